//! Macros for ergonomic machine construction.

/// Generate a state enum and its `State` implementation.
///
/// The enum derives everything `State` requires, so `serde` must be a
/// dependency of the calling crate.
///
/// # Example
///
/// ```
/// use chartwell::state_enum;
///
/// state_enum! {
///     pub enum OrderState {
///         Pending,
///         Paid,
///         Shipped,
///         Cancelled,
///     }
///     final: [Shipped, Cancelled]
///     error: [Cancelled]
/// }
/// ```
#[macro_export]
macro_rules! state_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident
            ),* $(,)?
        }

        $(final: [$($final:ident),* $(,)?])?
        $(error: [$($error:ident),* $(,)?])?
    ) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Debug, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant
            ),*
        }

        impl $crate::core::State for $name {
            fn name(&self) -> &str {
                match self {
                    $(Self::$variant => stringify!($variant)),*
                }
            }

            fn is_final(&self) -> bool {
                match self {
                    $($(Self::$final => true,)*)?
                    _ => false,
                }
            }

            fn is_error(&self) -> bool {
                match self {
                    $($(Self::$error => true,)*)?
                    _ => false,
                }
            }
        }
    };
}

/// Build a `FieldGuard` for a named struct field.
///
/// The guard is keyed by the field name and restores the field with
/// `Clone` when the predicate rejects the post-action context.
///
/// # Example
///
/// ```
/// use chartwell::field_guard;
///
/// #[derive(Clone, PartialEq, Debug)]
/// struct Cart {
///     items: u32,
///     coupon: Option<String>,
/// }
///
/// let guard = field_guard!(Cart, items, |cart| cart.items <= 20);
/// assert_eq!(guard.key(), "items");
///
/// let before = Cart { items: 3, coupon: None };
/// let mut after = Cart { items: 50, coupon: Some("SPRING".into()) };
/// guard.restore(&mut after, &before);
/// assert_eq!(after.items, 3);
/// assert_eq!(after.coupon.as_deref(), Some("SPRING"));
/// ```
#[macro_export]
macro_rules! field_guard {
    ($ty:ty, $field:ident, $predicate:expr $(,)?) => {
        $crate::core::FieldGuard::<$ty>::new(
            stringify!($field),
            $predicate,
            |live: &mut $ty, previous: &$ty| {
                live.$field = ::std::clone::Clone::clone(&previous.$field);
            },
        )
    };
}
