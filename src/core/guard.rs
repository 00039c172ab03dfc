//! Field-scoped guards over a machine's context.
//!
//! A guard watches one field of the context. After every action the guard's
//! predicate is evaluated against the whole post-action context; if it
//! rejects, only the guarded field is copied back from the pre-action
//! snapshot. Other fields keep whatever the action wrote.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

type Predicate<C> = Box<dyn Fn(&C) -> bool + Send + Sync>;
type Restore<C> = Box<dyn Fn(&mut C, &C) + Send + Sync>;

/// Predicate guarding a single context field.
///
/// `restore` copies the guarded field from the pre-action snapshot (second
/// argument) into the live context (first argument). The `field_guard!`
/// macro writes it for plain struct fields.
///
/// # Example
///
/// ```rust
/// use chartwell::core::FieldGuard;
///
/// #[derive(Clone, PartialEq, Debug)]
/// struct Account {
///     balance: i64,
///     note: String,
/// }
///
/// let guard = FieldGuard::new(
///     "balance",
///     |acc: &Account| acc.balance >= 0,
///     |live: &mut Account, prev: &Account| live.balance = prev.balance,
/// );
///
/// let before = Account { balance: 10, note: String::new() };
/// let mut after = Account { balance: -5, note: "overdraw".into() };
///
/// assert!(!guard.check(&after));
/// guard.restore(&mut after, &before);
/// assert_eq!(after.balance, 10);
/// assert_eq!(after.note, "overdraw");
/// ```
pub struct FieldGuard<C> {
    key: String,
    predicate: Predicate<C>,
    restore: Restore<C>,
}

impl<C> FieldGuard<C> {
    /// Create a guard for the field named `key`.
    pub fn new<P, R>(key: impl Into<String>, predicate: P, restore: R) -> Self
    where
        P: Fn(&C) -> bool + Send + Sync + 'static,
        R: Fn(&mut C, &C) + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            predicate: Box::new(predicate),
            restore: Box::new(restore),
        }
    }

    /// The guarded field's key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Evaluate the predicate against the whole context.
    pub fn check(&self, context: &C) -> bool {
        (self.predicate)(context)
    }

    /// Copy the guarded field from `previous` into `live`.
    pub fn restore(&self, live: &mut C, previous: &C) {
        (self.restore)(live, previous)
    }
}

impl FieldGuard<Value> {
    /// Guard one key of a JSON object context.
    ///
    /// On rejection the key is restored from the snapshot, or removed if the
    /// snapshot did not have it. Non-object contexts are left untouched.
    pub fn json<P>(key: impl Into<String>, predicate: P) -> Self
    where
        P: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let key = key.into();
        let field = key.clone();
        Self::new(key, predicate, move |live: &mut Value, previous: &Value| {
            let Some(object) = live.as_object_mut() else {
                return;
            };
            match previous.get(&field) {
                Some(value) => {
                    object.insert(field.clone(), value.clone());
                }
                None => {
                    object.remove(&field);
                }
            }
        })
    }
}

impl<C> fmt::Debug for FieldGuard<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldGuard").field("key", &self.key).finish()
    }
}

/// Guards installed on a machine, one per field key.
///
/// Guards are kept sorted by key so evaluation order is the same on every
/// run. Adding a second guard for a key replaces the first.
pub struct GuardSet<C> {
    guards: BTreeMap<String, FieldGuard<C>>,
}

impl<C> Default for GuardSet<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> GuardSet<C> {
    pub fn new() -> Self {
        Self {
            guards: BTreeMap::new(),
        }
    }

    /// Install a guard, replacing any guard already watching the same key.
    pub fn insert(&mut self, guard: FieldGuard<C>) -> Option<FieldGuard<C>> {
        self.guards.insert(guard.key.clone(), guard)
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Revert every field whose guard rejects `live`.
    ///
    /// Returns the keys that were reverted, in evaluation order.
    pub fn enforce(&self, live: &mut C, previous: &C) -> Vec<&str> {
        let mut reverted = Vec::new();
        for guard in self.guards.values() {
            if !guard.check(live) {
                guard.restore(live, previous);
                reverted.push(guard.key());
            }
        }
        reverted
    }
}

impl<C> fmt::Debug for GuardSet<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.guards.keys()).finish()
    }
}
