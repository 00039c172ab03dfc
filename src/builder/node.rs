//! Builders for state definitions: hooks, event handlers and delayed transitions.

use crate::core::{Context, Event, State};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

pub(crate) type Hook<C> = Box<dyn Fn(&mut C) + Send + Sync>;
pub(crate) type EventAction<E, C> = Box<dyn Fn(&mut C, &E) + Send + Sync>;

/// Reaction to one named event: an optional action, then an optional target.
pub struct EventHandler<S, E, C> {
    pub(crate) target: Option<S>,
    pub(crate) action: Option<EventAction<E, C>>,
}

impl<S: State, E: Event, C: Context> EventHandler<S, E, C> {
    /// A handler that does nothing until given a target or action.
    pub fn new() -> Self {
        Self {
            target: None,
            action: None,
        }
    }

    /// Shorthand for `EventHandler::new().target(state)`.
    pub fn to(state: S) -> Self {
        Self::new().target(state)
    }

    /// Transition to `state` after the action (if any) has run.
    pub fn target(mut self, state: S) -> Self {
        self.target = Some(state);
        self
    }

    /// Mutate the context. The action receives the event that triggered it.
    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut C, &E) + Send + Sync + 'static,
    {
        self.action = Some(Box::new(action));
        self
    }
}

impl<S: State, E: Event, C: Context> Default for EventHandler<S, E, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State, E, C> fmt::Debug for EventHandler<S, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandler")
            .field("target", &self.target)
            .field("action", &self.action.is_some())
            .finish()
    }
}

/// Transition taken automatically once a delay has elapsed in a state.
pub struct DelayedTransition<S, C> {
    pub(crate) target: Option<S>,
    pub(crate) action: Option<Hook<C>>,
}

impl<S: State, C: Context> DelayedTransition<S, C> {
    pub fn new() -> Self {
        Self {
            target: None,
            action: None,
        }
    }

    /// Shorthand for `DelayedTransition::new().target(state)`.
    pub fn to(state: S) -> Self {
        Self::new().target(state)
    }

    pub fn target(mut self, state: S) -> Self {
        self.target = Some(state);
        self
    }

    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(&mut C) + Send + Sync + 'static,
    {
        self.action = Some(Box::new(action));
        self
    }
}

impl<S: State, C: Context> Default for DelayedTransition<S, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State, C> fmt::Debug for DelayedTransition<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelayedTransition")
            .field("target", &self.target)
            .field("action", &self.action.is_some())
            .finish()
    }
}

/// Behaviour bundle for one state.
///
/// Every part is optional. A node without an event table rejects every
/// event with `MissingEventTable`; a node with an empty table (see
/// [`StateNode::events`]) rejects them with `UnknownEvent` instead.
///
/// # Example
///
/// ```rust
/// use chartwell::builder::{DelayedTransition, EventHandler, StateNode};
/// use chartwell::state_enum;
/// use std::time::Duration;
///
/// state_enum! {
///     enum Phase {
///         Waiting,
///         Expired,
///     }
///     final: [Expired]
/// }
///
/// #[derive(Clone, PartialEq, Debug, Default)]
/// struct Ticks {
///     count: u32,
/// }
///
/// let waiting: StateNode<Phase, &'static str, Ticks> = StateNode::new()
///     .entry(|ctx: &mut Ticks| ctx.count = 0)
///     .on("tick", EventHandler::new().action(|ctx: &mut Ticks, _| ctx.count += 1))
///     .after(Duration::from_secs(5), DelayedTransition::to(Phase::Expired));
/// ```
pub struct StateNode<S, E, C> {
    pub(crate) entry: Option<Hook<C>>,
    pub(crate) exit: Option<Hook<C>>,
    pub(crate) on: Option<HashMap<String, EventHandler<S, E, C>>>,
    pub(crate) after: Option<BTreeMap<Duration, DelayedTransition<S, C>>>,
}

impl<S: State, E: Event, C: Context> StateNode<S, E, C> {
    pub fn new() -> Self {
        Self {
            entry: None,
            exit: None,
            on: None,
            after: None,
        }
    }

    /// Run `hook` each time this state becomes current, including re-entry.
    pub fn entry<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut C) + Send + Sync + 'static,
    {
        self.entry = Some(Box::new(hook));
        self
    }

    /// Run `hook` when leaving this state for a different one.
    pub fn exit<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut C) + Send + Sync + 'static,
    {
        self.exit = Some(Box::new(hook));
        self
    }

    /// Handle the event named `event`, replacing any earlier handler for it.
    pub fn on(mut self, event: impl Into<String>, handler: EventHandler<S, E, C>) -> Self {
        self.on
            .get_or_insert_with(HashMap::new)
            .insert(event.into(), handler);
        self
    }

    /// Install an event table from `handlers`, even when it is empty.
    pub fn events<K, I>(mut self, handlers: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, EventHandler<S, E, C>)>,
    {
        let table = self.on.get_or_insert_with(HashMap::new);
        table.extend(handlers.into_iter().map(|(k, h)| (k.into(), h)));
        self
    }

    /// Schedule `transition` to fire `delay` after each entry into this state.
    ///
    /// One transition per delay; a second call with the same delay replaces
    /// the first.
    pub fn after(mut self, delay: Duration, transition: DelayedTransition<S, C>) -> Self {
        self.after
            .get_or_insert_with(BTreeMap::new)
            .insert(delay, transition);
        self
    }

    /// Same as [`StateNode::after`] with the delay given in milliseconds.
    pub fn after_ms(self, millis: u64, transition: DelayedTransition<S, C>) -> Self {
        self.after(Duration::from_millis(millis), transition)
    }
}

impl<S: State, E: Event, C: Context> Default for StateNode<S, E, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State, E, C> fmt::Debug for StateNode<S, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("entry", &self.entry.is_some())
            .field("exit", &self.exit.is_some())
            .field("on", &self.on)
            .field("after", &self.after)
            .finish()
    }
}

/// Immutable mapping from state to its definition, shared by every machine
/// created from one configuration.
pub(crate) struct StateTable<S, E, C> {
    nodes: HashMap<S, StateNode<S, E, C>>,
}

impl<S: State, E: Event, C: Context> StateTable<S, E, C> {
    pub(crate) fn new(nodes: HashMap<S, StateNode<S, E, C>>) -> Self {
        Self { nodes }
    }

    pub(crate) fn get(&self, state: &S) -> Option<&StateNode<S, E, C>> {
        self.nodes.get(state)
    }

    pub(crate) fn contains(&self, state: &S) -> bool {
        self.nodes.contains_key(state)
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }
}
