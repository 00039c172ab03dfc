//! Builder for machine configurations, and the factory that spawns machines.

use crate::builder::error::BuildError;
use crate::builder::node::{StateNode, StateTable};
use crate::core::{Context, Event, FieldGuard, GuardSet, State};
use crate::engine::{Machine, TimerPolicy};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Builder for machine configurations with a fluent API.
///
/// # Example
///
/// ```rust
/// use chartwell::builder::{EventHandler, MachineBuilder, StateNode};
/// use chartwell::state_enum;
///
/// state_enum! {
///     enum Switch {
///         Off,
///         On,
///     }
/// }
///
/// let config = MachineBuilder::<Switch, &'static str, u32>::new()
///     .initial(Switch::Off)
///     .context(0)
///     .state(Switch::Off, StateNode::new().on("flip", EventHandler::to(Switch::On)))
///     .state(
///         Switch::On,
///         StateNode::new()
///             .entry(|presses: &mut u32| *presses += 1)
///             .on("flip", EventHandler::to(Switch::Off)),
///     )
///     .build()
///     .unwrap();
///
/// let machine = config.create();
/// machine.start().unwrap();
/// machine.send("flip").unwrap();
/// assert_eq!(machine.state(), Switch::On);
/// assert_eq!(machine.context(), 1);
/// ```
pub struct MachineBuilder<S: State, E: Event, C: Context> {
    initial: Option<S>,
    context: Option<C>,
    states: HashMap<S, StateNode<S, E, C>>,
    guards: GuardSet<C>,
    timer_policy: TimerPolicy,
    runtime: Option<Handle>,
}

impl<S: State, E: Event, C: Context> MachineBuilder<S, E, C> {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            initial: None,
            context: None,
            states: HashMap::new(),
            guards: GuardSet::new(),
            timer_policy: TimerPolicy::default(),
            runtime: None,
        }
    }

    /// Set the initial state (required).
    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }

    /// Set the context every machine starts from (required).
    pub fn context(mut self, context: C) -> Self {
        self.context = Some(context);
        self
    }

    /// Define a state. Defining the same state twice keeps the last node.
    pub fn state(mut self, state: S, node: StateNode<S, E, C>) -> Self {
        self.states.insert(state, node);
        self
    }

    /// Define several states at once.
    pub fn states<I>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = (S, StateNode<S, E, C>)>,
    {
        self.states.extend(states);
        self
    }

    /// Install a field guard on every machine created from this config.
    pub fn guard(mut self, guard: FieldGuard<C>) -> Self {
        self.guards.insert(guard);
        self
    }

    /// Choose what happens to pending delayed transitions on exit.
    pub fn timer_policy(mut self, policy: TimerPolicy) -> Self {
        self.timer_policy = policy;
        self
    }

    /// Runtime that delayed transitions are spawned on.
    ///
    /// Defaults to the runtime current at `create()` time, if any.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Build the configuration.
    ///
    /// Transition targets are not checked here; an unknown target surfaces
    /// as `MachineError::UnknownState` when it is first taken.
    pub fn build(self) -> Result<MachineConfig<S, E, C>, BuildError> {
        let initial = self.initial.ok_or(BuildError::MissingInitialState)?;
        let context = self.context.ok_or(BuildError::MissingContext)?;

        if self.states.is_empty() {
            return Err(BuildError::NoStates);
        }

        Ok(MachineConfig {
            table: Arc::new(StateTable::new(self.states)),
            guards: Arc::new(self.guards),
            initial,
            context,
            timer_policy: self.timer_policy,
            runtime: self.runtime,
        })
    }
}

impl<S: State, E: Event, C: Context> Default for MachineBuilder<S, E, C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-machine overrides for [`MachineConfig::create_with`].
#[derive(Clone, Debug)]
pub struct InstanceOptions<S, C> {
    pub context: Option<C>,
    pub initial: Option<S>,
}

impl<S, C> Default for InstanceOptions<S, C> {
    fn default() -> Self {
        Self {
            context: None,
            initial: None,
        }
    }
}

impl<S, C> InstanceOptions<S, C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(mut self, context: C) -> Self {
        self.context = Some(context);
        self
    }

    pub fn initial(mut self, state: S) -> Self {
        self.initial = Some(state);
        self
    }
}

/// A built configuration: the shared state table plus instance defaults.
///
/// Cheap to clone; the table and guards are shared by reference.
pub struct MachineConfig<S: State, E: Event, C: Context> {
    table: Arc<StateTable<S, E, C>>,
    guards: Arc<GuardSet<C>>,
    initial: S,
    context: C,
    timer_policy: TimerPolicy,
    runtime: Option<Handle>,
}

impl<S: State, E: Event, C: Context> MachineConfig<S, E, C> {
    /// Create a machine from the configured initial state and context.
    pub fn create(&self) -> Machine<S, E, C> {
        self.create_with(InstanceOptions::default())
    }

    /// Create a machine, overriding the initial state and/or context.
    ///
    /// The machine owns its context; the configured default is cloned.
    pub fn create_with(&self, options: InstanceOptions<S, C>) -> Machine<S, E, C> {
        let context = options.context.unwrap_or_else(|| self.context.clone());
        let initial = options.initial.unwrap_or_else(|| self.initial.clone());
        let runtime = self.runtime.clone().or_else(|| Handle::try_current().ok());

        Machine::new(
            Arc::clone(&self.table),
            Arc::clone(&self.guards),
            initial,
            context,
            self.timer_policy,
            runtime,
        )
    }

    pub fn initial_state(&self) -> &S {
        &self.initial
    }

    pub fn initial_context(&self) -> &C {
        &self.context
    }

    /// Whether `state` has a definition in the table.
    pub fn defines(&self, state: &S) -> bool {
        self.table.contains(state)
    }

    pub fn state_count(&self) -> usize {
        self.table.len()
    }

    pub fn guard_count(&self) -> usize {
        self.guards.len()
    }

    pub fn timer_policy(&self) -> TimerPolicy {
        self.timer_policy
    }
}

impl<S: State, E: Event, C: Context> Clone for MachineConfig<S, E, C> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            guards: Arc::clone(&self.guards),
            initial: self.initial.clone(),
            context: self.context.clone(),
            timer_policy: self.timer_policy,
            runtime: self.runtime.clone(),
        }
    }
}

impl<S: State, E: Event, C: Context> fmt::Debug for MachineConfig<S, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineConfig")
            .field("initial", &self.initial)
            .field("states", &self.table.len())
            .field("guards", &self.guards)
            .field("timer_policy", &self.timer_policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::EventHandler;
    use crate::state_enum;

    state_enum! {
        enum TestState {
            Draft,
            Published,
            Archived,
        }
        final: [Archived]
    }

    #[derive(Clone, PartialEq, Debug, Default)]
    struct Post {
        title: String,
        views: u32,
    }

    fn builder() -> MachineBuilder<TestState, &'static str, Post> {
        MachineBuilder::new()
    }

    #[test]
    fn builder_validates_initial_state() {
        let result = builder().context(Post::default()).build();
        assert!(matches!(result, Err(BuildError::MissingInitialState)));
    }

    #[test]
    fn builder_validates_context() {
        let result = builder().initial(TestState::Draft).build();
        assert!(matches!(result, Err(BuildError::MissingContext)));
    }

    #[test]
    fn builder_requires_states() {
        let result = builder()
            .initial(TestState::Draft)
            .context(Post::default())
            .build();
        assert!(matches!(result, Err(BuildError::NoStates)));
    }

    #[test]
    fn build_does_not_check_targets() {
        let config = builder()
            .initial(TestState::Draft)
            .context(Post::default())
            .state(
                TestState::Draft,
                StateNode::new().on("archive", EventHandler::to(TestState::Archived)),
            )
            .build()
            .unwrap();

        assert!(config.defines(&TestState::Draft));
        assert!(!config.defines(&TestState::Archived));
        assert_eq!(config.state_count(), 1);
    }

    #[test]
    fn fluent_api_builds_config() {
        let config = builder()
            .initial(TestState::Draft)
            .context(Post {
                title: "hello".into(),
                views: 0,
            })
            .states(vec![
                (TestState::Draft, StateNode::new()),
                (TestState::Published, StateNode::new()),
            ])
            .guard(crate::field_guard!(Post, views, |p| p.views < 1000))
            .timer_policy(TimerPolicy::Detached)
            .build()
            .unwrap();

        assert_eq!(config.initial_state(), &TestState::Draft);
        assert_eq!(config.initial_context().title, "hello");
        assert_eq!(config.state_count(), 2);
        assert_eq!(config.guard_count(), 1);
        assert_eq!(config.timer_policy(), TimerPolicy::Detached);
    }

    #[test]
    fn create_clones_context_per_machine() {
        let config = builder()
            .initial(TestState::Draft)
            .context(Post::default())
            .state(
                TestState::Draft,
                StateNode::new().on(
                    "view",
                    EventHandler::new().action(|p: &mut Post, _| p.views += 1),
                ),
            )
            .build()
            .unwrap();

        let first = config.create();
        let second = config.create();
        first.send("view").unwrap();

        assert_eq!(first.context().views, 1);
        assert_eq!(second.context().views, 0);
        assert_eq!(config.initial_context().views, 0);
    }

    #[test]
    fn create_with_overrides_defaults() {
        let config = builder()
            .initial(TestState::Draft)
            .context(Post::default())
            .state(TestState::Draft, StateNode::new())
            .state(TestState::Published, StateNode::new())
            .build()
            .unwrap();

        let machine = config.create_with(
            InstanceOptions::new()
                .initial(TestState::Published)
                .context(Post {
                    title: "custom".into(),
                    views: 7,
                }),
        );

        assert_eq!(machine.state(), TestState::Published);
        assert_eq!(machine.context().views, 7);
    }
}
