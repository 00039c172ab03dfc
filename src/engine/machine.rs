//! The running machine: event dispatch, guarded actions and transitions.

use crate::builder::node::{StateNode, StateTable};
use crate::core::{Context, Event, GuardSet, State, StateHistory, StateTransition, TransitionCause};
use crate::engine::error::MachineError;
use crate::engine::subscription::{
    ChangeKind, OwnedSnapshot, Snapshot, SubscriberRegistry, Subscription,
};
use crate::engine::timer::{spawn_after, PendingTimers, TimerPolicy};
use chrono::Utc;
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

/// A running instance of a machine configuration.
///
/// Created by [`MachineConfig::create`](crate::builder::MachineConfig::create)
/// with the initial state already current but not yet entered; call
/// [`Machine::start`] to run the initial entry hook and schedule its delayed
/// transitions.
///
/// `Machine` is a cheap handle: clones refer to the same instance. Dropping
/// the last handle cancels every pending delayed transition.
///
/// Every operation runs to completion under a per-instance lock, and hooks,
/// actions and subscribers run while it is held. Calls they make back into
/// the same machine are detected rather than blocking:
///
/// - `send` queues the event; it is dispatched once the current step is done
/// - `start` and `try_snapshot` return [`MachineError::Reentrant`]
/// - `state`, `context`, `snapshot`, `with_snapshot`, `history`, `is_done` and
///   `pending_timers` panic
///
/// Subscribing and unsubscribing from a callback is fine. Subscribers that
/// need the current values should read the [`Snapshot`] they are handed.
pub struct Machine<S: State, E: Event, C: Context> {
    shared: Arc<Shared<S, E, C>>,
}

struct Shared<S: State, E: Event, C: Context> {
    id: Uuid,
    table: Arc<StateTable<S, E, C>>,
    guards: Arc<GuardSet<C>>,
    subscribers: SubscriberRegistry<S, C>,
    timer_policy: TimerPolicy,
    runtime: Option<Handle>,
    core: Mutex<Core<S, C>>,
    holder: Mutex<Option<ThreadId>>,
    queued: Mutex<VecDeque<E>>,
}

struct Core<S: State, C> {
    initial: S,
    current: S,
    context: C,
    history: StateHistory<S>,
    timers: PendingTimers,
}

/// The core lock, tagged with the thread holding it.
struct Held<'a, S: State, C> {
    core: MutexGuard<'a, Core<S, C>>,
    holder: &'a Mutex<Option<ThreadId>>,
}

impl<S: State, C> Deref for Held<'_, S, C> {
    type Target = Core<S, C>;

    fn deref(&self) -> &Core<S, C> {
        &self.core
    }
}

impl<S: State, C> DerefMut for Held<'_, S, C> {
    fn deref_mut(&mut self) -> &mut Core<S, C> {
        &mut self.core
    }
}

impl<S: State, C> Drop for Held<'_, S, C> {
    fn drop(&mut self) {
        // Cleared before `core` is released.
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl<S: State, E: Event, C: Context> Machine<S, E, C> {
    pub(crate) fn new(
        table: Arc<StateTable<S, E, C>>,
        guards: Arc<GuardSet<C>>,
        initial: S,
        context: C,
        timer_policy: TimerPolicy,
        runtime: Option<Handle>,
    ) -> Self {
        let id = Uuid::new_v4();
        debug!(machine = %id, initial = initial.name(), "machine created");
        Self {
            shared: Arc::new(Shared {
                id,
                table,
                guards,
                subscribers: SubscriberRegistry::new(),
                timer_policy,
                runtime,
                core: Mutex::new(Core {
                    current: initial.clone(),
                    initial,
                    context,
                    history: StateHistory::new(),
                    timers: PendingTimers::default(),
                }),
                holder: Mutex::new(None),
                queued: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Enter the initial state.
    ///
    /// The exit hook is skipped (the initial state is already current), the
    /// entry hook runs, subscribers receive `StateChange` and the state's
    /// delayed transitions are scheduled. Calling `start` again repeats the
    /// whole sequence.
    pub fn start(&self) -> Result<&Self, MachineError> {
        let shared = &self.shared;
        let mut core = shared.lock("start")?;
        let initial = core.initial.clone();
        let result = shared.transition(&mut core, &initial, TransitionCause::Start);
        shared.drain_queued(&mut core);
        result.map(|()| self)
    }

    /// Dispatch `event` against the current state's event table.
    ///
    /// The handler's action runs first (under the guard layer), then the
    /// transition to its target, so entry and exit hooks see the action's
    /// effects.
    ///
    /// Called from a hook, action or subscriber of this machine, the event
    /// is queued and `Ok(())` is returned; it is dispatched after the current
    /// step completes, and a failure is logged instead of returned.
    pub fn send(&self, event: E) -> Result<(), MachineError> {
        let shared = &self.shared;
        if shared.held_by_current_thread() {
            debug!(
                machine = %shared.id,
                event = event.name(),
                "event queued until the current step completes"
            );
            shared
                .queued
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(event);
            return Ok(());
        }

        let mut core = shared.lock("send")?;
        let result = shared.dispatch(&mut core, &event);
        shared.drain_queued(&mut core);
        result
    }

    /// Register `subscriber` for every subsequent state and context change.
    pub fn subscribe<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&Snapshot<'_, S, C>, ChangeKind) + Send + Sync + 'static,
    {
        self.shared.subscribers.subscribe(subscriber)
    }

    /// Run `f` against a borrowed view of the current state and context.
    ///
    /// # Panics
    ///
    /// If called from a hook, action or subscriber of this machine.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&Snapshot<'_, S, C>) -> R) -> R {
        let core = self.read("with_snapshot");
        f(&Snapshot {
            state: &core.current,
            context: &core.context,
        })
    }

    /// Copy of the current state and context.
    ///
    /// # Panics
    ///
    /// If called from a hook, action or subscriber of this machine; use
    /// [`Machine::try_snapshot`] there.
    pub fn snapshot(&self) -> OwnedSnapshot<S, C> {
        self.with_snapshot(|snapshot| snapshot.cloned())
    }

    /// Copy of the current state and context, or `Reentrant` when called
    /// from a hook, action or subscriber of this machine.
    pub fn try_snapshot(&self) -> Result<OwnedSnapshot<S, C>, MachineError> {
        let core = self.shared.lock("try_snapshot")?;
        Ok(OwnedSnapshot {
            state: core.current.clone(),
            context: core.context.clone(),
        })
    }

    pub fn state(&self) -> S {
        self.read("state").current.clone()
    }

    pub fn context(&self) -> C {
        self.read("context").context.clone()
    }

    /// Whether the current state is final.
    pub fn is_done(&self) -> bool {
        self.read("is_done").current.is_final()
    }

    /// Every transition taken so far, oldest first.
    pub fn history(&self) -> StateHistory<S> {
        self.read("history").history.clone()
    }

    /// Unique id of this instance, as recorded in log events.
    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.len()
    }

    /// Delayed transitions scheduled and not yet fired or cancelled.
    pub fn pending_timers(&self) -> usize {
        self.read("pending_timers").timers.live()
    }

    fn read(&self, operation: &'static str) -> Held<'_, S, C> {
        match self.shared.lock(operation) {
            Ok(core) => core,
            Err(err) => panic!("{err}"),
        }
    }
}

impl<S: State, E: Event, C: Context> Shared<S, E, C> {
    fn held_by_current_thread(&self) -> bool {
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner) == Some(thread::current().id())
    }

    /// Take the core lock, refusing if this thread already holds it.
    fn lock(&self, operation: &'static str) -> Result<Held<'_, S, C>, MachineError> {
        if self.held_by_current_thread() {
            return Err(MachineError::Reentrant { operation });
        }
        let core = self.core.lock().unwrap_or_else(PoisonError::into_inner);
        *self.holder.lock().unwrap_or_else(PoisonError::into_inner) = Some(thread::current().id());
        Ok(Held {
            core,
            holder: &self.holder,
        })
    }

    fn node(&self, state: &S) -> Result<&StateNode<S, E, C>, MachineError> {
        self.table.get(state).ok_or_else(|| MachineError::UnknownState {
            state: state.name().to_string(),
        })
    }

    fn notify(&self, core: &Core<S, C>, kind: ChangeKind) {
        let snapshot = Snapshot {
            state: &core.current,
            context: &core.context,
        };
        let notified = self.subscribers.notify(&snapshot, kind);
        trace!(machine = %self.id, ?kind, notified, "subscribers notified");
    }

    fn dispatch(self: &Arc<Self>, core: &mut Core<S, C>, event: &E) -> Result<(), MachineError> {
        let current = core.current.clone();

        let node = self.node(&current)?;
        let handlers = node
            .on
            .as_ref()
            .ok_or_else(|| MachineError::MissingEventTable {
                state: current.name().to_string(),
            })?;
        let handler = handlers
            .get(event.name())
            .ok_or_else(|| MachineError::UnknownEvent {
                state: current.name().to_string(),
                event: event.name().to_string(),
            })?;

        debug!(
            machine = %self.id,
            state = current.name(),
            event = event.name(),
            "dispatching event"
        );

        if let Some(action) = &handler.action {
            self.run_action(core, |context| action(context, event));
        }
        if let Some(target) = &handler.target {
            self.transition(
                core,
                target,
                TransitionCause::Event(event.name().to_string()),
            )?;
        }
        Ok(())
    }

    /// Dispatch events sent from inside callbacks, oldest first, until none
    /// are left. Their errors have no caller and are logged.
    fn drain_queued(self: &Arc<Self>, core: &mut Core<S, C>) {
        while let Some(event) = self.next_queued() {
            if let Err(err) = self.dispatch(core, &event) {
                error!(
                    machine = %self.id,
                    event = event.name(),
                    error = %err,
                    "queued event failed"
                );
            }
        }
    }

    fn next_queued(&self) -> Option<E> {
        self.queued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Run an action against the live context, then let the guards revert
    /// rejected fields. Subscribers hear about it only if something changed.
    fn run_action(&self, core: &mut Core<S, C>, action: impl FnOnce(&mut C)) {
        let before = core.context.clone();
        action(&mut core.context);

        let reverted = self.guards.enforce(&mut core.context, &before);
        if !reverted.is_empty() {
            debug!(
                machine = %self.id,
                state = core.current.name(),
                fields = ?reverted,
                "guards reverted context fields"
            );
        }

        if core.context != before {
            self.notify(core, ChangeKind::ContextChange);
        }
    }

    fn transition(
        self: &Arc<Self>,
        core: &mut Core<S, C>,
        target: &S,
        cause: TransitionCause,
    ) -> Result<(), MachineError> {
        let node = self.node(target)?;
        let from = core.current.clone();

        if *target != from {
            if let Some(exit) = self.table.get(&from).and_then(|n| n.exit.as_ref()) {
                exit(&mut core.context);
            }
        }

        let activation = core.timers.begin_activation(self.timer_policy);
        core.current = target.clone();
        debug!(
            machine = %self.id,
            from = from.name(),
            to = target.name(),
            cause = ?cause,
            "transition"
        );
        if target.is_error() {
            warn!(machine = %self.id, state = target.name(), "entered error state");
        } else if target.is_final() {
            debug!(machine = %self.id, state = target.name(), "entered final state");
        }
        core.history.push(StateTransition {
            from,
            to: target.clone(),
            timestamp: Utc::now(),
            cause,
        });

        if let Some(entry) = &node.entry {
            entry(&mut core.context);
        }

        self.notify(core, ChangeKind::StateChange);

        let Some(after) = node.after.as_ref().filter(|after| !after.is_empty()) else {
            return Ok(());
        };
        let runtime = self.runtime.as_ref().ok_or_else(|| MachineError::NoRuntime {
            state: target.name().to_string(),
        })?;

        for delay in after.keys().copied() {
            let machine = Arc::downgrade(self);
            let scheduled_by = target.clone();
            let handle = spawn_after(runtime, delay, move || {
                if let Some(shared) = machine.upgrade() {
                    shared.fire_delayed(&scheduled_by, delay, activation);
                }
            });
            core.timers.track(handle);
            debug!(
                machine = %self.id,
                state = target.name(),
                ?delay,
                "delayed transition scheduled"
            );
        }
        Ok(())
    }

    /// Body of a delayed transition: the scheduling state's action, then its
    /// target. Errors have no caller to return to and are logged.
    fn fire_delayed(self: &Arc<Self>, scheduled_by: &S, delay: Duration, activation: u64) {
        let mut core = match self.lock("delayed transition") {
            Ok(core) => core,
            Err(err) => {
                error!(machine = %self.id, error = %err, "delayed transition dropped");
                return;
            }
        };

        if self.timer_policy == TimerPolicy::CancelOnExit && core.timers.activation() != activation
        {
            debug!(
                machine = %self.id,
                state = scheduled_by.name(),
                ?delay,
                "stale delayed transition skipped"
            );
            return;
        }

        let Some(delayed) = self
            .table
            .get(scheduled_by)
            .and_then(|node| node.after.as_ref())
            .and_then(|after| after.get(&delay))
        else {
            return;
        };

        debug!(
            machine = %self.id,
            state = scheduled_by.name(),
            current = core.current.name(),
            ?delay,
            "delayed transition fired"
        );

        if let Some(action) = &delayed.action {
            self.run_action(&mut core, |context| action(context));
        }
        if let Some(target) = &delayed.target {
            if let Err(err) = self.transition(&mut core, target, TransitionCause::After(delay)) {
                error!(
                    machine = %self.id,
                    state = scheduled_by.name(),
                    error = %err,
                    "delayed transition failed"
                );
            }
        }
        self.drain_queued(&mut core);
    }
}

impl<S: State, E: Event, C: Context> Clone for Machine<S, E, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: State, E: Event, C: Context> fmt::Debug for Machine<S, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Machine");
        debug.field("id", &self.shared.id);
        match self.shared.core.try_lock() {
            Ok(core) => debug.field("state", &core.current),
            Err(_) => debug.field("state", &"<locked>"),
        };
        debug.finish()
    }
}
