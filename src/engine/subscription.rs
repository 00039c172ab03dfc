//! Change notification: snapshots, subscribers and the registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// Which part of a machine changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// A transition completed (entry hook has run).
    StateChange,
    /// An action left the context different from before it ran.
    ContextChange,
}

/// Live view of a machine handed to subscribers.
///
/// The context is borrowed, not copied. Use [`Snapshot::cloned`] to keep a
/// point-in-time value past the callback.
#[derive(Debug, Serialize)]
pub struct Snapshot<'a, S, C> {
    pub state: &'a S,
    pub context: &'a C,
}

impl<S: Clone, C: Clone> Snapshot<'_, S, C> {
    pub fn cloned(&self) -> OwnedSnapshot<S, C> {
        OwnedSnapshot {
            state: self.state.clone(),
            context: self.context.clone(),
        }
    }
}

/// Owned copy of a machine's state and context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OwnedSnapshot<S, C> {
    pub state: S,
    pub context: C,
}

type Subscriber<S, C> = Arc<dyn Fn(&Snapshot<'_, S, C>, ChangeKind) + Send + Sync>;

struct Entries<S, C> {
    next_id: u64,
    list: Vec<(u64, Subscriber<S, C>)>,
}

/// Ordered set of subscriber callbacks.
///
/// Each subscription gets its own id, so the same closure subscribed twice
/// is notified twice and removed independently.
pub(crate) struct SubscriberRegistry<S, C> {
    entries: Arc<Mutex<Entries<S, C>>>,
}

impl<S, C> SubscriberRegistry<S, C>
where
    S: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries {
                next_id: 0,
                list: Vec::new(),
            })),
        }
    }

    pub(crate) fn subscribe<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&Snapshot<'_, S, C>, ChangeKind) + Send + Sync + 'static,
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let id = entries.next_id;
        entries.next_id += 1;
        let subscriber: Subscriber<S, C> = Arc::new(subscriber);
        entries.list.push((id, subscriber));

        let registry: Weak<Mutex<Entries<S, C>>> = Arc::downgrade(&self.entries);
        Subscription {
            id,
            detach: Box::new(move || {
                let Some(entries) = registry.upgrade() else {
                    return false;
                };
                let mut entries = entries.lock().unwrap_or_else(PoisonError::into_inner);
                let before = entries.list.len();
                entries.list.retain(|(entry_id, _)| *entry_id != id);
                entries.list.len() != before
            }),
        }
    }

    /// Call every subscriber registered when the pass starts, in order.
    ///
    /// The registry is not locked while callbacks run, so a callback may
    /// subscribe or unsubscribe; the change applies from the next pass.
    pub(crate) fn notify(&self, snapshot: &Snapshot<'_, S, C>, kind: ChangeKind) -> usize {
        let pass: Vec<Subscriber<S, C>> = {
            let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.list.iter().map(|(_, s)| Arc::clone(s)).collect()
        };
        for subscriber in &pass {
            subscriber(snapshot, kind);
        }
        pass.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .list
            .len()
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping it leaves the subscriber registered for the machine's lifetime;
/// call [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    id: u64,
    detach: Box<dyn FnOnce() -> bool + Send + Sync>,
}

impl Subscription {
    /// Remove the subscriber. Returns `false` if the machine is gone.
    pub fn unsubscribe(self) -> bool {
        (self.detach)()
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
