//! Delayed transition scheduling.
//!
//! Each entry into a state that declares `after` transitions spawns one
//! sleeping task per delay. Tasks only hold a weak reference back to the
//! machine, so a dropped machine never fires.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// What happens to pending delayed transitions when their state is left.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimerPolicy {
    /// Every transition (including re-entry) invalidates the timers scheduled
    /// by the previous entry.
    #[default]
    CancelOnExit,

    /// Timers always fire once scheduled, even after the state that
    /// scheduled them has been left. The delayed action and target are the
    /// ones declared on the scheduling state.
    Detached,
}

/// Timers spawned by one machine, grouped by state activation.
#[derive(Debug, Default)]
pub(crate) struct PendingTimers {
    activation: u64,
    handles: Vec<JoinHandle<()>>,
}

impl PendingTimers {
    pub(crate) fn activation(&self) -> u64 {
        self.activation
    }

    /// Start a new activation, aborting the previous one's timers under
    /// `CancelOnExit`. Returns the new activation number.
    pub(crate) fn begin_activation(&mut self, policy: TimerPolicy) -> u64 {
        if policy == TimerPolicy::CancelOnExit {
            self.cancel_all();
        }
        self.activation += 1;
        self.activation
    }

    pub(crate) fn track(&mut self, handle: JoinHandle<()>) {
        self.handles.retain(|h| !h.is_finished());
        self.handles.push(handle);
    }

    pub(crate) fn cancel_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    /// Timers that have neither fired nor been cancelled.
    pub(crate) fn live(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for PendingTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Spawn `fire` on `runtime` once `delay` has elapsed.
pub(crate) fn spawn_after<F>(runtime: &Handle, delay: Duration, fire: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    runtime.spawn(async move {
        tokio::time::sleep(delay).await;
        fire();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn spawned_timer_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);

        let handle = spawn_after(&Handle::current(), Duration::from_millis(50), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(49)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        handle.await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_on_exit_aborts_previous_activation() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timers = PendingTimers::default();

        let first = timers.begin_activation(TimerPolicy::CancelOnExit);
        let counter = Arc::clone(&fired);
        timers.track(spawn_after(&Handle::current(), Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let second = timers.begin_activation(TimerPolicy::CancelOnExit);
        assert_eq!(second, first + 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timers.live(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn detached_keeps_previous_activation() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timers = PendingTimers::default();

        timers.begin_activation(TimerPolicy::Detached);
        let counter = Arc::clone(&fired);
        timers.track(spawn_after(&Handle::current(), Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        timers.begin_activation(TimerPolicy::Detached);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_policy_cancels() {
        assert_eq!(TimerPolicy::default(), TimerPolicy::CancelOnExit);
    }
}
