use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::SchedulerError;

pub type Task = Box<dyn FnOnce() + Send + 'static>;
pub type TickFn = Arc<dyn Fn() + Send + Sync + 'static>;
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync + 'static>;

/// Cancels a pending timeout or a running interval.
#[derive(Debug, Clone)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

pub trait Scheduler: Send + Sync {
    /// Runs `task` on a later turn of the scheduler.
    fn defer(&self, task: Task);

    fn set_timeout(&self, delay: Duration, task: Task) -> TimerHandle;

    /// Fires `tick` every `period` until cancelled. First firing is one
    /// period from now.
    fn set_interval(&self, period: Duration, tick: TickFn) -> TimerHandle;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub trait EventSource: Send + Sync {
    fn on(&self, event: &str, listener: Listener) -> ListenerId;

    fn off(&self, event: &str, id: ListenerId) -> bool;

    /// Calls every listener of `event` synchronously, in subscription
    /// order. Returns how many ran.
    fn emit(&self, event: &str, payload: &Value) -> usize;
}

#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    pub fn current() -> Result<Self, SchedulerError> {
        Ok(Self::new(Handle::try_current()?))
    }
}

impl Scheduler for TokioScheduler {
    fn defer(&self, task: Task) {
        self.handle.spawn(async move { task() });
    }

    fn set_timeout(&self, delay: Duration, task: Task) -> TimerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        self.handle.spawn(async move {
            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                _ = sleep(delay) => task(),
            }
        });
        TimerHandle { token }
    }

    fn set_interval(&self, period: Duration, tick: TickFn) -> TimerHandle {
        // interval_at rejects a zero period
        let period = period.max(Duration::from_millis(1));
        let token = CancellationToken::new();
        let cancelled = token.clone();
        self.handle.spawn(async move {
            let mut cadence = interval_at(Instant::now() + period, period);
            cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = cadence.tick() => tick(),
                }
            }
        });
        TimerHandle { token }
    }
}

/// In-process publish/subscribe. Clones share listeners.
#[derive(Clone, Default)]
pub struct EventEmitter {
    listeners: Arc<Mutex<HashMap<String, Vec<(ListenerId, Listener)>>>>,
    next_id: Arc<AtomicU64>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.lock().get(event).map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock();
        f.debug_struct("EventEmitter")
            .field("events", &listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EventSource for EventEmitter {
    fn on(&self, event: &str, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .entry(event.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    fn off(&self, event: &str, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(entries) = listeners.get_mut(event) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        before != entries.len()
    }

    fn emit(&self, event: &str, payload: &Value) -> usize {
        // Snapshot first: listeners may subscribe or unsubscribe while running.
        let snapshot: Vec<Listener> = match self.listeners.lock().get(event) {
            Some(entries) => entries.iter().map(|(_, l)| l.clone()).collect(),
            None => return 0,
        };
        for listener in &snapshot {
            listener(payload);
        }
        snapshot.len()
    }
}
