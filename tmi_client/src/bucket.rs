use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use crate::{ClientError, TransportError};

/// Parameters for the token bucket algorithm used by [`DispatchQueue`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThrottleSettings {
    /// Number of actions allowed per `time` seconds
    pub num: u32,
    /// Time permitted, in seconds, to send `num` actions
    pub time: u32,
    /// Number of actions allowed to temporarily exceed the normal rate
    pub burst: u32,
}

impl ThrottleSettings {
    /// Interval between released tokens once the burst allowance is spent.
    /// A zero `num` disables throttling.
    fn interval(&self) -> Duration {
        if self.num == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs(u64::from(self.time)).div_f64(f64::from(self.num))
        }
    }
}

/// Token reservation state for a single drip task.
struct TokenBucket {
    interval: Duration,
    capacity: u32,
    tokens: f64,
    refreshed: Instant,
}

impl TokenBucket {
    fn new(settings: ThrottleSettings) -> Self {
        let capacity = settings.burst.max(1);
        Self {
            interval: settings.interval(),
            capacity,
            tokens: f64::from(capacity),
            refreshed: Instant::now(),
        }
    }

    /// Consume one token, returning the instant at which it may be used.
    fn reserve(&mut self) -> Instant {
        let now = Instant::now();
        if self.interval.is_zero() {
            return now;
        }

        let refill = (now - self.refreshed).as_secs_f64() / self.interval.as_secs_f64();
        self.tokens = (self.tokens + refill).min(f64::from(self.capacity));
        self.refreshed = now;

        self.tokens -= 1.0;
        if self.tokens >= 0.0 {
            now
        } else {
            now + self.interval.mul_f64(-self.tokens)
        }
    }
}

/// Receives the actions released from a [`DispatchQueue`].
#[async_trait]
pub trait Sink: Send + Sync + 'static {
    type Item: Send + 'static;

    /// Deliver one released action.
    async fn deliver(&self, item: Self::Item) -> Result<(), TransportError>;

    /// Called when `deliver` fails. The queue keeps draining afterwards; a
    /// single bad delivery never halts the backlog.
    fn on_error(&self, err: TransportError);

    /// Close the sink, once the queue has fully drained.
    async fn close(&self) -> Result<(), TransportError>;
}

struct QueueState<T> {
    // Separate backlogs keep FIFO order within each priority while letting
    // urgent items jump everything still queued at normal priority.
    high: VecDeque<T>,
    normal: VecDeque<T>,
    closed: bool,
    cancelled: bool,
}

struct Shared<T> {
    state: Mutex<QueueState<T>>,
    notify: Notify,
}

/// An ordered queue of pending outbound actions, drained by a single
/// background drip task under a token-bucket policy.
///
/// Enqueueing never blocks and the backlog is unbounded; the remote rate,
/// not local memory, is the bottleneck resource. The token wait inside the
/// drip task is the only long suspension point of the whole pipeline.
pub struct DispatchQueue<T: Send + 'static> {
    shared: Arc<Shared<T>>,
    drip: Mutex<Option<JoinHandle<Result<(), TransportError>>>>,
}

impl<T: Send + 'static> DispatchQueue<T> {
    /// Create a queue draining into `sink` under `settings`, and start its
    /// drip task. Must be called within a tokio runtime.
    pub fn new<S: Sink<Item = T>>(sink: S, settings: ThrottleSettings) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                high: VecDeque::new(),
                normal: VecDeque::new(),
                closed: false,
                cancelled: false,
            }),
            notify: Notify::new(),
        });

        let drip = tokio::spawn(drip(Arc::clone(&shared), sink, settings));

        Self {
            shared,
            drip: Mutex::new(Some(drip)),
        }
    }

    /// Append an action to the queue. High-priority items are delivered
    /// before any normal-priority backlog, but never displace an item
    /// already handed to the sink.
    pub fn enqueue(&self, item: T, high_priority: bool) -> Result<(), ClientError> {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(ClientError::QueueClosed);
            }
            if high_priority {
                state.high.push_back(item);
            } else {
                state.normal.push_back(item);
            }
        }
        self.shared.notify.notify_one();
        Ok(())
    }

    /// Stop accepting new actions, wait for the backlog to drain (token
    /// waits still apply), then close the sink and return its close error.
    /// Idempotent.
    pub async fn close(&self) -> Result<(), TransportError> {
        {
            let mut state = self.shared.state.lock();
            state.closed = true;
        }
        self.shared.notify.notify_one();

        let handle = self.drip.lock().take();
        match handle {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("drip task panicked or was aborted: {}", e);
                    Ok(())
                }
            },
            None => Ok(()),
        }
    }
}

impl<T: Send + 'static> Drop for DispatchQueue<T> {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        if !state.closed {
            // Dropped without a graceful close: cancel the drip. It wakes
            // immediately, even mid-token-wait, and exits without delivering.
            state.cancelled = true;
            drop(state);
            self.shared.notify.notify_one();
        }
    }
}

enum Step<T> {
    Deliver(T),
    Drained,
    Cancelled,
}

fn next_step<T>(shared: &Shared<T>) -> Option<Step<T>> {
    let mut state = shared.state.lock();
    if state.cancelled {
        return Some(Step::Cancelled);
    }
    if let Some(item) = state.high.pop_front() {
        return Some(Step::Deliver(item));
    }
    if let Some(item) = state.normal.pop_front() {
        return Some(Step::Deliver(item));
    }
    if state.closed {
        return Some(Step::Drained);
    }
    None
}

async fn drip<T, S>(
    shared: Arc<Shared<T>>,
    sink: S,
    settings: ThrottleSettings,
) -> Result<(), TransportError>
where
    T: Send + 'static,
    S: Sink<Item = T>,
{
    let mut bucket = TokenBucket::new(settings);

    loop {
        let step = loop {
            // Create the wakeup future before re-checking state, so a
            // signal sent in between is not lost.
            let notified = shared.notify.notified();
            match next_step(&shared) {
                Some(step) => break step,
                None => notified.await,
            }
        };

        let item = match step {
            Step::Cancelled => return Ok(()),
            Step::Drained => return sink.close().await,
            Step::Deliver(item) => item,
        };

        // Wait for a token. This is the only long suspension point in the
        // engine; a cancellation mid-wait exits without delivering.
        let ready_at = bucket.reserve();
        loop {
            tokio::select! {
                _ = sleep_until(ready_at) => break,
                _ = shared.notify.notified() => {
                    if shared.state.lock().cancelled {
                        return Ok(());
                    }
                    // Woken by an enqueue or a close; the token still applies.
                }
            }
        }

        if let Err(e) = sink.deliver(item).await {
            sink.on_error(e);
        }
    }
}
