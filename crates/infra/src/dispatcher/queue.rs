//! Serialized overflow queue for rate-limited endpoints
//!
//! Requests that find their endpoint's window full wait here instead of
//! being dropped. A single drain worker takes them in FIFO order, waits until
//! the window has room, records the slot, hands the caller its [`Turn`] and
//! waits for the caller to finish before pausing `queue_delay` and moving on.
//!
//! While an endpoint has requests waiting, new callers for that endpoint
//! queue behind them even if the window has room, so same-endpoint requests
//! never overtake each other.

use std::sync::Arc;
use std::time::Duration;

use courier_common::resilience::{Quota, RateLimiterRegistry};
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

/// Smallest pause between capacity checks, so a zero wait cannot spin
const MIN_POLL: Duration = Duration::from_millis(1);

/// Permission to run a queued request
///
/// Dropping the turn tells the drain worker the request has completed.
#[derive(Debug)]
pub struct Turn {
    _done: oneshot::Sender<()>,
}

/// How the limiter answered an admission request
#[derive(Debug)]
pub enum RateAdmission {
    /// A slot was recorded; proceed now
    Immediate,
    /// Wait on the receiver for a turn
    Queued(oneshot::Receiver<Turn>),
    /// The window is full and overflow is rejected
    Exceeded { reset_in: Duration },
}

struct QueuedRequest {
    endpoint: String,
    quota: Quota,
    turn: oneshot::Sender<Turn>,
}

pub(crate) struct RateLimitQueue {
    limiter: Arc<RateLimiterRegistry>,
    queue_delay: Duration,
    /// Requests waiting or running per endpoint
    pending: Arc<DashMap<String, usize>>,
    sender: Mutex<Option<mpsc::UnboundedSender<QueuedRequest>>>,
}

impl RateLimitQueue {
    pub(crate) fn new(limiter: Arc<RateLimiterRegistry>, queue_delay: Duration) -> Self {
        Self { limiter, queue_delay, pending: Arc::new(DashMap::new()), sender: Mutex::new(None) }
    }

    /// Try to take a slot now, or join the queue
    ///
    /// With `reject_overflow` a full window yields
    /// [`RateAdmission::Exceeded`] instead of queueing.
    pub(crate) fn admit(&self, endpoint: &str, quota: &Quota, reject_overflow: bool) -> RateAdmission {
        let mut pending = self.pending.entry(endpoint.to_string()).or_insert(0);

        if *pending == 0 && self.limiter.try_acquire(endpoint, quota) {
            return RateAdmission::Immediate;
        }

        if reject_overflow {
            let reset_in = self.limiter.time_until_available(endpoint, quota);
            return RateAdmission::Exceeded { reset_in };
        }

        let (turn_tx, turn_rx) = oneshot::channel();
        let job = QueuedRequest { endpoint: endpoint.to_string(), quota: *quota, turn: turn_tx };
        if self.enqueue(job) {
            *pending += 1;
            debug!(endpoint, waiting = *pending, "rate window full, request queued");
        }
        // A failed enqueue drops the sender, so the caller sees a closed queue
        RateAdmission::Queued(turn_rx)
    }

    /// Requests currently waiting or running through the queue
    pub(crate) fn pending(&self, endpoint: &str) -> usize {
        self.pending.get(endpoint).map(|count| *count).unwrap_or(0)
    }

    fn enqueue(&self, job: QueuedRequest) -> bool {
        let mut sender = self.sender.lock();
        if let Some(tx) = sender.as_ref() {
            match tx.send(job) {
                Ok(()) => return true,
                Err(mpsc::error::SendError(job)) => return self.spawn_worker(&mut sender, job),
            }
        }
        self.spawn_worker(&mut sender, job)
    }

    /// Start the drain worker on first use
    ///
    /// The worker ends once the queue is dropped and drained.
    fn spawn_worker(
        &self,
        slot: &mut Option<mpsc::UnboundedSender<QueuedRequest>>,
        job: QueuedRequest,
    ) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(endpoint = %job.endpoint, "no tokio runtime, cannot queue request");
            return false;
        };

        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(job).is_err() {
            return false;
        }
        runtime.spawn(drain(rx, self.limiter.clone(), self.pending.clone(), self.queue_delay));
        *slot = Some(tx);
        true
    }
}

async fn drain(
    mut rx: mpsc::UnboundedReceiver<QueuedRequest>,
    limiter: Arc<RateLimiterRegistry>,
    pending: Arc<DashMap<String, usize>>,
    queue_delay: Duration,
) {
    debug!("rate limit queue worker started");

    while let Some(job) = rx.recv().await {
        while !limiter.try_acquire(&job.endpoint, &job.quota) {
            let wait = limiter.time_until_available(&job.endpoint, &job.quota).max(MIN_POLL);
            trace!(endpoint = %job.endpoint, ?wait, "waiting for rate window");
            tokio::time::sleep(wait).await;
        }

        let (done_tx, done_rx) = oneshot::channel();
        if job.turn.send(Turn { _done: done_tx }).is_ok() {
            // Resolves when the caller drops its turn
            let _ = done_rx.await;
        } else {
            debug!(endpoint = %job.endpoint, "queued caller went away before its turn");
        }

        release(&pending, &job.endpoint);
        tokio::time::sleep(queue_delay).await;
    }

    debug!("rate limit queue worker stopped");
}

fn release(pending: &DashMap<String, usize>, endpoint: &str) {
    if let Some(mut count) = pending.get_mut(endpoint) {
        *count = count.saturating_sub(1);
    }
    pending.remove_if(endpoint, |_, count| *count == 0);
}
