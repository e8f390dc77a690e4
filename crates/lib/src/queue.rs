//! Delayed poll jobs.
//!
//! A `PollJob` is an immutable record of one scheduled poll. Every reschedule builds a
//! fresh record; nothing is mutated in place. `DelayQueue` delivers jobs to the worker
//! channel once their delay has elapsed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

const WORKER_CHANNEL_CAPACITY: usize = 256;

/// One scheduled poll of a visitor's LiveChat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollJob {
    pub id: String,
    pub visitor_id: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_id: Option<i64>,
    /// Milliseconds since the epoch of the last agent message (or the session start).
    pub last_message_timestamp: i64,
    /// Polls run so far in this chain.
    #[serde(default)]
    pub iteration: u32,
    /// Failed runs of this exact poll.
    #[serde(default)]
    pub attempt: u32,
}

fn new_job_id() -> String {
    format!("poll-{}", uuid::Uuid::new_v4())
}

impl PollJob {
    /// First poll of a freshly started session.
    pub fn first(visitor_id: impl Into<String>, session_id: impl Into<String>, now_ms: i64) -> Self {
        Self {
            id: new_job_id(),
            visitor_id: visitor_id.into(),
            session_id: session_id.into(),
            last_message_id: None,
            last_message_timestamp: now_ms,
            iteration: 0,
            attempt: 0,
        }
    }

    /// Next poll when nothing new arrived: same cursor and activity time.
    pub fn successor(&self) -> Self {
        Self {
            id: new_job_id(),
            iteration: self.iteration + 1,
            attempt: 0,
            ..self.clone()
        }
    }

    /// Next poll after forwarding agent text: cursor advanced, activity at `now_ms`.
    pub fn advanced(&self, last_message_id: Option<i64>, now_ms: i64) -> Self {
        Self {
            id: new_job_id(),
            last_message_id: last_message_id.max(self.last_message_id),
            last_message_timestamp: now_ms,
            iteration: self.iteration + 1,
            attempt: 0,
            ..self.clone()
        }
    }

    /// Redelivery of this poll after a failure.
    pub fn retry(&self) -> Self {
        Self {
            id: new_job_id(),
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }

    /// Idle time in milliseconds at `now_ms`.
    pub fn idle_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.last_message_timestamp
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,
}

/// Schedules a job to run after a delay.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: PollJob, delay: Duration) -> Result<(), QueueError>;
}

/// In-process delayed queue: each job waits on its own tokio timer, then goes to the worker channel.
pub struct DelayQueue {
    tx: mpsc::Sender<PollJob>,
    open: AtomicBool,
}

impl DelayQueue {
    /// Create the queue and the receiving end for the worker.
    pub fn new() -> (Self, mpsc::Receiver<PollJob>) {
        let (tx, rx) = mpsc::channel(WORKER_CHANNEL_CAPACITY);
        (
            Self {
                tx,
                open: AtomicBool::new(true),
            },
            rx,
        )
    }

    /// Stop accepting jobs. Timers already armed still deliver unless the receiver is gone.
    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobQueue for DelayQueue {
    async fn enqueue(&self, job: PollJob, delay: Duration) -> Result<(), QueueError> {
        if !self.is_open() || self.tx.is_closed() {
            return Err(QueueError::Closed);
        }
        log::debug!(
            "queued {} for {} in {}ms",
            job.id,
            job.visitor_id,
            delay.as_millis()
        );
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let id = job.id.clone();
            if tx.send(job).await.is_err() {
                log::debug!("worker gone, dropping {}", id);
            }
        });
        Ok(())
    }
}
