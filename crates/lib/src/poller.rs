//! Poll worker: forwards agent replies from LiveChat to the end user.
//!
//! Each job runs one poll and schedules its successor. A chain ends when the conversation
//! has been idle past the timeout (the session is closed) or when the visitor has moved on
//! to a newer session.

use crate::channels::{LiveChatApi, LiveChatError, MessagingApi, SmoochError};
use crate::config::PollingConfig;
use crate::queue::{JobQueue, PollJob, QueueError};
use crate::session::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    LiveChat(#[from] LiveChatError),
    #[error(transparent)]
    Smooch(#[from] SmoochError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// What one poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Idle past the timeout: session closed, chain ended.
    TimedOut,
    /// The visitor has a different active session: this one was closed, chain ended.
    Superseded,
    /// Nothing new; `next` was scheduled with the same cursor.
    Idle(PollJob),
    /// Agent text was forwarded; `next` carries the advanced cursor.
    Forwarded(PollJob),
}

/// Runs poll jobs against LiveChat and forwards agent text through the messaging API.
pub struct Poller {
    livechat: Arc<dyn LiveChatApi>,
    messaging: Arc<dyn MessagingApi>,
    sessions: Arc<SessionRegistry>,
    queue: Arc<dyn JobQueue>,
    settings: PollingConfig,
}

impl Poller {
    pub fn new(
        livechat: Arc<dyn LiveChatApi>,
        messaging: Arc<dyn MessagingApi>,
        sessions: Arc<SessionRegistry>,
        queue: Arc<dyn JobQueue>,
        settings: PollingConfig,
    ) -> Self {
        Self {
            livechat,
            messaging,
            sessions,
            queue,
            settings,
        }
    }

    fn interval(&self) -> Duration {
        self.settings.interval()
    }

    /// Run one poll for `job` at time `now_ms`.
    pub async fn poll(&self, job: &PollJob, now_ms: i64) -> Result<PollOutcome, PollError> {
        let visitor = job.visitor_id.as_str();
        log::debug!("poll {} for {} (iteration {})", job.id, visitor, job.iteration);

        if !self.sessions.is_active(visitor, &job.session_id).await {
            self.livechat.close_session(visitor, &job.session_id).await?;
            log::info!("session for {} superseded, stopped polling old session", visitor);
            return Ok(PollOutcome::Superseded);
        }

        if job.idle_ms(now_ms) >= self.settings.conversation_timeout_ms as i64 {
            self.sessions.evict(visitor, &job.session_id).await;
            log::info!("conversation for {} timed out after {}ms idle", visitor, job.idle_ms(now_ms));
            self.livechat.close_session(visitor, &job.session_id).await?;
            return Ok(PollOutcome::TimedOut);
        }

        let pending = self
            .livechat
            .fetch_pending_messages(visitor, &job.session_id, job.last_message_id)
            .await?;
        if !pending.has_text() {
            let next = job.successor();
            self.queue.enqueue(next.clone(), self.interval()).await?;
            return Ok(PollOutcome::Idle(next));
        }

        self.messaging.send_to_user(visitor, &pending.text).await?;
        let recorded = self
            .sessions
            .record_activity(visitor, &job.session_id, pending.last_message_id, now_ms)
            .await;
        if !recorded {
            log::debug!("session for {} replaced during poll {}, ending its chain", visitor, job.id);
            self.livechat.close_session(visitor, &job.session_id).await?;
            return Ok(PollOutcome::Superseded);
        }
        let next = job.advanced(pending.last_message_id, now_ms);
        self.queue.enqueue(next.clone(), self.interval()).await?;
        Ok(PollOutcome::Forwarded(next))
    }

    /// Run `job` now; on failure redeliver it after the poll interval until attempts run out,
    /// then drop the chain and its registry entry.
    pub async fn run_job(&self, job: PollJob) {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let err = match self.poll(&job, now_ms).await {
            Ok(_) => return,
            Err(e) => e,
        };
        log::error!("error polling livechat for {} ({}): {}", job.visitor_id, job.id, err);
        if job.attempt + 1 >= self.settings.max_attempts {
            log::error!(
                "giving up on {} for {} after {} attempts",
                job.id,
                job.visitor_id,
                job.attempt + 1
            );
            self.sessions.evict(&job.visitor_id, &job.session_id).await;
            return;
        }
        let retry = job.retry();
        if let Err(e) = self.queue.enqueue(retry, self.interval()).await {
            log::warn!("could not redeliver poll for {}: {}", job.visitor_id, e);
            self.sessions.evict(&job.visitor_id, &job.session_id).await;
        }
    }

    /// Start the worker loop. Each delivered job runs in its own task. The loop stops when
    /// `shutdown` flips to true (or the queue side goes away) and waits for in-flight jobs.
    pub fn start(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<PollJob>,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        log::info!("poll worker started");
        tokio::spawn(async move {
            let mut in_flight = tokio::task::JoinSet::new();
            loop {
                tokio::select! {
                    job = rx.recv() => {
                        let Some(job) = job else { break };
                        let poller = self.clone();
                        in_flight.spawn(async move { poller.run_job(job).await });
                    }
                    Some(_) = in_flight.join_next(), if !in_flight.is_empty() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            while in_flight.join_next().await.is_some() {}
            log::info!("poll worker stopped");
        })
    }
}
