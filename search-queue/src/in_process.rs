//! Single-threaded in-process FIFO queue. Retries failed jobs up to a
//! bounded attempt count before moving them to `failed`; same-key jobs are
//! delivered in enqueue order because the worker task drains a single
//! ordered channel.

use crate::queue::{JobContext, JobCounts, JobHandler, Queue};
use async_trait::async_trait;
use hybrid_search_core::error::QueueError;
use hybrid_search_core::model::JobPayload;
use hybrid_search_core::SearchResult as Outcome;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

const MAX_ATTEMPTS: u32 = 3;

struct Counters {
    waiting: AtomicUsize,
    active: AtomicUsize,
    failed: AtomicUsize,
    completed: AtomicUsize,
}

impl Default for Counters {
    fn default() -> Self {
        Self { waiting: AtomicUsize::new(0), active: AtomicUsize::new(0), failed: AtomicUsize::new(0), completed: AtomicUsize::new(0) }
    }
}

pub struct InProcessQueue {
    name: String,
    sender: mpsc::UnboundedSender<(JobPayload, u32)>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<(JobPayload, u32)>>>,
    counters: Arc<Counters>,
    shutdown: watch::Sender<bool>,
    next_job_id: AtomicU32,
}

impl InProcessQueue {
    pub fn new(name: impl Into<String>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown, _) = watch::channel(false);
        Self { name: name.into(), sender, receiver: Mutex::new(Some(receiver)), counters: Arc::new(Counters::default()), shutdown, next_job_id: AtomicU32::new(0) }
    }
}

#[async_trait]
impl Queue for InProcessQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, payload: JobPayload) -> Outcome<()> {
        self.counters.waiting.fetch_add(1, Ordering::SeqCst);
        self.sender.send((payload, 0)).map_err(|_| QueueError::EnqueueFailed { queue: "in-process", reason: "worker channel closed".to_string() })?;
        Ok(())
    }

    async fn process(&self, handler: Arc<dyn JobHandler>) -> Outcome<()> {
        let mut guard = self.receiver.lock().await;
        let Some(mut receiver) = guard.take() else {
            return Ok(());
        };
        drop(guard);

        let counters = self.counters.clone();
        let mut shutdown_rx = self.shutdown.subscribe();
        let next_job_id = AtomicU32::new(self.next_job_id.load(Ordering::SeqCst));
        let retry_sender = self.sender.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    job = receiver.recv() => {
                        let Some((payload, attempt)) = job else { break };
                        counters.waiting.fetch_sub(1, Ordering::SeqCst);
                        counters.active.fetch_add(1, Ordering::SeqCst);

                        let job_id = next_job_id.fetch_add(1, Ordering::SeqCst).to_string();
                        let ctx = JobContext { job_id, attempt_number: attempt + 1 };
                        let result = handler.handle(payload.clone(), ctx).await;

                        counters.active.fetch_sub(1, Ordering::SeqCst);
                        match result {
                            Ok(()) => {
                                counters.completed.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(err) if err.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                                tracing::warn!(error = %err, attempt, "job failed, retrying");
                                counters.waiting.fetch_add(1, Ordering::SeqCst);
                                // Best-effort: if the channel is gone the job is dropped.
                                let _ = retry_sender.send((payload, attempt + 1));
                            }
                            Err(err) => {
                                tracing::error!(error = %err, "job failed permanently");
                                counters.failed.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                }
            }
        });

        Ok(())
    }

    async fn clear(&self) -> Outcome<()> {
        let mut guard = self.receiver.lock().await;
        if let Some(receiver) = guard.as_mut() {
            while receiver.try_recv().is_ok() {
                self.counters.waiting.fetch_sub(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    async fn close(&self) -> Outcome<()> {
        let _ = self.shutdown.send(true);
        Ok(())
    }

    async fn job_counts(&self) -> Outcome<JobCounts> {
        Ok(JobCounts {
            active: self.counters.active.load(Ordering::SeqCst),
            waiting: self.counters.waiting.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            completed: self.counters.completed.load(Ordering::SeqCst),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_search_core::identity::{EntityId, EntityIdType, RecordId, TenantId};
    use std::sync::atomic::AtomicUsize as Counter;
    use std::time::Duration;

    struct CountingHandler {
        seen: Arc<Counter>,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn handle(&self, _payload: JobPayload, _ctx: JobContext) -> Outcome<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn enqueued_jobs_are_processed_and_counted_complete() {
        let queue = InProcessQueue::new("test-queue");
        let seen = Arc::new(Counter::new(0));
        queue.process(Arc::new(CountingHandler { seen: seen.clone() })).await.unwrap();

        queue
            .enqueue(JobPayload::Delete { entity_type: EntityId::new("crm:contact"), record_id: RecordId::new("1"), tenant_id: TenantId::now_v7() })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        let counts = queue.job_counts().await.unwrap();
        assert_eq!(counts.completed, 1);
        assert!(counts.is_idle());
    }
}
