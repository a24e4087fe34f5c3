//! Ensures concurrent first-callers for the same key share one in-flight
//! initialization instead of racing to perform it multiple times. A failed
//! attempt evicts its entry so the next caller retries from scratch.

use dashmap::DashMap;
use hybrid_search_core::SearchResult as Outcome;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;

pub struct SingleFlight {
    inflight: DashMap<String, Arc<OnceCell<()>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self { inflight: DashMap::new() }
    }

    /// Runs `init` at most once per `key` among concurrent callers. If
    /// `init` fails, the entry is evicted so a later call retries.
    pub async fn run_once<F, Fut>(&self, key: &str, init: F) -> Outcome<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome<()>>,
    {
        let cell = self.inflight.entry(key.to_string()).or_insert_with(|| Arc::new(OnceCell::new())).clone();

        match cell.get_or_try_init(init).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.inflight.remove(key);
                Err(err)
            }
        }
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybrid_search_core::error::StrategyError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn concurrent_callers_share_one_initialization() {
        let flight = Arc::new(SingleFlight::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let flight = flight.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                flight
                    .run_once("tenant-a", || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                        Ok(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn a_failed_attempt_is_retried_by_the_next_caller() {
        let flight = SingleFlight::new();
        let first = flight.run_once("tenant-b", || async { Err(StrategyError::Unavailable { strategy: "vector" }.into()) }).await;
        assert!(first.is_err());

        let second = flight.run_once("tenant-b", || async { Ok(()) }).await;
        assert!(second.is_ok());
    }
}
