//! Single-flight deduplication per cache key.
//!
//! The first caller for a key becomes the leader and spawns the work as a
//! detached task; everyone (leader included) awaits a broadcast of the
//! shared result. Detaching means caller cancellation never cancels the
//! work, so a late result still lands in the cache for the next reader.

use gradelit_core::{CacheKey, Error, SimplificationResult};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

type Flights = Arc<Mutex<HashMap<CacheKey, broadcast::Sender<Arc<SimplificationResult>>>>>;

#[derive(Default)]
pub struct SingleFlight {
    inflight: Flights,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for this key, or join the flight already running it.
    ///
    /// `work` is only invoked on the leader path; followers never build
    /// the future.
    pub async fn run<F, Fut>(&self, key: &CacheKey, work: F) -> Result<Arc<SimplificationResult>, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Arc<SimplificationResult>> + Send + 'static,
    {
        let mut rx = {
            let mut inflight = self.inflight.lock().await;
            match inflight.get(key) {
                Some(tx) => {
                    debug!(key = %key, "Joining in-flight request");
                    tx.subscribe()
                }
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    inflight.insert(key.clone(), tx.clone());

                    let flights = Arc::clone(&self.inflight);
                    let key = key.clone();
                    let fut = work();
                    tokio::spawn(async move {
                        let result = fut.await;
                        // Deregister before broadcasting so a caller that
                        // arrives after completion starts a fresh flight
                        // (and hits the cache instead).
                        flights.lock().await.remove(&key);
                        let _ = tx.send(result);
                    });
                    rx
                }
            }
        };

        rx.recv()
            .await
            .map_err(|_| Error::Internal("in-flight leader dropped without a result".into()))
    }

    #[cfg(test)]
    pub async fn inflight_count(&self) -> usize {
        self.inflight.lock().await.len()
    }
}
