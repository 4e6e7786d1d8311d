//! Renter directory cache
//!
//! Process-wide index over all active renters, keyed by the external tenant
//! identifier. The full-table load runs exactly once per process lifetime:
//! every caller of `ensure_loaded` either triggers it, waits for the one in
//! flight, or observes its recorded outcome. A failed load is sticky until
//! restart; the directory never serves a partially populated map as if it
//! were complete.
//!
//! The directory is an explicit component owned by the composition root,
//! not a global. Readers go through an RwLock; `refresh` rebuilds the
//! snapshot aside and swaps it in, so lookups never block on a reload.

use crate::db::models::Renter;
use crate::db::Repository;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use metrics::gauge;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Where the directory loads renters from. The repository in production;
/// fakes in tests.
#[async_trait]
pub trait RenterSource: Send + Sync {
    /// Full scan of all active renters
    async fn load_all(&self) -> Result<Vec<Renter>>;
}

#[async_trait]
impl RenterSource for Repository {
    async fn load_all(&self) -> Result<Vec<Renter>> {
        self.all_active_renters().await
    }
}

/// Outcome of the one-time load, shared by every caller
#[derive(Debug, Clone)]
struct LoadFailure {
    message: String,
}

#[derive(Default)]
struct DirectoryState {
    by_renter_id: HashMap<String, Arc<Renter>>,
    all: Vec<Arc<Renter>>,
}

fn build_state(renters: Vec<Renter>) -> DirectoryState {
    let mut state = DirectoryState {
        by_renter_id: HashMap::with_capacity(renters.len()),
        all: Vec::with_capacity(renters.len()),
    };
    for renter in renters {
        let renter = Arc::new(renter);
        state
            .by_renter_id
            .insert(renter.renter_id.clone(), Arc::clone(&renter));
        state.all.push(renter);
    }
    state
}

/// In-memory renter index with exactly-once lazy population
pub struct RenterDirectory {
    source: Arc<dyn RenterSource>,
    loaded: OnceCell<std::result::Result<(), LoadFailure>>,
    state: RwLock<DirectoryState>,
}

impl RenterDirectory {
    pub fn new(source: Arc<dyn RenterSource>) -> Self {
        Self {
            source,
            loaded: OnceCell::new(),
            state: RwLock::new(DirectoryState::default()),
        }
    }

    /// Idempotent one-time load. Safe under arbitrary concurrency: the scan
    /// runs once, every concurrent caller waits for it, and all callers
    /// share the recorded outcome, including a failure, which stays until
    /// process restart.
    pub async fn ensure_loaded(&self) -> Result<()> {
        let outcome = self
            .loaded
            .get_or_init(|| async {
                let started = Instant::now();
                match self.source.load_all().await {
                    Ok(renters) => {
                        let state = build_state(renters);
                        let count = state.all.len();
                        *self.state.write().expect("renter directory lock poisoned") = state;

                        gauge!("gatewarden_renter_directory_size").set(count as f64);
                        info!(
                            count,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Renter directory loaded"
                        );
                        Ok(())
                    }
                    Err(err) => {
                        error!(error = %err, "Renter directory load failed");
                        Err(LoadFailure {
                            message: err.to_string(),
                        })
                    }
                }
            })
            .await;

        outcome.clone().map_err(|failure| AppError::DatabaseConnection {
            message: format!("renter directory load failed: {}", failure.message),
        })
    }

    /// O(1) lookup by external tenant identifier. Requires a prior
    /// successful `ensure_loaded`; before that the map is simply empty.
    pub fn lookup(&self, renter_id: &str) -> Option<Arc<Renter>> {
        self.state
            .read()
            .expect("renter directory lock poisoned")
            .by_renter_id
            .get(renter_id)
            .cloned()
    }

    /// Stable snapshot of every loaded renter at the moment of the call
    pub fn list(&self) -> Vec<Arc<Renter>> {
        self.state
            .read()
            .expect("renter directory lock poisoned")
            .all
            .clone()
    }

    /// Number of loaded renters
    pub fn len(&self) -> usize {
        self.state
            .read()
            .expect("renter directory lock poisoned")
            .all
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-scan the store and swap in a fresh snapshot. The replacement is
    /// built aside, so readers keep being served from the previous snapshot
    /// for the whole rebuild; a failed re-scan leaves it in place. A sticky
    /// initial-load failure is not cleared by refresh.
    pub async fn refresh(&self) -> Result<()> {
        self.ensure_loaded().await?;

        let renters = self.source.load_all().await?;
        let state = build_state(renters);
        let count = state.all.len();
        *self.state.write().expect("renter directory lock poisoned") = state;

        gauge!("gatewarden_renter_directory_size").set(count as f64);
        info!(count, "Renter directory refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn renter(id: i64, renter_id: &str) -> Renter {
        Renter {
            id,
            renter_id: renter_id.into(),
            name: format!("renter {}", id),
            secret: String::new(),
            white_ips: String::new(),
            qpd: 10_000,
            qps: 100,
            is_deleted: false,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    /// Counts loads; optionally sleeps to widen the race window
    struct CountingSource {
        loads: AtomicUsize,
        delay: Duration,
        renters: Vec<Renter>,
    }

    #[async_trait]
    impl RenterSource for CountingSource {
        async fn load_all(&self) -> Result<Vec<Renter>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.renters.clone())
        }
    }

    struct FailingSource {
        loads: AtomicUsize,
    }

    #[async_trait]
    impl RenterSource for FailingSource {
        async fn load_all(&self) -> Result<Vec<Renter>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Err(AppError::DatabaseConnection {
                message: "connection refused".into(),
            })
        }
    }

    /// Serves scripted results, one per load call
    struct ScriptedSource {
        results: Mutex<VecDeque<Result<Vec<Renter>>>>,
    }

    #[async_trait]
    impl RenterSource for ScriptedSource {
        async fn load_all(&self) -> Result<Vec<Renter>> {
            self.results
                .lock()
                .expect("scripted source lock poisoned")
                .pop_front()
                .expect("scripted source exhausted")
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_ensure_loaded_runs_one_load() {
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
            delay: Duration::from_millis(20),
            renters: vec![renter(1, "tenant-42"), renter(2, "tenant-43")],
        });
        let directory = Arc::new(RenterDirectory::new(source.clone()));

        let tasks: Vec<_> = (0..128)
            .map(|_| {
                let directory = Arc::clone(&directory);
                tokio::spawn(async move { directory.ensure_loaded().await })
            })
            .collect();

        for outcome in futures::future::join_all(tasks).await {
            outcome.unwrap().unwrap();
        }

        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert_eq!(directory.len(), 2);
        assert_eq!(
            directory.lookup("tenant-42").unwrap().renter_id,
            "tenant-42"
        );
        assert!(directory.lookup("tenant-99").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn failed_load_is_sticky_for_every_caller() {
        let source = Arc::new(FailingSource {
            loads: AtomicUsize::new(0),
        });
        let directory = Arc::new(RenterDirectory::new(source.clone()));

        let tasks: Vec<_> = (0..100)
            .map(|_| {
                let directory = Arc::clone(&directory);
                tokio::spawn(async move { directory.ensure_loaded().await })
            })
            .collect();

        for outcome in futures::future::join_all(tasks).await {
            assert!(outcome.unwrap().is_err());
        }

        // Later callers observe the captured error without retrying the scan,
        // and refresh cannot clear it either.
        assert!(directory.ensure_loaded().await.is_err());
        assert!(directory.refresh().await.is_err());
        assert_eq!(source.loads.load(Ordering::SeqCst), 1);
        assert!(directory.is_empty());
    }

    #[tokio::test]
    async fn list_returns_stable_snapshot() {
        let source = Arc::new(CountingSource {
            loads: AtomicUsize::new(0),
            delay: Duration::ZERO,
            renters: vec![renter(1, "tenant-42")],
        });
        let directory = RenterDirectory::new(source);
        directory.ensure_loaded().await.unwrap();

        let snapshot = directory.list();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].renter_id, "tenant-42");
    }

    #[tokio::test]
    async fn refresh_picks_up_new_renters() {
        let source = Arc::new(ScriptedSource {
            results: Mutex::new(VecDeque::from([
                Ok(vec![renter(1, "tenant-42")]),
                Ok(vec![renter(1, "tenant-42"), renter(2, "tenant-43")]),
            ])),
        });
        let directory = RenterDirectory::new(source);

        directory.ensure_loaded().await.unwrap();
        assert!(directory.lookup("tenant-43").is_none());

        directory.refresh().await.unwrap();
        assert_eq!(directory.len(), 2);
        assert!(directory.lookup("tenant-43").is_some());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let source = Arc::new(ScriptedSource {
            results: Mutex::new(VecDeque::from([
                Ok(vec![renter(1, "tenant-42")]),
                Err(AppError::DatabaseConnection {
                    message: "connection refused".into(),
                }),
            ])),
        });
        let directory = RenterDirectory::new(source);

        directory.ensure_loaded().await.unwrap();
        assert!(directory.refresh().await.is_err());

        // Stale but intact: readers are still served.
        assert_eq!(directory.len(), 1);
        assert!(directory.lookup("tenant-42").is_some());
    }
}
