//! Scoped access to the single SQLite store with bounded retry on lock contention.
//!
//! [`ConnectionManager`] never keeps a connection around: every top-level call opens
//! one, runs against it and drops it. A call that fails with `SQLITE_BUSY` or
//! `SQLITE_LOCKED` is discarded (any open transaction is rolled back on drop) and
//! retried after an exponentially growing delay. Everything else propagates at once.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, error, warn};

use crate::config::StorageConfig;
use crate::error::{is_busy, Result, StoreError};

/// Sleep function used between attempts. Swappable so tests can observe the delays.
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Bounded exponential backoff: `base`, `2 * base`, `4 * base`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Run `attempt` until it succeeds, fails non-transiently, or retries run out.
    ///
    /// `attempt` receives the 0-based attempt number.
    pub fn run<T>(
        &self,
        sleep: &dyn Fn(Duration),
        mut attempt: impl FnMut(u32) -> Result<T>,
    ) -> Result<T> {
        let mut retry = 0u32;
        loop {
            match attempt(retry) {
                Ok(value) => return Ok(value),
                Err(StoreError::Database(err)) if is_busy(&err) => {
                    if retry >= self.max_retries {
                        error!(
                            attempts = retry + 1,
                            error = %err,
                            "store still busy, giving up"
                        );
                        return Err(StoreError::StorageUnavailable {
                            attempts: retry + 1,
                            source: err,
                        });
                    }
                    let delay = self.delay_for(retry);
                    warn!(
                        attempt = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "store busy, backing off"
                    );
                    sleep(delay);
                    retry += 1;
                }
                Err(other) => return Err(other),
            }
        }
    }
}

/// Owns the location of the store and the discipline for reaching it.
///
/// Cheap to clone; share one instance by reference (or `Arc`) between components.
#[derive(Clone)]
pub struct ConnectionManager {
    path: PathBuf,
    connect_timeout: Duration,
    policy: RetryPolicy,
    sleeper: Sleeper,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("path", &self.path)
            .field("connect_timeout", &self.connect_timeout)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Create the store file (and parent directory) if needed, switch it to WAL and
    /// initialize the schema.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        let base_delay = config
            .base_backoff()
            .map_err(|e| StoreError::validation("base_backoff_seconds", e.to_string()))?;
        let path = config.resolved_db_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = Self {
            path,
            connect_timeout: config.connect_timeout(),
            policy: RetryPolicy::new(config.max_retries, base_delay),
            sleeper: Arc::new(std::thread::sleep),
        };

        manager.with_connection(|conn| {
            super::prepare_store(conn)?;
            Ok(())
        })?;

        tracing::info!(path = %manager.path.display(), "knowledge store ready");
        Ok(manager)
    }

    /// Replace the function used to wait between attempts.
    pub fn with_sleeper(mut self, sleeper: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Run `op` against a freshly opened connection, retrying the whole attempt on
    /// transient lock contention. The connection is closed when the call returns.
    pub fn with_connection<T>(
        &self,
        mut op: impl FnMut(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        self.policy.run(self.sleeper.as_ref(), |attempt| {
            if attempt > 0 {
                debug!(attempt = attempt + 1, "reconnecting to store");
            }
            let mut conn = self.connect()?;
            op(&mut conn)
        })
    }

    /// Run a read-only `op` inside one deferred transaction so every statement sees the
    /// same snapshot. A composite committing meanwhile is seen entirely or not at all.
    pub fn with_snapshot<T>(&self, mut op: impl FnMut(&Transaction<'_>) -> Result<T>) -> Result<T> {
        self.with_connection(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
            let value = op(&tx)?;
            tx.commit()?;
            Ok(value)
        })
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.connect_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn busy() -> StoreError {
        StoreError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".into()),
        ))
    }

    #[test]
    fn delays_double_from_base() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
    }

    #[test]
    fn huge_retry_number_saturates() {
        let policy = RetryPolicy::new(100, Duration::from_secs(1));
        assert_eq!(policy.delay_for(40), Duration::from_secs(u64::from(u32::MAX)));
    }

    #[test]
    fn three_busy_failures_then_success_sleeps_three_times() {
        let policy = RetryPolicy::new(3, Duration::from_millis(50));
        let sleeps = RefCell::new(Vec::new());
        let mut calls = 0;

        let result = policy.run(&|d| sleeps.borrow_mut().push(d), |_| {
            calls += 1;
            if calls <= 3 {
                Err(busy())
            } else {
                Ok("done")
            }
        });

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 4);
        assert_eq!(
            sleeps.into_inner(),
            vec![
                Duration::from_millis(50),
                Duration::from_millis(100),
                Duration::from_millis(200),
            ]
        );
    }

    #[test]
    fn exhausted_retries_surface_storage_unavailable() {
        let policy = RetryPolicy::new(2, Duration::from_millis(1));
        let sleeps = RefCell::new(0);

        let result: Result<()> = policy.run(&|_| *sleeps.borrow_mut() += 1, |_| Err(busy()));

        match result {
            Err(StoreError::StorageUnavailable { attempts, source }) => {
                assert_eq!(attempts, 3);
                assert!(source.to_string().contains("locked"));
            }
            other => panic!("expected StorageUnavailable, got {other:?}"),
        }
        assert_eq!(sleeps.into_inner(), 2);
    }

    #[test]
    fn non_transient_errors_are_not_retried() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let mut calls = 0;

        let result: Result<()> = policy.run(&|_| panic!("should not sleep"), |_| {
            calls += 1;
            Err(StoreError::validation("title", "must not be empty"))
        });

        assert!(matches!(result, Err(StoreError::ValidationFailed { .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_retries_means_single_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        let result: Result<()> = policy.run(&|_| panic!("should not sleep"), |_| Err(busy()));
        assert!(matches!(
            result,
            Err(StoreError::StorageUnavailable { attempts: 1, .. })
        ));
    }

    #[test]
    fn open_creates_parent_directory_and_schema() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("kb.db");
        let manager = ConnectionManager::open(&StorageConfig::at(&path)).unwrap();

        assert!(path.exists());
        let mode: String = manager
            .with_connection(|conn| {
                Ok(conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
    }

    #[test]
    fn snapshot_does_not_see_commits_made_while_it_is_open() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("kb.db");
        let manager = ConnectionManager::open(&StorageConfig::at(&path)).unwrap();
        let writer = Connection::open(&path).unwrap();
        let count = |conn: &Connection| -> Result<i64> {
            Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
        };

        let (before, during) = manager
            .with_snapshot(|tx| {
                let before = count(tx)?;
                writer.execute(
                    "INSERT INTO sessions (date, created_at) VALUES ('2025-01-01', '2025-01-01')",
                    [],
                )?;
                Ok((before, count(tx)?))
            })
            .unwrap();

        assert_eq!(before, 0);
        assert_eq!(during, 0);
        assert_eq!(manager.with_snapshot(|tx| count(tx)).unwrap(), 1);
    }

    #[test]
    fn open_rejects_unrepresentable_backoff() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = StorageConfig::at(tmp.path().join("kb.db"));
        config.base_backoff_seconds = f64::INFINITY;
        assert!(matches!(
            ConnectionManager::open(&config),
            Err(StoreError::ValidationFailed { field: "base_backoff_seconds", .. })
        ));
    }

    #[test]
    fn each_connection_gets_busy_timeout_and_foreign_keys() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut config = StorageConfig::at(tmp.path().join("kb.db"));
        config.connect_timeout_seconds = 7;
        let manager = ConnectionManager::open(&config).unwrap();

        let (timeout, fk): (i64, i64) = manager
            .with_connection(|conn| {
                let timeout = conn.pragma_query_value(None, "busy_timeout", |row| row.get(0))?;
                let fk = conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
                Ok((timeout, fk))
            })
            .unwrap();
        assert_eq!(timeout, 7000);
        assert_eq!(fk, 1);
    }
}
