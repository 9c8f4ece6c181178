use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

/// Attempts for writes that can hit row-lock contention.
pub const LOCK_RETRY_ATTEMPTS: u32 = 3;
/// Base delay; attempt `n` (1-based) waits `n * LOCK_RETRY_BASE_DELAY` before retrying.
pub const LOCK_RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// SQLSTATEs for serialization failure, deadlock, and lock_not_available.
const LOCK_SQLSTATES: &[&str] = &["40001", "40P01", "55P03"];

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Applies the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

/// True when the error comes from lock contention rather than bad input.
pub fn is_lock_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let code_matches = db_err
                .code()
                .map(|code| LOCK_SQLSTATES.iter().any(|state| code == *state))
                .unwrap_or(false);
            code_matches || db_err.message().to_lowercase().contains("locked")
        }
        _ => false,
    }
}

/// Runs `op` up to `LOCK_RETRY_ATTEMPTS` times, sleeping with linear backoff
/// between attempts while `is_retryable` holds. The last error is returned as-is.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut op: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < LOCK_RETRY_ATTEMPTS && is_retryable(&err) => {
                let delay = LOCK_RETRY_BASE_DELAY * attempt;
                warn!(
                    "Write attempt {}/{} hit lock contention ({err}), retrying after {}ms",
                    attempt,
                    LOCK_RETRY_ATTEMPTS,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn locked(err: &String) -> bool {
        err.contains("locked")
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_lock() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let started = tokio::time::Instant::now();

        let result: Result<u32, String> = retry_with_backoff(
            || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err("database is locked".to_string())
                    } else {
                        Ok(n)
                    }
                }
            },
            locked,
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms after the first failure, 200ms after the second
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(300) && waited < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_bound() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), String> = retry_with_backoff(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("table locked".to_string())
                }
            },
            locked,
        )
        .await;

        assert_eq!(result, Err("table locked".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), LOCK_RETRY_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_lock_error_propagates_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), String> = retry_with_backoff(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err("unique violation".to_string())
                }
            },
            locked,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_non_database_errors_are_not_lock_errors() {
        assert!(!is_lock_error(&sqlx::Error::RowNotFound));
        assert!(!is_lock_error(&sqlx::Error::PoolTimedOut));
    }
}
