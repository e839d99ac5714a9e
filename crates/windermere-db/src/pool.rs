//! Connection pool construction.

use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use sqlx::Executor;
use tracing::warn;

use crate::dialect::Dialect;
use crate::error::StorageError;

/// How long to wait between connection attempts at startup.
const CONNECT_RETRY_WAIT: Duration = Duration::from_secs(5);

/// Open a connection pool for the given database URL.
///
/// Retries indefinitely with a fixed wait until the database answers a
/// ping; a provisioning server racing its database at boot is routine and
/// not an error. SQLite connections get `PRAGMA foreign_keys = ON` once
/// per pooled connection so that child-table cascades work.
pub async fn connect(url: &str) -> Result<(AnyPool, Dialect), StorageError> {
    sqlx::any::install_default_drivers();
    let dialect = Dialect::from_url(url)?;

    let mut options = AnyPoolOptions::new()
        .max_connections(10)
        .max_lifetime(Duration::from_secs(3 * 60));

    if dialect == Dialect::Sqlite {
        options = options.after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("PRAGMA foreign_keys = ON;").await?;
                Ok(())
            })
        });
    }

    let pool = options.connect_lazy(url)?;
    loop {
        match pool.acquire().await {
            Ok(_) => break,
            Err(err) => {
                warn!(
                    error = %err,
                    retry_secs = CONNECT_RETRY_WAIT.as_secs(),
                    "failed to connect to database, will retry"
                );
                tokio::time::sleep(CONNECT_RETRY_WAIT).await;
            }
        }
    }

    Ok((pool, dialect))
}
