//! # Transient Conflict Retries
//!
//! Bounded retry helper for storage operations that can fail
//! transiently (SQLite `database is locked`, exhausted pool).
//!
//! Only transient failures are retried; a precondition failure means the
//! state genuinely moved on and retrying would just lose the race again
//! with a different answer.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use emporia_db::{DbError, DbResult};

use crate::error::{EngineError, EngineResult};

/// Backoff base between attempts. Grows linearly with the attempt count.
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Runs a storage operation, retrying transient failures up to `limit`
/// times with linear backoff.
///
/// ## Returns
/// The operation's result, or a typed `Transient` engine error once the
/// retry budget is exhausted. Non-transient errors pass through on the
/// first occurrence.
pub async fn with_retries<T, F, Fut>(limit: u32, op: F) -> EngineResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    with_retries_db(limit, op).await.map_err(|err| {
        if err.is_transient() {
            EngineError::transient(format!(
                "storage conflict persisted after {limit} retries: {err}"
            ))
        } else {
            err.into()
        }
    })
}

/// Like [`with_retries`], but keeps the `DbError` shape.
///
/// For call sites that still need to match on the error after the
/// retries, typically `PreconditionFailed` (which is never retried:
/// the state genuinely moved and the caller must decide what that
/// means for its operation).
pub async fn with_retries_db<T, F, Fut>(limit: u32, mut op: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                if attempt >= limit {
                    return Err(err);
                }
                attempt += 1;
                warn!(attempt, limit, error = %err, "Transient storage conflict, retrying");
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            Err(err) => return Err(err),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
