use std::fmt;

/// Errors surfaced by the KV/transaction adapter (§4.B). `napi-core`
/// translates these into the §7 error taxonomy; only [`StoreError::EtagConflict`]
/// and [`StoreError::Transient`] are interpreted specially by the allocator's
/// retry loop (§4.I) — every other variant propagates as a fatal bug or an
/// `InvalidParams`-adjacent condition.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("not found in bucket {bucket}: {key}")]
    NotFound { bucket: String, key: String },

    #[error("etag conflict writing {bucket}/{key}")]
    EtagConflict { bucket: String, key: String },

    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    #[error("query failed: {query}: {source}")]
    Query {
        query: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("failed to acquire a pooled connection: {0}")]
    Acquire(#[source] sqlx::Error),

    #[error("transient storage error: {0}")]
    Transient(#[source] sqlx::Error),

    #[error("internal storage error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    #[track_caller]
    pub fn query(query: impl fmt::Display, source: sqlx::Error) -> Self {
        if is_transient(&source) {
            return StoreError::Transient(source);
        }
        StoreError::Query {
            query: query.to_string(),
            source,
        }
    }

    pub fn acquire(source: sqlx::Error) -> Self {
        StoreError::Acquire(source)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        StoreError::Internal(message.into())
    }

    /// Whether this error is one `napi-core`'s retry orchestration (§4.I)
    /// should retry with backoff rather than propagate immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }

    pub fn is_etag_conflict(&self) -> bool {
        matches!(self, StoreError::EtagConflict { .. })
    }
}

/// Connection resets and statement timeouts are the transient cases called
/// out in §4.I; everything else (constraint violations, bad SQL, etc.) is a
/// logic error that should propagate immediately rather than be retried.
fn is_transient(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
        sqlx::Error::Database(db_err) => {
            // 57014 = query_canceled (statement_timeout), 08006/08003 = connection failures.
            matches!(
                db_err.code().as_deref(),
                Some("57014") | Some("08006") | Some("08003") | Some("08000")
            )
        }
        _ => false,
    }
}
