//! The §7 error taxonomy, shared by every orchestrator in this crate.
//! `napi-api` maps each variant onto its HTTP status and JSON body; nothing
//! in this crate talks HTTP directly.

use napi_model::ValidationError;
use napi_types::{BelongsToId, NetworkId, NetworkPoolId};
use napi_store::StoreError;

/// One entry of an `InUse` error's `errors` list (§7): the referencing
/// entity that blocks a delete.
#[derive(Debug, Clone)]
pub struct UsedByRef {
    pub ty: &'static str,
    pub id: String,
}

#[derive(thiserror::Error, Debug)]
pub enum NapiError {
    #[error(transparent)]
    InvalidParams(#[from] ValidationError),

    #[error("{ty} {id} not found")]
    ResourceNotFound { ty: &'static str, id: String },

    #[error("caller is not authorized for this {field}")]
    NotAuthorized { field: &'static str },

    #[error("in use by {} other record(s)", .refs.len())]
    InUse { refs: Vec<UsedByRef> },

    #[error("network {network} has no free addresses")]
    SubnetFull { network: NetworkId },

    #[error("pool {pool} has no free addresses")]
    PoolFull { pool: NetworkPoolId },

    #[error("pool has multiple nic tags and the caller supplied no hint")]
    NicTagsAmbiguous,

    #[error("a concrete ip cannot be requested against a pool")]
    PoolIpNotAllowed,

    #[error("storage is temporarily unavailable, retry the request")]
    TransientRetryable,

    /// Maps §4.I's `BucketNotFound` ("fatal bug") and any other adapter
    /// failure that should never reach a caller as a well-formed taxonomy
    /// member.
    #[error("internal error: {0}")]
    Internal(String),
}

impl NapiError {
    pub fn not_found(ty: &'static str, id: impl std::fmt::Display) -> Self {
        NapiError::ResourceNotFound {
            ty,
            id: id.to_string(),
        }
    }

    pub fn in_use(refs: Vec<UsedByRef>) -> Self {
        NapiError::InUse { refs }
    }

    pub fn single_field(field: &'static str, message: impl Into<String>) -> Self {
        NapiError::InvalidParams(ValidationError::single(napi_model::FieldError::invalid(
            field, message,
        )))
    }
}

/// `EtagConflict` is internal-only per §7 — if it ever escapes an
/// orchestrator's retry loop it is a bug in that loop, not a condition a
/// caller should see, so it collapses to `Internal` here rather than being
/// given its own taxonomy member.
impl From<StoreError> for NapiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(_) => NapiError::TransientRetryable,
            StoreError::NotFound { bucket, key } => {
                NapiError::ResourceNotFound { ty: "record", id: format!("{bucket}/{key}") }
            }
            StoreError::EtagConflict { bucket, key } => {
                NapiError::Internal(format!("unretried etag conflict on {bucket}/{key}"))
            }
            StoreError::BucketNotFound(name) => {
                NapiError::Internal(format!("bucket not found: {name}"))
            }
            other => NapiError::Internal(other.to_string()),
        }
    }
}

/// Address-codec failures only ever reach the allocator on a value that was
/// already validated going in (a stored record, a numeric round-trip), so
/// any failure here is a storage-layer inconsistency, not caller input.
impl From<napi_net::codec::AddressError> for NapiError {
    fn from(err: napi_net::codec::AddressError) -> Self {
        NapiError::Internal(err.to_string())
    }
}

/// Used by the few code paths that need to name the belongs-to entity in an
/// `InUse` error without importing `napi_model` at the call site.
pub fn used_by(ty: &'static str, id: BelongsToId) -> UsedByRef {
    UsedByRef {
        ty,
        id: id.to_string(),
    }
}

pub type NapiResult<T> = Result<T, NapiError>;
