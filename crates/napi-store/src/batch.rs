use serde_json::Value;

use crate::error::StoreResult;
use crate::kv;
use crate::pool::SafeTransaction;

/// One operation in a `batch` call (§4.B). `napi-core` builds these for
/// every multi-write protocol step (nic create-and-bind, rebind, delete,
/// range update) so that the whole step commits or rolls back as a unit.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Put {
        bucket: String,
        key: String,
        value: Value,
        /// `None` means "must not exist", matching `put`'s own contract.
        expected_etag: Option<String>,
    },
    Delete {
        bucket: String,
        key: String,
    },
    /// Delete conditioned on the row's current etag, used when a batch
    /// both reads and then deletes a record it must not have raced on.
    DeleteWithEtag {
        bucket: String,
        key: String,
        expected_etag: String,
    },
}

/// `batch([op…]) -> ok | first-failure` from §4.B. All-or-nothing:
/// every operation runs against the same `SafeTransaction`, so the first
/// failing operation (an etag mismatch, a missing row) rolls back
/// everything that ran before it in this call. The caller is responsible
/// for committing the transaction afterward — `batch` only applies the
/// operations, since in `napi-core` a single request's transaction often
/// spans a batch plus other reads.
pub async fn apply_batch(txn: &mut SafeTransaction<'_>, ops: &[BatchOp]) -> StoreResult<()> {
    for op in ops {
        match op {
            BatchOp::Put {
                bucket,
                key,
                value,
                expected_etag,
            } => {
                kv::put(txn, bucket, key, value, expected_etag.as_deref()).await?;
            }
            BatchOp::Delete { bucket, key } => {
                kv::delete(txn, bucket, key).await?;
            }
            BatchOp::DeleteWithEtag {
                bucket,
                key,
                expected_etag,
            } => {
                kv::delete_with_etag(txn, bucket, key, expected_etag).await?;
            }
        }
    }
    Ok(())
}
