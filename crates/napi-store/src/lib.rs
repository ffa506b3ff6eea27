//! The KV/transaction adapter of §4.B: a uniform `get`/`put`/`delete`/
//! `find`/`batch`/`sqlGapScan`/`createBucket` surface implemented over
//! Postgres, following the teacher's `SafePgPool`/`Transaction` split
//! (`safe_pg_pool.rs`) instead of a hand-rolled locking layer, and its
//! dynamic-filter query building (`network_prefix.rs`'s `ColumnInfo`/
//! `ObjectColumnFilter`) generalized to an abstract [`find::Filter`] over
//! a bucket's declared indexed columns.
//!
//! Every logical "bucket" from §4.B is one Postgres table: a `key` primary
//! key, a `value jsonb` payload, an `etag` used for optimistic-concurrency
//! writes, and one `GENERATED ALWAYS ... STORED` column per field the
//! entity's [`napi_model::BucketSchema`] declares as indexed.

pub mod batch;
pub mod bucket;
pub mod error;
pub mod find;
pub mod gap_scan;
pub mod kv;
pub mod migrations;
pub mod pool;
pub mod retry;

use std::time::Duration;

use napi_model::{BucketSchema, BucketSpec};
use serde_json::Value;

pub use batch::BatchOp;
pub use error::{StoreError, StoreResult};
pub use find::{Filter, FindOptions, SortOrder};
pub use gap_scan::Gap;
pub use kv::Stored;
pub use pool::{SafePgPool, SafeTransaction};

/// The adapter handle request code is given: a clone of the process-wide
/// connection pool. Per §5's "shared mutable resources" note, this is the
/// only process-wide state request handlers touch, and it is handed in
/// explicitly rather than reached for through a singleton.
#[derive(Clone)]
pub struct Store {
    pool: SafePgPool,
}

impl Store {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool: pool.into() }
    }

    pub fn raw_pool(&self) -> &sqlx::PgPool {
        self.pool.raw()
    }

    pub async fn get(&self, bucket: &str, key: &str) -> StoreResult<Option<Stored>> {
        let mut conn = self.pool.acquire().await?;
        kv::get(&mut conn, bucket, key).await
    }

    pub async fn put(
        &self,
        bucket: &str,
        key: &str,
        value: &Value,
        expected_etag: Option<&str>,
    ) -> StoreResult<String> {
        let mut conn = self.pool.acquire().await?;
        kv::put(&mut conn, bucket, key, value, expected_etag).await
    }

    pub async fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        kv::delete(&mut conn, bucket, key).await
    }

    pub async fn find(
        &self,
        bucket: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Stored>> {
        let mut conn = self.pool.acquire().await?;
        find::find(&mut conn, bucket, filter, options).await
    }

    pub async fn count(&self, bucket: &str, filter: &Filter) -> StoreResult<i64> {
        let mut conn = self.pool.acquire().await?;
        find::count(&mut conn, bucket, filter).await
    }

    pub async fn gap_scan(
        &self,
        bucket: &str,
        key_column: &str,
        lo: i64,
        hi: i64,
        limit: i64,
    ) -> StoreResult<Vec<Gap>> {
        let mut conn = self.pool.acquire().await?;
        gap_scan::gap_scan(&mut conn, bucket, key_column, lo, hi, limit).await
    }

    pub async fn create_bucket(&self, spec: &BucketSpec) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        bucket::create_bucket(&mut conn, spec).await
    }

    pub async fn delete_bucket(&self, name: &str) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        bucket::delete_bucket(&mut conn, name).await
    }

    pub async fn update_bucket_schema(&self, name: &str, schema: &BucketSchema) -> StoreResult<()> {
        let mut conn = self.pool.acquire().await?;
        bucket::update_bucket_schema(&mut conn, name, schema).await
    }

    /// Run `f` inside one transaction, committing on success and rolling
    /// back on any error — the vehicle every multi-write §4.D/§4.E protocol
    /// step (claim, rebind, delete) uses to apply a [`BatchOp`] slice
    /// atomically.
    pub async fn with_txn<T>(
        &mut self,
        f: impl for<'txn> FnOnce(
            &'txn mut SafeTransaction<'_>,
        ) -> futures::future::BoxFuture<'txn, Result<T, StoreError>>,
    ) -> StoreResult<T> {
        self.pool.with_txn(f).await
    }
}

/// Default retry budget for transient adapter errors (§4.I: "retried up to
/// N=3 with exponential backoff").
pub const TRANSIENT_RETRY_LIMIT: usize = 3;

/// Default bound on the allocator's etag-conflict restart loop (§4.D's
/// claim protocol: "up to a bounded retry count (default 10)").
pub const CLAIM_RETRY_LIMIT: usize = 10;

pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(20);
