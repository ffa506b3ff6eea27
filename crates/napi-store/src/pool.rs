use std::ops::{Deref, DerefMut};

use sqlx::Postgres;
use sqlx::pool::PoolConnection;

use crate::error::StoreError;

/// A `SafePgPool` only allows one transaction at a time, mirroring the
/// teacher's `SafePgPool`: the borrow checker prevents a request from
/// starting a second transaction while the first is still live, which is
/// what would otherwise let a request deadlock against itself by holding a
/// transaction open and then trying to acquire another connection from the
/// same pool.
#[derive(Clone)]
pub struct SafePgPool {
    pool: sqlx::PgPool,
}

impl SafePgPool {
    pub fn begin(&mut self) -> impl Future<Output = Result<SafeTransaction<'_>, StoreError>> + '_ {
        async move {
            let inner = self
                .pool
                .begin()
                .await
                .map_err(|e| StoreError::query("BEGIN", e))?;
            Ok(SafeTransaction { inner })
        }
    }

    pub async fn with_txn<T>(
        &mut self,
        f: impl for<'txn> FnOnce(
            &'txn mut SafeTransaction<'_>,
        ) -> futures::future::BoxFuture<'txn, Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let mut txn = self.begin().await?;
        match f(&mut txn).await {
            Ok(output) => {
                txn.commit().await?;
                Ok(output)
            }
            Err(e) => {
                txn.rollback().await.ok();
                Err(e)
            }
        }
    }

    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>, StoreError> {
        self.pool.acquire().await.map_err(StoreError::acquire)
    }

    pub fn raw(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

impl From<sqlx::PgPool> for SafePgPool {
    fn from(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

/// A transaction borrowed mutably from a [`SafePgPool`]. Every §4.B `batch`
/// operation runs inside one of these so that partial application is
/// impossible: either every operation commits, or the whole transaction
/// rolls back on drop/`rollback`.
pub struct SafeTransaction<'a> {
    inner: sqlx::Transaction<'a, Postgres>,
}

impl<'a> SafeTransaction<'a> {
    pub async fn commit(self) -> Result<(), StoreError> {
        self.inner
            .commit()
            .await
            .map_err(|e| StoreError::query("COMMIT", e))
    }

    pub async fn rollback(self) -> Result<(), StoreError> {
        self.inner
            .rollback()
            .await
            .map_err(|e| StoreError::query("ROLLBACK", e))
    }
}

impl<'a> Deref for SafeTransaction<'a> {
    type Target = sqlx::Transaction<'a, Postgres>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for SafeTransaction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
