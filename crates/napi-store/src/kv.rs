use serde_json::Value;
use sqlx::PgConnection;
use sqlx::Row;

use crate::error::{StoreError, StoreResult};

/// A single record plus the etag it was read with, per §4.B's `get`
/// contract.
#[derive(Debug, Clone)]
pub struct Stored {
    pub value: Value,
    pub etag: String,
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `get(bucket, key)` from §4.B.
pub async fn get(conn: &mut PgConnection, bucket: &str, key: &str) -> StoreResult<Option<Stored>> {
    let table = quote_ident(bucket);
    let query = format!("SELECT value, etag FROM {table} WHERE key = $1");
    let row = sqlx::query(&query)
        .bind(key)
        .fetch_optional(conn)
        .await
        .map_err(|e| StoreError::query(&query, e))?;

    Ok(row.map(|row| Stored {
        value: row.get("value"),
        etag: row.get("etag"),
    }))
}

/// `put(bucket, key, value, {etag?})` from §4.B. `expected_etag` of `None`
/// means "must not exist"; any mismatch (including a row existing when
/// `None` was expected) surfaces as [`StoreError::EtagConflict`], which
/// `napi-core`'s allocator claim protocol (§4.D) treats as a restart
/// signal rather than a fatal error.
pub async fn put(
    conn: &mut PgConnection,
    bucket: &str,
    key: &str,
    value: &Value,
    expected_etag: Option<&str>,
) -> StoreResult<String> {
    let table = quote_ident(bucket);
    let new_etag = uuid::Uuid::new_v4().to_string();

    let row = match expected_etag {
        None => {
            let query = format!(
                "INSERT INTO {table} (key, value, etag) VALUES ($1, $2, $3) \
                 ON CONFLICT (key) DO NOTHING RETURNING etag"
            );
            sqlx::query(&query)
                .bind(key)
                .bind(value)
                .bind(&new_etag)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| StoreError::query(&query, e))?
        }
        Some(etag) => {
            let query = format!(
                "UPDATE {table} SET value = $2, etag = $3 \
                 WHERE key = $1 AND etag = $4 RETURNING etag"
            );
            sqlx::query(&query)
                .bind(key)
                .bind(value)
                .bind(&new_etag)
                .bind(etag)
                .fetch_optional(&mut *conn)
                .await
                .map_err(|e| StoreError::query(&query, e))?
        }
    };

    match row {
        Some(_) => Ok(new_etag),
        None => Err(StoreError::EtagConflict {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }),
    }
}

/// `delete(bucket, key)` from §4.B.
pub async fn delete(conn: &mut PgConnection, bucket: &str, key: &str) -> StoreResult<()> {
    let table = quote_ident(bucket);
    let query = format!("DELETE FROM {table} WHERE key = $1 RETURNING key");
    let row = sqlx::query(&query)
        .bind(key)
        .fetch_optional(conn)
        .await
        .map_err(|e| StoreError::query(&query, e))?;

    match row {
        Some(_) => Ok(()),
        None => Err(StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }),
    }
}

/// Conditional delete, used by `batch`'s per-item etag discipline: delete
/// only succeeds if the row's current etag matches.
pub async fn delete_with_etag(
    conn: &mut PgConnection,
    bucket: &str,
    key: &str,
    expected_etag: &str,
) -> StoreResult<()> {
    let table = quote_ident(bucket);
    let query = format!("DELETE FROM {table} WHERE key = $1 AND etag = $2 RETURNING key");
    let row = sqlx::query(&query)
        .bind(key)
        .bind(expected_etag)
        .fetch_optional(conn)
        .await
        .map_err(|e| StoreError::query(&query, e))?;

    match row {
        Some(_) => Ok(()),
        None => Err(StoreError::EtagConflict {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }),
    }
}
