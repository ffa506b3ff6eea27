use napi_model::{BucketSchema, BucketSpec, IndexedFieldType};
use sqlx::{Executor, PgConnection, Postgres};

use crate::error::{StoreError, StoreResult};

/// Maps an entity's declared [`IndexedFieldType`] onto the Postgres column
/// type backing its generated, indexed column.
fn pg_column_type(ty: IndexedFieldType) -> &'static str {
    match ty {
        IndexedFieldType::Text => "text",
        IndexedFieldType::Uuid => "uuid",
        IndexedFieldType::Bool => "boolean",
        IndexedFieldType::Integer => "integer",
        IndexedFieldType::Numeric => "numeric",
    }
}

/// Build the `value ->> 'field'` (or `->'a'->>'b'` for a nested pointer)
/// extraction expression for a field's JSON pointer, cast to the indexed
/// column's declared type.
fn extraction_expr(json_pointer: &str, ty: IndexedFieldType) -> String {
    let segments: Vec<&str> = json_pointer.trim_start_matches('/').split('/').collect();
    let mut expr = "value".to_string();
    for (i, seg) in segments.iter().enumerate() {
        let op = if i + 1 == segments.len() { "->>" } else { "->" };
        expr.push_str(&format!("{op}'{seg}'"));
    }
    format!("({expr})::{}", pg_column_type(ty))
}

/// Quote an identifier so bucket/field names built from a network uuid
/// (`napi_ips_<uuid>`) can never be interpreted as anything but a single
/// identifier, even though they are not literal `bind`-able parameters in
/// DDL.
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `createBucket(name, schema)` from §4.B. Builds one Postgres table per
/// bucket, with a generated+indexed column per declared indexed field, and
/// records the bucket's schema version in `napi_bucket_versions` so a later
/// `updateBucketSchema` call knows whether a backfill is needed.
pub async fn create_bucket(conn: &mut PgConnection, spec: &BucketSpec) -> StoreResult<()> {
    let table = quote_ident(&spec.name);
    let mut columns = vec![
        "key text PRIMARY KEY".to_string(),
        "value jsonb NOT NULL".to_string(),
        "etag text NOT NULL".to_string(),
    ];
    for field in spec.schema.indexed {
        columns.push(format!(
            "{} {} GENERATED ALWAYS AS ({}) STORED",
            quote_ident(field.name),
            pg_column_type(field.ty),
            extraction_expr(field.json_pointer, field.ty)
        ));
    }

    let create = format!("CREATE TABLE IF NOT EXISTS {table} ({})", columns.join(", "));
    conn.execute(create.as_str())
        .await
        .map_err(|e| StoreError::query(&create, e))?;

    for field in spec.schema.indexed {
        let idx_name = format!("{}_{}_idx", spec.name, field.name);
        let create_idx = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {table} ({})",
            quote_ident(&idx_name),
            quote_ident(field.name)
        );
        conn.execute(create_idx.as_str())
            .await
            .map_err(|e| StoreError::query(&create_idx, e))?;
    }

    record_bucket_version(conn, &spec.name, spec.schema.version).await
}

/// `deleteBucket(name)` from §4.B, used when a network is deleted (§3's
/// "destroyed on network deletion" lifecycle rule).
pub async fn delete_bucket(conn: &mut PgConnection, name: &str) -> StoreResult<()> {
    let table = quote_ident(name);
    let drop = format!("DROP TABLE IF EXISTS {table}");
    conn.execute(drop.as_str())
        .await
        .map_err(|e| StoreError::query(&drop, e))?;

    let query = "DELETE FROM napi_bucket_versions WHERE bucket_name = $1";
    sqlx::query(query)
        .bind(name)
        .execute(&mut *conn)
        .await
        .map_err(|e| StoreError::query(query, e))?;
    Ok(())
}

async fn record_bucket_version(conn: &mut PgConnection, name: &str, version: i32) -> StoreResult<()> {
    let query = r#"
        INSERT INTO napi_bucket_versions (bucket_name, version)
        VALUES ($1, $2)
        ON CONFLICT (bucket_name) DO NOTHING
    "#;
    sqlx::query(query)
        .bind(name)
        .bind(version)
        .execute(conn)
        .await
        .map_err(|e| StoreError::query(query, e))?;
    Ok(())
}

pub async fn bucket_version(conn: &mut PgConnection, name: &str) -> StoreResult<Option<i32>> {
    let query = "SELECT version FROM napi_bucket_versions WHERE bucket_name = $1";
    sqlx::query_scalar(query)
        .bind(name)
        .fetch_optional(conn)
        .await
        .map_err(|e| StoreError::query(query, e))
}

/// `updateBucketSchema` from §4.B: declares the target [`BucketSchema`],
/// adds any newly-indexed generated columns, and bumps the recorded
/// version. Per §4.B this must run an online index backfill before
/// reporting readiness; since every indexed column here is `GENERATED
/// ALWAYS ... STORED`, adding the column *is* the backfill — Postgres
/// computes it for every existing row as part of the `ALTER TABLE`.
pub async fn update_bucket_schema(
    conn: &mut PgConnection,
    bucket_name: &str,
    schema: &BucketSchema,
) -> StoreResult<()> {
    let current = bucket_version(conn, bucket_name).await?;
    if current == Some(schema.version) {
        return Ok(());
    }

    let table = quote_ident(bucket_name);
    for field in schema.indexed {
        let add_col = format!(
            "ALTER TABLE {table} ADD COLUMN IF NOT EXISTS {} {} GENERATED ALWAYS AS ({}) STORED",
            quote_ident(field.name),
            pg_column_type(field.ty),
            extraction_expr(field.json_pointer, field.ty)
        );
        conn.execute(add_col.as_str())
            .await
            .map_err(|e| StoreError::query(&add_col, e))?;

        let idx_name = format!("{bucket_name}_{}_idx", field.name);
        let create_idx = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {table} ({})",
            quote_ident(&idx_name),
            quote_ident(field.name)
        );
        conn.execute(create_idx.as_str())
            .await
            .map_err(|e| StoreError::query(&create_idx, e))?;
    }

    let query = r#"
        INSERT INTO napi_bucket_versions (bucket_name, version)
        VALUES ($1, $2)
        ON CONFLICT (bucket_name) DO UPDATE SET version = EXCLUDED.version
    "#;
    sqlx::query(query)
        .bind(bucket_name)
        .bind(schema.version)
        .execute(conn)
        .await
        .map_err(|e| StoreError::query(query, e))?;
    Ok(())
}

pub(crate) type PgExecutor<'a> = &'a mut <Postgres as sqlx::Database>::Connection;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_expr_builds_single_level_pointer() {
        assert_eq!(
            extraction_expr("/uuid", IndexedFieldType::Uuid),
            "(value->>'uuid')::uuid"
        );
    }

    #[test]
    fn extraction_expr_builds_nested_pointer() {
        assert_eq!(
            extraction_expr("/a/b", IndexedFieldType::Text),
            "(value->'a'->>'b')::text"
        );
    }

    #[test]
    fn quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("na\"pi"), "\"na\"\"pi\"");
    }
}
