use sqlx::PgPool;

/// Re-used for every integration test as well as the `migrate` CLI
/// sub-command. `sqlx::migrate!` must only be invoked here — calling it
/// from more than one place embeds the migration set into the binary
/// multiple times, as the teacher's own `MIGRATOR` docs warn.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[tracing::instrument(skip(pool))]
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// §9's legacy-v4-bucket backfill: advancing a network's IP bucket schema
/// from version 1 (numeric-only v4 keys) to version 2 (canonical string
/// keys plus an indexed numeric sort column) requires backfilling
/// `ipaddr`/`subnet_end_ip`-equivalent derived columns on every existing
/// row. Because every indexed column in this store is `GENERATED ALWAYS
/// ... STORED` (see `bucket::update_bucket_schema`), the backfill happens
/// as a side effect of the `ALTER TABLE ADD COLUMN` Postgres runs when the
/// schema version is bumped — this function exists so callers have an
/// explicit, idempotent, restartable entry point matching §9's wording
/// ("must be idempotent and restartable") rather than relying on that
/// being an implementation detail of `update_bucket_schema`.
pub async fn backfill_ip_bucket_v2(
    conn: &mut sqlx::PgConnection,
    bucket_name: &str,
) -> crate::error::StoreResult<()> {
    crate::bucket::update_bucket_schema(
        conn,
        bucket_name,
        &napi_model::IpRecord::bucket_schema(),
    )
    .await
}
