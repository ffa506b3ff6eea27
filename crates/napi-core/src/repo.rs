//! Thin generic CRUD glue between an [`Entity`] and the [`Store`] it's
//! persisted in: every orchestrator loads/writes network/pool/nic/etc.
//! records through these instead of hand-rolling `bucket()`/`serialize()`
//! calls at each call site.

use napi_model::Entity;
use napi_store::Store;

use crate::error::{NapiError, NapiResult};

pub struct Loaded<E> {
    pub entity: E,
    pub etag: String,
}

pub async fn get<E: Entity>(store: &Store, ty: &'static str, key: &str) -> NapiResult<Loaded<E>> {
    let bucket = E::bucket().name;
    let stored = store
        .get(&bucket, key)
        .await?
        .ok_or_else(|| NapiError::not_found(ty, key))?;
    let entity = E::deserialize(stored.value)
        .map_err(|e| NapiError::Internal(format!("corrupt {ty} record: {e}")))?;
    Ok(Loaded {
        entity,
        etag: stored.etag,
    })
}

pub async fn try_get<E: Entity>(store: &Store, key: &str) -> NapiResult<Option<Loaded<E>>> {
    let bucket = E::bucket().name;
    let Some(stored) = store.get(&bucket, key).await? else {
        return Ok(None);
    };
    let entity = E::deserialize(stored.value)
        .map_err(|e| NapiError::Internal(format!("corrupt record: {e}")))?;
    Ok(Some(Loaded {
        entity,
        etag: stored.etag,
    }))
}

pub async fn put<E: Entity>(
    store: &Store,
    key: &str,
    entity: &E,
    expected_etag: Option<&str>,
) -> NapiResult<String> {
    let bucket = E::bucket().name;
    store
        .put(&bucket, key, &entity.serialize(), expected_etag)
        .await
        .map_err(NapiError::from)
}

pub async fn delete<E: Entity>(store: &Store, key: &str) -> NapiResult<()> {
    let bucket = E::bucket().name;
    store.delete(&bucket, key).await.map_err(NapiError::from)
}
