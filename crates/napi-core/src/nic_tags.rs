//! Referential CRUD for nic tags. Keyed by `name` (unique, per §3) rather
//! than `uuid`, since every reference to a tag elsewhere in the model
//! (`Network.nic_tag`) is by name.

use napi_model::{Entity, NicTag, NicTagParams, Network};
use napi_store::{Filter, FindOptions, Store};

use crate::error::{NapiError, NapiResult, UsedByRef};
use crate::repo;

pub async fn create_nic_tag(store: &Store, params: NicTagParams) -> NapiResult<NicTag> {
    let tag = NicTag::validate(params)?;
    if repo::try_get::<NicTag>(store, &tag.name).await?.is_some() {
        return Err(NapiError::single_field(
            "name",
            "a nic tag with this name already exists",
        ));
    }
    repo::put::<NicTag>(store, &tag.name, &tag, None).await?;
    Ok(tag)
}

pub async fn update_nic_tag(store: &Store, name: &str, mtu: Option<u32>) -> NapiResult<NicTag> {
    let loaded = repo::get::<NicTag>(store, "nic_tag", name).await?;
    let updated = NicTag::validate(NicTagParams {
        uuid: Some(loaded.entity.uuid),
        name: name.to_string(),
        mtu,
    })?;
    repo::put::<NicTag>(store, name, &updated, Some(&loaded.etag)).await?;
    Ok(updated)
}

/// `deleteNicTag`: refused if any network still references it by name
/// (§3: "deletion refused if any network references it").
pub async fn delete_nic_tag(store: &Store, name: &str) -> NapiResult<()> {
    repo::get::<NicTag>(store, "nic_tag", name).await?;

    let filter = Filter::eq("nic_tag", name);
    let referencing = store
        .find(&Network::bucket().name, &filter, &FindOptions::default())
        .await
        .map_err(NapiError::from)?;
    if let Some(stored) = referencing.into_iter().next() {
        let network = Network::deserialize(stored.value)
            .map_err(|e| NapiError::Internal(format!("corrupt network record: {e}")))?;
        return Err(NapiError::in_use(vec![UsedByRef {
            ty: "network",
            id: network.uuid.to_string(),
        }]));
    }

    repo::delete::<NicTag>(store, name).await
}
