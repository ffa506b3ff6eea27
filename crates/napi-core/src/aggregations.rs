//! Referential CRUD for LACP aggregations: every mac must belong to an
//! existing nic under the same server, and a mac may appear in at most one
//! aggregation (§3).

use mac_address::MacAddress;
use napi_model::{Aggregation, AggregationId, AggregationParams, Entity, Nic};
use napi_store::{Filter, FindOptions, Store};

use crate::error::{NapiError, NapiResult};
use crate::nic_state_machine::mac_key;
use crate::repo;

async fn require_macs_belong_to_server(
    store: &Store,
    macs: &[MacAddress],
    belongs_to_uuid: napi_types::BelongsToId,
) -> NapiResult<()> {
    for mac in macs {
        let nic = repo::try_get::<Nic>(store, &mac_key(*mac)).await?;
        match nic {
            Some(loaded) if loaded.entity.belongs_to_uuid == belongs_to_uuid => {}
            _ => {
                return Err(NapiError::single_field(
                    "macs",
                    format!("{mac} is not a nic belonging to this server"),
                ));
            }
        }
    }
    Ok(())
}

/// No mac in `macs` may already belong to a different aggregation on the
/// same server (`excluding` is the id being updated, if any).
async fn require_macs_unclaimed(
    store: &Store,
    macs: &[MacAddress],
    belongs_to_uuid: napi_types::BelongsToId,
    excluding: Option<&AggregationId>,
) -> NapiResult<()> {
    let filter = Filter::eq("belongs_to_uuid", belongs_to_uuid.to_string());
    let siblings = store
        .find(&Aggregation::bucket().name, &filter, &FindOptions::default())
        .await
        .map_err(NapiError::from)?;

    for stored in siblings {
        let sibling = Aggregation::deserialize(stored.value)
            .map_err(|e| NapiError::Internal(format!("corrupt aggregation record: {e}")))?;
        if excluding.is_some_and(|id| *id == sibling.id()) {
            continue;
        }
        for mac in macs {
            if sibling.macs.contains(mac) {
                return Err(NapiError::single_field(
                    "macs",
                    format!("{mac} already belongs to aggregation {}", sibling.id()),
                ));
            }
        }
    }
    Ok(())
}

pub async fn create_aggregation(store: &Store, params: AggregationParams) -> NapiResult<Aggregation> {
    let belongs_to_uuid = params.belongs_to_uuid;
    let macs = params.macs.clone();
    let aggr = Aggregation::validate(params)?;

    require_macs_belong_to_server(store, &macs, belongs_to_uuid).await?;
    require_macs_unclaimed(store, &macs, belongs_to_uuid, None).await?;

    repo::put::<Aggregation>(store, &aggr.id().to_string(), &aggr, None).await?;
    Ok(aggr)
}

pub async fn update_aggregation(
    store: &Store,
    id: &AggregationId,
    mut params: AggregationParams,
) -> NapiResult<Aggregation> {
    let loaded = repo::get::<Aggregation>(store, "aggregation", &id.to_string()).await?;
    params.belongs_to_uuid = id.belongs_to_uuid;
    params.name = id.name.clone();
    let macs = params.macs.clone();
    let updated = Aggregation::validate(params)?;

    require_macs_belong_to_server(store, &macs, id.belongs_to_uuid).await?;
    require_macs_unclaimed(store, &macs, id.belongs_to_uuid, Some(id)).await?;

    repo::put::<Aggregation>(store, &id.to_string(), &updated, Some(&loaded.etag)).await?;
    Ok(updated)
}

pub async fn delete_aggregation(store: &Store, id: &AggregationId) -> NapiResult<()> {
    repo::get::<Aggregation>(store, "aggregation", &id.to_string()).await?;
    repo::delete::<Aggregation>(store, &id.to_string()).await
}
