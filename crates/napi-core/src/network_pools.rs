//! Referential CRUD for network pools: resolving the caller's member
//! network uuids into the `MemberNetwork` snapshots `NetworkPool::validate`
//! needs, and the owner/family compatibility checks that need store access
//! (§4.G, §9's open-question decision (b)).

use napi_model::{Entity, MemberNetwork, Network, NetworkPool, NetworkPoolParams};
use napi_store::Store;
use napi_types::{NetworkId, NetworkPoolId, OwnerId};

use crate::error::{NapiError, NapiResult};
use crate::owner_policy;
use crate::repo;

/// Caller-facing request shape: a list of network uuids rather than the
/// resolved `MemberNetwork` snapshots `napi-model` validates against,
/// since only this crate can fetch those snapshots.
#[derive(Debug, Clone)]
pub struct PoolRequest {
    pub name: String,
    pub description: Option<String>,
    pub network_uuids: Vec<NetworkId>,
    pub owner_uuids: Option<Vec<OwnerId>>,
}

async fn resolve_members(store: &Store, uuids: &[NetworkId]) -> NapiResult<Vec<MemberNetwork>> {
    let mut members = Vec::with_capacity(uuids.len());
    for uuid in uuids {
        let network = repo::get::<Network>(store, "network", &uuid.to_string())
            .await?
            .entity;
        members.push(MemberNetwork {
            uuid: network.uuid,
            family: network.family,
            nic_tag: network.nic_tag,
        });
    }
    Ok(members)
}

/// Every owner id a pool admits must also be admitted by each member
/// network, per the open-question (b) decision recorded in the design
/// ledger: a pool's ownership narrows who may provision through it, it
/// never needs to match a network's restriction exactly.
async fn check_owner_compatibility(
    store: &Store,
    network_uuids: &[NetworkId],
    pool_owner_uuids: Option<&[OwnerId]>,
    admin: OwnerId,
) -> NapiResult<()> {
    let Some(owners) = pool_owner_uuids else {
        return Ok(());
    };
    for uuid in network_uuids {
        let network = repo::get::<Network>(store, "network", &uuid.to_string())
            .await?
            .entity;
        for owner in owners {
            if !owner_policy::owner_allowed(network.owner_uuids.as_deref(), *owner, admin) {
                return Err(NapiError::single_field(
                    "owner_uuids",
                    format!("{owner} is not an eligible owner of member network {uuid}"),
                ));
            }
        }
    }
    Ok(())
}

pub async fn create_pool(
    store: &Store,
    req: PoolRequest,
    admin: OwnerId,
) -> NapiResult<NetworkPool> {
    let members = resolve_members(store, &req.network_uuids).await?;
    check_owner_compatibility(store, &req.network_uuids, req.owner_uuids.as_deref(), admin).await?;

    let pool = NetworkPool::validate(NetworkPoolParams {
        uuid: None,
        name: req.name,
        description: req.description,
        networks: members,
        owner_uuids: req.owner_uuids,
    })?;
    repo::put::<NetworkPool>(store, &pool.uuid.to_string(), &pool, None).await?;
    Ok(pool)
}

pub async fn update_pool(
    store: &Store,
    uuid: NetworkPoolId,
    req: PoolRequest,
    admin: OwnerId,
) -> NapiResult<NetworkPool> {
    let loaded = repo::get::<NetworkPool>(store, "network_pool", &uuid.to_string()).await?;
    let members = resolve_members(store, &req.network_uuids).await?;
    check_owner_compatibility(store, &req.network_uuids, req.owner_uuids.as_deref(), admin).await?;

    let updated = NetworkPool::validate(NetworkPoolParams {
        uuid: Some(uuid),
        name: req.name,
        description: req.description,
        networks: members,
        owner_uuids: req.owner_uuids,
    })?;
    if updated.family != loaded.entity.family {
        return Err(NapiError::single_field(
            "networks",
            "a pool's address family is immutable once created",
        ));
    }

    repo::put::<NetworkPool>(store, &uuid.to_string(), &updated, Some(&loaded.etag)).await?;
    Ok(updated)
}

pub async fn delete_pool(store: &Store, uuid: NetworkPoolId) -> NapiResult<()> {
    repo::get::<NetworkPool>(store, "network_pool", &uuid.to_string()).await?;
    repo::delete::<NetworkPool>(store, &uuid.to_string()).await
}
