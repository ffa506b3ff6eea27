//! The nic state machine (§4.E): create, bind, rebind, delete, and the
//! primary-flag invariant, each going through `allocator`/`owner_policy`
//! and committing its nic+ip writes as one `batch` where the spec requires
//! it.

use mac_address::MacAddress;
use napi_model::{Entity, IpRecord, Network, Nic, NicParams, NicState};
use napi_store::{BatchOp, Filter, FindOptions, Store};
use napi_types::{BelongsToId, NetworkId, OwnerId};
use std::net::IpAddr;

use crate::allocator::{self, ClaimRequest};
use crate::error::{NapiError, NapiResult};
use crate::owner_policy;
use crate::repo;

/// Nics are keyed by the integer form of their MAC address (§3).
pub fn mac_key(mac: MacAddress) -> String {
    let bytes = mac.bytes();
    let num = bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    num.to_string()
}

async fn commit_batch(store: &Store, ops: Vec<BatchOp>) -> Result<(), napi_store::StoreError> {
    let mut store = store.clone();
    store
        .with_txn(move |txn| Box::pin(async move { napi_store::batch::apply_batch(txn, &ops).await }))
        .await
}

fn enforce_owner_and_tag(
    network: &Network,
    requested_tag: Option<&str>,
    caller_owner: OwnerId,
    admin: OwnerId,
    check_owner: bool,
) -> NapiResult<()> {
    if !check_owner {
        return Ok(());
    }
    if !owner_policy::owner_allowed(network.owner_uuids.as_deref(), caller_owner, admin) {
        return Err(NapiError::single_field(
            "owner_uuid",
            "caller is not an eligible owner of this network",
        ));
    }
    if let Some(tag) = requested_tag
        && tag != network.nic_tag
    {
        return Err(NapiError::single_field(
            "nic_tag",
            "does not match the network's nic tag",
        ));
    }
    Ok(())
}

/// Parameters for `createNic`. `network_uuid` absent means the nic is
/// created unbound; present means it is created already bound to a fresh
/// or caller-specified address.
#[derive(Debug, Clone)]
pub struct CreateNicRequest {
    pub mac: MacAddress,
    pub owner_uuid: OwnerId,
    pub belongs_to_type: String,
    pub belongs_to_uuid: BelongsToId,
    pub primary: bool,
    pub state: NicState,
    pub network_uuid: Option<NetworkId>,
    pub requested_ip: Option<IpAddr>,
    pub vlan_id: Option<u16>,
    pub mtu: Option<u32>,
    pub cn_uuid: Option<String>,
}

pub async fn create_nic(
    store: &Store,
    req: CreateNicRequest,
    caller_owner: OwnerId,
    admin: OwnerId,
    check_owner: bool,
) -> NapiResult<Nic> {
    let key = mac_key(req.mac);
    if repo::try_get::<Nic>(store, &key).await?.is_some() {
        return Err(NapiError::single_field(
            "mac",
            "a nic with this mac already exists",
        ));
    }

    let Some(network_uuid) = req.network_uuid else {
        let nic = Nic::validate(NicParams {
            mac: Some(req.mac),
            owner_uuid: req.owner_uuid,
            belongs_to_type: req.belongs_to_type,
            belongs_to_uuid: req.belongs_to_uuid,
            primary: false,
            state: req.state,
            nic_tag: None,
            network_uuid: None,
            ip: None,
            vlan_id: req.vlan_id,
            mtu: req.mtu,
            cn_uuid: req.cn_uuid,
            created_at: None,
            modified_at: None,
        })?;
        repo::put::<Nic>(store, &key, &nic, None).await?;
        if req.primary {
            return set_primary(store, req.mac, req.belongs_to_uuid).await;
        }
        return Ok(nic);
    };

    let network = repo::get::<Network>(store, "network", &network_uuid.to_string())
        .await?
        .entity;
    enforce_owner_and_tag(&network, None, caller_owner, admin, check_owner)?;

    let claim = ClaimRequest {
        belongs_to_type: req.belongs_to_type.clone(),
        belongs_to_uuid: req.belongs_to_uuid,
        owner_uuid: req.owner_uuid,
        reserved: false,
    };

    for _ in 0..allocator::CLAIM_RETRY_LIMIT {
        let (record, ip_op) =
            allocator::allocate_for_batch(store, &network, req.requested_ip, &claim).await?;
        let nic = Nic::validate(NicParams {
            mac: Some(req.mac),
            owner_uuid: req.owner_uuid,
            belongs_to_type: req.belongs_to_type.clone(),
            belongs_to_uuid: req.belongs_to_uuid,
            primary: false,
            state: req.state,
            nic_tag: Some(network.nic_tag.clone()),
            network_uuid: Some(network.uuid),
            ip: Some(record.ip),
            vlan_id: req.vlan_id,
            mtu: req.mtu,
            cn_uuid: req.cn_uuid.clone(),
            created_at: None,
            modified_at: None,
        })?;
        let nic_op = BatchOp::Put {
            bucket: Nic::bucket().name,
            key: key.clone(),
            value: nic.serialize(),
            expected_etag: None,
        };

        match commit_batch(store, vec![ip_op, nic_op]).await {
            Ok(()) => {
                if req.primary {
                    return set_primary(store, req.mac, req.belongs_to_uuid).await;
                }
                return Ok(nic);
            }
            Err(e) if e.is_etag_conflict() => continue,
            Err(e) if e.is_transient() => return Err(NapiError::TransientRetryable),
            Err(e) => return Err(e.into()),
        }
    }
    Err(NapiError::TransientRetryable)
}

/// Writes a nic record against an address the pool dispatcher has already
/// claimed via `allocator::allocate` (not batched — the pool's choice of
/// member network isn't known until dispatch runs, so there is no single
/// network to fold the nic write into ahead of time).
pub async fn create_nic_from_pool_allocation(
    store: &Store,
    req: CreateNicRequest,
    network: &Network,
    record: &IpRecord,
) -> NapiResult<Nic> {
    let key = mac_key(req.mac);
    if repo::try_get::<Nic>(store, &key).await?.is_some() {
        return Err(NapiError::single_field(
            "mac",
            "a nic with this mac already exists",
        ));
    }

    let nic = Nic::validate(NicParams {
        mac: Some(req.mac),
        owner_uuid: req.owner_uuid,
        belongs_to_type: req.belongs_to_type,
        belongs_to_uuid: req.belongs_to_uuid,
        primary: false,
        state: req.state,
        nic_tag: Some(network.nic_tag.clone()),
        network_uuid: Some(network.uuid),
        ip: Some(record.ip),
        vlan_id: req.vlan_id,
        mtu: req.mtu,
        cn_uuid: req.cn_uuid,
        created_at: None,
        modified_at: None,
    })?;
    repo::put::<Nic>(store, &key, &nic, None).await?;
    if req.primary {
        return set_primary(store, req.mac, req.belongs_to_uuid).await;
    }
    Ok(nic)
}

/// §4.E "update-to-bind" and "rebind": assigns `target_network`/`target_ip`
/// to an existing nic, freeing whatever address it previously held (if
/// any), all committed as one batch. Covers both transitions named in the
/// spec since an unbound nic simply has no old address to release.
pub async fn bind_network(
    store: &Store,
    mac: MacAddress,
    target_network: NetworkId,
    target_ip: Option<IpAddr>,
    caller_owner: OwnerId,
    admin: OwnerId,
    check_owner: bool,
) -> NapiResult<Nic> {
    let key = mac_key(mac);
    let network = repo::get::<Network>(store, "network", &target_network.to_string())
        .await?
        .entity;
    enforce_owner_and_tag(&network, None, caller_owner, admin, check_owner)?;

    for _ in 0..allocator::CLAIM_RETRY_LIMIT {
        let loaded = repo::get::<Nic>(store, "nic", &key).await?;
        let nic = loaded.entity;

        let claim = ClaimRequest {
            belongs_to_type: nic.belongs_to_type.clone(),
            belongs_to_uuid: nic.belongs_to_uuid,
            owner_uuid: nic.owner_uuid,
            reserved: false,
        };
        let (record, new_ip_op) =
            allocator::allocate_for_batch(store, &network, target_ip, &claim).await?;

        let mut ops = Vec::new();
        if let (Some(old_network), Some(old_ip)) = (nic.network_uuid, nic.ip) {
            let old_network = repo::get::<Network>(store, "network", &old_network.to_string())
                .await?
                .entity;
            ops.push(allocator::release_for_batch(store, &old_network, old_ip).await?);
        }
        ops.push(new_ip_op);

        let updated = Nic {
            nic_tag: Some(network.nic_tag.clone()),
            network_uuid: Some(network.uuid),
            ip: Some(record.ip),
            modified_at: chrono::Utc::now(),
            ..nic
        };
        ops.push(BatchOp::Put {
            bucket: Nic::bucket().name,
            key: key.clone(),
            value: updated.serialize(),
            expected_etag: Some(loaded.etag),
        });

        match commit_batch(store, ops).await {
            Ok(()) => return Ok(updated),
            Err(e) if e.is_etag_conflict() => continue,
            Err(e) if e.is_transient() => return Err(NapiError::TransientRetryable),
            Err(e) => return Err(e.into()),
        }
    }
    Err(NapiError::TransientRetryable)
}

/// §4.E "delete": removes the nic record and, in the same batch, clears
/// `belongs_to_*` on its bound IP (preserving `owner_uuid`/`reserved`).
pub async fn delete_nic(store: &Store, mac: MacAddress) -> NapiResult<()> {
    let key = mac_key(mac);
    let loaded = repo::get::<Nic>(store, "nic", &key).await?;
    let nic = loaded.entity;

    let mut ops = Vec::new();
    if let (Some(network_uuid), Some(ip)) = (nic.network_uuid, nic.ip) {
        let network = repo::get::<Network>(store, "network", &network_uuid.to_string())
            .await?
            .entity;
        ops.push(allocator::release_for_batch(store, &network, ip).await?);
    }
    ops.push(BatchOp::Delete {
        bucket: Nic::bucket().name,
        key,
    });

    commit_batch(store, ops).await.map_err(NapiError::from)
}

/// §4.E "primary flag": sets `primary:true` on `mac`'s nic and atomically
/// clears it on every other nic sharing `belongs_to_uuid`.
pub async fn set_primary(
    store: &Store,
    mac: MacAddress,
    belongs_to_uuid: BelongsToId,
) -> NapiResult<Nic> {
    let bucket = Nic::bucket().name;
    let filter = Filter::eq("belongs_to_uuid", belongs_to_uuid.to_string());
    let siblings = store
        .find(&bucket, &filter, &FindOptions::default())
        .await
        .map_err(NapiError::from)?;

    let target_key = mac_key(mac);
    let mut ops = Vec::new();
    let mut target: Option<Nic> = None;

    for stored in siblings {
        let mut nic = Nic::deserialize(stored.value)
            .map_err(|e| NapiError::Internal(format!("corrupt nic record: {e}")))?;
        let key = mac_key(nic.mac);
        let want_primary = key == target_key;
        if nic.primary == want_primary {
            if want_primary {
                target = Some(nic);
            }
            continue;
        }
        nic.primary = want_primary;
        nic.modified_at = chrono::Utc::now();
        ops.push(BatchOp::Put {
            bucket: bucket.clone(),
            key: key.clone(),
            value: nic.serialize(),
            expected_etag: Some(stored.etag),
        });
        if want_primary {
            target = Some(nic);
        }
    }

    let Some(target) = target else {
        return Err(NapiError::not_found("nic", &target_key));
    };

    if !ops.is_empty() {
        commit_batch(store, ops).await?;
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_key_is_decimal_and_stable() {
        let mac = MacAddress::new([0, 0, 0, 0, 0, 1]);
        assert_eq!(mac_key(mac), "1");
        assert_eq!(mac_key(mac), mac_key(mac));
    }

    #[test]
    fn mac_key_respects_byte_order() {
        let mac = MacAddress::new([0, 0, 0, 0, 1, 0]);
        assert_eq!(mac_key(mac), "256");
    }
}
