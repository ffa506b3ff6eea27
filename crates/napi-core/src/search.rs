//! §4.H: by-address search across every network, and the listing
//! operations for networks/pools/nics/aggregations/ips. Listing's
//! owner-eligibility filter (§4.G) isn't an indexed column, so it is
//! applied in-process after the adapter's `find` rather than pushed into
//! the SQL predicate, then the page is sliced to `limit`/`offset`.

use napi_model::{Aggregation, Entity, IpRecord, Network, NetworkPool, Nic, NicTag};
use napi_net::{IdentifyAddressFamily, codec};
use napi_store::{Filter, FindOptions, SortOrder, Store};
use napi_types::OwnerId;
use std::net::IpAddr;

use crate::error::{NapiError, NapiResult};
use crate::owner_policy;

/// Upper bound on how many rows a full-bucket scan (no caller-supplied
/// limit) will ever pull back in one call, e.g. enumerating every network
/// to search an address or every pool to post-filter by owner.
const SCAN_LIMIT: i64 = 100_000;

pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 1000;

/// Validates the `limit`/`offset` rule shared by every listing endpoint
/// (§6: "limit integer 1..1000; offset integer ≥0").
pub fn validate_page(limit: i64, offset: i64) -> NapiResult<()> {
    if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
        return Err(NapiError::single_field(
            "limit",
            format!("must be in {MIN_LIMIT}..{MAX_LIMIT}"),
        ));
    }
    if offset < 0 {
        return Err(NapiError::single_field("offset", "must be >= 0"));
    }
    Ok(())
}

fn paginate<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

/// One network's view of a searched address: the record as it exists (or a
/// materialized free placeholder, per §4.H) plus the network it belongs to.
#[derive(Debug, Clone)]
pub struct AddressHit {
    pub network_uuid: napi_types::NetworkId,
    pub record: IpRecord,
}

/// `searchIPs(ip)`: every network whose subnet contains `ip`, one
/// [`AddressHit`] each. A network with no existing record for the address
/// gets a free placeholder materialized in the response rather than
/// written to storage. `NoNetworksForIP` (mapped to `ResourceNotFound`) when
/// no network contains the address at all.
pub async fn search_ips(store: &Store, ip: IpAddr) -> NapiResult<Vec<AddressHit>> {
    let family = ip.address_family();
    let filter = Filter::eq("family", family.to_string());
    let options = FindOptions {
        sort: None,
        limit: SCAN_LIMIT,
        offset: 0,
    };
    let candidates = store
        .find(&Network::bucket().name, &filter, &options)
        .await
        .map_err(NapiError::from)?;

    let mut hits = Vec::new();
    for stored in candidates {
        let network = Network::deserialize(stored.value)
            .map_err(|e| NapiError::Internal(format!("corrupt network record: {e}")))?;
        if !codec::in_subnet(ip, &network.subnet) {
            continue;
        }
        let bucket = IpRecord::bucket_name(network.uuid);
        let key = codec::format(ip);
        let record = match store.get(&bucket, &key).await.map_err(NapiError::from)? {
            Some(stored) => IpRecord::deserialize(stored.value)
                .map_err(|e| NapiError::Internal(format!("corrupt ip record: {e}")))?,
            None => IpRecord::placeholder(ip),
        };
        hits.push(AddressHit {
            network_uuid: network.uuid,
            record,
        });
    }

    if hits.is_empty() {
        return Err(NapiError::not_found("ip", codec::format(ip)));
    }
    Ok(hits)
}

/// `GET /networks/:uuid/ips/:ip`: the record for one address in one known
/// network, materializing a free placeholder when nothing is stored yet —
/// the same existing-or-placeholder rule `search_ips` applies per network.
pub async fn get_ip(store: &Store, network: &Network, ip: IpAddr) -> NapiResult<IpRecord> {
    let bucket = IpRecord::bucket_name(network.uuid);
    let key = codec::format(ip);
    match store.get(&bucket, &key).await.map_err(NapiError::from)? {
        Some(stored) => IpRecord::deserialize(stored.value)
            .map_err(|e| NapiError::Internal(format!("corrupt ip record: {e}"))),
        None => Ok(IpRecord::placeholder(ip)),
    }
}

/// `listIPs(network)`: every existing record in `network`'s bucket, sorted
/// by address ascending, paginated.
pub async fn list_ips(
    store: &Store,
    network: &Network,
    limit: i64,
    offset: i64,
) -> NapiResult<Vec<IpRecord>> {
    validate_page(limit, offset)?;
    let bucket = IpRecord::bucket_name(network.uuid);
    let options = FindOptions {
        sort: Some(("addr_num", SortOrder::Asc)),
        limit,
        offset,
    };
    let rows = store
        .find(&bucket, &Filter::And(vec![]), &options)
        .await
        .map_err(NapiError::from)?;

    rows.into_iter()
        .map(|stored| {
            IpRecord::deserialize(stored.value)
                .map_err(|e| NapiError::Internal(format!("corrupt ip record: {e}")))
        })
        .collect()
}

/// Caller context a listing endpoint applies the owner-eligibility
/// predicate (§4.G) under; `None` means no `provisionable_by` was given and
/// every row passes.
#[derive(Debug, Clone, Copy)]
pub struct OwnerScope {
    pub caller: OwnerId,
    pub admin: OwnerId,
}

fn owner_ok(scope: Option<OwnerScope>, owner_uuids: Option<&[OwnerId]>) -> bool {
    match scope {
        None => true,
        Some(scope) => owner_policy::owner_allowed(owner_uuids, scope.caller, scope.admin),
    }
}

pub async fn list_networks(
    store: &Store,
    filter: &Filter,
    scope: Option<OwnerScope>,
    limit: i64,
    offset: i64,
) -> NapiResult<Vec<Network>> {
    validate_page(limit, offset)?;
    let options = FindOptions {
        sort: Some(("name", SortOrder::Asc)),
        limit: SCAN_LIMIT,
        offset: 0,
    };
    let rows = store
        .find(&Network::bucket().name, filter, &options)
        .await
        .map_err(NapiError::from)?;

    let mut networks = Vec::new();
    for stored in rows {
        let network = Network::deserialize(stored.value)
            .map_err(|e| NapiError::Internal(format!("corrupt network record: {e}")))?;
        if owner_ok(scope, network.owner_uuids.as_deref()) {
            networks.push(network);
        }
    }
    Ok(paginate(networks, limit, offset))
}

pub async fn list_pools(
    store: &Store,
    filter: &Filter,
    scope: Option<OwnerScope>,
    limit: i64,
    offset: i64,
) -> NapiResult<Vec<NetworkPool>> {
    validate_page(limit, offset)?;
    let options = FindOptions {
        sort: Some(("name", SortOrder::Asc)),
        limit: SCAN_LIMIT,
        offset: 0,
    };
    let rows = store
        .find(&NetworkPool::bucket().name, filter, &options)
        .await
        .map_err(NapiError::from)?;

    let mut pools = Vec::new();
    for stored in rows {
        let pool = NetworkPool::deserialize(stored.value)
            .map_err(|e| NapiError::Internal(format!("corrupt pool record: {e}")))?;
        if owner_ok(scope, pool.owner_uuids.as_deref()) {
            pools.push(pool);
        }
    }
    Ok(paginate(pools, limit, offset))
}

/// Nics carry no `owner_uuids` set of their own (§3: a nic has a single
/// `owner_uuid`), so listing applies `provisionable_by` as an equality
/// check against that field rather than `owner_policy::owner_allowed`.
pub async fn list_nics(
    store: &Store,
    filter: &Filter,
    provisionable_by: Option<OwnerId>,
    limit: i64,
    offset: i64,
) -> NapiResult<Vec<Nic>> {
    validate_page(limit, offset)?;
    let options = FindOptions {
        sort: Some(("mac", SortOrder::Asc)),
        limit,
        offset,
    };
    let combined = match provisionable_by {
        None => filter.clone(),
        Some(owner) => Filter::And(vec![filter.clone(), Filter::eq("owner_uuid", owner.to_string())]),
    };
    let rows = store
        .find(&Nic::bucket().name, &combined, &options)
        .await
        .map_err(NapiError::from)?;

    rows.into_iter()
        .map(|stored| {
            Nic::deserialize(stored.value)
                .map_err(|e| NapiError::Internal(format!("corrupt nic record: {e}")))
        })
        .collect()
}

/// Nic tags have no owner or filterable field beyond `name`; listing is a
/// plain sorted page over the bucket.
pub async fn list_nic_tags(store: &Store, limit: i64, offset: i64) -> NapiResult<Vec<NicTag>> {
    validate_page(limit, offset)?;
    let options = FindOptions {
        sort: Some(("name", SortOrder::Asc)),
        limit,
        offset,
    };
    let rows = store
        .find(&NicTag::bucket().name, &Filter::And(vec![]), &options)
        .await
        .map_err(NapiError::from)?;

    rows.into_iter()
        .map(|stored| {
            NicTag::deserialize(stored.value)
                .map_err(|e| NapiError::Internal(format!("corrupt nic tag record: {e}")))
        })
        .collect()
}

pub async fn list_aggregations(
    store: &Store,
    filter: &Filter,
    limit: i64,
    offset: i64,
) -> NapiResult<Vec<Aggregation>> {
    validate_page(limit, offset)?;
    let options = FindOptions {
        sort: Some(("name", SortOrder::Asc)),
        limit,
        offset,
    };
    let rows = store
        .find(&Aggregation::bucket().name, filter, &options)
        .await
        .map_err(NapiError::from)?;

    rows.into_iter()
        .map(|stored| {
            Aggregation::deserialize(stored.value)
                .map_err(|e| NapiError::Internal(format!("corrupt aggregation record: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_rejects_zero_limit() {
        assert!(validate_page(0, 0).is_err());
    }

    #[test]
    fn page_rejects_negative_offset() {
        assert!(validate_page(10, -1).is_err());
    }

    #[test]
    fn page_accepts_bounds() {
        assert!(validate_page(1, 0).is_ok());
        assert!(validate_page(1000, 0).is_ok());
        assert!(validate_page(1001, 0).is_err());
    }

    #[test]
    fn paginate_slices_in_memory_candidates() {
        let items = vec![1, 2, 3, 4, 5];
        assert_eq!(paginate(items, 2, 1), vec![2, 3]);
    }
}
