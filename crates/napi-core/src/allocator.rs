//! The IP allocator (§4.D): selection, claim, reservation, release, and
//! range-update bookkeeping for one network's address bucket. Every public
//! function here works against exactly one network's `napi_ips_<uuid>`
//! bucket and never reasons about pools or nics — that orchestration lives
//! in `pool_dispatcher` and `nic_state_machine`.

use std::net::IpAddr;

use chrono::Utc;
use napi_model::{IpRecord, IpRecordUpdate, Network};
use napi_net::{codec, subnet};
use napi_store::{BatchOp, Filter, FindOptions, SortOrder, Store, StoreError};
use napi_types::{BelongsToId, OwnerId};

use crate::error::{NapiError, NapiResult};

/// Bound on the claim-retry loop (§4.D: "up to a bounded retry count
/// (default 10)").
pub const CLAIM_RETRY_LIMIT: usize = 10;

/// What a fresh claim binds the selected address to.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub belongs_to_type: String,
    pub belongs_to_uuid: BelongsToId,
    pub owner_uuid: OwnerId,
    pub reserved: bool,
}

fn key_for(ip: IpAddr) -> String {
    codec::format(ip)
}

fn addr_num(ip: IpAddr) -> String {
    codec::to_numeric(ip).to_string()
}

/// Allocate a fresh address on `network`: the caller's concrete `ip` if
/// given (§4.D step 1), otherwise the selection policy of steps 2-3.
pub async fn allocate(
    store: &Store,
    network: &Network,
    requested_ip: Option<IpAddr>,
    request: ClaimRequest,
) -> NapiResult<IpRecord> {
    if let Some(ip) = requested_ip {
        return claim_concrete(store, network, ip, request).await;
    }

    let bucket = IpRecord::bucket_name(network.uuid);
    for _ in 0..CLAIM_RETRY_LIMIT {
        let candidate = select_candidate(store, &bucket, network).await?;
        let Some(ip) = candidate else {
            return Err(NapiError::SubnetFull {
                network: network.uuid,
            });
        };
        match try_claim(store, &bucket, ip, &request).await {
            Ok(record) => return Ok(record),
            Err(e) if e.is_etag_conflict() => continue,
            Err(e) if e.is_transient() => return Err(NapiError::TransientRetryable),
            Err(e) => return Err(e.into()),
        }
    }
    Err(NapiError::SubnetFull {
        network: network.uuid,
    })
}

/// §4.D step 1: claim a caller-specified address. The address must lie in
/// the subnet, must not be the broadcast address (where the family/prefix
/// has one, see the open-question decision in the design ledger), and must
/// either be unassigned or already reserved for the same owner.
async fn claim_concrete(
    store: &Store,
    network: &Network,
    ip: IpAddr,
    request: ClaimRequest,
) -> NapiResult<IpRecord> {
    if !napi_net::codec::in_subnet(ip, &network.subnet) {
        return Err(NapiError::single_field("ip", "address is not inside the network's subnet"));
    }
    if let Some(bcast) = subnet::broadcast(&network.subnet)
        && ip == bcast
    {
        return Err(NapiError::single_field("ip", "address is the subnet's broadcast address"));
    }

    let bucket = IpRecord::bucket_name(network.uuid);
    let key = key_for(ip);

    match store.get(&bucket, &key).await? {
        None => try_claim(store, &bucket, ip, &request)
            .await
            .map_err(NapiError::from),
        Some(stored) => {
            let existing = IpRecord::deserialize(stored.value)
                .map_err(|e| NapiError::Internal(format!("corrupt ip record: {e}")))?;
            if !existing.free() {
                return Err(NapiError::single_field("ip", "address is already assigned"));
            }
            if existing.owner_uuid.is_some() && existing.owner_uuid != Some(request.owner_uuid) {
                return Err(NapiError::single_field(
                    "ip",
                    "address is reserved for a different owner",
                ));
            }
            let record = IpRecord {
                ip,
                reserved: request.reserved || existing.reserved,
                belongs_to_type: Some(request.belongs_to_type),
                belongs_to_uuid: Some(request.belongs_to_uuid),
                owner_uuid: Some(request.owner_uuid),
                modified_at: Some(Utc::now()),
            };
            store
                .put(&bucket, &key, &record.serialize(), Some(&stored.etag))
                .await
                .map_err(NapiError::from)?;
            Ok(record)
        }
    }
}

/// §4.D steps 2-3: the smallest never-touched address in the provision
/// range (the gap-scan fast path), falling back to the oldest freed
/// address when the range has no gaps left.
async fn select_candidate(
    store: &Store,
    bucket: &str,
    network: &Network,
) -> NapiResult<Option<IpAddr>> {
    let lo = codec::to_numeric(network.provision_start_ip);
    let hi = codec::to_numeric(network.provision_end_ip);

    if let Some(ip) = gap_scan_candidate(store, bucket, network, lo, hi).await? {
        return Ok(Some(ip));
    }

    oldest_freed_candidate(store, bucket, lo, hi).await
}

/// Addresses within `i64::MAX` use the adapter's native `sqlGapScan`
/// (`generate_series` + anti-join); wider IPv6 ranges fall back to scanning
/// the records that do exist in the range and walking for the first
/// missing integer, since `sqlGapScan`'s bounds are `bigint`.
async fn gap_scan_candidate(
    store: &Store,
    bucket: &str,
    network: &Network,
    lo: u128,
    hi: u128,
) -> NapiResult<Option<IpAddr>> {
    if hi <= i64::MAX as u128 {
        let gaps = store
            .gap_scan(bucket, "addr_num", lo as i64, hi as i64, 1)
            .await?;
        let Some(gap) = gaps.into_iter().next() else {
            return Ok(None);
        };
        return Ok(Some(codec::from_numeric(gap.gap_start as u128, network.family)?));
    }

    let filter = Filter::Between(
        "addr_num",
        lo.to_string(),
        hi.to_string(),
    );
    let options = FindOptions {
        sort: Some(("addr_num", SortOrder::Asc)),
        limit: (hi - lo + 1).min(100_000) as i64,
        offset: 0,
    };
    let existing = store.find(bucket, &filter, &options).await?;
    let mut occupied: std::collections::BTreeSet<u128> = std::collections::BTreeSet::new();
    for stored in existing {
        if let Ok(record) = IpRecord::deserialize(stored.value) {
            occupied.insert(codec::to_numeric(record.ip));
        }
    }
    let mut cursor = lo;
    while cursor <= hi {
        if !occupied.contains(&cursor) {
            return Ok(Some(codec::from_numeric(cursor, network.family)?));
        }
        cursor += 1;
    }
    Ok(None)
}

async fn oldest_freed_candidate(
    store: &Store,
    bucket: &str,
    lo: u128,
    hi: u128,
) -> NapiResult<Option<IpAddr>> {
    let filter = Filter::And(vec![
        Filter::IsNull("belongs_to_uuid"),
        Filter::eq("reserved", false),
        Filter::Between("addr_num", lo.to_string(), hi.to_string()),
    ]);
    let options = FindOptions {
        sort: Some(("modified_at", SortOrder::Asc)),
        limit: 1,
        offset: 0,
    };
    let mut rows = store.find(bucket, &filter, &options).await?;
    let Some(stored) = rows.pop() else {
        return Ok(None);
    };
    let record = IpRecord::deserialize(stored.value)
        .map_err(|e| NapiError::Internal(format!("corrupt ip record: {e}")))?;
    Ok(Some(record.ip))
}

/// Writes the claim via etag CAS. A pure placeholder/never-seen address is
/// inserted with `expected_etag: None`; an address recovered from the
/// oldest-freed scan is updated against the etag it was read with.
async fn try_claim(
    store: &Store,
    bucket: &str,
    ip: IpAddr,
    request: &ClaimRequest,
) -> Result<IpRecord, StoreError> {
    let key = key_for(ip);
    let existing = store.get(bucket, &key).await?;

    let record = IpRecord {
        ip,
        reserved: request.reserved,
        belongs_to_type: Some(request.belongs_to_type.clone()),
        belongs_to_uuid: Some(request.belongs_to_uuid),
        owner_uuid: Some(request.owner_uuid),
        modified_at: Some(Utc::now()),
    };

    let expected_etag = existing.as_ref().map(|s| s.etag.as_str());
    store
        .put(bucket, &key, &record.serialize(), expected_etag)
        .await?;
    Ok(record)
}

/// Same selection policy as [`allocate`], but returns a prepared
/// [`BatchOp`] instead of committing it, so `nic_state_machine` can fold
/// the ip write into the same transaction as the nic write (§4.E's
/// "committed as one batch"). A conflict surfaces as `StoreError::EtagConflict`
/// once the batch is applied; the caller retries the whole bind attempt.
pub async fn allocate_for_batch(
    store: &Store,
    network: &Network,
    requested_ip: Option<IpAddr>,
    request: &ClaimRequest,
) -> NapiResult<(IpRecord, BatchOp)> {
    let bucket = IpRecord::bucket_name(network.uuid);

    let ip = match requested_ip {
        Some(ip) => {
            if !napi_net::codec::in_subnet(ip, &network.subnet) {
                return Err(NapiError::single_field(
                    "ip",
                    "address is not inside the network's subnet",
                ));
            }
            if let Some(bcast) = subnet::broadcast(&network.subnet)
                && ip == bcast
            {
                return Err(NapiError::single_field(
                    "ip",
                    "address is the subnet's broadcast address",
                ));
            }
            ip
        }
        None => match select_candidate(store, &bucket, network).await? {
            Some(ip) => ip,
            None => {
                return Err(NapiError::SubnetFull {
                    network: network.uuid,
                });
            }
        },
    };

    let key = key_for(ip);
    let existing = store.get(&bucket, &key).await?;
    let mut reserved = request.reserved;
    if let Some(stored) = &existing {
        let current = IpRecord::deserialize(stored.value.clone())
            .map_err(|e| NapiError::Internal(format!("corrupt ip record: {e}")))?;
        if !current.free() {
            return Err(NapiError::single_field("ip", "address is already assigned"));
        }
        if requested_ip.is_some()
            && current.owner_uuid.is_some()
            && current.owner_uuid != Some(request.owner_uuid)
        {
            return Err(NapiError::single_field(
                "ip",
                "address is reserved for a different owner",
            ));
        }
        reserved = reserved || current.reserved;
    }

    let record = IpRecord {
        ip,
        reserved,
        belongs_to_type: Some(request.belongs_to_type.clone()),
        belongs_to_uuid: Some(request.belongs_to_uuid),
        owner_uuid: Some(request.owner_uuid),
        modified_at: Some(Utc::now()),
    };

    let op = BatchOp::Put {
        bucket,
        key,
        value: record.serialize(),
        expected_etag: existing.map(|s| s.etag),
    };
    Ok((record, op))
}

/// Sets `reserved=true` on an address, creating a reservation placeholder
/// if none exists yet. Retries on etag conflict since the only possible
/// race is against another caller doing the same read-modify-write.
pub async fn reserve(
    store: &Store,
    network: &Network,
    ip: IpAddr,
    owner_uuid: Option<OwnerId>,
) -> NapiResult<IpRecord> {
    if !napi_net::codec::in_subnet(ip, &network.subnet) {
        return Err(NapiError::single_field("ip", "address is not inside the network's subnet"));
    }
    let bucket = IpRecord::bucket_name(network.uuid);
    let key = key_for(ip);

    for _ in 0..CLAIM_RETRY_LIMIT {
        let existing = store.get(&bucket, &key).await?;
        let mut record = match &existing {
            Some(stored) => IpRecord::deserialize(stored.value.clone())
                .map_err(|e| NapiError::Internal(format!("corrupt ip record: {e}")))?,
            None => IpRecord::placeholder(ip),
        };
        record.reserved = true;
        if owner_uuid.is_some() {
            record.owner_uuid = owner_uuid;
        }
        record.modified_at = Some(Utc::now());

        let expected_etag = existing.as_ref().map(|s| s.etag.as_str());
        match store.put(&bucket, &key, &record.serialize(), expected_etag).await {
            Ok(_) => return Ok(record),
            Err(e) if e.is_etag_conflict() => continue,
            Err(e) if e.is_transient() => return Err(NapiError::TransientRetryable),
            Err(e) => return Err(e.into()),
        }
    }
    Err(NapiError::TransientRetryable)
}

/// §4.D `unassign`: clear `belongs_to_type`/`belongs_to_uuid` while keeping
/// `owner_uuid` and `reserved`. Used both by `PUT .../ips/:ip
/// {unassign:true}` and, under the hood, by `nic_state_machine` on nic
/// delete/rebind.
pub async fn unassign(store: &Store, network: &Network, ip: IpAddr) -> NapiResult<IpRecord> {
    mutate_existing(store, network, ip, |record| {
        record.unassign(Utc::now());
    })
    .await
}

/// §4.D `free:true`: clear everything but `ip`.
pub async fn free(store: &Store, network: &Network, ip: IpAddr) -> NapiResult<IpRecord> {
    mutate_existing(store, network, ip, |record| {
        record.wipe(Utc::now());
    })
    .await
}

/// §4.D `reserved:false`: explicitly clear a reservation without touching
/// any assignment.
pub async fn unreserve(store: &Store, network: &Network, ip: IpAddr) -> NapiResult<IpRecord> {
    mutate_existing(store, network, ip, |record| {
        record.reserved = false;
        record.modified_at = Some(Utc::now());
    })
    .await
}

/// Dispatches `PUT /networks/:uuid/ips/:ip`'s body to whichever primitive
/// above its fields imply, after [`IpRecordUpdate::validate`] has already
/// ruled out incompatible combinations. `free` and `unassign` win over a new
/// assignment (validate already rejects them alongside `belongs_to_uuid`);
/// a bare `reserved` flag with no assignment toggles the reservation in
/// place; anything else is a no-op touch of the existing record.
pub async fn apply_update(
    store: &Store,
    network: &Network,
    ip: IpAddr,
    update: IpRecordUpdate,
) -> NapiResult<IpRecord> {
    if update.free {
        return free(store, network, ip).await;
    }
    if update.unassign {
        return unassign(store, network, ip).await;
    }
    if let Some(belongs_to_uuid) = update.belongs_to_uuid {
        let request = ClaimRequest {
            belongs_to_type: update.belongs_to_type.expect("validated by IpRecordUpdate::validate"),
            belongs_to_uuid,
            owner_uuid: update.owner_uuid.expect("validated by IpRecordUpdate::validate"),
            reserved: update.reserved.unwrap_or(false),
        };
        return allocate(store, network, Some(ip), request).await;
    }
    match update.reserved {
        Some(true) => reserve(store, network, ip, update.owner_uuid).await,
        Some(false) => unreserve(store, network, ip).await,
        None => mutate_existing(store, network, ip, |_| {}).await,
    }
}

async fn mutate_existing(
    store: &Store,
    network: &Network,
    ip: IpAddr,
    f: impl Fn(&mut IpRecord),
) -> NapiResult<IpRecord> {
    let bucket = IpRecord::bucket_name(network.uuid);
    let key = key_for(ip);

    for _ in 0..CLAIM_RETRY_LIMIT {
        let Some(stored) = store.get(&bucket, &key).await? else {
            return Err(NapiError::not_found("ip", &key));
        };
        let mut record = IpRecord::deserialize(stored.value)
            .map_err(|e| NapiError::Internal(format!("corrupt ip record: {e}")))?;
        f(&mut record);

        match store.put(&bucket, &key, &record.serialize(), Some(&stored.etag)).await {
            Ok(_) => return Ok(record),
            Err(e) if e.is_etag_conflict() => continue,
            Err(e) if e.is_transient() => return Err(NapiError::TransientRetryable),
            Err(e) => return Err(e.into()),
        }
    }
    Err(NapiError::TransientRetryable)
}

/// Directly unassigns the IP record bound to `belongs_to_uuid`, if any,
/// used by `nic_state_machine` as one step of a larger batch (delete,
/// rebind). Returns `Ok(None)` when the nic had no bound address.
pub async fn release_for_batch(
    store: &Store,
    network: &Network,
    ip: IpAddr,
) -> NapiResult<BatchOp> {
    let bucket = IpRecord::bucket_name(network.uuid);
    let key = key_for(ip);
    let Some(stored) = store.get(&bucket, &key).await? else {
        return Err(NapiError::not_found("ip", &key));
    };
    let mut record = IpRecord::deserialize(stored.value)
        .map_err(|e| NapiError::Internal(format!("corrupt ip record: {e}")))?;
    record.unassign(Utc::now());
    Ok(BatchOp::Put {
        bucket,
        key,
        value: record.serialize(),
        expected_etag: Some(stored.etag),
    })
}

/// §4.D range update: when a network's provision range shifts, the two
/// range-sentinel placeholders bounding the old range (`start-1`,
/// `end+1`) are replaced by new ones bounding the new range, applied as a
/// single `batch` per the spec's "partial failure leaves no split state."
/// Existing assigned/reserved records are left untouched wherever they
/// fall; they simply stop (or start) being eligible for fresh selection.
pub async fn update_provision_range(
    store: &Store,
    network: &Network,
    new_start: IpAddr,
    new_end: IpAddr,
) -> NapiResult<()> {
    let bucket = IpRecord::bucket_name(network.uuid);
    let family = network.family;

    let old_lo = sentinel(network.provision_start_ip, -1, family)?;
    let old_hi = sentinel(network.provision_end_ip, 1, family)?;
    let new_lo = sentinel(new_start, -1, family)?;
    let new_hi = sentinel(new_end, 1, family)?;

    let mut ops = Vec::new();
    for (old, new) in [(old_lo, new_lo), (old_hi, new_hi)] {
        if old == new {
            continue;
        }
        if let Some(old) = old
            && let Some(stored) = store.get(&bucket, &key_for(old)).await?
        {
            let is_placeholder = IpRecord::deserialize(stored.value)
                .map(|r| r.free() && !r.reserved)
                .unwrap_or(false);
            if is_placeholder {
                ops.push(BatchOp::DeleteWithEtag {
                    bucket: bucket.clone(),
                    key: key_for(old),
                    expected_etag: stored.etag,
                });
            }
        }
        if let Some(new) = new
            && store.get(&bucket, &key_for(new)).await?.is_none()
        {
            ops.push(BatchOp::Put {
                bucket: bucket.clone(),
                key: key_for(new),
                value: IpRecord::placeholder(new).serialize(),
                expected_etag: None,
            });
        }
    }

    if ops.is_empty() {
        return Ok(());
    }

    let mut store = store.clone();
    store
        .with_txn(move |txn| {
            Box::pin(async move {
                napi_store::batch::apply_batch(txn, &ops).await?;
                Ok(())
            })
        })
        .await?;
    Ok(())
}

/// Materializes the two range-sentinel placeholders for a freshly created
/// network's provision range. Unlike [`update_provision_range`] there is no
/// old range to retire, so this just inserts whatever sentinels
/// `network.provision_start_ip`/`provision_end_ip` imply, skipping any that
/// already exist.
pub async fn init_provision_range(store: &Store, network: &Network) -> NapiResult<()> {
    let bucket = IpRecord::bucket_name(network.uuid);
    let family = network.family;

    let mut ops = Vec::new();
    for endpoint in [
        sentinel(network.provision_start_ip, -1, family)?,
        sentinel(network.provision_end_ip, 1, family)?,
    ]
    .into_iter()
    .flatten()
    {
        if store.get(&bucket, &key_for(endpoint)).await?.is_none() {
            ops.push(BatchOp::Put {
                bucket: bucket.clone(),
                key: key_for(endpoint),
                value: IpRecord::placeholder(endpoint).serialize(),
                expected_etag: None,
            });
        }
    }

    if ops.is_empty() {
        return Ok(());
    }
    let mut store = store.clone();
    store
        .with_txn(move |txn| Box::pin(async move { napi_store::batch::apply_batch(txn, &ops).await }))
        .await?;
    Ok(())
}

/// The sentinel address just outside a provision range endpoint, or `None`
/// when that would fall outside the numeric address space (the low
/// sentinel below address `0`) or onto the network/broadcast address
/// (where a sentinel would be redundant with the subnet's own bounds).
fn sentinel(
    endpoint: IpAddr,
    direction: i128,
    family: napi_net::AddressFamily,
) -> NapiResult<Option<IpAddr>> {
    let numeric = codec::to_numeric(endpoint) as i128 + direction;
    if numeric < 0 {
        return Ok(None);
    }
    match codec::from_numeric(numeric as u128, family) {
        Ok(addr) => Ok(Some(addr)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_steps_by_one_in_each_direction() {
        let base: IpAddr = "10.0.1.5".parse().unwrap();
        let lo = sentinel(base, -1, napi_net::AddressFamily::Ipv4).unwrap().unwrap();
        let hi = sentinel(base, 1, napi_net::AddressFamily::Ipv4).unwrap().unwrap();
        assert_eq!(lo.to_string(), "10.0.1.4");
        assert_eq!(hi.to_string(), "10.0.1.6");
    }

    #[test]
    fn sentinel_below_zero_is_none() {
        let base: IpAddr = "0.0.0.0".parse().unwrap();
        assert!(sentinel(base, -1, napi_net::AddressFamily::Ipv4).unwrap().is_none());
    }
}
