//! The pool dispatcher (§4.F): pick a member network out of a pool under
//! the caller's tag/owner constraints and retry across networks as each
//! candidate runs out of addresses.

use napi_model::{IpRecord, Network, NetworkPool};
use napi_store::Store;
use napi_types::OwnerId;

use crate::allocator::{self, ClaimRequest};
use crate::error::{NapiError, NapiResult};
use crate::owner_policy;
use crate::repo;

/// Caller-supplied hints narrowing which member network is eligible.
#[derive(Debug, Clone, Default)]
pub struct PoolHint {
    pub nic_tag: Option<String>,
    pub nic_tags_available: Vec<String>,
}

/// Allocate an address from the first eligible, non-full member network of
/// `pool`, in declared order. A concrete `ip` is never accepted here —
/// callers must reject `PoolIpNotAllowed` before reaching this function.
pub async fn provision(
    store: &Store,
    pool: &NetworkPool,
    hint: &PoolHint,
    claim: ClaimRequest,
    caller_owner: OwnerId,
    admin: OwnerId,
    check_owner: bool,
) -> NapiResult<(Network, IpRecord)> {
    if check_owner
        && !owner_policy::owner_allowed(pool.owner_uuids.as_deref(), caller_owner, admin)
    {
        return Err(NapiError::single_field(
            "owner_uuid",
            "caller is not an eligible owner of this pool",
        ));
    }

    let no_hint = hint.nic_tag.is_none() && hint.nic_tags_available.is_empty();
    if pool.nic_tags_present.len() > 1 && no_hint {
        return Err(NapiError::NicTagsAmbiguous);
    }
    let single_tag = pool.nic_tags_present.len() <= 1;

    for network_uuid in &pool.networks {
        let loaded = repo::get::<Network>(store, "network", &network_uuid.to_string()).await?;
        let network = loaded.entity;

        if !owner_policy::nic_tag_matches(
            &network.nic_tag,
            hint.nic_tag.as_deref(),
            &hint.nic_tags_available,
            single_tag,
        ) {
            continue;
        }
        if check_owner
            && !owner_policy::owner_allowed(network.owner_uuids.as_deref(), caller_owner, admin)
        {
            continue;
        }

        match allocator::allocate(store, &network, None, claim.clone()).await {
            Ok(record) => return Ok((network, record)),
            Err(NapiError::SubnetFull { .. }) => continue,
            Err(e) => return Err(e),
        }
    }

    Err(NapiError::PoolFull { pool: pool.uuid })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_tag_pool_permits_no_hint() {
        let hint = PoolHint::default();
        assert!(hint.nic_tag.is_none());
        assert!(hint.nic_tags_available.is_empty());
    }
}
