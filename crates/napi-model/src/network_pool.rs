use std::collections::BTreeSet;

use napi_net::AddressFamily;
use napi_types::{NetworkId, NetworkPoolId, OwnerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{BucketSchema, BucketSpec, Entity, IndexedField, IndexedFieldType};
use crate::validation::{FieldError, Validator};

const MIN_NETWORKS: usize = 1;
const MAX_NETWORKS: usize = 64;

/// The slice of a member network's fields a pool needs to derive `family`,
/// `nic_tag`, and `nic_tags_present`. Resolved by the orchestrator (which
/// has store access) and handed in, keeping this validation purely local
/// per §4.C.
#[derive(Debug, Clone)]
pub struct MemberNetwork {
    pub uuid: NetworkId,
    pub family: AddressFamily,
    pub nic_tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkPool {
    pub uuid: NetworkPoolId,
    pub name: String,
    pub description: Option<String>,
    pub family: AddressFamily,
    pub nic_tag: String,
    pub nic_tags_present: Vec<String>,
    pub networks: Vec<NetworkId>,
    pub owner_uuids: Option<Vec<OwnerId>>,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkPoolParams {
    pub uuid: Option<NetworkPoolId>,
    pub name: String,
    pub description: Option<String>,
    pub networks: Vec<MemberNetwork>,
    pub owner_uuids: Option<Vec<OwnerId>>,
}

impl Entity for NetworkPool {
    type Params = NetworkPoolParams;

    fn validate(params: NetworkPoolParams) -> Result<Self, crate::validation::ValidationError> {
        let mut v = Validator::new();

        if params.name.is_empty() {
            v.push(FieldError::missing("name"));
        }

        if params.networks.len() < MIN_NETWORKS {
            v.push(FieldError::invalid("networks", "must contain at least one network"));
        }
        if params.networks.len() > MAX_NETWORKS {
            v.push(FieldError::invalid(
                "networks",
                format!("must contain at most {MAX_NETWORKS} networks"),
            ));
        }

        let families: BTreeSet<AddressFamily> =
            params.networks.iter().map(|n| n.family).collect();
        if families.len() > 1 {
            v.push(FieldError::invalid(
                "networks",
                "all member networks must share one address family",
            ));
        }

        let seen: BTreeSet<NetworkId> = {
            let mut seen = BTreeSet::new();
            for n in &params.networks {
                if !seen.insert(n.uuid) {
                    v.push(FieldError::duplicate(
                        "networks",
                        format!("{} appears more than once", n.uuid),
                    ));
                }
            }
            seen
        };
        let _ = seen;

        if params.owner_uuids.as_ref().is_some_and(|o| o.is_empty()) {
            v.push(FieldError::invalid(
                "owner_uuids",
                "must be non-empty when present",
            ));
        }

        let family = families.into_iter().next();
        let Some(family) = family else {
            return v.finish(NetworkPool {
                uuid: params.uuid.unwrap_or_default(),
                name: params.name,
                description: params.description,
                family: AddressFamily::Ipv4,
                nic_tag: String::new(),
                nic_tags_present: Vec::new(),
                networks: Vec::new(),
                owner_uuids: params.owner_uuids,
            });
        };

        let nic_tag = params.networks[0].nic_tag.clone();
        let mut nic_tags_present: Vec<String> =
            params.networks.iter().map(|n| n.nic_tag.clone()).collect();
        nic_tags_present.sort();
        nic_tags_present.dedup();

        v.finish(NetworkPool {
            uuid: params.uuid.unwrap_or_default(),
            name: params.name,
            description: params.description,
            family,
            nic_tag,
            nic_tags_present,
            networks: params.networks.into_iter().map(|n| n.uuid).collect(),
            owner_uuids: params.owner_uuids,
        })
    }

    fn bucket() -> BucketSpec {
        BucketSpec {
            name: "napi_network_pools".to_string(),
            schema: BucketSchema {
                version: 1,
                indexed: &[
                    IndexedField::new("uuid", "/uuid", IndexedFieldType::Uuid),
                    IndexedField::new("name", "/name", IndexedFieldType::Text),
                    IndexedField::new("family", "/family", IndexedFieldType::Text),
                ],
            },
        }
    }

    fn serialize(&self) -> Value {
        serde_json::to_value(self).expect("NetworkPool always serializes")
    }

    fn deserialize(raw: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(tag: &str) -> MemberNetwork {
        MemberNetwork {
            uuid: NetworkId::new(),
            family: AddressFamily::Ipv4,
            nic_tag: tag.to_string(),
        }
    }

    #[test]
    fn derives_family_and_tags() {
        let params = NetworkPoolParams {
            uuid: None,
            name: "pool1".to_string(),
            description: None,
            networks: vec![member("external"), member("external")],
            owner_uuids: None,
        };
        let pool = NetworkPool::validate(params).unwrap();
        assert_eq!(pool.family, AddressFamily::Ipv4);
        assert_eq!(pool.nic_tag, "external");
        assert_eq!(pool.nic_tags_present, vec!["external".to_string()]);
    }

    #[test]
    fn rejects_mixed_family() {
        let mut b = member("external");
        b.family = AddressFamily::Ipv6;
        let params = NetworkPoolParams {
            uuid: None,
            name: "pool1".to_string(),
            description: None,
            networks: vec![member("external"), b],
            owner_uuids: None,
        };
        assert!(NetworkPool::validate(params).is_err());
    }

    #[test]
    fn rejects_empty_network_list() {
        let params = NetworkPoolParams {
            uuid: None,
            name: "pool1".to_string(),
            description: None,
            networks: vec![],
            owner_uuids: None,
        };
        assert!(NetworkPool::validate(params).is_err());
    }

    #[test]
    fn rejects_duplicate_network() {
        let m = member("external");
        let params = NetworkPoolParams {
            uuid: None,
            name: "pool1".to_string(),
            description: None,
            networks: vec![m.clone(), m],
            owner_uuids: None,
        };
        assert!(NetworkPool::validate(params).is_err());
    }
}
