use std::collections::BTreeMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use napi_net::{AddressFamily, IdentifyAddressFamily, IpNetwork, codec, subnet};
use napi_types::{NetworkId, OwnerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{BucketSchema, BucketSpec, Entity, IndexedField, IndexedFieldType};
use crate::validation::{FieldError, Validator};

const MAX_RESOLVERS: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub uuid: NetworkId,
    pub name: String,
    pub nic_tag: String,
    pub vlan_id: u16,
    pub family: AddressFamily,
    pub subnet: IpNetwork,
    pub subnet_start_ip: IpAddr,
    pub subnet_end_ip: IpAddr,
    pub provision_start_ip: IpAddr,
    pub provision_end_ip: IpAddr,
    pub gateway: Option<IpAddr>,
    pub resolvers: Vec<IpAddr>,
    pub routes: BTreeMap<String, IpAddr>,
    pub mtu: u32,
    pub owner_uuids: Option<Vec<OwnerId>>,
    pub description: Option<String>,
    pub fabric: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkParams {
    pub uuid: Option<NetworkId>,
    pub name: String,
    pub nic_tag: String,
    pub vlan_id: u16,
    pub subnet: String,
    pub provision_start_ip: String,
    pub provision_end_ip: String,
    pub gateway: Option<String>,
    pub resolvers: Vec<String>,
    pub routes: BTreeMap<String, String>,
    pub mtu: u32,
    pub owner_uuids: Option<Vec<OwnerId>>,
    pub description: Option<String>,
    pub fabric: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// A route destination must be either a bare host address or a CIDR block.
fn valid_route_destination(dst: &str) -> bool {
    dst.parse::<IpAddr>().is_ok() || dst.parse::<IpNetwork>().is_ok()
}

impl Entity for Network {
    type Params = NetworkParams;

    fn validate(params: NetworkParams) -> Result<Self, crate::validation::ValidationError> {
        let mut v = Validator::new();

        if params.name.is_empty() {
            v.push(FieldError::missing("name"));
        }
        if params.nic_tag.is_empty() {
            v.push(FieldError::missing("nic_tag"));
        }

        if !(params.vlan_id == 0 || (2..=4094).contains(&params.vlan_id)) {
            v.push(FieldError::invalid(
                "vlan_id",
                "must be 0 or in 2..4094",
            ));
        }

        let net: Option<IpNetwork> = match params.subnet.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                v.push(FieldError::invalid("subnet", "not a valid CIDR"));
                None
            }
        };

        let family = net.as_ref().map(|n| n.network().address_family());
        if let Some(family) = family
            && !subnet::valid_prefix_bits(net.as_ref().unwrap().prefix(), family)
        {
            v.push(FieldError::invalid(
                "subnet",
                "prefix length out of range for family",
            ));
        }

        let gateway: Option<IpAddr> = match params.gateway.as_deref() {
            None => None,
            Some(raw) => match codec::parse(raw) {
                Ok(addr) => Some(addr),
                Err(_) => {
                    v.push(FieldError::invalid("gateway", "not a valid address"));
                    None
                }
            },
        };

        if let (Some(net), Some(gw)) = (&net, gateway)
            && !net.contains(gw)
        {
            v.push(FieldError::invalid("gateway", "must lie inside the subnet"));
        }

        if params.resolvers.len() > MAX_RESOLVERS {
            v.push(FieldError::invalid(
                "resolvers",
                format!("at most {MAX_RESOLVERS} resolvers allowed"),
            ));
        }
        let mut resolvers = Vec::with_capacity(params.resolvers.len());
        for raw in &params.resolvers {
            match codec::parse(raw) {
                Ok(addr) => {
                    if let Some(family) = family
                        && addr.address_family() != family
                    {
                        v.push(FieldError::invalid(
                            "resolvers",
                            format!("{raw} is not in the network's address family"),
                        ));
                    }
                    resolvers.push(addr);
                }
                Err(_) => v.push(FieldError::invalid(
                    "resolvers",
                    format!("{raw} is not a valid address"),
                )),
            }
        }

        let mut routes = BTreeMap::new();
        for (dst, gw) in &params.routes {
            if !valid_route_destination(dst) {
                v.push(FieldError::invalid(
                    "routes",
                    format!("{dst} is not a host or CIDR"),
                ));
                continue;
            }
            match codec::parse(gw) {
                Ok(addr) => {
                    routes.insert(dst.clone(), addr);
                }
                Err(_) => v.push(FieldError::invalid(
                    "routes",
                    format!("{gw} is not a valid gateway address"),
                )),
            }
        }

        let provision_start = codec::parse(&params.provision_start_ip).ok();
        let provision_end = codec::parse(&params.provision_end_ip).ok();
        if provision_start.is_none() {
            v.push(FieldError::invalid(
                "provision_start_ip",
                "not a valid address",
            ));
        }
        if provision_end.is_none() {
            v.push(FieldError::invalid(
                "provision_end_ip",
                "not a valid address",
            ));
        }

        if let (Some(net), Some(start), Some(end)) = (&net, provision_start, provision_end)
            && let Err(e) = subnet::range_strictly_inside(net, start, end)
        {
            v.push(FieldError::invalid("provision_start_ip", e.to_string()));
        }

        if params.owner_uuids.as_ref().is_some_and(|o| o.is_empty()) {
            v.push(FieldError::invalid(
                "owner_uuids",
                "must be non-empty when present",
            ));
        }

        let (Some(net), Some(family), Some(provision_start), Some(provision_end)) =
            (net, family, provision_start, provision_end)
        else {
            return v.finish(unreachable_network());
        };

        let (subnet_start_ip, subnet_end_ip) = subnet::subnet_bounds(&net);
        let now = params.created_at.unwrap_or_else(|| params.modified_at.unwrap_or_default());

        v.finish(Network {
            uuid: params.uuid.unwrap_or_default(),
            name: params.name,
            nic_tag: params.nic_tag,
            vlan_id: params.vlan_id,
            family,
            subnet: net,
            subnet_start_ip,
            subnet_end_ip,
            provision_start_ip: provision_start,
            provision_end_ip: provision_end,
            gateway,
            resolvers,
            routes,
            mtu: params.mtu,
            owner_uuids: params.owner_uuids,
            description: params.description,
            fabric: params.fabric,
            created_at: now,
            modified_at: params.modified_at.unwrap_or(now),
        })
    }

    fn bucket() -> BucketSpec {
        BucketSpec {
            name: "napi_networks".to_string(),
            schema: BucketSchema {
                version: 2,
                indexed: &[
                    IndexedField::new("uuid", "/uuid", IndexedFieldType::Uuid),
                    IndexedField::new("name", "/name", IndexedFieldType::Text),
                    IndexedField::new("nic_tag", "/nic_tag", IndexedFieldType::Text),
                    IndexedField::new("vlan_id", "/vlan_id", IndexedFieldType::Integer),
                    IndexedField::new("family", "/family", IndexedFieldType::Text),
                ],
            },
        }
    }

    fn serialize(&self) -> Value {
        serde_json::to_value(self).expect("Network always serializes")
    }

    fn deserialize(raw: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw)
    }
}

/// Placeholder constructed only on the invalid-params path, where `finish`
/// will discard it because `v` already carries errors. Avoids an `Option`
/// threaded through every field above just to satisfy the always-taken
/// success path's types.
fn unreachable_network() -> Network {
    Network {
        uuid: NetworkId::default(),
        name: String::new(),
        nic_tag: String::new(),
        vlan_id: 0,
        family: AddressFamily::Ipv4,
        subnet: "0.0.0.0/32".parse().unwrap(),
        subnet_start_ip: "0.0.0.0".parse().unwrap(),
        subnet_end_ip: "0.0.0.0".parse().unwrap(),
        provision_start_ip: "0.0.0.0".parse().unwrap(),
        provision_end_ip: "0.0.0.0".parse().unwrap(),
        gateway: None,
        resolvers: Vec::new(),
        routes: BTreeMap::new(),
        mtu: 0,
        owner_uuids: None,
        description: None,
        fabric: false,
        created_at: DateTime::<Utc>::default(),
        modified_at: DateTime::<Utc>::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params() -> NetworkParams {
        NetworkParams {
            uuid: None,
            name: "external".to_string(),
            nic_tag: "external".to_string(),
            vlan_id: 0,
            subnet: "10.0.1.0/28".to_string(),
            provision_start_ip: "10.0.1.1".to_string(),
            provision_end_ip: "10.0.1.10".to_string(),
            gateway: Some("10.0.1.1".to_string()),
            resolvers: vec!["8.8.8.8".to_string()],
            routes: BTreeMap::new(),
            mtu: 1500,
            owner_uuids: None,
            description: None,
            fabric: false,
            created_at: None,
            modified_at: None,
        }
    }

    #[test]
    fn accepts_well_formed_network() {
        let net = Network::validate(base_params()).unwrap();
        assert_eq!(net.subnet_start_ip.to_string(), "10.0.1.0");
        assert_eq!(net.subnet_end_ip.to_string(), "10.0.1.15");
    }

    #[test]
    fn rejects_gateway_outside_subnet() {
        let mut p = base_params();
        p.gateway = Some("192.168.0.1".to_string());
        assert!(Network::validate(p).is_err());
    }

    #[test]
    fn rejects_provision_range_touching_broadcast() {
        let mut p = base_params();
        p.provision_end_ip = "10.0.1.15".to_string();
        assert!(Network::validate(p).is_err());
    }

    #[test]
    fn rejects_bad_vlan_id() {
        let mut p = base_params();
        p.vlan_id = 1;
        assert!(Network::validate(p).is_err());
    }

    #[test]
    fn rejects_route_with_bad_destination() {
        let mut p = base_params();
        p.routes.insert("not-a-route".to_string(), "10.0.1.1".to_string());
        assert!(Network::validate(p).is_err());
    }

    #[test]
    fn collects_multiple_errors_at_once() {
        let mut p = base_params();
        p.name = String::new();
        p.vlan_id = 1;
        let err = Network::validate(p).unwrap_err();
        assert!(err.errors.len() >= 2);
    }
}
