use std::net::IpAddr;

use chrono::{DateTime, Utc};
use mac_address::MacAddress;
use napi_types::{BelongsToId, NetworkId, OwnerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{BucketSchema, BucketSpec, Entity, IndexedField, IndexedFieldType};
use crate::validation::{FieldError, Validator};

/// The persisted state of a nic. `new` and `deleted` from §4.E's state
/// diagram are transitions, not stored states: a nic record comes into
/// existence already `Provisioning` and is removed from its bucket on
/// delete rather than tombstoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NicState {
    Provisioning,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nic {
    pub mac: MacAddress,
    pub owner_uuid: OwnerId,
    pub belongs_to_type: String,
    pub belongs_to_uuid: BelongsToId,
    pub primary: bool,
    pub state: NicState,
    pub nic_tag: Option<String>,
    pub network_uuid: Option<NetworkId>,
    pub ip: Option<IpAddr>,
    pub vlan_id: Option<u16>,
    pub mtu: Option<u32>,
    pub cn_uuid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NicParams {
    pub mac: Option<MacAddress>,
    pub owner_uuid: OwnerId,
    pub belongs_to_type: String,
    pub belongs_to_uuid: BelongsToId,
    pub primary: bool,
    pub state: NicState,
    pub nic_tag: Option<String>,
    pub network_uuid: Option<NetworkId>,
    pub ip: Option<IpAddr>,
    pub vlan_id: Option<u16>,
    pub mtu: Option<u32>,
    pub cn_uuid: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl Entity for Nic {
    type Params = NicParams;

    fn validate(params: NicParams) -> Result<Self, crate::validation::ValidationError> {
        let mut v = Validator::new();

        let mac = v.require("mac", params.mac);

        if params.belongs_to_type.is_empty() {
            v.push(FieldError::missing("belongs_to_type"));
        }

        if params.ip.is_some() && params.network_uuid.is_none() {
            v.push(FieldError::invalid(
                "network_uuid",
                "required when ip is given",
            ));
        }

        if let Some(vlan) = params.vlan_id
            && !(vlan == 0 || (2..=4094).contains(&vlan))
        {
            v.push(FieldError::invalid("vlan_id", "must be 0 or in 2..4094"));
        }

        let now = params
            .created_at
            .unwrap_or_else(|| params.modified_at.unwrap_or_default());

        let Some(mac) = mac else {
            return v.finish(placeholder_nic(params, now));
        };

        v.finish(Nic {
            mac,
            owner_uuid: params.owner_uuid,
            belongs_to_type: params.belongs_to_type,
            belongs_to_uuid: params.belongs_to_uuid,
            primary: params.primary,
            state: params.state,
            nic_tag: params.nic_tag,
            network_uuid: params.network_uuid,
            ip: params.ip,
            vlan_id: params.vlan_id,
            mtu: params.mtu,
            cn_uuid: params.cn_uuid,
            created_at: now,
            modified_at: params.modified_at.unwrap_or(now),
        })
    }

    fn bucket() -> BucketSpec {
        BucketSpec {
            name: "napi_nics".to_string(),
            schema: BucketSchema {
                version: 1,
                indexed: &[
                    IndexedField::new("mac", "/mac", IndexedFieldType::Text),
                    IndexedField::new("owner_uuid", "/owner_uuid", IndexedFieldType::Uuid),
                    IndexedField::new(
                        "belongs_to_uuid",
                        "/belongs_to_uuid",
                        IndexedFieldType::Uuid,
                    ),
                    IndexedField::new("network_uuid", "/network_uuid", IndexedFieldType::Uuid),
                    IndexedField::new("nic_tag", "/nic_tag", IndexedFieldType::Text),
                ],
            },
        }
    }

    fn serialize(&self) -> Value {
        serde_json::to_value(self).expect("Nic always serializes")
    }

    fn deserialize(raw: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw)
    }
}

fn placeholder_nic(params: NicParams, now: DateTime<Utc>) -> Nic {
    Nic {
        mac: MacAddress::new([0; 6]),
        owner_uuid: params.owner_uuid,
        belongs_to_type: params.belongs_to_type,
        belongs_to_uuid: params.belongs_to_uuid,
        primary: params.primary,
        state: params.state,
        nic_tag: params.nic_tag,
        network_uuid: params.network_uuid,
        ip: params.ip,
        vlan_id: params.vlan_id,
        mtu: params.mtu,
        cn_uuid: params.cn_uuid,
        created_at: now,
        modified_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_params() -> NicParams {
        NicParams {
            mac: Some(MacAddress::new([0x00, 0x01, 0x02, 0x03, 0x04, 0x05])),
            owner_uuid: OwnerId::new(),
            belongs_to_type: "zone".to_string(),
            belongs_to_uuid: BelongsToId::new(),
            primary: false,
            state: NicState::Provisioning,
            nic_tag: None,
            network_uuid: None,
            ip: None,
            vlan_id: None,
            mtu: None,
            cn_uuid: None,
            created_at: None,
            modified_at: None,
        }
    }

    #[test]
    fn accepts_unbound_nic() {
        assert!(Nic::validate(base_params()).is_ok());
    }

    #[test]
    fn requires_network_uuid_with_ip() {
        let mut p = base_params();
        p.ip = Some("10.0.1.5".parse().unwrap());
        assert!(Nic::validate(p).is_err());
    }

    #[test]
    fn accepts_bound_nic() {
        let mut p = base_params();
        p.ip = Some("10.0.1.5".parse().unwrap());
        p.network_uuid = Some(NetworkId::new());
        assert!(Nic::validate(p).is_ok());
    }

    #[test]
    fn rejects_missing_mac() {
        let mut p = base_params();
        p.mac = None;
        assert!(Nic::validate(p).is_err());
    }
}
