use std::net::IpAddr;

use chrono::{DateTime, Utc};
use napi_types::{BelongsToId, NetworkId, OwnerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{BucketSchema, IndexedField, IndexedFieldType};
use crate::validation::{FieldError, Validator};

/// The per-address bookkeeping entry in a network's IP bucket. All three
/// shapes named in §3 — assigned, reserved-but-unbound, and placeholder —
/// are this one struct with the irrelevant fields left `None`; `free()`
/// derives the "is this address in use" predicate from `belongs_to_uuid`
/// rather than a separate flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpRecord {
    pub ip: IpAddr,
    pub reserved: bool,
    pub belongs_to_type: Option<String>,
    pub belongs_to_uuid: Option<BelongsToId>,
    pub owner_uuid: Option<OwnerId>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl IpRecord {
    pub fn placeholder(ip: IpAddr) -> Self {
        Self {
            ip,
            reserved: false,
            belongs_to_type: None,
            belongs_to_uuid: None,
            owner_uuid: None,
            modified_at: None,
        }
    }

    /// An address is free iff it has no owning nic, per §3.
    pub fn free(&self) -> bool {
        self.belongs_to_uuid.is_none()
    }

    /// Clears assignment while retaining `owner_uuid` and `reserved`,
    /// implementing `unassign` from §4.D.
    pub fn unassign(&mut self, modified_at: DateTime<Utc>) {
        self.belongs_to_type = None;
        self.belongs_to_uuid = None;
        self.modified_at = Some(modified_at);
    }

    /// Clears everything except `ip`, implementing `free:true` from §4.D.
    pub fn wipe(&mut self, modified_at: DateTime<Utc>) {
        self.reserved = false;
        self.belongs_to_type = None;
        self.belongs_to_uuid = None;
        self.owner_uuid = None;
        self.modified_at = Some(modified_at);
    }

    /// Serializes to the stored JSON shape, plus an `addr_num` field not
    /// present on the struct itself: the decimal numeric form of `ip`,
    /// carried only so `napi-store` can declare it as an indexed numeric
    /// column and drive the gap-scan fast path (§4.D step 2) without the
    /// store layer needing any address-family-aware SQL of its own.
    pub fn serialize(&self) -> Value {
        let mut value = serde_json::to_value(self).expect("IpRecord always serializes");
        if let Value::Object(ref mut map) = value {
            map.insert(
                "addr_num".to_string(),
                Value::String(napi_net::codec::to_numeric(self.ip).to_string()),
            );
        }
        value
    }

    pub fn deserialize(raw: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw)
    }

    /// The bucket name for a network's IP records is parameterized on the
    /// network's uuid (§6's `napi_ips_<network-uuid-with-underscores>`),
    /// unlike every other entity's fixed bucket name — so this lives as a
    /// free function rather than a static `Entity::bucket()`.
    pub fn bucket_name(network: NetworkId) -> String {
        format!("napi_ips_{}", network.to_string().replace('-', "_"))
    }

    pub fn bucket_schema() -> BucketSchema {
        BucketSchema {
            version: 2,
            indexed: &[
                IndexedField::new("reserved", "/reserved", IndexedFieldType::Bool),
                IndexedField::new(
                    "belongs_to_uuid",
                    "/belongs_to_uuid",
                    IndexedFieldType::Uuid,
                ),
                IndexedField::new("modified_at", "/modified_at", IndexedFieldType::Text),
                IndexedField::new("addr_num", "/addr_num", IndexedFieldType::Numeric),
            ],
        }
    }
}

/// Parameters accepted by `PUT /networks/:uuid/ips/:ip`, validated before
/// being applied to an existing or placeholder [`IpRecord`].
#[derive(Debug, Clone, Default)]
pub struct IpRecordUpdate {
    pub reserved: Option<bool>,
    pub belongs_to_type: Option<String>,
    pub belongs_to_uuid: Option<BelongsToId>,
    pub owner_uuid: Option<OwnerId>,
    pub unassign: bool,
    pub free: bool,
}

impl IpRecordUpdate {
    pub fn validate(self) -> Result<Self, crate::validation::ValidationError> {
        let mut v = Validator::new();

        if self.belongs_to_uuid.is_some() && self.belongs_to_type.is_none() {
            v.push(FieldError::missing("belongs_to_type"));
        }
        if self.belongs_to_uuid.is_some() && self.owner_uuid.is_none() {
            v.push(FieldError::missing("owner_uuid"));
        }
        if self.free && self.unassign {
            v.push(FieldError::invalid(
                "free",
                "free and unassign are mutually exclusive",
            ));
        }
        if self.free && self.belongs_to_uuid.is_some() {
            v.push(FieldError::invalid(
                "free",
                "free cannot be combined with a new assignment",
            ));
        }

        v.finish(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_free() {
        let rec = IpRecord::placeholder("10.0.1.5".parse().unwrap());
        assert!(rec.free());
    }

    #[test]
    fn unassign_retains_owner_and_reservation() {
        let mut rec = IpRecord {
            ip: "10.0.1.5".parse().unwrap(),
            reserved: true,
            belongs_to_type: Some("zone".to_string()),
            belongs_to_uuid: Some(BelongsToId::new()),
            owner_uuid: Some(OwnerId::new()),
            modified_at: None,
        };
        let owner = rec.owner_uuid;
        rec.unassign(Utc::now());
        assert!(rec.free());
        assert!(rec.reserved);
        assert_eq!(rec.owner_uuid, owner);
    }

    #[test]
    fn wipe_clears_everything_but_ip() {
        let mut rec = IpRecord {
            ip: "10.0.1.5".parse().unwrap(),
            reserved: true,
            belongs_to_type: Some("zone".to_string()),
            belongs_to_uuid: Some(BelongsToId::new()),
            owner_uuid: Some(OwnerId::new()),
            modified_at: None,
        };
        rec.wipe(Utc::now());
        assert!(rec.free());
        assert!(!rec.reserved);
        assert!(rec.owner_uuid.is_none());
    }

    #[test]
    fn update_requires_owner_with_assignment() {
        let update = IpRecordUpdate {
            belongs_to_type: Some("zone".to_string()),
            belongs_to_uuid: Some(BelongsToId::new()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn bucket_name_strips_hyphens() {
        let id = NetworkId::new();
        let name = IpRecord::bucket_name(id);
        assert!(!name.contains('-'));
        assert!(name.starts_with("napi_ips_"));
    }

    #[test]
    fn serialize_adds_numeric_address() {
        let rec = IpRecord::placeholder("10.0.1.5".parse().unwrap());
        let value = rec.serialize();
        assert_eq!(value["addr_num"], serde_json::json!("167772421"));
    }
}
