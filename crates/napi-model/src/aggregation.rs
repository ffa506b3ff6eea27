use std::collections::BTreeSet;
use std::fmt;

use mac_address::MacAddress;
use napi_types::BelongsToId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{BucketSchema, BucketSpec, Entity, IndexedField, IndexedFieldType};
use crate::validation::{FieldError, Validator};

const MIN_MACS: usize = 2;
const MAX_MACS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LacpMode {
    Off,
    Active,
    Passive,
}

/// An aggregation's id is not a stored field but derived from
/// `belongs_to_uuid` and `name`, per §3.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct AggregationId {
    pub belongs_to_uuid: BelongsToId,
    pub name: String,
}

impl fmt::Display for AggregationId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.belongs_to_uuid, self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregation {
    pub belongs_to_uuid: BelongsToId,
    pub name: String,
    pub macs: Vec<MacAddress>,
    pub lacp_mode: LacpMode,
    pub nic_tags_provided: Option<Vec<String>>,
}

impl Aggregation {
    pub fn id(&self) -> AggregationId {
        AggregationId {
            belongs_to_uuid: self.belongs_to_uuid,
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregationParams {
    pub belongs_to_uuid: BelongsToId,
    pub name: String,
    pub macs: Vec<MacAddress>,
    pub lacp_mode: LacpMode,
    pub nic_tags_provided: Option<Vec<String>>,
}

impl Entity for Aggregation {
    type Params = AggregationParams;

    fn validate(params: AggregationParams) -> Result<Self, crate::validation::ValidationError> {
        let mut v = Validator::new();

        if params.name.is_empty() {
            v.push(FieldError::missing("name"));
        }

        if params.macs.len() < MIN_MACS {
            v.push(FieldError::invalid(
                "macs",
                format!("must contain at least {MIN_MACS} macs"),
            ));
        }
        if params.macs.len() > MAX_MACS {
            v.push(FieldError::invalid(
                "macs",
                format!("must contain at most {MAX_MACS} macs"),
            ));
        }

        let mut seen = BTreeSet::new();
        for mac in &params.macs {
            if !seen.insert(mac.bytes()) {
                v.push(FieldError::duplicate(
                    "macs",
                    format!("{mac} appears more than once"),
                ));
            }
        }

        v.finish(Aggregation {
            belongs_to_uuid: params.belongs_to_uuid,
            name: params.name,
            macs: params.macs,
            lacp_mode: params.lacp_mode,
            nic_tags_provided: params.nic_tags_provided,
        })
    }

    fn bucket() -> BucketSpec {
        BucketSpec {
            name: "napi_aggregations".to_string(),
            schema: BucketSchema {
                version: 1,
                indexed: &[
                    IndexedField::new(
                        "belongs_to_uuid",
                        "/belongs_to_uuid",
                        IndexedFieldType::Uuid,
                    ),
                    IndexedField::new("name", "/name", IndexedFieldType::Text),
                ],
            },
        }
    }

    fn serialize(&self) -> Value {
        serde_json::to_value(self).expect("Aggregation always serializes")
    }

    fn deserialize(raw: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(n: u8) -> MacAddress {
        MacAddress::new([0, 0, 0, 0, 0, n])
    }

    fn base_params() -> AggregationParams {
        AggregationParams {
            belongs_to_uuid: BelongsToId::new(),
            name: "aggr0".to_string(),
            macs: vec![mac(1), mac(2)],
            lacp_mode: LacpMode::Active,
            nic_tags_provided: None,
        }
    }

    #[test]
    fn accepts_two_macs() {
        assert!(Aggregation::validate(base_params()).is_ok());
    }

    #[test]
    fn rejects_single_mac() {
        let mut p = base_params();
        p.macs = vec![mac(1)];
        assert!(Aggregation::validate(p).is_err());
    }

    #[test]
    fn rejects_duplicate_mac() {
        let mut p = base_params();
        p.macs = vec![mac(1), mac(1)];
        assert!(Aggregation::validate(p).is_err());
    }

    #[test]
    fn id_combines_owner_and_name() {
        let aggr = Aggregation::validate(base_params()).unwrap();
        assert!(aggr.id().to_string().contains(":aggr0"));
    }
}
