use napi_types::NicTagId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::{BucketSchema, BucketSpec, Entity, IndexedField, IndexedFieldType};
use crate::validation::{FieldError, Validator};

const NAME_MAX_LEN: usize = 31;

fn valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicTag {
    pub uuid: NicTagId,
    pub name: String,
    pub mtu: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct NicTagParams {
    pub uuid: Option<NicTagId>,
    pub name: String,
    pub mtu: Option<u32>,
}

impl Entity for NicTag {
    type Params = NicTagParams;

    fn validate(params: NicTagParams) -> Result<Self, crate::validation::ValidationError> {
        let mut v = Validator::new();

        if params.name.is_empty() {
            v.push(FieldError::missing("name"));
        } else {
            if params.name.len() > NAME_MAX_LEN {
                v.push(FieldError::invalid(
                    "name",
                    format!("must be at most {NAME_MAX_LEN} characters"),
                ));
            }
            if !params.name.chars().all(valid_name_char) {
                v.push(FieldError::invalid(
                    "name",
                    "must match [A-Za-z0-9_]",
                ));
            }
        }

        if let Some(mtu) = params.mtu
            && mtu == 0
        {
            v.push(FieldError::invalid("mtu", "must be greater than zero"));
        }

        v.finish(NicTag {
            uuid: params.uuid.unwrap_or_default(),
            name: params.name,
            mtu: params.mtu,
        })
    }

    fn bucket() -> BucketSpec {
        BucketSpec {
            name: "napi_nic_tags".to_string(),
            schema: BucketSchema {
                version: 1,
                indexed: &[IndexedField::new("name", "/name", IndexedFieldType::Text)],
            },
        }
    }

    fn serialize(&self) -> Value {
        serde_json::to_value(self).expect("NicTag always serializes")
    }

    fn deserialize(raw: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(name: &str) -> NicTagParams {
        NicTagParams {
            uuid: None,
            name: name.to_string(),
            mtu: None,
        }
    }

    #[test]
    fn accepts_valid_name() {
        assert!(NicTag::validate(params("external")).is_ok());
    }

    #[test]
    fn rejects_name_too_long() {
        let long = "a".repeat(32);
        assert!(NicTag::validate(params(&long)).is_err());
    }

    #[test]
    fn rejects_name_with_bad_chars() {
        assert!(NicTag::validate(params("bad-name")).is_err());
    }

    #[test]
    fn rejects_zero_mtu() {
        let mut p = params("external");
        p.mtu = Some(0);
        assert!(NicTag::validate(p).is_err());
    }
}
