use serde_json::Value;

use crate::validation::ValidationError;

/// A single indexed field declared by a bucket's schema. `napi-store` uses
/// this to build the generated column backing an index, per §4.B's
/// `createBucket(name, schema)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexedFieldType {
    Text,
    Uuid,
    Bool,
    Integer,
    Numeric,
}

#[derive(Debug, Clone)]
pub struct IndexedField {
    pub name: &'static str,
    pub json_pointer: &'static str,
    pub ty: IndexedFieldType,
}

impl IndexedField {
    pub const fn new(name: &'static str, json_pointer: &'static str, ty: IndexedFieldType) -> Self {
        Self {
            name,
            json_pointer,
            ty,
        }
    }
}

/// A bucket's name plus the schema version and indexed fields it declares,
/// per §4.B/§6's "persisted buckets" list.
#[derive(Debug, Clone)]
pub struct BucketSchema {
    pub version: i32,
    pub indexed: &'static [IndexedField],
}

#[derive(Debug, Clone)]
pub struct BucketSpec {
    pub name: String,
    pub schema: BucketSchema,
}

/// The capability set every entity exposes, per §4.C and §9's
/// "polymorphism" design note: entities are tagged variants over
/// `{validate, bucket, serialize}`, never a class hierarchy.
pub trait Entity: Sized {
    /// Parameters accepted by create/update calls for this entity, before
    /// normalization.
    type Params;

    /// Local, storage-independent validation. Referential checks (does the
    /// nic tag exist, is the pool family consistent with a member network)
    /// are left to the orchestrators in `napi-core`, which can read other
    /// buckets.
    fn validate(params: Self::Params) -> Result<Self, ValidationError>;

    fn bucket() -> BucketSpec;

    fn serialize(&self) -> Value;

    fn deserialize(raw: Value) -> Result<Self, serde_json::Error>;
}

/// The operation an entity is being validated for, since some checks
/// (e.g. immutable `family` on a network pool) only apply on update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
}
