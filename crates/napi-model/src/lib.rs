//! Domain models: validation, serialization, and bucket naming for every
//! entity in the network control plane. Referential checks that need
//! another bucket's data (does this nic tag exist, are these networks'
//! families consistent) are left to the orchestrators in `napi-core`;
//! everything here is pure and storage-independent.

pub mod address_selection_strategy;
pub mod aggregation;
pub mod entity;
pub mod ip_record;
pub mod network;
pub mod network_pool;
pub mod nic;
pub mod nic_tag;
pub mod validation;

pub use address_selection_strategy::AddressSelectionStrategy;
pub use aggregation::{Aggregation, AggregationId, AggregationParams, LacpMode};
pub use entity::{BucketSchema, BucketSpec, Entity, IndexedField, IndexedFieldType, Operation};
pub use ip_record::{IpRecord, IpRecordUpdate};
pub use network::{Network, NetworkParams};
pub use network_pool::{MemberNetwork, NetworkPool, NetworkPoolParams};
pub use nic::{Nic, NicParams, NicState};
pub use nic_tag::{NicTag, NicTagParams};
pub use validation::{FieldError, FieldErrorCode, ValidationError, Validator};
