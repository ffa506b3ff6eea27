use napi_store::Store;
use napi_types::OwnerId;

use crate::cfg::Config;

/// Shared axum state, mirroring `Arc<Api>` in the teacher: the store handle
/// plus the bits of config every handler needs (the admin uuid for
/// owner-predicate checks, the default mtu for nic-tag-less networks).
pub struct ApiState {
    pub store: Store,
    pub admin_uuid: OwnerId,
    pub mtu_default: u32,
}

impl ApiState {
    pub fn new(store: Store, config: &Config) -> Self {
        Self {
            store,
            admin_uuid: config.admin_uuid,
            mtu_default: config.mtu_default,
        }
    }
}
