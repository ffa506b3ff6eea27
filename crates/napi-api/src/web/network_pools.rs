//! `/network_pools`, `/network_pools/:uuid`, `/network_pools/:uuid/nics`
//! (§6).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use napi_core::NapiError;
use napi_core::network_pools::PoolRequest;
use napi_core::nic_state_machine::CreateNicRequest;
use napi_core::pool_dispatcher::PoolHint;
use napi_core::search::OwnerScope;
use napi_model::{NetworkPool, NicState};
use napi_types::{BelongsToId, NetworkId, NetworkPoolId, OwnerId};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::ApiState;
use crate::web::support::{Page, parse_mac};

#[derive(Debug, Deserialize)]
pub struct PoolBody {
    pub name: String,
    pub description: Option<String>,
    pub networks: Vec<NetworkId>,
    pub owner_uuids: Option<Vec<OwnerId>>,
}

impl PoolBody {
    fn into_request(self) -> PoolRequest {
        PoolRequest {
            name: self.name,
            description: self.description,
            network_uuids: self.networks,
            owner_uuids: self.owner_uuids,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(flatten)]
    pub page: Page,
    pub name: Option<String>,
    pub provisionable_by: Option<OwnerId>,
}

pub async fn list(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Vec<NetworkPool>>> {
    let mut clauses = Vec::new();
    if let Some(name) = &q.name {
        clauses.push(napi_store::Filter::eq("name", name));
    }
    let filter = napi_store::Filter::And(clauses);
    let scope = q.provisionable_by.map(|caller| OwnerScope { caller, admin: state.admin_uuid });
    let pools = napi_core::search::list_pools(&state.store, &filter, scope, q.page.limit, q.page.offset).await?;
    Ok(Json(pools))
}

pub async fn create(State(state): State<Arc<ApiState>>, Json(body): Json<PoolBody>) -> ApiResult<Json<NetworkPool>> {
    let pool = napi_core::network_pools::create_pool(&state.store, body.into_request(), state.admin_uuid).await?;
    Ok(Json(pool))
}

pub async fn get(State(state): State<Arc<ApiState>>, Path(uuid): Path<NetworkPoolId>) -> ApiResult<Json<NetworkPool>> {
    let loaded = napi_core::repo::get::<NetworkPool>(&state.store, "network_pool", &uuid.to_string()).await?;
    Ok(Json(loaded.entity))
}

pub async fn update(
    State(state): State<Arc<ApiState>>,
    Path(uuid): Path<NetworkPoolId>,
    Json(body): Json<PoolBody>,
) -> ApiResult<Json<NetworkPool>> {
    let pool = napi_core::network_pools::update_pool(&state.store, uuid, body.into_request(), state.admin_uuid).await?;
    Ok(Json(pool))
}

pub async fn delete(State(state): State<Arc<ApiState>>, Path(uuid): Path<NetworkPoolId>) -> ApiResult<StatusCode> {
    napi_core::network_pools::delete_pool(&state.store, uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn default_nic_state() -> NicState {
    NicState::Provisioning
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ProvisionViaPoolBody {
    pub mac: String,
    pub owner_uuid: OwnerId,
    pub belongs_to_type: String,
    pub belongs_to_uuid: BelongsToId,
    #[serde(default)]
    pub primary: bool,
    #[serde(default = "default_nic_state")]
    pub state: NicState,
    pub nic_tag: Option<String>,
    #[serde(default)]
    pub nic_tags_available: Vec<String>,
    pub vlan_id: Option<u16>,
    pub mtu: Option<u32>,
    pub cn_uuid: Option<String>,
    #[serde(default = "default_true")]
    pub check_owner: bool,
}

/// `POST /network_pools/:uuid/nics`: dispatches across the pool's member
/// networks (§4.F) and persists the resulting nic in the network the
/// dispatcher picked. A concrete ip is never accepted here (§4.F:
/// "a concrete ip cannot be requested against a pool").
pub async fn provision_nic(
    State(state): State<Arc<ApiState>>,
    Path(uuid): Path<NetworkPoolId>,
    Json(body): Json<ProvisionViaPoolBody>,
) -> ApiResult<Json<napi_model::Nic>> {
    let mac = parse_mac(&body.mac).ok_or_else(|| NapiError::single_field("mac", "not a valid mac address"))?;
    let pool = napi_core::repo::get::<NetworkPool>(&state.store, "network_pool", &uuid.to_string())
        .await?
        .entity;

    let hint = PoolHint {
        nic_tag: body.nic_tag,
        nic_tags_available: body.nic_tags_available,
    };
    let claim = napi_core::allocator::ClaimRequest {
        belongs_to_type: body.belongs_to_type.clone(),
        belongs_to_uuid: body.belongs_to_uuid,
        owner_uuid: body.owner_uuid,
        reserved: false,
    };
    let (network, record) = napi_core::pool_dispatcher::provision(
        &state.store,
        &pool,
        &hint,
        claim,
        body.owner_uuid,
        state.admin_uuid,
        body.check_owner,
    )
    .await?;

    let req = CreateNicRequest {
        mac,
        owner_uuid: body.owner_uuid,
        belongs_to_type: body.belongs_to_type,
        belongs_to_uuid: body.belongs_to_uuid,
        primary: body.primary,
        state: body.state,
        network_uuid: Some(network.uuid),
        requested_ip: Some(record.ip),
        vlan_id: body.vlan_id,
        mtu: body.mtu,
        cn_uuid: body.cn_uuid,
    };
    let nic = napi_core::nic_state_machine::create_nic_from_pool_allocation(&state.store, req, &network, &record).await?;
    Ok(Json(nic))
}
