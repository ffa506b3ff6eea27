//! `/networks`, `/networks/:uuid`, and `/networks/:uuid/nics` (§6).

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use napi_core::NapiError;
use napi_core::nic_state_machine::CreateNicRequest;
use napi_core::search::OwnerScope;
use napi_model::{Network, NetworkParams, NicState};
use napi_types::{NetworkId, OwnerId};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::ApiState;
use crate::web::support::{Page, parse_mac};

#[derive(Debug, Deserialize)]
pub struct NetworkBody {
    pub name: String,
    pub nic_tag: String,
    pub vlan_id: u16,
    pub subnet: String,
    pub provision_start_ip: String,
    pub provision_end_ip: String,
    pub gateway: Option<String>,
    #[serde(default)]
    pub resolvers: Vec<String>,
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
    pub mtu: u32,
    pub owner_uuids: Option<Vec<OwnerId>>,
    pub description: Option<String>,
    #[serde(default)]
    pub fabric: bool,
}

impl From<NetworkBody> for NetworkParams {
    fn from(b: NetworkBody) -> Self {
        NetworkParams {
            uuid: None,
            name: b.name,
            nic_tag: b.nic_tag,
            vlan_id: b.vlan_id,
            subnet: b.subnet,
            provision_start_ip: b.provision_start_ip,
            provision_end_ip: b.provision_end_ip,
            gateway: b.gateway,
            resolvers: b.resolvers,
            routes: b.routes,
            mtu: b.mtu,
            owner_uuids: b.owner_uuids,
            description: b.description,
            fabric: b.fabric,
            created_at: None,
            modified_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(flatten)]
    pub page: Page,
    pub name: Option<String>,
    pub nic_tag: Option<String>,
    pub provisionable_by: Option<OwnerId>,
}

pub async fn list(State(state): State<Arc<ApiState>>, Query(q): Query<ListQuery>) -> ApiResult<Json<Vec<Network>>> {
    let mut clauses = Vec::new();
    if let Some(name) = &q.name {
        clauses.push(napi_store::Filter::eq("name", name));
    }
    if let Some(tag) = &q.nic_tag {
        clauses.push(napi_store::Filter::eq("nic_tag", tag));
    }
    let filter = napi_store::Filter::And(clauses);
    let scope = q.provisionable_by.map(|caller| OwnerScope { caller, admin: state.admin_uuid });
    let networks = napi_core::search::list_networks(&state.store, &filter, scope, q.page.limit, q.page.offset).await?;
    Ok(Json(networks))
}

pub async fn create(State(state): State<Arc<ApiState>>, Json(body): Json<NetworkBody>) -> ApiResult<Json<Network>> {
    let network = napi_core::networks::create_network(&state.store, body.into()).await?;
    Ok(Json(network))
}

#[derive(Debug, Deserialize)]
pub struct GetQuery {
    pub provisionable_by: Option<OwnerId>,
}

pub async fn get(
    State(state): State<Arc<ApiState>>,
    Path(uuid): Path<NetworkId>,
    Query(q): Query<GetQuery>,
) -> ApiResult<Json<Network>> {
    let loaded = napi_core::repo::get::<Network>(&state.store, "network", &uuid.to_string()).await?;
    if let Some(caller) = q.provisionable_by
        && !napi_core::owner_policy::owner_allowed(loaded.entity.owner_uuids.as_deref(), caller, state.admin_uuid)
    {
        return Err(NapiError::NotAuthorized { field: "owner_uuid" }.into());
    }
    Ok(Json(loaded.entity))
}

pub async fn update(
    State(state): State<Arc<ApiState>>,
    Path(uuid): Path<NetworkId>,
    Json(body): Json<NetworkBody>,
) -> ApiResult<Json<Network>> {
    let network = napi_core::networks::update_network(&state.store, uuid, body.into()).await?;
    Ok(Json(network))
}

pub async fn delete(State(state): State<Arc<ApiState>>, Path(uuid): Path<NetworkId>) -> ApiResult<StatusCode> {
    napi_core::networks::delete_network(&state.store, uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn default_nic_state() -> NicState {
    NicState::Provisioning
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ProvisionNicBody {
    pub mac: String,
    pub owner_uuid: OwnerId,
    pub belongs_to_type: String,
    pub belongs_to_uuid: napi_types::BelongsToId,
    #[serde(default)]
    pub primary: bool,
    #[serde(default = "default_nic_state")]
    pub state: NicState,
    pub requested_ip: Option<String>,
    pub vlan_id: Option<u16>,
    pub mtu: Option<u32>,
    pub cn_uuid: Option<String>,
    #[serde(default = "default_true")]
    pub check_owner: bool,
}

/// `POST /networks/:uuid/nics`: provisions a nic bound directly to this
/// network rather than dispatched through a pool.
pub async fn provision_nic(
    State(state): State<Arc<ApiState>>,
    Path(uuid): Path<NetworkId>,
    Json(body): Json<ProvisionNicBody>,
) -> ApiResult<Json<napi_model::Nic>> {
    let mac = parse_mac(&body.mac).ok_or_else(|| NapiError::single_field("mac", "not a valid mac address"))?;
    let requested_ip = body
        .requested_ip
        .as_deref()
        .map(napi_net::codec::parse)
        .transpose()
        .map_err(|_| NapiError::single_field("requested_ip", "not a valid address"))?;

    let req = CreateNicRequest {
        mac,
        owner_uuid: body.owner_uuid,
        belongs_to_type: body.belongs_to_type,
        belongs_to_uuid: body.belongs_to_uuid,
        primary: body.primary,
        state: body.state,
        network_uuid: Some(uuid),
        requested_ip,
        vlan_id: body.vlan_id,
        mtu: body.mtu,
        cn_uuid: body.cn_uuid,
    };
    let nic = napi_core::nic_state_machine::create_nic(
        &state.store,
        req,
        body.owner_uuid,
        state.admin_uuid,
        body.check_owner,
    )
    .await?;
    Ok(Json(nic))
}
