//! `/nics`, `/nics/:mac` (§6). The path segment accepts a mac in any of the
//! three forms §6 names, parsed by [`crate::web::support::parse_mac`].

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use napi_core::NapiError;
use napi_core::nic_state_machine::CreateNicRequest;
use napi_model::{Nic, NicState};
use napi_types::{BelongsToId, NetworkId, OwnerId};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::ApiState;
use crate::web::support::{Page, parse_mac};

fn default_nic_state() -> NicState {
    NicState::Provisioning
}

fn default_true() -> bool {
    true
}

fn parse_path_mac(raw: &str) -> ApiResult<mac_address::MacAddress> {
    parse_mac(raw)
        .ok_or_else(|| NapiError::single_field("mac", "not a valid mac address").into())
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(flatten)]
    pub page: Page,
    pub belongs_to_uuid: Option<BelongsToId>,
    pub network_uuid: Option<NetworkId>,
    pub provisionable_by: Option<OwnerId>,
}

pub async fn list(State(state): State<Arc<ApiState>>, Query(q): Query<ListQuery>) -> ApiResult<Json<Vec<Nic>>> {
    let mut clauses = Vec::new();
    if let Some(belongs_to_uuid) = q.belongs_to_uuid {
        clauses.push(napi_store::Filter::eq("belongs_to_uuid", belongs_to_uuid));
    }
    if let Some(network_uuid) = q.network_uuid {
        clauses.push(napi_store::Filter::eq("network_uuid", network_uuid));
    }
    let filter = napi_store::Filter::And(clauses);
    let nics = napi_core::search::list_nics(&state.store, &filter, q.provisionable_by, q.page.limit, q.page.offset).await?;
    Ok(Json(nics))
}

#[derive(Debug, Deserialize)]
pub struct CreateNicBody {
    pub mac: String,
    pub owner_uuid: OwnerId,
    pub belongs_to_type: String,
    pub belongs_to_uuid: BelongsToId,
    #[serde(default)]
    pub primary: bool,
    #[serde(default = "default_nic_state")]
    pub state: NicState,
    pub network_uuid: Option<NetworkId>,
    pub requested_ip: Option<String>,
    pub vlan_id: Option<u16>,
    pub mtu: Option<u32>,
    pub cn_uuid: Option<String>,
    #[serde(default = "default_true")]
    pub check_owner: bool,
}

pub async fn create(State(state): State<Arc<ApiState>>, Json(body): Json<CreateNicBody>) -> ApiResult<Json<Nic>> {
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
        network_uuid: body.network_uuid,
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

pub async fn get(State(state): State<Arc<ApiState>>, Path(mac): Path<String>) -> ApiResult<Json<Nic>> {
    let mac = parse_path_mac(&mac)?;
    let key = napi_core::nic_state_machine::mac_key(mac);
    let loaded = napi_core::repo::get::<Nic>(&state.store, "nic", &key).await?;
    Ok(Json(loaded.entity))
}

#[derive(Debug, Default, Deserialize)]
pub struct NicUpdateBody {
    pub network_uuid: Option<NetworkId>,
    pub ip: Option<String>,
    pub owner_uuid: Option<OwnerId>,
    pub primary: Option<bool>,
    #[serde(default = "default_true")]
    pub check_owner: bool,
}

/// Rebinds to a new network/address when `network_uuid` is given, and/or
/// flips the primary flag, following §4.E's "update-to-bind"/"rebind" and
/// "primary flag" transitions.
pub async fn update(
    State(state): State<Arc<ApiState>>,
    Path(mac): Path<String>,
    Json(body): Json<NicUpdateBody>,
) -> ApiResult<Json<Nic>> {
    let mac = parse_path_mac(&mac)?;

    let mut nic = if let Some(network_uuid) = body.network_uuid {
        let target_ip = body
            .ip
            .as_deref()
            .map(napi_net::codec::parse)
            .transpose()
            .map_err(|_| NapiError::single_field("ip", "not a valid address"))?;
        let caller_owner = body
            .owner_uuid
            .ok_or_else(|| NapiError::single_field("owner_uuid", "required when rebinding a nic"))?;
        napi_core::nic_state_machine::bind_network(
            &state.store,
            mac,
            network_uuid,
            target_ip,
            caller_owner,
            state.admin_uuid,
            body.check_owner,
        )
        .await?
    } else {
        let key = napi_core::nic_state_machine::mac_key(mac);
        napi_core::repo::get::<Nic>(&state.store, "nic", &key).await?.entity
    };

    if body.primary == Some(true) {
        nic = napi_core::nic_state_machine::set_primary(&state.store, mac, nic.belongs_to_uuid).await?;
    }

    Ok(Json(nic))
}

pub async fn delete(State(state): State<Arc<ApiState>>, Path(mac): Path<String>) -> ApiResult<StatusCode> {
    let mac = parse_path_mac(&mac)?;
    napi_core::nic_state_machine::delete_nic(&state.store, mac).await?;
    Ok(StatusCode::NO_CONTENT)
}
