//! `/networks/:uuid/ips`, `/networks/:uuid/ips/:ip` (§6).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use napi_core::NapiError;
use napi_model::{IpRecord, IpRecordUpdate, Network};
use napi_types::{BelongsToId, NetworkId, OwnerId};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::ApiState;
use crate::web::support::Page;

pub async fn list(
    State(state): State<Arc<ApiState>>,
    Path(uuid): Path<NetworkId>,
    Query(page): Query<Page>,
) -> ApiResult<Json<Vec<IpRecord>>> {
    let network = napi_core::repo::get::<Network>(&state.store, "network", &uuid.to_string())
        .await?
        .entity;
    let records = napi_core::search::list_ips(&state.store, &network, page.limit, page.offset).await?;
    Ok(Json(records))
}

pub async fn get(
    State(state): State<Arc<ApiState>>,
    Path((uuid, ip)): Path<(NetworkId, String)>,
) -> ApiResult<Json<IpRecord>> {
    let addr = napi_net::codec::parse(&ip).map_err(|_| NapiError::single_field("ip", "not a valid address"))?;
    let network = napi_core::repo::get::<Network>(&state.store, "network", &uuid.to_string())
        .await?
        .entity;
    let record = napi_core::search::get_ip(&state.store, &network, addr).await?;
    Ok(Json(record))
}

#[derive(Debug, Default, Deserialize)]
pub struct IpUpdateBody {
    pub reserved: Option<bool>,
    pub belongs_to_type: Option<String>,
    pub belongs_to_uuid: Option<BelongsToId>,
    pub owner_uuid: Option<OwnerId>,
    #[serde(default)]
    pub unassign: bool,
    #[serde(default)]
    pub free: bool,
}

impl From<IpUpdateBody> for IpRecordUpdate {
    fn from(b: IpUpdateBody) -> Self {
        IpRecordUpdate {
            reserved: b.reserved,
            belongs_to_type: b.belongs_to_type,
            belongs_to_uuid: b.belongs_to_uuid,
            owner_uuid: b.owner_uuid,
            unassign: b.unassign,
            free: b.free,
        }
    }
}

pub async fn update(
    State(state): State<Arc<ApiState>>,
    Path((uuid, ip)): Path<(NetworkId, String)>,
    Json(body): Json<IpUpdateBody>,
) -> ApiResult<Json<IpRecord>> {
    let addr = napi_net::codec::parse(&ip).map_err(|_| NapiError::single_field("ip", "not a valid address"))?;
    let network = napi_core::repo::get::<Network>(&state.store, "network", &uuid.to_string())
        .await?
        .entity;
    let update: IpRecordUpdate = body.into();
    let update = update.validate().map_err(NapiError::from)?;
    let record = napi_core::allocator::apply_update(&state.store, &network, addr, update).await?;
    Ok(Json(record))
}
