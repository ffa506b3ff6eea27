//! `/search/ips` (§6).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use napi_core::NapiError;
use napi_core::search::AddressHit;
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::ApiState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub ip: String,
}

#[derive(Debug, Serialize)]
pub struct AddressHitBody {
    pub network_uuid: napi_types::NetworkId,
    #[serde(flatten)]
    pub record: napi_model::IpRecord,
    pub free: bool,
}

impl From<AddressHit> for AddressHitBody {
    fn from(hit: AddressHit) -> Self {
        let free = hit.record.free();
        AddressHitBody {
            network_uuid: hit.network_uuid,
            record: hit.record,
            free,
        }
    }
}

pub async fn search_ips(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<SearchQuery>,
) -> ApiResult<Json<Vec<AddressHitBody>>> {
    let ip = napi_net::codec::parse(&q.ip).map_err(|_| NapiError::single_field("ip", "not a valid address"))?;
    let hits = napi_core::search::search_ips(&state.store, ip).await?;
    Ok(Json(hits.into_iter().map(AddressHitBody::from).collect()))
}
