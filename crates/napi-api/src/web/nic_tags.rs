//! `/nic_tags`, `/nic_tags/:name` (§6).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use napi_model::{NicTag, NicTagParams};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::ApiState;
use crate::web::support::Page;

#[derive(Debug, Deserialize)]
pub struct NicTagBody {
    pub name: String,
    pub mtu: Option<u32>,
}

pub async fn list(State(state): State<Arc<ApiState>>, Query(page): Query<Page>) -> ApiResult<Json<Vec<NicTag>>> {
    let tags = napi_core::search::list_nic_tags(&state.store, page.limit, page.offset).await?;
    Ok(Json(tags))
}

pub async fn create(State(state): State<Arc<ApiState>>, Json(body): Json<NicTagBody>) -> ApiResult<Json<NicTag>> {
    let tag = napi_core::nic_tags::create_nic_tag(
        &state.store,
        NicTagParams {
            uuid: None,
            name: body.name,
            mtu: body.mtu,
        },
    )
    .await?;
    Ok(Json(tag))
}

pub async fn get(State(state): State<Arc<ApiState>>, Path(name): Path<String>) -> ApiResult<Json<NicTag>> {
    let loaded = napi_core::repo::get::<NicTag>(&state.store, "nic_tag", &name).await?;
    Ok(Json(loaded.entity))
}

pub async fn update(
    State(state): State<Arc<ApiState>>,
    Path(name): Path<String>,
    Json(body): Json<NicTagBody>,
) -> ApiResult<Json<NicTag>> {
    let tag = napi_core::nic_tags::update_nic_tag(&state.store, &name, body.mtu).await?;
    Ok(Json(tag))
}

pub async fn delete(State(state): State<Arc<ApiState>>, Path(name): Path<String>) -> ApiResult<StatusCode> {
    napi_core::nic_tags::delete_nic_tag(&state.store, &name).await?;
    Ok(StatusCode::NO_CONTENT)
}
