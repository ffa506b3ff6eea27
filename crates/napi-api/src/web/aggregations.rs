//! `/aggregations`, `/aggregations/:id` (§6). `:id` is `AggregationId`'s
//! `belongs_to_uuid:name` display form.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use mac_address::MacAddress;
use napi_core::NapiError;
use napi_model::{Aggregation, AggregationId, AggregationParams, LacpMode};
use napi_types::BelongsToId;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::ApiState;
use crate::web::support::Page;

fn parse_id(raw: &str) -> ApiResult<AggregationId> {
    let (belongs_to_uuid, name) = raw
        .split_once(':')
        .ok_or_else(|| NapiError::single_field("id", "must be belongs_to_uuid:name"))?;
    let belongs_to_uuid: BelongsToId = belongs_to_uuid
        .parse()
        .map_err(|_| NapiError::single_field("id", "not a valid belongs_to_uuid"))?;
    Ok(AggregationId {
        belongs_to_uuid,
        name: name.to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(flatten)]
    pub page: Page,
    pub belongs_to_uuid: Option<BelongsToId>,
}

pub async fn list(
    State(state): State<Arc<ApiState>>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Vec<Aggregation>>> {
    let mut clauses = Vec::new();
    if let Some(belongs_to_uuid) = q.belongs_to_uuid {
        clauses.push(napi_store::Filter::eq("belongs_to_uuid", belongs_to_uuid));
    }
    let filter = napi_store::Filter::And(clauses);
    let aggregations = napi_core::search::list_aggregations(&state.store, &filter, q.page.limit, q.page.offset).await?;
    Ok(Json(aggregations))
}

#[derive(Debug, Deserialize)]
pub struct AggregationBody {
    pub belongs_to_uuid: BelongsToId,
    pub name: String,
    pub macs: Vec<MacAddress>,
    pub lacp_mode: LacpMode,
    pub nic_tags_provided: Option<Vec<String>>,
}

impl From<AggregationBody> for AggregationParams {
    fn from(b: AggregationBody) -> Self {
        AggregationParams {
            belongs_to_uuid: b.belongs_to_uuid,
            name: b.name,
            macs: b.macs,
            lacp_mode: b.lacp_mode,
            nic_tags_provided: b.nic_tags_provided,
        }
    }
}

pub async fn create(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<AggregationBody>,
) -> ApiResult<Json<Aggregation>> {
    let aggr = napi_core::aggregations::create_aggregation(&state.store, body.into()).await?;
    Ok(Json(aggr))
}

pub async fn get(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> ApiResult<Json<Aggregation>> {
    let id = parse_id(&id)?;
    let loaded = napi_core::repo::get::<Aggregation>(&state.store, "aggregation", &id.to_string()).await?;
    Ok(Json(loaded.entity))
}

pub async fn update(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    Json(body): Json<AggregationBody>,
) -> ApiResult<Json<Aggregation>> {
    let id = parse_id(&id)?;
    let aggr = napi_core::aggregations::update_aggregation(&state.store, &id, body.into()).await?;
    Ok(Json(aggr))
}

pub async fn delete(State(state): State<Arc<ApiState>>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    napi_core::aggregations::delete_aggregation(&state.store, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
