//! HTTP handlers for the NAPI control plane (§6), one module per resource.
//! Every handler takes `State<Arc<ApiState>>` and returns `ApiResult<Json<T>>`
//! (or `ApiResult<StatusCode>` for deletes); [`crate::error`] does the one
//! `NapiError -> Response` translation every handler relies on.

pub mod aggregations;
pub mod ips;
pub mod network_pools;
pub mod networks;
pub mod nic_tags;
pub mod nics;
pub mod ping;
pub mod search;
mod support;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::state::ApiState;

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ping", get(ping::ping))
        .route("/nic_tags", get(nic_tags::list).post(nic_tags::create))
        .route(
            "/nic_tags/{name}",
            get(nic_tags::get).put(nic_tags::update).delete(nic_tags::delete),
        )
        .route("/networks", get(networks::list).post(networks::create))
        .route(
            "/networks/{uuid}",
            get(networks::get).put(networks::update).delete(networks::delete),
        )
        .route("/networks/{uuid}/nics", post(networks::provision_nic))
        .route("/networks/{uuid}/ips", get(ips::list))
        .route("/networks/{uuid}/ips/{ip}", get(ips::get).put(ips::update))
        .route("/network_pools", get(network_pools::list).post(network_pools::create))
        .route(
            "/network_pools/{uuid}",
            get(network_pools::get)
                .put(network_pools::update)
                .delete(network_pools::delete),
        )
        .route("/network_pools/{uuid}/nics", post(network_pools::provision_nic))
        .route("/nics", get(nics::list).post(nics::create))
        .route(
            "/nics/{mac}",
            get(nics::get).put(nics::update).delete(nics::delete),
        )
        .route("/aggregations", get(aggregations::list).post(aggregations::create))
        .route(
            "/aggregations/{id}",
            get(aggregations::get).put(aggregations::update).delete(aggregations::delete),
        )
        .route("/search/ips", get(search::search_ips))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
