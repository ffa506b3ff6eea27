//! `GET /ping` (§6): a liveness probe that also touches the pool, so an
//! unreachable database shows up as `status:"error"` rather than a bare
//! 200.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::ApiState;

#[derive(Debug, Serialize)]
pub struct Ping {
    healthy: bool,
    status: &'static str,
}

pub async fn ping(State(state): State<Arc<ApiState>>) -> Json<Ping> {
    let healthy = sqlx::query("SELECT 1").execute(state.store.raw_pool()).await.is_ok();
    Json(Ping {
        healthy,
        status: if healthy { "ok" } else { "error" },
    })
}
