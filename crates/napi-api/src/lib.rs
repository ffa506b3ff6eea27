//! HTTP surface, error mapping, and config/log bootstrap for the NAPI
//! control plane (§5/§6), following `carbide-api`'s split between
//! `cfg` (process invocation + service config), `state` (the shared axum
//! state), `error` (the one place a [`napi_core::NapiError`] becomes a
//! [`axum::response::Response`]), and `web` (one module per resource).

pub mod cfg;
pub mod error;
pub mod state;
pub mod web;
