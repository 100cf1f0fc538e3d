use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::sync::{CadetStore, DriverStore, GeometryStore, LastSync, RouteStore, StopStore};

#[derive(Clone)]
pub struct HealthState {
    pub routes: RouteStore,
    pub stops: StopStore,
    pub drivers: DriverStore,
    pub cadets: CadetStore,
    pub geometries: GeometryStore,
    pub last_sync: LastSync,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Whether the service is running
    pub healthy: bool,
    /// Number of routes in the current backend snapshot
    pub routes_cached: usize,
    /// Number of stops in the current backend snapshot
    pub stops_cached: usize,
    /// Number of drivers in the current backend snapshot
    pub drivers_cached: usize,
    /// Number of cadets in the current backend snapshot
    pub cadets_cached: usize,
    /// Number of routes with a computed geometry
    pub geometries_cached: usize,
    /// When the last successful backend refresh finished (RFC 3339)
    pub last_sync: Option<String>,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service health status", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<HealthState>) -> Json<HealthResponse> {
    let routes_cached = state.routes.read().await.len();
    let stops_cached = state.stops.read().await.len();
    let drivers_cached = state.drivers.read().await.len();
    let cadets_cached = state.cadets.read().await.len();
    let geometries_cached = state.geometries.read().await.len();
    let last_sync = state.last_sync.read().await.as_ref().map(|t| t.to_rfc3339());

    Json(HealthResponse {
        healthy: true,
        routes_cached,
        stops_cached,
        drivers_cached,
        cadets_cached,
        geometries_cached,
        last_sync,
    })
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/", get(health_check)).with_state(state)
}
