use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::RoutesState;
use crate::api::{not_found, ErrorResponse};
use crate::geo;
use crate::providers::routing::GeoPoint;

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteGeometryResponse {
    pub route_id: i64,
    /// Path points in travel order, ready for a map polyline
    pub points: Vec<GeoPoint>,
    pub distance_km: f64,
    pub duration_minutes: f64,
    /// Duration formatted for display, e.g. "1h 30min"
    pub duration_display: String,
    pub legs_total: usize,
    /// Legs that failed during aggregation; their share of the path is missing
    pub legs_failed: usize,
    /// When the geometry was computed (RFC 3339); absent while the first
    /// computation is still pending
    pub computed_at: Option<String>,
}

/// Get the aggregated drawable geometry for a route.
///
/// A route with fewer than two mappable stops has no computable geometry and
/// yields the empty path with zero totals.
#[utoipa::path(
    get,
    path = "/api/routes/{id}/geometry",
    params(
        ("id" = i64, Path, description = "Route id")
    ),
    responses(
        (status = 200, description = "Aggregated route geometry", body = RouteGeometryResponse),
        (status = 404, description = "Route not found", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route_geometry(
    State(state): State<RoutesState>,
    Path(id): Path<i64>,
) -> Result<Json<RouteGeometryResponse>, (StatusCode, Json<ErrorResponse>)> {
    {
        let routes = state.routes.read().await;
        if !routes.contains_key(&id) {
            return Err(not_found("Route not found"));
        }
    }

    let cache = state.geometries.read().await;
    let response = match cache.get(&id) {
        Some(cached) => RouteGeometryResponse {
            route_id: id,
            points: cached.geometry.points.clone(),
            distance_km: cached.geometry.distance_km,
            duration_minutes: cached.geometry.duration_minutes,
            duration_display: geo::format_eta(cached.geometry.duration_minutes.round() as u32),
            legs_total: cached.geometry.legs_total,
            legs_failed: cached.geometry.legs_failed,
            computed_at: Some(cached.computed_at.to_rfc3339()),
        },
        // Known route, first computation still pending
        None => RouteGeometryResponse {
            route_id: id,
            points: Vec::new(),
            distance_km: 0.0,
            duration_minutes: 0.0,
            duration_display: geo::format_eta(0),
            legs_total: 0,
            legs_failed: 0,
            computed_at: None,
        },
    };

    Ok(Json(response))
}
