use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::{RoutesState, BUS_CAPACITY};
use crate::api::{not_found, ErrorResponse};
use crate::geo;
use crate::providers::backend::{Driver, MiniBusStop, Route as BackendRoute};

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteListResponse {
    pub routes: Vec<RouteSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteSummary {
    pub id: i64,
    pub route_name: String,
    pub description: Option<String>,
    pub stop_count: usize,
    pub driver_count: usize,
    pub cadet_count: usize,
    /// Whether a driver is currently assigned and pointing at this route
    pub active: bool,
    /// Cadets as a percentage of minibus capacity
    pub occupancy_percent: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteDetail {
    pub id: i64,
    pub route_name: String,
    pub description: Option<String>,
    /// Stops in travel order
    pub stops: Vec<RouteStop>,
    pub drivers: Vec<RouteDriver>,
    pub active: bool,
    pub cadet_count: usize,
    pub occupancy_percent: u32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteStop {
    pub id: i64,
    pub stop_name: Option<String>,
    pub district: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub cadet_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteDriver {
    pub id: i64,
    pub full_name: Option<String>,
    pub phone: String,
    pub online: bool,
}

impl RouteSummary {
    fn from_route(route: &BackendRoute) -> Self {
        Self {
            id: route.id,
            route_name: route.route_name.clone(),
            description: route.description.clone(),
            stop_count: route.stops.len(),
            driver_count: route.drivers.len(),
            cadet_count: route.cadet_count(),
            active: route.is_active(),
            occupancy_percent: route.occupancy_percent(BUS_CAPACITY),
        }
    }
}

impl RouteStop {
    fn from_stop(stop: &MiniBusStop) -> Self {
        Self {
            id: stop.id,
            stop_name: stop.stop_name.clone(),
            district: stop.district.clone(),
            latitude: stop.latitude,
            longitude: stop.longitude,
            cadet_count: stop.cadetes.len(),
        }
    }
}

impl RouteDriver {
    fn from_driver(driver: &Driver) -> Self {
        Self {
            id: driver.id,
            full_name: driver.full_name.clone(),
            phone: geo::format_phone_number(driver.phone),
            online: driver.is_online(),
        }
    }
}

/// List all routes with summary statistics
#[utoipa::path(
    get,
    path = "/api/routes",
    responses(
        (status = 200, description = "List of all routes", body = RouteListResponse)
    ),
    tag = "routes"
)]
pub async fn list_routes(State(state): State<RoutesState>) -> Json<RouteListResponse> {
    let store = state.routes.read().await;
    let mut routes: Vec<RouteSummary> = store.values().map(RouteSummary::from_route).collect();
    routes.sort_by_key(|r| r.id);
    Json(RouteListResponse { routes })
}

/// Get a route with its ordered stops and drivers
#[utoipa::path(
    get,
    path = "/api/routes/{id}",
    params(
        ("id" = i64, Path, description = "Route id")
    ),
    responses(
        (status = 200, description = "Route detail", body = RouteDetail),
        (status = 404, description = "Route not found", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route(
    State(state): State<RoutesState>,
    Path(id): Path<i64>,
) -> Result<Json<RouteDetail>, (StatusCode, Json<ErrorResponse>)> {
    let store = state.routes.read().await;
    let route = store.get(&id).ok_or_else(|| not_found("Route not found"))?;

    Ok(Json(RouteDetail {
        id: route.id,
        route_name: route.route_name.clone(),
        description: route.description.clone(),
        stops: route.stops.iter().map(RouteStop::from_stop).collect(),
        drivers: route.drivers.iter().map(RouteDriver::from_driver).collect(),
        active: route.is_active(),
        cadet_count: route.cadet_count(),
        occupancy_percent: route.occupancy_percent(BUS_CAPACITY),
    }))
}
