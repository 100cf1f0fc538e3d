use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::DriversState;
use crate::api::stops::StopView;
use crate::api::{not_found, ErrorResponse};
use crate::geo;
use crate::providers::backend::Driver;
use crate::providers::routing::GeoPoint;

#[derive(Debug, Serialize, ToSchema)]
pub struct DriverListResponse {
    pub drivers: Vec<DriverView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DriverView {
    pub id: i64,
    pub full_name: Option<String>,
    pub username: Option<String>,
    /// Phone formatted for display, or "N/A"
    pub phone: String,
    /// Whether the driver has reported at least one location
    pub online: bool,
    /// Newest reported position, if any
    pub position: Option<GeoPoint>,
    pub route: Option<DriverRoute>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DriverRoute {
    pub id: i64,
    pub route_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DriverDetail {
    pub driver: DriverView,
    /// The stop of the driver's route closest to its current position
    pub nearest_stop: Option<DriverNearestStop>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DriverNearestStop {
    pub stop: StopView,
    pub distance_km: f64,
    pub eta_minutes: u32,
    /// ETA formatted for display, e.g. "15 min"
    pub eta_display: String,
}

impl DriverView {
    fn from_driver(driver: &Driver) -> Self {
        Self {
            id: driver.id,
            full_name: driver.full_name.clone(),
            username: driver.username.clone(),
            phone: geo::format_phone_number(driver.phone),
            online: driver.is_online(),
            position: driver
                .latest_position()
                .map(|c| GeoPoint { lat: c.lat, lon: c.lon }),
            route: driver.current_route.as_ref().map(|r| DriverRoute {
                id: r.id,
                route_name: r.route_name.clone(),
            }),
        }
    }
}

/// List all drivers with their latest position
#[utoipa::path(
    get,
    path = "/api/drivers",
    responses(
        (status = 200, description = "List of all drivers", body = DriverListResponse)
    ),
    tag = "drivers"
)]
pub async fn list_drivers(State(state): State<DriversState>) -> Json<DriverListResponse> {
    let store = state.drivers.read().await;
    let mut drivers: Vec<DriverView> = store.values().map(DriverView::from_driver).collect();
    drivers.sort_by_key(|d| d.id);
    Json(DriverListResponse { drivers })
}

/// Get a driver with the nearest stop of its current route
#[utoipa::path(
    get,
    path = "/api/drivers/{id}",
    params(
        ("id" = i64, Path, description = "Driver id")
    ),
    responses(
        (status = 200, description = "Driver detail", body = DriverDetail),
        (status = 404, description = "Driver not found", body = ErrorResponse)
    ),
    tag = "drivers"
)]
pub async fn get_driver(
    State(state): State<DriversState>,
    Path(id): Path<i64>,
) -> Result<Json<DriverDetail>, (StatusCode, Json<ErrorResponse>)> {
    let driver = {
        let store = state.drivers.read().await;
        store.get(&id).cloned().ok_or_else(|| not_found("Driver not found"))?
    };

    let view = DriverView::from_driver(&driver);
    let nearest_stop = match (&view.position, &view.route) {
        (Some(position), Some(route)) => {
            let routes = state.routes.read().await;
            routes.get(&route.id).and_then(|r| {
                geo::find_nearest_stop(position.lat, position.lon, &r.stops).map(|nearest| {
                    let eta_minutes =
                        geo::estimate_eta_minutes(nearest.distance_km, state.average_speed_kmh);
                    DriverNearestStop {
                        stop: StopView::from_stop(nearest.stop),
                        distance_km: nearest.distance_km,
                        eta_minutes,
                        eta_display: geo::format_eta(eta_minutes),
                    }
                })
            })
        }
        _ => None,
    };

    Ok(Json(DriverDetail { driver: view, nearest_stop }))
}
