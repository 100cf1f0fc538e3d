use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::StopsState;
use crate::api::{bad_request, not_found, ErrorResponse};
use crate::geo;
use crate::providers::backend::MiniBusStop;

/// Grouping key for stops whose district is not set
const NO_DISTRICT: &str = "No district";

#[derive(Debug, Serialize, ToSchema)]
pub struct StopListResponse {
    pub stops: Vec<StopView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StopView {
    pub id: i64,
    pub stop_name: Option<String>,
    pub district: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub cadet_count: usize,
}

impl StopView {
    pub(crate) fn from_stop(stop: &MiniBusStop) -> Self {
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

#[derive(Debug, Deserialize, IntoParams)]
pub struct StopListQuery {
    /// Only return stops in this district (case-insensitive)
    pub district: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StopsByDistrictResponse {
    /// Stops grouped by district name, districts in alphabetical order
    pub districts: BTreeMap<String, Vec<StopView>>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct NearestStopQuery {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NearestStopResponse {
    pub stop: StopView,
    pub distance_km: f64,
    pub eta_minutes: u32,
    /// ETA formatted for display, e.g. "15 min"
    pub eta_display: String,
}

/// List all stops, optionally filtered by district
#[utoipa::path(
    get,
    path = "/api/stops",
    params(StopListQuery),
    responses(
        (status = 200, description = "List of stops", body = StopListResponse)
    ),
    tag = "stops"
)]
pub async fn list_stops(
    State(state): State<StopsState>,
    Query(query): Query<StopListQuery>,
) -> Json<StopListResponse> {
    let store = state.stops.read().await;
    let mut stops: Vec<StopView> = store
        .values()
        .filter(|s| match &query.district {
            Some(district) => s
                .district
                .as_ref()
                .map(|d| d.eq_ignore_ascii_case(district))
                .unwrap_or(false),
            None => true,
        })
        .map(StopView::from_stop)
        .collect();
    stops.sort_by_key(|s| s.id);
    Json(StopListResponse { stops })
}

/// List stops grouped by district
#[utoipa::path(
    get,
    path = "/api/stops/by-district",
    responses(
        (status = 200, description = "Stops grouped by district", body = StopsByDistrictResponse)
    ),
    tag = "stops"
)]
pub async fn stops_by_district(State(state): State<StopsState>) -> Json<StopsByDistrictResponse> {
    let store = state.stops.read().await;
    let mut stops: Vec<&MiniBusStop> = store.values().collect();
    stops.sort_by_key(|s| s.id);

    let mut districts: BTreeMap<String, Vec<StopView>> = BTreeMap::new();
    for stop in stops {
        let district = stop
            .district
            .clone()
            .unwrap_or_else(|| NO_DISTRICT.to_string());
        districts.entry(district).or_default().push(StopView::from_stop(stop));
    }

    Json(StopsByDistrictResponse { districts })
}

/// Find the stop nearest to a position.
///
/// Coordinates outside valid latitude/longitude bounds are rejected before
/// any distance is computed.
#[utoipa::path(
    get,
    path = "/api/stops/nearest",
    params(NearestStopQuery),
    responses(
        (status = 200, description = "Nearest stop with distance and ETA", body = NearestStopResponse),
        (status = 400, description = "Invalid coordinates", body = ErrorResponse),
        (status = 404, description = "No mappable stops", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn nearest_stop(
    State(state): State<StopsState>,
    Query(query): Query<NearestStopQuery>,
) -> Result<Json<NearestStopResponse>, (StatusCode, Json<ErrorResponse>)> {
    if !geo::is_valid_coordinate(query.lat, query.lon) {
        return Err(bad_request("Invalid coordinates"));
    }

    let store = state.stops.read().await;
    let mut stops: Vec<&MiniBusStop> = store.values().collect();
    // Stable iteration order so distance ties resolve deterministically
    stops.sort_by_key(|s| s.id);
    let stops: Vec<MiniBusStop> = stops.into_iter().cloned().collect();

    let nearest = geo::find_nearest_stop(query.lat, query.lon, &stops)
        .ok_or_else(|| not_found("No stops with coordinates available"))?;

    let eta_minutes = geo::estimate_eta_minutes(nearest.distance_km, state.average_speed_kmh);

    Ok(Json(NearestStopResponse {
        stop: StopView::from_stop(nearest.stop),
        distance_km: nearest.distance_km,
        eta_minutes,
        eta_display: geo::format_eta(eta_minutes),
    }))
}
