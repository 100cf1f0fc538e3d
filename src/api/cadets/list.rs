use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use super::CadetsState;
use crate::api::stops::StopView;
use crate::api::{not_found, ErrorResponse};
use crate::geo;
use crate::providers::backend::Cadet;

#[derive(Debug, Serialize, ToSchema)]
pub struct CadetListResponse {
    pub cadets: Vec<CadetView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CadetView {
    pub id: i64,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    /// Phone formatted for display, or "N/A"
    pub phone: String,
    /// Assigned boarding stop, if any
    pub stop_id: Option<i64>,
    pub stop_name: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CadetDetail {
    pub cadet: CadetView,
    /// Full view of the assigned stop, when it exists in the snapshot
    pub stop: Option<StopView>,
    /// The route serving the assigned stop, when one does
    pub route: Option<CadetRoute>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CadetRoute {
    pub id: i64,
    pub route_name: String,
    pub description: Option<String>,
}

impl CadetView {
    fn from_cadet(cadet: &Cadet) -> Self {
        Self {
            id: cadet.id,
            full_name: cadet.full_name.clone(),
            username: cadet.username.clone(),
            city: cadet.city.clone(),
            district: cadet.district.clone(),
            phone: geo::format_phone_number(cadet.phone),
            stop_id: cadet.stop.as_ref().map(|s| s.id),
            stop_name: cadet.stop.as_ref().and_then(|s| s.stop_name.clone()),
        }
    }
}

/// List all cadets with their assigned stop
#[utoipa::path(
    get,
    path = "/api/cadets",
    responses(
        (status = 200, description = "List of all cadets", body = CadetListResponse)
    ),
    tag = "cadets"
)]
pub async fn list_cadets(State(state): State<CadetsState>) -> Json<CadetListResponse> {
    let store = state.cadets.read().await;
    let mut cadets: Vec<CadetView> = store.values().map(CadetView::from_cadet).collect();
    cadets.sort_by_key(|c| c.id);
    Json(CadetListResponse { cadets })
}

/// Get a cadet with its stop and the route serving that stop
#[utoipa::path(
    get,
    path = "/api/cadets/{id}",
    params(
        ("id" = i64, Path, description = "Cadet id")
    ),
    responses(
        (status = 200, description = "Cadet detail", body = CadetDetail),
        (status = 404, description = "Cadet not found", body = ErrorResponse)
    ),
    tag = "cadets"
)]
pub async fn get_cadet(
    State(state): State<CadetsState>,
    Path(id): Path<i64>,
) -> Result<Json<CadetDetail>, (StatusCode, Json<ErrorResponse>)> {
    let cadet = {
        let store = state.cadets.read().await;
        store.get(&id).cloned().ok_or_else(|| not_found("Cadet not found"))?
    };

    let view = CadetView::from_cadet(&cadet);

    let stop = match view.stop_id {
        Some(stop_id) => {
            let stops = state.stops.read().await;
            stops.get(&stop_id).map(StopView::from_stop)
        }
        None => None,
    };

    let route = match view.stop_id {
        Some(stop_id) => {
            let routes = state.routes.read().await;
            let mut serving: Vec<&crate::providers::backend::Route> = routes
                .values()
                .filter(|r| r.stops.iter().any(|s| s.id == stop_id))
                .collect();
            serving.sort_by_key(|r| r.id);
            serving.first().map(|r| CadetRoute {
                id: r.id,
                route_name: r.route_name.clone(),
                description: r.description.clone(),
            })
        }
        None => None,
    };

    Ok(Json(CadetDetail { cadet: view, stop, route }))
}
