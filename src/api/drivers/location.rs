use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use utoipa::ToSchema;

use super::DriversState;
use crate::api::{bad_gateway, bad_request, not_found, ErrorResponse};
use crate::geo;
use crate::providers::backend::BackendError;
use crate::sync::DriverPositionUpdate;

/// Location push body; field names follow the backend wire format
#[derive(Debug, Deserialize, ToSchema)]
pub struct PushLocationRequest {
    pub lat: f64,
    pub long: f64,
}

/// Push a new location sample for a driver.
///
/// The sample is relayed to the backend, the local snapshot is refreshed and
/// the position is broadcast to live subscribers.
#[utoipa::path(
    post,
    path = "/api/drivers/{id}/location",
    params(
        ("id" = i64, Path, description = "Driver id")
    ),
    request_body = PushLocationRequest,
    responses(
        (status = 200, description = "Accepted position", body = DriverPositionUpdate),
        (status = 400, description = "Invalid coordinates", body = ErrorResponse),
        (status = 404, description = "Driver not found", body = ErrorResponse),
        (status = 502, description = "Backend relay failed", body = ErrorResponse)
    ),
    tag = "drivers"
)]
pub async fn push_driver_location(
    State(state): State<DriversState>,
    Path(id): Path<i64>,
    Json(request): Json<PushLocationRequest>,
) -> Result<Json<DriverPositionUpdate>, (StatusCode, Json<ErrorResponse>)> {
    if !geo::is_valid_coordinate(request.lat, request.long) {
        return Err(bad_request("Invalid coordinates"));
    }

    match state
        .manager
        .push_driver_location(id, request.lat, request.long)
        .await
    {
        Ok(update) => Ok(Json(update)),
        Err(BackendError::ApiError { status: 404, .. }) => Err(not_found("Driver not found")),
        Err(e) => Err(bad_gateway(e.to_string())),
    }
}
