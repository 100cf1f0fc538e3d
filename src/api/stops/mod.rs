mod list;

pub use list::*;

use axum::{routing::get, Router};

use crate::sync::StopStore;

#[derive(Clone)]
pub struct StopsState {
    pub stops: StopStore,
    /// Assumed average minibus speed for ETA estimates (km/h)
    pub average_speed_kmh: f64,
}

pub fn router(stops: StopStore, average_speed_kmh: f64) -> Router {
    let state = StopsState { stops, average_speed_kmh };
    Router::new()
        .route("/", get(list_stops))
        .route("/by-district", get(stops_by_district))
        .route("/nearest", get(nearest_stop))
        .with_state(state)
}
