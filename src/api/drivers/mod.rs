mod list;
mod location;

pub use list::*;
pub use location::*;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::sync::{DriverStore, RouteStore, SyncManager};

#[derive(Clone)]
pub struct DriversState {
    pub drivers: DriverStore,
    pub routes: RouteStore,
    /// For relaying location pushes to the backend
    pub manager: Arc<SyncManager>,
    /// Assumed average minibus speed for ETA estimates (km/h)
    pub average_speed_kmh: f64,
}

pub fn router(manager: Arc<SyncManager>, average_speed_kmh: f64) -> Router {
    let state = DriversState {
        drivers: manager.driver_store(),
        routes: manager.route_store(),
        manager,
        average_speed_kmh,
    };
    Router::new()
        .route("/", get(list_drivers))
        .route("/{id}", get(get_driver))
        .route("/{id}/location", post(push_driver_location))
        .with_state(state)
}
