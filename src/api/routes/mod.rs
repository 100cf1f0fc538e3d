mod geometry;
mod list;

pub use geometry::*;
pub use list::*;

use axum::{routing::get, Router};

use crate::sync::{GeometryStore, RouteStore};

/// Seats on a standard minibus, used for occupancy percentages
pub const BUS_CAPACITY: usize = 35;

#[derive(Clone)]
pub struct RoutesState {
    pub routes: RouteStore,
    pub geometries: GeometryStore,
}

pub fn router(routes: RouteStore, geometries: GeometryStore) -> Router {
    let state = RoutesState { routes, geometries };
    Router::new()
        .route("/", get(list_routes))
        .route("/{id}", get(get_route))
        .route("/{id}/geometry", get(get_route_geometry))
        .with_state(state)
}
