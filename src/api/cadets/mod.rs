mod list;

pub use list::*;

use axum::{routing::get, Router};

use crate::sync::{CadetStore, RouteStore, StopStore};

#[derive(Clone)]
pub struct CadetsState {
    pub cadets: CadetStore,
    pub stops: StopStore,
    pub routes: RouteStore,
}

pub fn router(cadets: CadetStore, stops: StopStore, routes: RouteStore) -> Router {
    let state = CadetsState { cadets, stops, routes };
    Router::new()
        .route("/", get(list_cadets))
        .route("/{id}", get(get_cadet))
        .with_state(state)
}
