pub mod cadets;
pub mod drivers;
pub mod error;
pub mod health;
pub mod routes;
pub mod stops;
pub mod ws;

pub use error::{bad_gateway, bad_request, not_found, ErrorResponse};

use std::sync::Arc;

use axum::{routing::get, Router};

use crate::sync::SyncManager;

pub fn router(manager: Arc<SyncManager>, average_speed_kmh: f64) -> Router {
    let ws_state = ws::WsState {
        drivers: manager.driver_store(),
        driver_updates_tx: manager.driver_updates_sender(),
        geometry_progress_tx: manager.geometry_progress_sender(),
    };
    let health_state = health::HealthState {
        routes: manager.route_store(),
        stops: manager.stop_store(),
        drivers: manager.driver_store(),
        cadets: manager.cadet_store(),
        geometries: manager.geometry_store(),
        last_sync: manager.last_sync(),
    };

    Router::new()
        .nest(
            "/routes",
            routes::router(manager.route_store(), manager.geometry_store()),
        )
        .nest("/stops", stops::router(manager.stop_store(), average_speed_kmh))
        .nest(
            "/cadets",
            cadets::router(
                manager.cadet_store(),
                manager.stop_store(),
                manager.route_store(),
            ),
        )
        .nest("/drivers", drivers::router(manager, average_speed_kmh))
        .nest("/health", health::router(health_state))
        .route("/ws/drivers", get(ws::ws_drivers).with_state(ws_state))
}
