//! Background synchronization of backend data and route geometries.
//!
//! This module handles:
//! - Periodic refresh of routes, stops, drivers and cadets from the
//!   transport backend into in-memory stores
//! - Aggregate route geometry computation, cached by stop-list identity
//! - Driver location pushes and live update broadcasting

mod geometry;
mod types;

pub use geometry::{
    aggregate_route_geometry, stop_list_key, CancelFlag, GeometryProgress,
    GeometryProgressSender, RouteGeometry,
};
pub use types::{
    CachedGeometry, CadetStore, DriverPositionUpdate, DriverStore, DriverUpdateSender,
    GeometryStore, LastSync, RouteStore, StopStore,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::providers::backend::{BackendClient, BackendError, Route};
use crate::providers::routing::{LegRouter, RoutingClient};
use crate::retry::retry_with_backoff;

/// Manages background refresh of backend data and geometry computation
pub struct SyncManager {
    backend: BackendClient,
    routing: RoutingClient,
    config: Config,
    routes: RouteStore,
    stops: StopStore,
    drivers: DriverStore,
    cadets: CadetStore,
    geometries: GeometryStore,
    last_sync: LastSync,
    driver_updates_tx: DriverUpdateSender,
    geometry_progress_tx: GeometryProgressSender,
    cancel: CancelFlag,
}

impl SyncManager {
    pub fn new(config: Config) -> Result<Self, SyncError> {
        let backend =
            BackendClient::new(&config.backend).map_err(|e| SyncError::Client(e.to_string()))?;
        let routing =
            RoutingClient::new(&config.routing).map_err(|e| SyncError::Client(e.to_string()))?;

        // Position updates fan out to WebSocket clients; slow readers just lag
        let (driver_updates_tx, _) = broadcast::channel(64);
        // Per-leg progress is observational, capacity keeps bursts from blocking
        let (geometry_progress_tx, _) = broadcast::channel(64);

        Ok(Self {
            backend,
            routing,
            config,
            routes: Arc::new(RwLock::new(HashMap::new())),
            stops: Arc::new(RwLock::new(HashMap::new())),
            drivers: Arc::new(RwLock::new(HashMap::new())),
            cadets: Arc::new(RwLock::new(HashMap::new())),
            geometries: Arc::new(RwLock::new(HashMap::new())),
            last_sync: Arc::new(RwLock::new(None)),
            driver_updates_tx,
            geometry_progress_tx,
            cancel: CancelFlag::new(),
        })
    }

    pub fn route_store(&self) -> RouteStore {
        self.routes.clone()
    }

    pub fn stop_store(&self) -> StopStore {
        self.stops.clone()
    }

    pub fn driver_store(&self) -> DriverStore {
        self.drivers.clone()
    }

    pub fn cadet_store(&self) -> CadetStore {
        self.cadets.clone()
    }

    pub fn geometry_store(&self) -> GeometryStore {
        self.geometries.clone()
    }

    pub fn last_sync(&self) -> LastSync {
        self.last_sync.clone()
    }

    /// Get the driver updates sender for passing to API handlers
    pub fn driver_updates_sender(&self) -> DriverUpdateSender {
        self.driver_updates_tx.clone()
    }

    pub fn geometry_progress_sender(&self) -> GeometryProgressSender {
        self.geometry_progress_tx.clone()
    }

    /// Stop in-flight geometry runs; called on service shutdown
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Run the initial load and then the periodic refresh loop
    pub async fn start(self: Arc<Self>) {
        info!("Starting sync manager");

        // Initial load with backoff so a briefly unreachable backend does
        // not leave the first interval empty
        let sync_config = self.config.sync.clone();
        let initial = retry_with_backoff(
            || self.refresh_backend_data(),
            sync_config.initial_load_retries,
            Duration::from_millis(sync_config.initial_load_delay_ms),
        )
        .await;

        match initial {
            Ok(()) => self.refresh_geometries().await,
            Err(e) => {
                error!(error = %e, "Initial backend load failed, serving empty stores until next cycle")
            }
        }

        let mut interval = tokio::time::interval(Duration::from_secs(sync_config.interval_secs));
        // Skip the first tick which fires immediately (we already loaded above)
        interval.tick().await;

        loop {
            interval.tick().await;
            if self.cancel.is_cancelled() {
                info!("Sync manager stopped");
                return;
            }
            match self.refresh_backend_data().await {
                Ok(()) => self.refresh_geometries().await,
                Err(e) => warn!(error = %e, "Refresh cycle failed, keeping previous snapshot"),
            }
        }
    }

    /// Fetch all backend resources and replace the store snapshots.
    ///
    /// Routes are the backbone (they drive geometry), so a failed route
    /// fetch fails the cycle; the other resources degrade individually.
    async fn refresh_backend_data(&self) -> Result<(), SyncError> {
        let (routes, stops, drivers, cadets) = tokio::join!(
            self.backend.fetch_routes(),
            self.backend.fetch_stops(),
            self.backend.fetch_drivers(),
            self.backend.fetch_cadets(),
        );

        let routes = routes.map_err(|e| SyncError::Backend(e.to_string()))?;
        let route_count = routes.len();
        {
            let mut store = self.routes.write().await;
            *store = routes.into_iter().map(|r| (r.id, r)).collect();
        }

        match stops {
            Ok(stops) => {
                let mut store = self.stops.write().await;
                *store = stops.into_iter().map(|s| (s.id, s)).collect();
            }
            Err(e) => warn!(error = %e, "Failed to fetch stops, keeping previous data"),
        }

        match drivers {
            Ok(drivers) => {
                let mut store = self.drivers.write().await;
                *store = drivers.into_iter().map(|d| (d.id, d)).collect();
            }
            Err(e) => warn!(error = %e, "Failed to fetch drivers, keeping previous data"),
        }

        match cadets {
            Ok(cadets) => {
                let mut store = self.cadets.write().await;
                *store = cadets.into_iter().map(|c| (c.id, c)).collect();
            }
            Err(e) => warn!(error = %e, "Failed to fetch cadets, keeping previous data"),
        }

        {
            let mut last = self.last_sync.write().await;
            *last = Some(Utc::now());
        }

        info!(routes = route_count, "Refreshed backend data");
        Ok(())
    }

    /// Recompute geometries for routes whose stop list changed identity
    async fn refresh_geometries(&self) {
        let routes = {
            let store = self.routes.read().await;
            store.clone()
        };

        refresh_route_geometries(
            &self.routing,
            &routes,
            &self.geometries,
            &self.geometry_progress_tx,
            &self.cancel,
        )
        .await;
    }

    /// Relay a driver location push to the backend, refresh the driver's
    /// snapshot and broadcast the new position to live subscribers
    pub async fn push_driver_location(
        &self,
        driver_id: i64,
        lat: f64,
        lon: f64,
    ) -> Result<DriverPositionUpdate, BackendError> {
        self.backend.update_driver_location(driver_id, lat, lon).await?;

        // Re-fetch so the stored snapshot carries the backend's canonical
        // sample ids rather than ones invented here
        let driver = self.backend.fetch_driver(driver_id).await?;
        let route_id = driver.current_route.as_ref().map(|r| r.id);
        {
            let mut store = self.drivers.write().await;
            store.insert(driver.id, driver);
        }

        let update = DriverPositionUpdate {
            driver_id,
            route_id,
            lat,
            lon,
            timestamp: Utc::now().to_rfc3339(),
        };
        // Ignore send errors - they just mean no one is listening
        let _ = self.driver_updates_tx.send(update.clone());

        Ok(update)
    }
}

/// Walk the route snapshot and bring the geometry cache up to date.
///
/// Routes are processed in id order, one at a time (each aggregation is
/// itself sequential per leg). Unchanged stop lists reuse the cached
/// aggregate; vanished routes lose their cache entry.
async fn refresh_route_geometries(
    router: &dyn LegRouter,
    routes: &HashMap<i64, Route>,
    geometries: &GeometryStore,
    progress: &GeometryProgressSender,
    cancel: &CancelFlag,
) {
    let mut route_ids: Vec<i64> = routes.keys().copied().collect();
    route_ids.sort_unstable();

    let mut computed = 0usize;
    let mut reused = 0usize;

    for route_id in route_ids {
        let route = &routes[&route_id];
        let key = stop_list_key(&route.stops);

        let up_to_date = {
            let cache = geometries.read().await;
            cache.get(&route_id).map(|c| c.key == key).unwrap_or(false)
        };
        if up_to_date {
            reused += 1;
            continue;
        }

        match aggregate_route_geometry(router, route_id, &route.stops, progress, cancel).await {
            Some(geometry) => {
                if geometry.legs_failed > 0 {
                    warn!(
                        route_id,
                        legs_failed = geometry.legs_failed,
                        legs_total = geometry.legs_total,
                        "Route geometry is partial"
                    );
                }
                let mut cache = geometries.write().await;
                cache.insert(
                    route_id,
                    CachedGeometry {
                        key,
                        geometry,
                        computed_at: Utc::now(),
                    },
                );
                computed += 1;
            }
            None => {
                info!(route_id, "Geometry refresh cancelled");
                return;
            }
        }
    }

    // Drop cache entries for routes that no longer exist
    {
        let mut cache = geometries.write().await;
        cache.retain(|route_id, _| routes.contains_key(route_id));
    }

    info!(computed, reused, "Refreshed route geometries");
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Backend fetch error: {0}")]
    Backend(String),
    #[error("Client error: {0}")]
    Client(String),
}
