//! Type definitions for the sync module.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use utoipa::ToSchema;

use super::geometry::{RouteGeometry, StopListKey};
use crate::providers::backend::{Cadet, Driver, MiniBusStop, Route};

/// In-memory snapshot stores, replaced wholesale on each refresh cycle
pub type RouteStore = Arc<RwLock<HashMap<i64, Route>>>;
pub type StopStore = Arc<RwLock<HashMap<i64, MiniBusStop>>>;
pub type DriverStore = Arc<RwLock<HashMap<i64, Driver>>>;
pub type CadetStore = Arc<RwLock<HashMap<i64, Cadet>>>;

/// A computed aggregate geometry plus the stop-list identity it was
/// computed for; a changed identity invalidates the entry
#[derive(Debug, Clone)]
pub struct CachedGeometry {
    pub key: StopListKey,
    pub geometry: RouteGeometry,
    pub computed_at: DateTime<Utc>,
}

pub type GeometryStore = Arc<RwLock<HashMap<i64, CachedGeometry>>>;

/// When the last successful backend refresh finished
pub type LastSync = Arc<RwLock<Option<DateTime<Utc>>>>;

/// Live driver position update, broadcast to WebSocket subscribers
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DriverPositionUpdate {
    pub driver_id: i64,
    /// Route the driver is currently assigned to, if any
    pub route_id: Option<i64>,
    pub lat: f64,
    pub lon: f64,
    /// RFC 3339 receive time stamped by this service
    pub timestamp: String,
}

/// Sender for driver position updates
pub type DriverUpdateSender = broadcast::Sender<DriverPositionUpdate>;
