//! Client for the OSRM-compatible routing service.
//!
//! One driving-route request per stop pair. The service expects coordinates
//! as `longitude,latitude` pairs, swapped relative to the internal
//! latitude-first representation; the swap happens exactly once, here.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::RoutingConfig;

pub const ROUTE_API_PATH: &str = "/route/v1/driving/";

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("No route in response")]
    NoRoute,
}

/// A latitude/longitude pair in degrees, latitude first
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// One driving leg as returned by the routing service, decoded
#[derive(Debug, Clone, PartialEq)]
pub struct DrivingRoute {
    /// Path points in travel order
    pub points: Vec<GeoPoint>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

/// Source of driving-route legs. The production impl talks to the routing
/// service; tests script legs directly.
#[async_trait]
pub trait LegRouter: Send + Sync {
    async fn driving_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<DrivingRoute, RoutingError>;
}

pub struct RoutingClient {
    client: Client,
    base_url: String,
}

impl RoutingClient {
    pub fn new(config: &RoutingConfig) -> Result<Self, RoutingError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RoutingError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl LegRouter for RoutingClient {
    async fn driving_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<DrivingRoute, RoutingError> {
        let request_id = Uuid::new_v4();
        let url = leg_url(&self.base_url, origin, destination);
        let start = Instant::now();

        tracing::debug!(%request_id, %url, "Routing request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RoutingError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();
        tracing::debug!(
            %request_id,
            status,
            duration_ms = start.elapsed().as_millis() as u64,
            "Routing response"
        );

        if !response.status().is_success() {
            return Err(RoutingError::ApiError(format!("HTTP error: {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RoutingError::NetworkError(e.to_string()))?;

        let parsed: RouteResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(
                %request_id,
                error = %e,
                body = &body[..body.len().min(500)],
                "Failed to parse routing response"
            );
            RoutingError::ParseError(e.to_string())
        })?;

        let route = parsed.routes.into_iter().next().ok_or(RoutingError::NoRoute)?;
        let points = decode_geometry(&route.geometry)?;

        Ok(DrivingRoute {
            points,
            distance_meters: route.distance,
            duration_seconds: route.duration,
        })
    }
}

/// Build the per-leg request URL. The routing service wants longitude first.
fn leg_url(base_url: &str, origin: GeoPoint, destination: GeoPoint) -> String {
    format!(
        "{}{}{},{};{},{}?overview=full",
        base_url, ROUTE_API_PATH, origin.lon, origin.lat, destination.lon, destination.lat
    )
}

/// Decode an encoded polyline into latitude-first points.
///
/// The decoder yields x=longitude / y=latitude coordinates; the mapping back
/// to latitude-first is done field by field so the axes can never drift.
fn decode_geometry(geometry: &str) -> Result<Vec<GeoPoint>, RoutingError> {
    let line: geo_types::LineString<f64> = polyline::decode_polyline(geometry, 5)
        .map_err(|e| RoutingError::ParseError(e.to_string()))?;

    Ok(line
        .coords()
        .map(|c| GeoPoint { lat: c.y, lon: c.x })
        .collect())
}

// Response structures

#[derive(Debug, Deserialize)]
struct RouteResponse {
    #[serde(default)]
    routes: Vec<RouteLegResponse>,
}

#[derive(Debug, Deserialize)]
struct RouteLegResponse {
    /// Encoded polyline for the leg path
    geometry: String,
    /// Meters
    distance: f64,
    /// Seconds
    duration: f64,
}
