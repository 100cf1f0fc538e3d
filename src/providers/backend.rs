//! Client for the transport backend REST API.
//!
//! The backend owns all master data (routes, stops, drivers, cadets) and is
//! consumed read-only here, except for the driver location push relay. The
//! client is constructed explicitly from config; there is no process-wide
//! instance.

use std::time::{Duration, Instant};

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::BackendConfig;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },
}

/// Typed client for the transport backend
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BackendError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// All routes with their stops and drivers
    pub async fn fetch_routes(&self) -> Result<Vec<Route>, BackendError> {
        self.get_json("/routes").await
    }

    /// All minibus stops, including ones not on any route
    pub async fn fetch_stops(&self) -> Result<Vec<MiniBusStop>, BackendError> {
        self.get_json("/minibusstops").await
    }

    /// All drivers with their location history
    pub async fn fetch_drivers(&self) -> Result<Vec<Driver>, BackendError> {
        self.get_json("/drivers").await
    }

    /// A single driver by id
    pub async fn fetch_driver(&self, id: i64) -> Result<Driver, BackendError> {
        self.get_json(&format!("/driver/{}", id)).await
    }

    /// All cadets with their assigned stop
    pub async fn fetch_cadets(&self) -> Result<Vec<Cadet>, BackendError> {
        self.get_json("/cadetes").await
    }

    /// Relay a driver location sample to the backend
    pub async fn update_driver_location(
        &self,
        driver_id: i64,
        lat: f64,
        lon: f64,
    ) -> Result<(), BackendError> {
        let request_id = Uuid::new_v4();
        let url = format!("{}/driver/location/socket/{}", self.base_url, driver_id);
        let body = UpdateDriverLocationRequest { lat, long: lon };
        let start = Instant::now();

        tracing::debug!(%request_id, %url, "Backend request: PUT");

        let response = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();
        tracing::debug!(
            %request_id,
            status,
            duration_ms = start.elapsed().as_millis() as u64,
            "Backend response"
        );

        if !response.status().is_success() {
            return Err(BackendError::ApiError {
                status,
                message: status_message(status).to_string(),
            });
        }

        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let request_id = Uuid::new_v4();
        let url = format!("{}{}", self.base_url, path);
        let start = Instant::now();

        tracing::debug!(%request_id, %url, "Backend request: GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;

        let status = response.status().as_u16();
        tracing::debug!(
            %request_id,
            status,
            duration_ms = start.elapsed().as_millis() as u64,
            "Backend response"
        );

        if !response.status().is_success() {
            return Err(BackendError::ApiError {
                status,
                message: status_message(status).to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::NetworkError(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(
                %request_id,
                error = %e,
                body = &body[..body.len().min(500)],
                "Failed to parse backend response"
            );
            BackendError::ParseError(e.to_string())
        })
    }
}

fn status_message(status: u16) -> &'static str {
    match status {
        401 => "Unauthorized - please login again",
        404 => "Resource not found",
        500..=599 => "Server error - please try again later",
        _ => "Unexpected response",
    }
}

// Wire shapes. Optional fields are genuinely nullable on the wire; nested
// back-references are shallow so the object graph stays acyclic.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: i64,
    pub route_name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub stops: Vec<MiniBusStop>,
    #[serde(default)]
    pub drivers: Vec<Driver>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiniBusStop {
    pub id: i64,
    pub stop_name: Option<String>,
    /// District name; the backend spells the field "distrit"
    #[serde(rename = "distrit")]
    pub district: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub cadetes: Vec<CadetRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: i64,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub phone: Option<i64>,
    /// Location history, oldest first; the newest sample is the last entry
    #[serde(default)]
    pub coordinates: Vec<DriverCoordinates>,
    pub current_route: Option<RouteRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverCoordinates {
    pub id: i64,
    pub lat: f64,
    #[serde(rename = "long")]
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cadet {
    pub id: i64,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub city: Option<String>,
    #[serde(rename = "distrit")]
    pub district: Option<String>,
    pub phone: Option<i64>,
    pub stop: Option<StopRef>,
}

/// Shallow route back-pointer (lookup key, not ownership)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRef {
    pub id: i64,
    pub route_name: String,
}

/// Shallow stop back-pointer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopRef {
    pub id: i64,
    pub stop_name: Option<String>,
}

/// Shallow cadet reference as embedded in a stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CadetRef {
    pub id: i64,
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdateDriverLocationRequest {
    lat: f64,
    long: f64,
}

impl Route {
    /// A route is active when one of its drivers currently points back at it
    pub fn is_active(&self) -> bool {
        self.drivers
            .iter()
            .any(|d| d.current_route.as_ref().map(|r| r.id) == Some(self.id))
    }

    /// Total cadets assigned across the route's stops
    pub fn cadet_count(&self) -> usize {
        self.stops.iter().map(|s| s.cadetes.len()).sum()
    }

    /// Occupancy as a percentage of the given bus capacity
    pub fn occupancy_percent(&self, bus_capacity: usize) -> u32 {
        if bus_capacity == 0 {
            return 0;
        }
        ((self.cadet_count() as f64 / bus_capacity as f64) * 100.0).round() as u32
    }
}

impl Driver {
    /// The newest location sample, if the driver has ever reported one
    pub fn latest_position(&self) -> Option<&DriverCoordinates> {
        self.coordinates.last()
    }

    /// A driver is online when it has at least one location sample.
    /// The wire samples carry no timestamps, so liveness is presence-based.
    pub fn is_online(&self) -> bool {
        !self.coordinates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver_on_route(route_id: i64) -> Driver {
        Driver {
            id: 1,
            full_name: Some("João Manuel".to_string()),
            username: None,
            email: None,
            photo: None,
            phone: Some(244923456789),
            coordinates: vec![],
            current_route: Some(RouteRef {
                id: route_id,
                route_name: "Rota Norte".to_string(),
            }),
        }
    }

    #[test]
    fn test_route_parses_backend_shape() {
        let json = r#"{
            "id": 3,
            "route_name": "Rota Norte",
            "description": null,
            "stops": [
                {
                    "id": 10,
                    "stop_name": "Mutamba",
                    "distrit": "Ingombota",
                    "latitude": -8.8383,
                    "longitude": 13.2344,
                    "cadetes": [{"id": 5, "full_name": "Ana"}]
                },
                {
                    "id": 11,
                    "stop_name": null,
                    "distrit": null,
                    "latitude": null,
                    "longitude": null
                }
            ],
            "drivers": []
        }"#;

        let route: Route = serde_json::from_str(json).unwrap();
        assert_eq!(route.id, 3);
        assert_eq!(route.stops.len(), 2);
        assert_eq!(route.stops[0].district.as_deref(), Some("Ingombota"));
        assert_eq!(route.stops[0].cadetes.len(), 1);
        assert!(route.stops[1].latitude.is_none());
        assert!(route.stops[1].cadetes.is_empty());
    }

    #[test]
    fn test_driver_parses_shallow_route_ref() {
        // The backend nests a full route under current_route; only the
        // reference fields are kept
        let json = r#"{
            "id": 1,
            "full_name": "João Manuel",
            "username": "jmanuel",
            "email": null,
            "photo": null,
            "phone": 244923456789,
            "coordinates": [
                {"id": 1, "lat": -8.84, "long": 13.23},
                {"id": 2, "lat": -8.85, "long": 13.24}
            ],
            "current_route": {"id": 3, "route_name": "Rota Norte", "stops": [], "drivers": []}
        }"#;

        let driver: Driver = serde_json::from_str(json).unwrap();
        assert_eq!(driver.current_route.as_ref().unwrap().id, 3);
        let latest = driver.latest_position().unwrap();
        assert_eq!(latest.lat, -8.85);
        assert_eq!(latest.lon, 13.24);
        assert!(driver.is_online());
    }

    #[test]
    fn test_route_activity_and_occupancy() {
        let mut route = Route {
            id: 3,
            route_name: "Rota Norte".to_string(),
            description: None,
            stops: vec![
                MiniBusStop {
                    id: 10,
                    stop_name: Some("Mutamba".to_string()),
                    district: None,
                    latitude: None,
                    longitude: None,
                    cadetes: vec![
                        CadetRef { id: 1, full_name: None },
                        CadetRef { id: 2, full_name: None },
                    ],
                },
                MiniBusStop {
                    id: 11,
                    stop_name: None,
                    district: None,
                    latitude: None,
                    longitude: None,
                    cadetes: vec![CadetRef { id: 3, full_name: None }],
                },
            ],
            drivers: vec![],
        };

        assert!(!route.is_active());
        assert_eq!(route.cadet_count(), 3);
        // 3 of 35 seats
        assert_eq!(route.occupancy_percent(35), 9);
        assert_eq!(route.occupancy_percent(0), 0);

        route.drivers.push(driver_on_route(3));
        assert!(route.is_active());

        route.drivers[0].current_route = Some(RouteRef {
            id: 99,
            route_name: "Outra".to_string(),
        });
        assert!(!route.is_active());
    }

    #[test]
    fn test_driver_without_samples_is_offline() {
        let mut driver = driver_on_route(3);
        driver.coordinates.clear();
        assert!(!driver.is_online());
        assert!(driver.latest_position().is_none());
    }
}
