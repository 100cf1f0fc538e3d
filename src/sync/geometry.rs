//! Route geometry aggregation.
//!
//! Turns a route's ordered stop list into a single drawable path with
//! summary distance/duration by stitching together one routing-service leg
//! per consecutive stop pair. Legs are fetched strictly one at a time; the
//! concatenation order of leg points is the travel order and must never be
//! reordered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use utoipa::ToSchema;

use crate::providers::backend::MiniBusStop;
use crate::providers::routing::{GeoPoint, LegRouter};

/// Progress event emitted once per leg while a route geometry is computed.
/// Observational only; nothing reads it back into the computation.
#[derive(Debug, Clone, Serialize)]
pub struct GeometryProgress {
    pub route_id: i64,
    pub leg: usize,
    pub legs_total: usize,
    /// Human-readable form, e.g. "leg 2 of 4"
    pub message: String,
}

pub type GeometryProgressSender = broadcast::Sender<GeometryProgress>;

/// Cancellation flag for an in-flight aggregation run.
///
/// Checked before each leg is fetched and again before its result is
/// appended, so a cancelled run never updates state it no longer owns.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Aggregated drawable geometry for one route
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RouteGeometry {
    /// Path points in travel order, legs concatenated without deduplication
    pub points: Vec<GeoPoint>,
    pub distance_km: f64,
    pub duration_minutes: f64,
    /// Legs attempted (mappable stops minus one; zero when not computable)
    pub legs_total: usize,
    /// Legs that failed and contributed nothing
    pub legs_failed: usize,
}

impl RouteGeometry {
    pub fn empty() -> Self {
        Self {
            points: Vec::new(),
            distance_km: 0.0,
            duration_minutes: 0.0,
            legs_total: 0,
            legs_failed: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Identity of a route's stop list, used to decide when a cached geometry
/// must be recomputed. Coordinates are compared bit-exact.
pub type StopListKey = Vec<(i64, Option<(u64, u64)>)>;

pub fn stop_list_key(stops: &[MiniBusStop]) -> StopListKey {
    stops
        .iter()
        .map(|s| {
            let coords = match (s.latitude, s.longitude) {
                (Some(lat), Some(lon)) => Some((lat.to_bits(), lon.to_bits())),
                _ => None,
            };
            (s.id, coords)
        })
        .collect()
}

/// Compute the aggregate geometry for a route.
///
/// Stops without coordinates are skipped (original order preserved); with
/// fewer than two mappable stops the empty geometry is returned without any
/// routing request. A failed leg is logged and skipped, and the remaining
/// legs still contribute. Returns `None` when the run was cancelled, in
/// which case nothing should be stored.
pub async fn aggregate_route_geometry(
    router: &dyn LegRouter,
    route_id: i64,
    stops: &[MiniBusStop],
    progress: &GeometryProgressSender,
    cancel: &CancelFlag,
) -> Option<RouteGeometry> {
    let waypoints: Vec<GeoPoint> = stops
        .iter()
        .filter_map(|s| match (s.latitude, s.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint { lat, lon }),
            _ => None,
        })
        .collect();

    if waypoints.len() < 2 {
        return Some(RouteGeometry::empty());
    }

    let legs_total = waypoints.len() - 1;
    let mut geometry = RouteGeometry::empty();
    geometry.legs_total = legs_total;

    for (i, pair) in waypoints.windows(2).enumerate() {
        if cancel.is_cancelled() {
            tracing::debug!(route_id, "Geometry run cancelled");
            return None;
        }

        let leg = i + 1;
        // Ignore send errors - they just mean no one is listening
        let _ = progress.send(GeometryProgress {
            route_id,
            leg,
            legs_total,
            message: format!("leg {} of {}", leg, legs_total),
        });

        match router.driving_route(pair[0], pair[1]).await {
            Ok(driving) => {
                if cancel.is_cancelled() {
                    tracing::debug!(route_id, "Geometry run cancelled mid-leg");
                    return None;
                }
                geometry.points.extend(driving.points);
                geometry.distance_km += driving.distance_meters / 1000.0;
                geometry.duration_minutes += driving.duration_seconds / 60.0;
            }
            Err(e) => {
                geometry.legs_failed += 1;
                tracing::warn!(route_id, leg, legs_total, error = %e, "Failed to compute leg, skipping");
            }
        }
    }

    Some(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::routing::{DrivingRoute, RoutingError};
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct ScriptedRouter {
        legs: Mutex<VecDeque<Result<DrivingRoute, RoutingError>>>,
        calls: AtomicUsize,
        cancel_during_call: Option<CancelFlag>,
    }

    impl ScriptedRouter {
        fn new(legs: Vec<Result<DrivingRoute, RoutingError>>) -> Self {
            Self {
                legs: Mutex::new(legs.into()),
                calls: AtomicUsize::new(0),
                cancel_during_call: None,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl LegRouter for ScriptedRouter {
        async fn driving_route(
            &self,
            _origin: GeoPoint,
            _destination: GeoPoint,
        ) -> Result<DrivingRoute, RoutingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(flag) = &self.cancel_during_call {
                flag.cancel();
            }
            self.legs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(RoutingError::NoRoute))
        }
    }

    fn stop(id: i64, lat: Option<f64>, lon: Option<f64>) -> MiniBusStop {
        MiniBusStop {
            id,
            stop_name: None,
            district: None,
            latitude: lat,
            longitude: lon,
            cadetes: vec![],
        }
    }

    fn leg(points: &[(f64, f64)], meters: f64, seconds: f64) -> Result<DrivingRoute, RoutingError> {
        Ok(DrivingRoute {
            points: points.iter().map(|&(lat, lon)| GeoPoint { lat, lon }).collect(),
            distance_meters: meters,
            duration_seconds: seconds,
        })
    }

    fn progress_channel() -> (GeometryProgressSender, broadcast::Receiver<GeometryProgress>) {
        broadcast::channel(16)
    }

    #[tokio::test]
    async fn test_fewer_than_two_mappable_stops_is_empty_without_requests() {
        let router = ScriptedRouter::new(vec![]);
        let (tx, _rx) = progress_channel();
        let cancel = CancelFlag::new();

        for stops in [
            vec![],
            vec![stop(1, Some(-8.84), Some(13.23))],
            // Two stops, but only one mappable
            vec![stop(1, Some(-8.84), Some(13.23)), stop(2, None, None)],
        ] {
            let geometry = aggregate_route_geometry(&router, 3, &stops, &tx, &cancel)
                .await
                .unwrap();
            assert!(geometry.is_empty());
            assert_eq!(geometry.distance_km, 0.0);
            assert_eq!(geometry.duration_minutes, 0.0);
            assert_eq!(geometry.legs_total, 0);
        }

        assert_eq!(router.call_count(), 0);
    }

    #[tokio::test]
    async fn test_legs_concatenate_in_travel_order_without_dedup() {
        // Leg 1 ends where leg 2 starts; the shared point appears twice
        let router = ScriptedRouter::new(vec![
            leg(&[(-8.84, 13.23), (-8.85, 13.24)], 1500.0, 60.0),
            leg(&[(-8.85, 13.24), (-8.86, 13.25)], 2500.0, 120.0),
        ]);
        let (tx, _rx) = progress_channel();
        let cancel = CancelFlag::new();
        let stops = vec![
            stop(1, Some(-8.84), Some(13.23)),
            stop(2, Some(-8.85), Some(13.24)),
            stop(3, Some(-8.86), Some(13.25)),
        ];

        let geometry = aggregate_route_geometry(&router, 3, &stops, &tx, &cancel)
            .await
            .unwrap();

        assert_eq!(router.call_count(), 2);
        assert_eq!(
            geometry.points,
            vec![
                GeoPoint { lat: -8.84, lon: 13.23 },
                GeoPoint { lat: -8.85, lon: 13.24 },
                GeoPoint { lat: -8.85, lon: 13.24 },
                GeoPoint { lat: -8.86, lon: 13.25 },
            ]
        );
        assert_eq!(geometry.distance_km, 4.0);
        assert_eq!(geometry.duration_minutes, 3.0);
        assert_eq!(geometry.legs_total, 2);
        assert_eq!(geometry.legs_failed, 0);
    }

    #[tokio::test]
    async fn test_unmappable_stops_are_skipped_in_order() {
        let router = ScriptedRouter::new(vec![leg(&[(-8.84, 13.23), (-8.86, 13.25)], 3000.0, 180.0)]);
        let (tx, _rx) = progress_channel();
        let cancel = CancelFlag::new();
        // The middle stop has no coordinates; a single leg bridges around it
        let stops = vec![
            stop(1, Some(-8.84), Some(13.23)),
            stop(2, None, None),
            stop(3, Some(-8.86), Some(13.25)),
        ];

        let geometry = aggregate_route_geometry(&router, 3, &stops, &tx, &cancel)
            .await
            .unwrap();

        assert_eq!(router.call_count(), 1);
        assert_eq!(geometry.legs_total, 1);
        assert_eq!(geometry.points.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_middle_leg_is_skipped_and_rest_survives() {
        let router = ScriptedRouter::new(vec![
            leg(&[(1.0, 1.0), (2.0, 2.0)], 1000.0, 60.0),
            Err(RoutingError::ApiError("HTTP error: 503".to_string())),
            leg(&[(3.0, 3.0), (4.0, 4.0)], 2000.0, 120.0),
        ]);
        let (tx, _rx) = progress_channel();
        let cancel = CancelFlag::new();
        let stops = vec![
            stop(1, Some(1.0), Some(1.0)),
            stop(2, Some(2.0), Some(2.0)),
            stop(3, Some(3.0), Some(3.0)),
            stop(4, Some(4.0), Some(4.0)),
        ];

        let geometry = aggregate_route_geometry(&router, 3, &stops, &tx, &cancel)
            .await
            .unwrap();

        assert_eq!(router.call_count(), 3);
        // Only the first and third legs contribute points and totals
        assert_eq!(
            geometry.points,
            vec![
                GeoPoint { lat: 1.0, lon: 1.0 },
                GeoPoint { lat: 2.0, lon: 2.0 },
                GeoPoint { lat: 3.0, lon: 3.0 },
                GeoPoint { lat: 4.0, lon: 4.0 },
            ]
        );
        assert_eq!(geometry.distance_km, 3.0);
        assert_eq!(geometry.duration_minutes, 3.0);
        assert_eq!(geometry.legs_total, 3);
        assert_eq!(geometry.legs_failed, 1);
    }

    #[tokio::test]
    async fn test_progress_is_emitted_per_leg() {
        let router = ScriptedRouter::new(vec![
            leg(&[(1.0, 1.0)], 100.0, 10.0),
            leg(&[(2.0, 2.0)], 100.0, 10.0),
        ]);
        let (tx, mut rx) = progress_channel();
        let cancel = CancelFlag::new();
        let stops = vec![
            stop(1, Some(1.0), Some(1.0)),
            stop(2, Some(2.0), Some(2.0)),
            stop(3, Some(3.0), Some(3.0)),
        ];

        aggregate_route_geometry(&router, 7, &stops, &tx, &cancel)
            .await
            .unwrap();

        let first = rx.try_recv().unwrap();
        assert_eq!(first.route_id, 7);
        assert_eq!(first.message, "leg 1 of 2");
        let second = rx.try_recv().unwrap();
        assert_eq!(second.message, "leg 2 of 2");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_makes_no_requests() {
        let router = ScriptedRouter::new(vec![leg(&[(1.0, 1.0)], 100.0, 10.0)]);
        let (tx, _rx) = progress_channel();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let stops = vec![stop(1, Some(1.0), Some(1.0)), stop(2, Some(2.0), Some(2.0))];

        let result = aggregate_route_geometry(&router, 3, &stops, &tx, &cancel).await;

        assert!(result.is_none());
        assert_eq!(router.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_mid_leg_discards_the_run() {
        let cancel = CancelFlag::new();
        let mut router = ScriptedRouter::new(vec![leg(&[(1.0, 1.0)], 100.0, 10.0)]);
        router.cancel_during_call = Some(cancel.clone());
        let (tx, _rx) = progress_channel();
        let stops = vec![stop(1, Some(1.0), Some(1.0)), stop(2, Some(2.0), Some(2.0))];

        // The flag flips while the leg request is in flight; its result
        // must not be appended
        let result = aggregate_route_geometry(&router, 3, &stops, &tx, &cancel).await;

        assert!(result.is_none());
        assert_eq!(router.call_count(), 1);
    }

    #[test]
    fn test_stop_list_key_tracks_identity() {
        let stops = vec![
            stop(1, Some(-8.84), Some(13.23)),
            stop(2, None, None),
        ];
        let key = stop_list_key(&stops);

        assert_eq!(key, stop_list_key(&stops));

        // Coordinate change
        let mut moved = stops.clone();
        moved[0].latitude = Some(-8.85);
        assert_ne!(key, stop_list_key(&moved));

        // A stop gaining coordinates
        let mut mapped = stops.clone();
        mapped[1].latitude = Some(-8.9);
        mapped[1].longitude = Some(13.3);
        assert_ne!(key, stop_list_key(&mapped));

        // Reordering
        let mut reordered = stops.clone();
        reordered.reverse();
        assert_ne!(key, stop_list_key(&reordered));

        // Renaming does not change identity
        let mut renamed = stops.clone();
        renamed[0].stop_name = Some("Novo nome".to_string());
        assert_eq!(key, stop_list_key(&renamed));
    }
}
