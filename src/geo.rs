//! Pure coordinate math and formatting helpers. No I/O.

use crate::providers::backend::MiniBusStop;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Assumed average minibus speed when the caller has nothing better (km/h)
pub const DEFAULT_AVERAGE_SPEED_KMH: f64 = 40.0;

/// Great-circle distance between two points using the haversine formula.
///
/// Inputs are degrees; output is kilometers rounded to two decimal places.
pub fn haversine_distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    let distance = EARTH_RADIUS_KM * c;

    (distance * 100.0).round() / 100.0
}

/// The stop closest to a query point, with its distance.
#[derive(Debug, Clone)]
pub struct NearestStop<'a> {
    pub stop: &'a MiniBusStop,
    pub distance_km: f64,
}

/// Find the stop nearest to the given position.
///
/// Stops without both coordinates are skipped. Returns `None` when no stop
/// is mappable. On equal distances the first stop encountered wins.
pub fn find_nearest_stop<'a>(
    lat: f64,
    lon: f64,
    stops: &'a [MiniBusStop],
) -> Option<NearestStop<'a>> {
    let mut nearest: Option<NearestStop<'a>> = None;

    for stop in stops {
        let (stop_lat, stop_lon) = match (stop.latitude, stop.longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => continue,
        };

        let distance_km = haversine_distance_km(lat, lon, stop_lat, stop_lon);
        match &nearest {
            Some(current) if current.distance_km <= distance_km => {}
            _ => nearest = Some(NearestStop { stop, distance_km }),
        }
    }

    nearest
}

/// Estimated travel time in whole minutes for a distance at an average speed.
pub fn estimate_eta_minutes(distance_km: f64, average_speed_kmh: f64) -> u32 {
    let hours = distance_km / average_speed_kmh;
    (hours * 60.0).round() as u32
}

/// Format an ETA in minutes for display, e.g. "45 min", "1h 30min", "2h".
pub fn format_eta(minutes: u32) -> String {
    if minutes < 60 {
        return format!("{} min", minutes);
    }

    let hours = minutes / 60;
    let mins = minutes % 60;

    if mins > 0 {
        format!("{}h {}min", hours, mins)
    } else {
        format!("{}h", hours)
    }
}

/// Whether a latitude/longitude pair is within valid bounds.
///
/// Reports validity only; callers reject invalid coordinates before using
/// them in distance or ETA calculations.
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

/// Format a phone number for display, e.g. "+244 923 456 789".
///
/// Numbers not carrying the Angolan country prefix are shown as-is.
pub fn format_phone_number(phone: Option<i64>) -> String {
    let phone = match phone {
        Some(p) => p,
        None => return "N/A".to_string(),
    };

    let digits = phone.to_string();
    if digits.starts_with("244") && digits.len() >= 9 {
        format!(
            "+{} {} {} {}",
            &digits[0..3],
            &digits[3..6],
            &digits[6..9],
            &digits[9..]
        )
        .trim_end()
        .to_string()
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: i64, lat: Option<f64>, lon: Option<f64>) -> MiniBusStop {
        MiniBusStop {
            id,
            stop_name: Some(format!("Stop {}", id)),
            district: None,
            latitude: lat,
            longitude: lon,
            cadetes: vec![],
        }
    }

    #[test]
    fn test_haversine_known_luanda_pair() {
        // Mutamba <-> Benfica, just under 12 km apart
        let d = haversine_distance_km(-8.8383, 13.2344, -8.9334, 13.1897);
        assert!((d - 11.66).abs() < 0.5, "got {}", d);
    }

    #[test]
    fn test_haversine_symmetry_and_identity() {
        let d1 = haversine_distance_km(-8.8383, 13.2344, -8.9334, 13.1897);
        let d2 = haversine_distance_km(-8.9334, 13.1897, -8.8383, 13.2344);
        assert_eq!(d1, d2);
        assert_eq!(haversine_distance_km(-8.8383, 13.2344, -8.8383, 13.2344), 0.0);
    }

    #[test]
    fn test_haversine_rounds_to_two_decimals() {
        let d = haversine_distance_km(0.0, 0.0, 0.5, 0.5);
        assert_eq!((d * 100.0).round() / 100.0, d);
    }

    #[test]
    fn test_nearest_stop_exact_match_wins() {
        let stops = vec![
            stop(1, Some(-8.9), Some(13.3)),
            stop(2, Some(-8.8383), Some(13.2344)),
            stop(3, Some(-8.7), Some(13.1)),
        ];
        let nearest = find_nearest_stop(-8.8383, 13.2344, &stops).unwrap();
        assert_eq!(nearest.stop.id, 2);
        assert_eq!(nearest.distance_km, 0.0);
    }

    #[test]
    fn test_nearest_stop_skips_unmappable() {
        let stops = vec![
            stop(1, None, Some(13.3)),
            stop(2, Some(-8.9), None),
            stop(3, Some(-8.85), Some(13.24)),
        ];
        let nearest = find_nearest_stop(-8.8383, 13.2344, &stops).unwrap();
        assert_eq!(nearest.stop.id, 3);
    }

    #[test]
    fn test_nearest_stop_none_for_empty_or_unmappable() {
        assert!(find_nearest_stop(-8.8, 13.2, &[]).is_none());

        let stops = vec![stop(1, None, None), stop(2, Some(-8.9), None)];
        assert!(find_nearest_stop(-8.8, 13.2, &stops).is_none());
    }

    #[test]
    fn test_nearest_stop_tie_keeps_first() {
        // Two stops at the same coordinates; the first in iteration order wins
        let stops = vec![stop(7, Some(-8.85), Some(13.24)), stop(8, Some(-8.85), Some(13.24))];
        let nearest = find_nearest_stop(-8.8, 13.2, &stops).unwrap();
        assert_eq!(nearest.stop.id, 7);
    }

    #[test]
    fn test_estimate_eta_minutes() {
        assert_eq!(estimate_eta_minutes(40.0, 40.0), 60);
        assert_eq!(estimate_eta_minutes(10.0, 40.0), 15);
        assert_eq!(estimate_eta_minutes(0.0, 40.0), 0);
        // 12.5 km at 40 km/h = 18.75 min, rounds to 19
        assert_eq!(estimate_eta_minutes(12.5, 40.0), 19);
    }

    #[test]
    fn test_format_eta() {
        assert_eq!(format_eta(45), "45 min");
        assert_eq!(format_eta(90), "1h 30min");
        assert_eq!(format_eta(120), "2h");
        assert_eq!(format_eta(0), "0 min");
        assert_eq!(format_eta(59), "59 min");
        assert_eq!(format_eta(60), "1h");
    }

    #[test]
    fn test_is_valid_coordinate() {
        assert!(is_valid_coordinate(-8.8, 13.2));
        assert!(is_valid_coordinate(90.0, 180.0));
        assert!(is_valid_coordinate(-90.0, -180.0));
        assert!(!is_valid_coordinate(91.0, 0.0));
        assert!(!is_valid_coordinate(45.0, 200.0));
        assert!(!is_valid_coordinate(-95.0, 0.0));
        assert!(!is_valid_coordinate(0.0, -181.0));
    }

    #[test]
    fn test_format_phone_number() {
        assert_eq!(format_phone_number(Some(244923456789)), "+244 923 456 789");
        assert_eq!(format_phone_number(Some(923456789)), "923456789");
        assert_eq!(format_phone_number(None), "N/A");
    }
}
