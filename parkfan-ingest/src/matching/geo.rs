//! Great-circle distance and linear-decay geo similarity

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Beyond this distance a hemisphere sign error upstream is suspected
pub const SIGN_FLIP_THRESHOLD_KM: f64 = 1000.0;

/// Haversine distance between two (lat, lon) points in kilometres
pub fn haversine_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Distance that tolerates a flipped longitude sign on the second point
///
/// Some upstreams publish western-hemisphere parks with a positive longitude.
/// When the raw distance exceeds 1000 km the flipped variant is also tried
/// and the smaller distance wins.
pub fn corrected_distance_km(a: (f64, f64), b: (f64, f64)) -> f64 {
    let raw = haversine_km(a, b);
    if raw > SIGN_FLIP_THRESHOLD_KM {
        raw.min(haversine_km(a, (b.0, -b.1)))
    } else {
        raw
    }
}

/// 1.0 at zero distance, falling linearly to 0.0 at `threshold_km`
pub fn linear_decay(distance_km: f64, threshold_km: f64) -> f64 {
    if threshold_km <= 0.0 {
        return 0.0;
    }
    (1.0 - distance_km / threshold_km).clamp(0.0, 1.0)
}
