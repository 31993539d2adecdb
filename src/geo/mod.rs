use crate::models::booking::LngLat;

const EARTH_RADIUS_KM: f64 = 6_371.0;
const AVERAGE_SPEED_KMH: f64 = 30.0;

pub fn haversine_km(a: &LngLat, b: &LngLat) -> f64 {
    let lat1 = a.lat().to_radians();
    let lat2 = b.lat().to_radians();
    let delta_lat = (b.lat() - a.lat()).to_radians();
    let delta_lng = (b.lng() - a.lng()).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn haversine_m(a: &LngLat, b: &LngLat) -> f64 {
    haversine_km(a, b) * 1_000.0
}

/// Minutes to cover the great-circle distance at the assumed average speed,
/// never below one minute.
pub fn eta_minutes(from: &LngLat, to: &LngLat) -> i64 {
    let distance_km = haversine_km(from, to);
    let minutes = (distance_km / AVERAGE_SPEED_KMH * 60.0).round() as i64;
    minutes.max(1)
}
