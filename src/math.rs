//! Web-Mercator helpers.
//!
//! Map space is EPSG:3857: meters at the equator, stretched by
//! `1 / cos(latitude)` everywhere else.

use nalgebra as na;

pub const EARTH_RADIUS: f64 = 6_378_137.0;

pub const TILE_SIZE: f64 = 256.0;

/// Map-space distance from the projection's center to its edges.
pub const ORIGIN_SHIFT: f64 = std::f64::consts::PI * EARTH_RADIUS;

pub fn lat_lon_to_mercator(lat_deg: f64, lon_deg: f64) -> na::Point2<f64> {
    let x = EARTH_RADIUS * lon_deg.to_radians();
    let y = EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat_deg.to_radians() / 2.0).tan().ln();

    na::Point2::new(x, y)
}

/// Returns `(latitude, longitude)` in degrees.
pub fn mercator_to_lat_lon(p: na::Point2<f64>) -> (f64, f64) {
    let lon = (p.x / EARTH_RADIUS).to_degrees();
    let lat = (p.y / EARTH_RADIUS).sinh().atan().to_degrees();

    (lat, lon)
}

/// Factor turning map-space distances into ground distances at `lat_deg`.
#[inline]
pub fn latitude_scale(lat_deg: f64) -> f64 {
    lat_deg.to_radians().cos()
}

/// Map-space units covered by one raster pixel at a slippy-map zoom level.
#[inline]
pub fn zoom_resolution(zoom: u8) -> f64 {
    2.0 * std::f64::consts::PI * EARTH_RADIUS / (TILE_SIZE * 2f64.powi(zoom as i32))
}

/// Global slippy-map pixel `(column, row)` of a map-space point at `zoom`.
/// Rows grow southwards from the top edge of tile row 0.
pub fn world_pixel(p: na::Point2<f64>, zoom: u8) -> (f64, f64) {
    let resolution = zoom_resolution(zoom);

    (
        (p.x + ORIGIN_SHIFT) / resolution,
        (ORIGIN_SHIFT - p.y) / resolution,
    )
}

/// Approximate ground distance in meters between two map-space points, using
/// one reference latitude for the whole observation area.
pub fn ground_distance(a: na::Point2<f64>, b: na::Point2<f64>, reference_latitude: f64) -> f64 {
    na::distance(&a, &b) * latitude_scale(reference_latitude)
}
