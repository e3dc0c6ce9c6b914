//! Geometry helpers for the GeoJSON bindings.
//!
//! Buffer polygons are placed with the direct geodesic problem on the WGS84
//! ellipsoid (Vincenty's formulation), so a "1000 m hexagon" has vertices
//! 1000 m from its center regardless of latitude.

use serde_json::{json, Map, Value};

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const WGS84_B: f64 = WGS84_A * (1.0 - WGS84_F);

const MAX_ITERATIONS: usize = 200;
const CONVERGENCE: f64 = 1e-12;

/// Destination `(lat, lon)` in degrees reached from `(lat, lon)` by travelling
/// `distance` metres along the initial `azimuth` (degrees clockwise from north).
pub fn geodesic_direct(lat: f64, lon: f64, azimuth: f64, distance: f64) -> (f64, f64) {
    let phi1 = lat.to_radians();
    let alpha1 = azimuth.to_radians();
    let (sin_alpha1, cos_alpha1) = alpha1.sin_cos();

    let tan_u1 = (1.0 - WGS84_F) * phi1.tan();
    let cos_u1 = 1.0 / (1.0 + tan_u1 * tan_u1).sqrt();
    let sin_u1 = tan_u1 * cos_u1;

    let sigma1 = tan_u1.atan2(cos_alpha1);
    let sin_alpha = cos_u1 * sin_alpha1;
    let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
    let u_sq = cos_sq_alpha * (WGS84_A * WGS84_A - WGS84_B * WGS84_B) / (WGS84_B * WGS84_B);
    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));

    let first_sigma = distance / (WGS84_B * big_a);
    let mut sigma = first_sigma;
    let mut cos_2sigma_m;
    let mut sin_sigma;
    let mut cos_sigma;
    let mut iterations = 0;
    loop {
        cos_2sigma_m = (2.0 * sigma1 + sigma).cos();
        sin_sigma = sigma.sin();
        cos_sigma = sigma.cos();
        let delta_sigma = big_b
            * sin_sigma
            * (cos_2sigma_m
                + big_b / 4.0
                    * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)
                        - big_b / 6.0
                            * cos_2sigma_m
                            * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                            * (-3.0 + 4.0 * cos_2sigma_m * cos_2sigma_m)));
        let next = first_sigma + delta_sigma;
        iterations += 1;
        if (next - sigma).abs() < CONVERGENCE || iterations >= MAX_ITERATIONS {
            sigma = next;
            break;
        }
        sigma = next;
    }

    let tmp = sin_u1 * sin_sigma - cos_u1 * cos_sigma * cos_alpha1;
    let phi2 = (sin_u1 * cos_sigma + cos_u1 * sin_sigma * cos_alpha1)
        .atan2((1.0 - WGS84_F) * (sin_alpha * sin_alpha + tmp * tmp).sqrt());
    let lambda = (sin_sigma * sin_alpha1).atan2(cos_u1 * cos_sigma - sin_u1 * sin_sigma * cos_alpha1);
    let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));
    let big_l = lambda
        - (1.0 - c)
            * WGS84_F
            * sin_alpha
            * (sigma
                + c * sin_sigma
                    * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m * cos_2sigma_m)));

    (phi2.to_degrees(), normalize_longitude(lon + big_l.to_degrees()))
}

fn normalize_longitude(lon: f64) -> f64 {
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Closed ring of `[lon, lat]` pairs approximating a circle of `radius` metres.
///
/// Vertices sit at equal azimuth steps, walked from the highest step down to
/// north, and the first vertex is repeated to close the ring.
pub fn buffer_ring(lat: f64, lon: f64, vertices: usize, radius: f64) -> Vec<[f64; 2]> {
    let step = 360.0 / vertices as f64;
    let mut ring: Vec<[f64; 2]> = (0..vertices)
        .rev()
        .map(|i| {
            let (vlat, vlon) = geodesic_direct(lat, lon, step * i as f64, radius);
            [vlon, vlat]
        })
        .collect();
    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
    ring
}

pub fn point(lon: f64, lat: f64) -> Map<String, Value> {
    geometry("Point", json!([lon, lat]))
}

pub fn polygon(ring: Vec<[f64; 2]>) -> Map<String, Value> {
    geometry("Polygon", json!([ring]))
}

fn geometry(kind: &str, coordinates: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("type".to_string(), Value::String(kind.to_string()));
    map.insert("coordinates".to_string(), coordinates);
    map
}
