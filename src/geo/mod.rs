use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod address;
pub mod annotator;
pub mod nominatim;
pub mod osrm;

pub use annotator::{DistanceAnnotator, DistanceCache, Pacing};
pub use nominatim::{Geocoder, NominatimGeocoder};
pub use osrm::{OsrmRouter, RouteService};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

pub const SOUTHERN_ONTARIO: BoundingBox = BoundingBox {
    min_lat: 42.0,
    max_lat: 46.0,
    min_lng: -83.0,
    max_lng: -75.0,
};

impl BoundingBox {
    pub fn contains(&self, point: Coordinates) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lng >= self.min_lng
            && point.lng <= self.max_lng
    }
}

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service responded with status {0}")]
    Status(u16),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid service url: {0}")]
    Url(#[from] url::ParseError),
}

pub fn haversine_km(from: Coordinates, to: Coordinates) -> f64 {
    let d_lat = (to.lat - from.lat).to_radians();
    let d_lng = (to.lng - from.lng).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from.lat.to_radians().cos() * to.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
