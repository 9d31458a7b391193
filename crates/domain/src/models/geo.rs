//! Coordinate value types and the flat-Earth helpers used for zone matching
//! and map centering.
//!
//! All distances here are in decimal degrees or use the fixed 111 km per
//! degree approximation. This is coarse on purpose and degrades near the
//! poles; it is not a geodesic model.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Approximate kilometres per degree of latitude or longitude.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Precision of the intra-cycle coordinate key (4 decimal places, ~11 m).
pub const COORDINATE_KEY_SCALE: f64 = 10_000.0;

/// A latitude/longitude pair in signed decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Euclidean distance in decimal degrees (not geodesic).
    pub fn degree_distance(&self, other: &GeoPoint) -> f64 {
        let d_lat = self.latitude - other.latitude;
        let d_lon = self.longitude - other.longitude;
        (d_lat * d_lat + d_lon * d_lon).sqrt()
    }

    /// Axis-aligned box extending `radius_km` in every direction.
    pub fn bounding_box(&self, radius_km: f64) -> BoundingBox {
        let delta = km_to_degrees(radius_km);
        BoundingBox {
            north: self.latitude + delta,
            south: self.latitude - delta,
            east: self.longitude + delta,
            west: self.longitude - delta,
        }
    }

    /// Coordinates scaled and rounded to the 4-decimal key precision.
    pub fn rounded_key(&self) -> (i64, i64) {
        (
            (self.latitude * COORDINATE_KEY_SCALE).round() as i64,
            (self.longitude * COORDINATE_KEY_SCALE).round() as i64,
        )
    }
}

/// Converts kilometres to decimal degrees using the fixed approximation.
pub fn km_to_degrees(km: f64) -> f64 {
    km / KM_PER_DEGREE
}

/// Geographic rectangle in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Default map extent (Northeast India) shown when there is nothing to fit.
    pub const DEFAULT_REGION: BoundingBox = BoundingBox {
        north: 29.5,
        south: 21.5,
        east: 97.5,
        west: 87.0,
    };

    pub fn center(&self) -> GeoPoint {
        GeoPoint::new(
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }

    /// Grows this box so that it also covers `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            north: self.north.max(other.north),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            west: self.west.min(other.west),
        }
    }

    /// Smallest box covering every circle, or `None` when there are none.
    pub fn enclosing<I>(circles: I) -> Option<BoundingBox>
    where
        I: IntoIterator<Item = (GeoPoint, f64)>,
    {
        circles
            .into_iter()
            .map(|(center, radius_meters)| center.bounding_box(radius_meters / 1000.0))
            .reduce(|acc, b| acc.union(&b))
    }
}
