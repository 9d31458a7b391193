//! Aggregate views over the active zone set (dashboard counters and map
//! framing).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::geo::{BoundingBox, GeoPoint};
use crate::models::zone::Zone;

/// Counts of active zones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSummary {
    pub total: usize,
    pub manual: usize,
    pub ai_generated: usize,
    pub by_risk_level: BTreeMap<String, usize>,
    pub by_prediction_type: BTreeMap<String, usize>,
}

impl ZoneSummary {
    pub fn from_zones(zones: &[Zone]) -> Self {
        let mut summary = ZoneSummary::default();
        for zone in zones.iter().filter(|z| z.active) {
            summary.total += 1;
            *summary
                .by_risk_level
                .entry(zone.risk_level.as_str().to_string())
                .or_default() += 1;
            match zone.prediction_type() {
                Some(t) => {
                    summary.ai_generated += 1;
                    *summary
                        .by_prediction_type
                        .entry(t.as_str().to_string())
                        .or_default() += 1;
                }
                None => summary.manual += 1,
            }
        }
        summary
    }
}

/// Map framing for the active zones.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneBounds {
    pub bounds: BoundingBox,
    pub center: GeoPoint,
    pub zone_count: usize,
    /// True when no zone exists and the regional default is returned.
    pub is_default: bool,
}

impl ZoneBounds {
    pub fn from_zones(zones: &[Zone]) -> Self {
        let active: Vec<&Zone> = zones.iter().filter(|z| z.active).collect();
        match BoundingBox::enclosing(active.iter().map(|z| (z.center(), z.radius_meters))) {
            Some(bounds) => ZoneBounds {
                bounds,
                center: bounds.center(),
                zone_count: active.len(),
                is_default: false,
            },
            None => ZoneBounds {
                bounds: BoundingBox::DEFAULT_REGION,
                center: BoundingBox::DEFAULT_REGION.center(),
                zone_count: 0,
                is_default: true,
            },
        }
    }
}
