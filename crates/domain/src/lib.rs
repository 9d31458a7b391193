//! Domain layer for the risk zone backend.
//!
//! This crate contains:
//! - Domain models (Zone, GeoPoint, prediction wire types, settings)
//! - The zone store and prediction service abstractions
//! - The reconciliation engine that turns hazard predictions into zones

pub mod models;
pub mod services;
