//! Outbound service integrations.

pub mod prediction_client;

pub use prediction_client::HttpPredictionClient;
