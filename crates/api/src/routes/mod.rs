//! HTTP route handlers.

pub mod events;
pub mod health;
pub mod predictions;
pub mod zones;
