//! Shared utilities for the risk zone backend.
//!
//! Currently provides the custom validators used by request payloads and
//! domain models across crates.

pub mod validation;
