//! Database entity definitions.

pub mod zone;

pub use zone::{EntityError, SourceColumns, ZoneEntity};
