//! Common validation utilities.

use validator::ValidationError;

/// Validates that a latitude value is within valid range (-90 to 90).
pub fn validate_latitude(lat: f64) -> Result<(), ValidationError> {
    if (-90.0..=90.0).contains(&lat) {
        Ok(())
    } else {
        let mut err = ValidationError::new("latitude_range");
        err.message = Some("Latitude must be between -90 and 90".into());
        Err(err)
    }
}

/// Validates that a longitude value is within valid range (-180 to 180).
pub fn validate_longitude(lon: f64) -> Result<(), ValidationError> {
    if (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        let mut err = ValidationError::new("longitude_range");
        err.message = Some("Longitude must be between -180 and 180".into());
        Err(err)
    }
}

/// Validates that a zone radius is strictly positive and finite.
pub fn validate_radius(radius: f64) -> Result<(), ValidationError> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        let mut err = ValidationError::new("radius_range");
        err.message = Some("Radius must be greater than 0 meters".into());
        Err(err)
    }
}

/// Validates that a confidence score or threshold lies in [0, 1].
pub fn validate_confidence(confidence: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&confidence) {
        Ok(())
    } else {
        let mut err = ValidationError::new("confidence_range");
        err.message = Some("Confidence must be between 0 and 1".into());
        Err(err)
    }
}

/// Validates that a string contains something other than whitespace.
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        Err(err)
    } else {
        Ok(())
    }
}
