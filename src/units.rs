//! Length unit conversions.
//!
//! The service is canonical-centimeters end-to-end: sensor payloads, the
//! store, the threshold table and alert rows all carry cm. The dashboard
//! may display inches, so the conversion lives here and nowhere else.
//! The three severity thresholds are exact inch values (30 / 24 / 12 in).

pub const CM_PER_INCH: f64 = 2.54;

pub fn cm_to_inches(cm: f64) -> f64 {
    cm / CM_PER_INCH
}

pub fn inches_to_cm(inches: f64) -> f64 {
    inches * CM_PER_INCH
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::thresholds::{DANGER_ABOVE_CM, SAFE_ABOVE_CM, WARNING_ABOVE_CM};

    #[test]
    fn test_thresholds_are_exact_inch_values() {
        assert_eq!(inches_to_cm(30.0), SAFE_ABOVE_CM);
        assert_eq!(inches_to_cm(24.0), WARNING_ABOVE_CM);
        assert_eq!(inches_to_cm(12.0), DANGER_ABOVE_CM);
    }

    #[test]
    fn test_round_trip_is_exact_for_representable_values() {
        assert_eq!(cm_to_inches(inches_to_cm(30.0)), 30.0);
        assert_eq!(cm_to_inches(SAFE_ABOVE_CM), 30.0);
    }
}
