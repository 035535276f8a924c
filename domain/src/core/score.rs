//! Score bounds shared by phase iterations and racing hypotheses.

use super::error::DomainError;

/// Lowest score a judge may report.
pub const SCORE_MIN: f64 = 0.0;

/// Highest score a judge may report.
pub const SCORE_MAX: f64 = 10.0;

/// Validate a collaborator-reported score.
///
/// Non-finite values and values outside `SCORE_MIN..=SCORE_MAX` are rejected.
pub fn validate_score(value: f64) -> Result<f64, DomainError> {
    if value.is_finite() && (SCORE_MIN..=SCORE_MAX).contains(&value) {
        Ok(value)
    } else {
        Err(DomainError::ScoreOutOfRange(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_score_bounds() {
        assert_eq!(validate_score(0.0), Ok(0.0));
        assert_eq!(validate_score(10.0), Ok(10.0));
        assert_eq!(validate_score(7.5), Ok(7.5));
    }

    #[test]
    fn test_validate_score_rejects_out_of_range() {
        assert!(validate_score(-0.1).is_err());
        assert!(validate_score(10.01).is_err());
        assert!(validate_score(f64::NAN).is_err());
        assert!(validate_score(f64::INFINITY).is_err());
    }
}
