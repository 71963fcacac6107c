//! Error types and validation functions for continuous beta estimation.
//!
//! This module provides the error taxonomy for every stage of the estimator
//! pipeline: precondition violations on the raw price input, insufficient
//! history, degenerate truncation inside a rolling window, and alignment
//! failures between the asset and index series.

use std::fmt;
use thiserror::Error;

/// Pipeline stage in which a per-window computation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EstimationStage {
    /// Time-of-day seasonal profile
    TimeOfDay,
    /// Per-slot truncation threshold
    Threshold,
    /// Truncated beta statistic
    Beta,
}

impl fmt::Display for EstimationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EstimationStage::TimeOfDay => "time-of-day",
            EstimationStage::Threshold => "threshold",
            EstimationStage::Beta => "beta",
        };
        f.write_str(name)
    }
}

/// Error types for continuous beta estimation.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ContinuousBetaError {
    /// Series too short to produce a single rolling window.
    #[error("Insufficient data: need at least {required} observations, got {actual}")]
    InsufficientData {
        /// Minimum number of observations required
        required: usize,
        /// Actual number of observations provided
        actual: usize,
    },

    /// Invalid configuration or call parameter.
    #[error("Invalid parameter: {parameter} = {value}, expected {constraint}")]
    InvalidParameter {
        /// Parameter name
        parameter: String,
        /// Invalid value provided
        value: f64,
        /// Valid range or constraint description
        constraint: String,
    },

    /// A price was zero, negative or not finite, so its logarithm is undefined.
    #[error("Non-positive price at index {index}: {value}")]
    NonPositivePrice {
        /// Position of the offending price
        index: usize,
        /// Offending value
        value: f64,
    },

    /// Two sequences that must line up have different lengths.
    #[error("Length mismatch in {context}: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Which pair of sequences disagreed
        context: String,
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Asset and index series were prepared with different `L`/`n` settings.
    #[error("Series layout mismatch: asset uses {asset}, index uses {index}")]
    LayoutMismatch {
        /// Asset layout as `L x n`
        asset: String,
        /// Index layout as `L x n`
        index: String,
    },

    /// All observations of a window were truncated away, or a divisor collapsed to zero.
    #[error("Degenerate truncation in {stage} stage for window {window}: {reason}")]
    DegenerateTruncation {
        /// Stage in which the window failed
        stage: EstimationStage,
        /// Rolling window start (day index)
        window: usize,
        /// Description of the degenerate quantity
        reason: String,
    },

    /// The asset's first date does not occur in the index calendar.
    #[error("Alignment failed: date {date} not found in index calendar")]
    AlignmentNotFound {
        /// Date that could not be matched
        date: String,
    },

    /// Alignment offset does not fall on a day boundary.
    #[error("Alignment offset {offset} is not a multiple of {slots_per_day} slots per day")]
    MisalignedOffset {
        /// Offset in observations
        offset: usize,
        /// Intraday slots per day
        slots_per_day: usize,
    },

    /// Numerical computation error (non-finite intermediate values).
    #[error("Numerical computation failed: {reason}")]
    NumericalError {
        /// Detailed reason for numerical failure
        reason: String,
    },

    /// Worker pool could not be constructed.
    #[error("Thread pool construction failed: {reason}")]
    ThreadPoolError {
        /// Reason reported by the pool builder
        reason: String,
    },

    /// Named series is not registered.
    #[error("Series not found: {name}")]
    SeriesNotFound {
        /// Name of the missing series
        name: String,
    },
}

impl ContinuousBetaError {
    /// Shorthand for a degenerate window in `stage`.
    pub fn degenerate(stage: EstimationStage, window: usize, reason: impl Into<String>) -> Self {
        ContinuousBetaError::DegenerateTruncation {
            stage,
            window,
            reason: reason.into(),
        }
    }

    /// True if the error affects a single window rather than the whole series.
    pub fn is_window_local(&self) -> bool {
        matches!(self, ContinuousBetaError::DegenerateTruncation { .. })
    }
}

/// Result type for continuous beta operations.
pub type BetaResult<T> = Result<T, ContinuousBetaError>;

/// Validates that a series has at least `min_required` observations.
///
/// # Example
/// ```rust
/// use continuous_beta::errors::validate_data_length;
///
/// let data = vec![0.01, -0.02, 0.005];
/// assert!(validate_data_length(&data, 2).is_ok());
/// assert!(validate_data_length(&data, 5).is_err());
/// ```
pub fn validate_data_length(data: &[f64], min_required: usize) -> BetaResult<()> {
    if data.len() < min_required {
        Err(ContinuousBetaError::InsufficientData {
            required: min_required,
            actual: data.len(),
        })
    } else {
        Ok(())
    }
}

/// Validates that a parameter lies in `[min, max]` and is not NaN.
///
/// # Example
/// ```rust
/// use continuous_beta::errors::validate_parameter;
///
/// assert!(validate_parameter(2.5, 0.0, f64::MAX, "limit_k_scale").is_ok());
/// assert!(validate_parameter(-1.0, 0.0, f64::MAX, "limit_k_scale").is_err());
/// ```
pub fn validate_parameter(value: f64, min: f64, max: f64, name: &str) -> BetaResult<()> {
    if value.is_nan() {
        return Err(ContinuousBetaError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: "must not be NaN".to_string(),
        });
    }

    if min.is_nan() || max.is_nan() || min > max {
        return Err(ContinuousBetaError::NumericalError {
            reason: format!(
                "Invalid bounds for parameter {}: min={}, max={}",
                name, min, max
            ),
        });
    }

    if value < min || value > max {
        Err(ContinuousBetaError::InvalidParameter {
            parameter: name.to_string(),
            value,
            constraint: format!("[{}, {}]", min, max),
        })
    } else {
        Ok(())
    }
}

/// Validates that every value in `data` is finite.
///
/// Returns on the first offending value, reporting its index.
pub fn validate_all_finite(data: &[f64], name: &str) -> BetaResult<()> {
    if let Some((i, value)) = data.iter().enumerate().find(|(_, v)| !v.is_finite()) {
        return Err(ContinuousBetaError::NumericalError {
            reason: format!("{} contains non-finite value at index {}: {}", name, i, value),
        });
    }
    Ok(())
}

/// Validates that two sequences have the same length.
pub fn validate_equal_length(expected: usize, actual: usize, context: &str) -> BetaResult<()> {
    if expected != actual {
        return Err(ContinuousBetaError::LengthMismatch {
            context: context.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_data_length_boundary() {
        let data = vec![0.0; 10];
        assert!(validate_data_length(&data, 10).is_ok());

        match validate_data_length(&data, 11) {
            Err(ContinuousBetaError::InsufficientData { required, actual }) => {
                assert_eq!(required, 11);
                assert_eq!(actual, 10);
            }
            other => panic!("Expected InsufficientData, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_parameter_rejects_nan_and_bad_bounds() {
        assert!(matches!(
            validate_parameter(f64::NAN, 0.0, 1.0, "p"),
            Err(ContinuousBetaError::InvalidParameter { .. })
        ));
        assert!(matches!(
            validate_parameter(0.5, 1.0, 0.0, "p"),
            Err(ContinuousBetaError::NumericalError { .. })
        ));
        assert!(validate_parameter(0.0, 0.0, 1.0, "p").is_ok());
        assert!(validate_parameter(1.0, 0.0, 1.0, "p").is_ok());
    }

    #[test]
    fn test_validate_all_finite_reports_index() {
        let data = vec![0.01, 0.02, f64::INFINITY];
        match validate_all_finite(&data, "returns") {
            Err(ContinuousBetaError::NumericalError { reason }) => {
                assert!(reason.contains("returns"));
                assert!(reason.contains("index 2"));
            }
            other => panic!("Expected NumericalError, got {:?}", other),
        }
        assert!(validate_all_finite(&[], "empty").is_ok());
    }

    #[test]
    fn test_validate_equal_length() {
        assert!(validate_equal_length(4, 4, "open/close").is_ok());
        match validate_equal_length(4, 3, "open/close") {
            Err(ContinuousBetaError::LengthMismatch {
                context,
                expected,
                actual,
            }) => {
                assert_eq!(context, "open/close");
                assert_eq!(expected, 4);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected LengthMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_error_display_formatting() {
        let err = ContinuousBetaError::degenerate(EstimationStage::TimeOfDay, 7, "zero divisor");
        let text = format!("{}", err);
        assert!(text.contains("time-of-day"));
        assert!(text.contains("window 7"));
        assert!(text.contains("zero divisor"));
        assert!(err.is_window_local());

        let err = ContinuousBetaError::InsufficientData {
            required: 11_760,
            actual: 11_712,
        };
        assert!(!err.is_window_local());
        assert!(format!("{}", err).contains("11760"));
    }
}
