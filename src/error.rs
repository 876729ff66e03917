//! Unified error handling for the lap-delta library.
//!
//! The per-trace builders never fail: an empty window yields an empty series.
//! Errors only surface at the pipeline boundary, where an empty stage result
//! means there is nothing the caller can chart.

use std::fmt;

/// Which of the two traces an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceRole {
    Reference,
    Comparison,
}

impl fmt::Display for TraceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceRole::Reference => write!(f, "reference"),
            TraceRole::Comparison => write!(f, "comparison"),
        }
    }
}

/// Unified error type for lap-delta operations.
#[derive(Debug, Clone)]
pub enum LapDeltaError {
    /// Fewer samples fell inside the window than the operation needs
    InsufficientSamples {
        trace: TraceRole,
        sample_count: usize,
        minimum_required: usize,
    },
    /// Window finish does not come after its start
    InvalidWindow { start_ms: f64, finish_ms: f64 },
    /// Trace has no usable GPS coordinates
    InvalidCoordinates { trace: TraceRole, message: String },
    /// A trace has not been loaded into the engine
    MissingTrace { trace: TraceRole },
    /// Configuration error
    ConfigError { message: String },
    /// Result could not be serialized
    Serialization { message: String },
}

impl fmt::Display for LapDeltaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LapDeltaError::InsufficientSamples {
                trace,
                sample_count,
                minimum_required,
            } => {
                write!(
                    f,
                    "The {} trace has {} samples in the window, minimum {} required",
                    trace, sample_count, minimum_required
                )
            }
            LapDeltaError::InvalidWindow {
                start_ms,
                finish_ms,
            } => {
                write!(
                    f,
                    "Window finish ({:.0}ms) must be after start ({:.0}ms)",
                    finish_ms, start_ms
                )
            }
            LapDeltaError::InvalidCoordinates { trace, message } => {
                write!(f, "The {} trace has invalid coordinates: {}", trace, message)
            }
            LapDeltaError::MissingTrace { trace } => {
                write!(f, "No {} trace loaded", trace)
            }
            LapDeltaError::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            LapDeltaError::Serialization { message } => {
                write!(f, "Serialization error: {}", message)
            }
        }
    }
}

impl std::error::Error for LapDeltaError {}

impl From<serde_json::Error> for LapDeltaError {
    fn from(err: serde_json::Error) -> Self {
        LapDeltaError::Serialization {
            message: err.to_string(),
        }
    }
}

/// Result type alias for lap-delta operations.
pub type Result<T> = std::result::Result<T, LapDeltaError>;

/// Extension trait for converting Option to LapDeltaError.
pub trait OptionExt<T> {
    /// Convert Option to Result with insufficient samples error.
    fn ok_or_insufficient_samples(
        self,
        trace: TraceRole,
        sample_count: usize,
        minimum: usize,
    ) -> Result<T>;

    /// Convert Option to Result with missing trace error.
    fn ok_or_missing(self, trace: TraceRole) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_insufficient_samples(
        self,
        trace: TraceRole,
        sample_count: usize,
        minimum: usize,
    ) -> Result<T> {
        self.ok_or(LapDeltaError::InsufficientSamples {
            trace,
            sample_count,
            minimum_required: minimum,
        })
    }

    fn ok_or_missing(self, trace: TraceRole) -> Result<T> {
        self.ok_or(LapDeltaError::MissingTrace { trace })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LapDeltaError::InsufficientSamples {
            trace: TraceRole::Comparison,
            sample_count: 1,
            minimum_required: 2,
        };
        assert!(err.to_string().contains("comparison"));
        assert!(err.to_string().contains("1 samples"));
    }

    #[test]
    fn test_window_display() {
        let err = LapDeltaError::InvalidWindow {
            start_ms: 2000.0,
            finish_ms: 1000.0,
        };
        assert!(err.to_string().contains("1000ms"));
    }

    #[test]
    fn test_option_ext() {
        let none: Option<i32> = None;
        let result = none.ok_or_insufficient_samples(TraceRole::Reference, 0, 2);
        assert!(matches!(
            result,
            Err(LapDeltaError::InsufficientSamples { .. })
        ));

        let missing: Option<i32> = None;
        assert!(matches!(
            missing.ok_or_missing(TraceRole::Reference),
            Err(LapDeltaError::MissingTrace {
                trace: TraceRole::Reference
            })
        ));
    }
}
