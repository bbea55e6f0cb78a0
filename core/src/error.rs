//! Error types shared by the filter, its models, and the simulation driver.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MclError {
    /// The observation vector does not line up with the landmark set.
    #[error("input mismatch: expected {expected} values, got {actual}")]
    InputMismatch { expected: usize, actual: usize },

    /// A weight vector with no positive, finite mass reached the resampler.
    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    /// Rejected at construction time.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("observed range {index} is not finite ({value})")]
    NonFiniteObservation { index: usize, value: f64 },

    #[error("commanded displacement is not finite ({dx}, {dy})")]
    NonFiniteCommand { dx: f64, dy: f64 },

    #[error("filter has been stopped")]
    FilterStopped,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for MclError {
    fn from(e: serde_json::Error) -> Self {
        MclError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for MclError {
    fn from(e: serde_yaml::Error) -> Self {
        MclError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for MclError {
    fn from(e: toml::de::Error) -> Self {
        MclError::Serialization(e.to_string())
    }
}

impl From<toml::ser::Error> for MclError {
    fn from(e: toml::ser::Error) -> Self {
        MclError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MclError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_mismatch_message() {
        let err = MclError::InputMismatch {
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "input mismatch: expected 2 values, got 3");
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MclError = io.into();
        assert!(matches!(err, MclError::Io(_)));
    }
}
