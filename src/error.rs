use thiserror::Error;

/// Result type for leaf-drqn operations
pub type Result<T> = std::result::Result<T, DrqnError>;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum DrqnError {
    /// Sampling was requested before any stored trace was long enough
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// An episode trace too short to be replayed
    #[error("Short episode: {length} transitions, at least {required} required")]
    ShortEpisode { length: usize, required: usize },

    /// No checkpoint could be found or read
    #[error("Checkpoint unavailable in {0}")]
    CheckpointUnavailable(String),

    /// Unknown command-line mode
    #[error("Invalid mode '{0}', expected 'Train' or 'Test'")]
    InvalidMode(String),

    /// Invalid dimensions for operations
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Invalid action
    #[error("Invalid action {action}: must be less than {max_actions}")]
    InvalidAction { action: usize, max_actions: usize },

    /// Numerical computation errors
    #[error("Numerical error: {0}")]
    NumericalError(String),

    /// Configuration file errors
    #[error("Config error: {0}")]
    Config(String),

    /// IO errors (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Image decoding errors
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// CSV reading/writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<bincode::Error> for DrqnError {
    fn from(err: bincode::Error) -> Self {
        DrqnError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DrqnError {
    fn from(err: serde_json::Error) -> Self {
        DrqnError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for DrqnError {
    fn from(err: serde_yaml::Error) -> Self {
        DrqnError::Config(err.to_string())
    }
}

impl From<ndarray::ShapeError> for DrqnError {
    fn from(err: ndarray::ShapeError) -> Self {
        DrqnError::DimensionMismatch {
            expected: "compatible array shape".to_string(),
            actual: err.to_string(),
        }
    }
}

// Helper functions for common error patterns
impl DrqnError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        DrqnError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        DrqnError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
