/// Result alias that carries the custom [`TrainerError`] type.
pub type Result<T> = std::result::Result<T, TrainerError>;

/// Common error type for the core crate.
///
/// Wrong pitches, incomplete chords and attempts that miss the beat are not
/// errors: they are reported as [`crate::Judgment`] values.
#[derive(Debug, thiserror::Error)]
pub enum TrainerError {
    /// A tempo, meter or tolerance value outside its accepted range.
    #[error("{field} must be within {min}..={max}, got {value}")]
    InvalidConfig {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },
    /// A pitch name that could not be normalized.
    #[error("invalid note name `{0}`")]
    InvalidPitch(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around configuration (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl TrainerError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for TrainerError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for TrainerError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
