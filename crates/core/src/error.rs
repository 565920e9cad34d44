/// Result alias that carries the custom [`SingalongError`] type.
pub type Result<T> = std::result::Result<T, SingalongError>;

/// Common error type for the core crate.
///
/// Only setup paths fail this way. Runtime conditions such as A/V desync or a
/// part without scoreable beats degrade gracefully instead of surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum SingalongError {
    /// Free form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Input rejected before any state was touched.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// A player was assigned to a vocal part the song does not have.
    #[error("song has {available} part(s), part {requested} does not exist")]
    UnknownPart { requested: usize, available: usize },
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON in a song, note log or config file.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl SingalongError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for SingalongError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SingalongError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<realfft::FftError> for SingalongError {
    fn from(value: realfft::FftError) -> Self {
        Self::Message(value.to_string())
    }
}
