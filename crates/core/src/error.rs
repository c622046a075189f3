/// Result alias that carries the custom [`SeaLevelError`] type.
pub type Result<T> = std::result::Result<T, SeaLevelError>;

/// Common error type for the core crate.
///
/// Out-of-range seeks have no variant: index and fraction arithmetic clamps
/// instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum SeaLevelError {
    /// The dataset could not be fetched or failed validation. Fatal to the
    /// view, but the caller may retry the load.
    #[error("failed to load sea level data: {reason}")]
    Data { reason: String },
    /// A narration asset is missing or could not be loaded. Playback carries
    /// on silently.
    #[error("audio unavailable: {reason}")]
    Audio { reason: String },
    /// The requested scenario label is not part of the dataset.
    #[error("unknown scenario `{0}`")]
    UnknownScenario(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl SeaLevelError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn data<T: Into<String>>(reason: T) -> Self {
        Self::Data {
            reason: reason.into(),
        }
    }

    pub fn audio<T: Into<String>>(reason: T) -> Self {
        Self::Audio {
            reason: reason.into(),
        }
    }

    /// Whether the failure should be surfaced with a retry action.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Data { .. })
    }
}

impl From<&str> for SeaLevelError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SeaLevelError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_data_errors_are_retryable() {
        assert!(SeaLevelError::data("unreachable").is_retryable());
        assert!(!SeaLevelError::audio("load failed").is_retryable());
        assert!(!SeaLevelError::UnknownScenario("9".into()).is_retryable());
    }

    #[test]
    fn messages_include_reason() {
        let err = SeaLevelError::audio("load failed");
        assert_eq!(err.to_string(), "audio unavailable: load failed");
    }
}
