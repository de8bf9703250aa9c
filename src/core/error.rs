use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FingerprintError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("Incompatible fingerprints: {left} bits vs {right} bits")]
    IncompatibleFingerprints { left: usize, right: usize },

    #[error("Malformed fingerprint record: {reason}")]
    MalformedFingerprintRecord { reason: String },
}

impl FingerprintError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_configuration(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedFingerprintRecord {
            reason: reason.into(),
        }
    }
}
