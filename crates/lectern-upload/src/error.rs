//! Upload failure taxonomy.
//!
//! Validation errors (`InvalidFileKind`, `FileTooLarge`) are produced before
//! any network call and are recoverable locally. `Transport` covers
//! everything after the request leaves: network failure, a non-2xx status,
//! or a response without a usable URL. Nothing is retried automatically -
//! the user re-triggers the upload.

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum UploadError {
    /// The payload is neither an image nor a video.
    #[error("unsupported file kind: {mime}")]
    #[diagnostic(code(lectern::upload::invalid_kind))]
    InvalidFileKind { mime: String },

    /// The payload exceeds the configured byte ceiling.
    #[error("file is {size} bytes, over the {max} byte ceiling")]
    #[diagnostic(code(lectern::upload::too_large))]
    FileTooLarge { size: usize, max: usize },

    /// The upload request failed in flight or the server's answer was
    /// unusable.
    #[error("upload transport failed: {reason}")]
    #[diagnostic(code(lectern::upload::transport))]
    Transport {
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },
}

impl UploadError {
    pub(crate) fn transport(reason: impl Into<String>) -> Self {
        UploadError::Transport { reason: reason.into(), source: None }
    }

    pub(crate) fn transport_from(reason: impl Into<String>, source: reqwest::Error) -> Self {
        UploadError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Whether this failure was caught before any network traffic.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            UploadError::InvalidFileKind { .. } | UploadError::FileTooLarge { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(UploadError::InvalidFileKind { mime: "text/plain".into() }.is_validation());
        assert!(UploadError::FileTooLarge { size: 11, max: 10 }.is_validation());
        assert!(!UploadError::transport("boom").is_validation());
    }

    #[test]
    fn test_display_messages() {
        let err = UploadError::FileTooLarge { size: 15_728_640, max: 10_485_760 };
        assert_eq!(
            err.to_string(),
            "file is 15728640 bytes, over the 10485760 byte ceiling"
        );
    }
}
