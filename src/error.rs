//! ALFA Reveal - Error Types

use std::fmt;

use thiserror::Error;

/// Result type for reveal operations
pub type RevealResult<T> = Result<T, RevealError>;

/// Authoring error codes shown to the viewer.
///
/// Each code names exactly one missing piece so that page authors can debug
/// their markup. None of them depend on the passphrase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Placeholder has no `data-encryption-info-by`
    NoInfoRef,
    /// Placeholder has no `data-content`
    NoContent,
    /// Referenced metadata element does not exist
    BrokenInfoRef,
    /// Metadata element exists but lacks salt/IV/hash/tag/iterations
    BrokenInfoRefLate,
    /// Page cannot decrypt in place (insecure context or `nocrypt`)
    NotSecureContext,
}

impl ErrorCode {
    /// Stable code string, e.g. `ERR_NO_CONTENT`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoInfoRef => "ERR_NO_INFO_REF",
            Self::NoContent => "ERR_NO_CONTENT",
            Self::BrokenInfoRef => "ERR_BROKEN_INFO_REF",
            Self::BrokenInfoRefLate => "ERR_BROKEN_INFO_REF_LATE",
            Self::NotSecureContext => "ERR_NOT_SECURE_CONTEXT",
        }
    }

    /// Viewer-facing message, code included
    pub fn message(&self) -> String {
        let text = match self {
            Self::NoInfoRef => {
                "This content cannot be decrypted because critical information is missing!"
            }
            Self::NoContent => {
                "This content cannot be decrypted because there is no content to decrypt."
            }
            Self::BrokenInfoRef => {
                "This content cannot be decrypted because the encryption information is missing!"
            }
            Self::BrokenInfoRefLate => "Critical information is missing!",
            Self::NotSecureContext => {
                "The page is not being delivered over a secure connection, so in-place decryption is not available."
            }
        };
        format!("{} ({})", text, self.as_str())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reveal error types
#[derive(Error, Debug)]
pub enum RevealError {
    // ═══════════════════════════════════════════════════════════════
    // TRANSFER ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Stream read failed: {0}")]
    StreamReadFailure(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Invalid media source: {0}")]
    InvalidSource(String),

    #[error("Transfer aborted after {received} bytes")]
    Aborted { received: u64 },

    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    // ═══════════════════════════════════════════════════════════════
    // CRYPTO ERRORS
    // ═══════════════════════════════════════════════════════════════

    /// Wrong passphrase, tampered ciphertext/tag and malformed metadata all
    /// collapse into this variant.
    #[error("Decryption failed")]
    DecryptionFailure,

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    // ═══════════════════════════════════════════════════════════════
    // PLACEHOLDER ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Unsupported replacement type: {0}")]
    UnsupportedReplacementType(String),

    #[error("Missing metadata ({0})")]
    MissingMetadata(ErrorCode),

    #[error("Placeholder not found: {0}")]
    PlaceholderNotFound(String),

    // ═══════════════════════════════════════════════════════════════
    // CONFIG / IO ERRORS
    // ═══════════════════════════════════════════════════════════════

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RevealError {
    /// Structural problems in the authored page. Retrying cannot fix them.
    pub fn is_authoring_error(&self) -> bool {
        matches!(
            self,
            RevealError::MissingMetadata(_)
                | RevealError::UnsupportedReplacementType(_)
                | RevealError::InvalidSource(_)
        )
    }

    /// Runtime failures that leave the placeholder open for a manual retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RevealError::StreamReadFailure(_)
                | RevealError::Network(_)
                | RevealError::HttpStatus { .. }
                | RevealError::Aborted { .. }
                | RevealError::ImageDecode(_)
                | RevealError::DecryptionFailure
        )
    }
}

impl From<serde_json::Error> for RevealError {
    fn from(e: serde_json::Error) -> Self {
        RevealError::Serialization(e.to_string())
    }
}

impl From<image::ImageError> for RevealError {
    fn from(e: image::ImageError) -> Self {
        RevealError::ImageDecode(e.to_string())
    }
}

impl From<reqwest::Error> for RevealError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => RevealError::HttpStatus {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => RevealError::Network(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::NoContent.as_str(), "ERR_NO_CONTENT");
        assert!(ErrorCode::BrokenInfoRefLate
            .message()
            .ends_with("(ERR_BROKEN_INFO_REF_LATE)"));
    }

    #[test]
    fn test_classification() {
        assert!(RevealError::MissingMetadata(ErrorCode::NoInfoRef).is_authoring_error());
        assert!(!RevealError::MissingMetadata(ErrorCode::NoInfoRef).is_retryable());
        assert!(RevealError::DecryptionFailure.is_retryable());
        assert_eq!(RevealError::DecryptionFailure.to_string(), "Decryption failed");
    }
}
