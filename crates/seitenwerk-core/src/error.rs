// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Seitenwerk.

use thiserror::Error;

/// Top-level error type for all Seitenwerk operations.
#[derive(Debug, Error)]
pub enum SeitenwerkError {
    // -- Source errors --
    #[error("failed to parse {source_name}: {detail}")]
    Parse { source_name: String, detail: String },

    #[error("{source_name} is encrypted ({})", password_state(.password_attempted))]
    EncryptedDocument {
        source_name: String,
        password_attempted: bool,
    },

    #[error("unsupported image format in {file_name}: {detail}")]
    UnsupportedImageFormat { file_name: String, detail: String },

    #[error("no input supplied: {0}")]
    NoInput(String),

    // -- Parameter validation --
    #[error("invalid page range {range}: {detail}")]
    InvalidPageRange { range: String, detail: String },

    #[error("invalid page permutation: {0}")]
    InvalidPermutation(String),

    #[error("cannot delete {requested} of {page_count} pages; a document must keep at least one page")]
    CannotDeleteAllPages { requested: usize, page_count: usize },

    #[error("page index {index} out of range (document has {page_count} pages)")]
    PageOutOfRange { index: usize, page_count: usize },

    #[error("rotation must be a multiple of 90 degrees, got {0}")]
    InvalidRotation(i32),

    #[error("invalid overlay parameter: {0}")]
    InvalidOverlay(String),

    // -- Output errors --
    #[error("protection not supported: {0}")]
    ProtectionUnsupported(String),

    #[error("PDF write failed: {0}")]
    Pdf(String),

    #[error("rendering failed on page {page_index}: {detail}")]
    Render { page_index: usize, detail: String },

    #[error("image processing failed: {0}")]
    Image(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("archive already contains an entry named {file_name}")]
    ArchiveNamingCollision { file_name: String },

    #[error("archive creation failed: {0}")]
    Archive(String),

    // -- Execution --
    #[error("operation cancelled")]
    Cancelled,

    #[error("background task failed: {0}")]
    Task(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SeitenwerkError {
    /// Shorthand for a [`SeitenwerkError::Parse`] with the given source name.
    pub fn parse(source_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            detail: detail.into(),
        }
    }

    /// True for errors raised by parameter validation before any mutation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidPageRange { .. }
                | Self::InvalidPermutation(_)
                | Self::CannotDeleteAllPages { .. }
                | Self::PageOutOfRange { .. }
                | Self::InvalidRotation(_)
                | Self::InvalidOverlay(_)
        )
    }
}

fn password_state(attempted: &bool) -> &'static str {
    if *attempted {
        "incorrect password"
    } else {
        "password required"
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, SeitenwerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypted_message_distinguishes_attempts() {
        let missing = SeitenwerkError::EncryptedDocument {
            source_name: "a.pdf".into(),
            password_attempted: false,
        };
        let wrong = SeitenwerkError::EncryptedDocument {
            source_name: "a.pdf".into(),
            password_attempted: true,
        };
        assert_eq!(missing.to_string(), "a.pdf is encrypted (password required)");
        assert_eq!(wrong.to_string(), "a.pdf is encrypted (incorrect password)");
    }

    #[test]
    fn validation_classification() {
        assert!(SeitenwerkError::InvalidRotation(45).is_validation());
        assert!(
            SeitenwerkError::CannotDeleteAllPages {
                requested: 3,
                page_count: 3
            }
            .is_validation()
        );
        assert!(!SeitenwerkError::Cancelled.is_validation());
    }
}
