// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the UI layer.
//
// Every engine error is mapped to plain English with a clear suggestion that
// names the offending file, page, or parameter. Severity drives presentation.

use crate::error::SeitenwerkError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Worth retrying as-is.
    Transient,
    /// The user must change their input (password, page range, file).
    ActionRequired,
    /// Cannot be fixed by retrying or changing parameters.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether retrying unchanged might succeed.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(message: impl Into<String>, suggestion: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable: severity == Severity::Transient,
            severity,
        }
    }
}

/// Convert a `SeitenwerkError` into a `HumanError`.
pub fn humanize_error(err: &SeitenwerkError) -> HumanError {
    use Severity::*;

    match err {
        // -- Source errors --
        SeitenwerkError::Parse { source_name, .. } => HumanError::new(
            format!("\"{source_name}\" isn't a readable PDF."),
            "The file may be damaged or not really a PDF. Try opening it in another viewer, or choose a different file.",
            Permanent,
        ),

        SeitenwerkError::EncryptedDocument {
            source_name,
            password_attempted: false,
        } => HumanError::new(
            format!("\"{source_name}\" is password protected."),
            "Enter the document's password and try again.",
            ActionRequired,
        ),

        SeitenwerkError::EncryptedDocument {
            source_name,
            password_attempted: true,
        } => HumanError::new(
            format!("The password for \"{source_name}\" isn't right."),
            "Check the password (it is case sensitive) and try again.",
            ActionRequired,
        ),

        SeitenwerkError::UnsupportedImageFormat { file_name, .. } => HumanError::new(
            format!("\"{file_name}\" isn't an image we can use."),
            "Use JPEG, PNG, GIF or WebP images.",
            ActionRequired,
        ),

        SeitenwerkError::NoInput(what) => HumanError::new(
            "Nothing to work with yet.",
            format!("Add at least one file first. ({what})"),
            ActionRequired,
        ),

        // -- Parameter validation --
        SeitenwerkError::InvalidPageRange { range, detail } => HumanError::new(
            format!("The page range \"{range}\" doesn't fit this document."),
            format!("Adjust the range and try again: {detail}."),
            ActionRequired,
        ),

        SeitenwerkError::InvalidPermutation(detail) => HumanError::new(
            "The new page order isn't complete.",
            format!("Every page must appear exactly once. ({detail})"),
            ActionRequired,
        ),

        SeitenwerkError::CannotDeleteAllPages { page_count, .. } => HumanError::new(
            "You can't delete every page.",
            format!("Keep at least one of the {page_count} pages."),
            ActionRequired,
        ),

        SeitenwerkError::PageOutOfRange { index, page_count } => HumanError::new(
            format!("Page {} doesn't exist.", index + 1),
            format!("This document has {page_count} pages."),
            ActionRequired,
        ),

        SeitenwerkError::InvalidRotation(degrees) => HumanError::new(
            format!("Pages can't be turned by {degrees}°."),
            "Rotate in steps of 90°.",
            ActionRequired,
        ),

        SeitenwerkError::InvalidOverlay(detail) => HumanError::new(
            "The stamp settings aren't valid.",
            format!("Check the text settings and try again. ({detail})"),
            ActionRequired,
        ),

        // -- Output errors --
        SeitenwerkError::ProtectionUnsupported(detail) => HumanError::new(
            "This kind of protection isn't available.",
            format!("The file was not saved without protection. ({detail})"),
            ActionRequired,
        ),

        SeitenwerkError::Pdf(_) => HumanError::new(
            "The new PDF couldn't be written.",
            "Try again. If this keeps happening, try with a different file.",
            Transient,
        ),

        SeitenwerkError::Render { page_index, .. } => HumanError::new(
            format!("Page {} couldn't be turned into an image.", page_index + 1),
            "Try a smaller scale, or skip this page.",
            Permanent,
        ),

        SeitenwerkError::Image(_) => HumanError::new(
            "There's a problem with this image.",
            "The image may be damaged. Try saving it as a JPEG or PNG first.",
            Permanent,
        ),

        SeitenwerkError::Ocr(_) => HumanError::new(
            "Text recognition didn't work on this document.",
            "Try a higher scale, or check the page is clear and in focus.",
            Transient,
        ),

        SeitenwerkError::ArchiveNamingCollision { file_name } => HumanError::new(
            format!("Two results are both called \"{file_name}\"."),
            "Give each page range a different name.",
            ActionRequired,
        ),

        SeitenwerkError::Archive(_) => HumanError::new(
            "The download bundle couldn't be created.",
            "Try downloading the files one at a time.",
            Transient,
        ),

        // -- Execution --
        SeitenwerkError::Cancelled => HumanError::new(
            "The operation was cancelled.",
            "Start it again when you're ready.",
            Transient,
        ),

        SeitenwerkError::Task(_) | SeitenwerkError::Serialization(_) => HumanError::new(
            "Something went wrong inside the app.",
            "Try again. If this keeps happening, please report it.",
            Transient,
        ),

        SeitenwerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError::new(
                    "The file couldn't be found.",
                    "It may have been moved or deleted. Try choosing the file again.",
                    ActionRequired,
                )
            } else {
                HumanError::new(
                    "There was a problem reading or writing a file.",
                    "Try again. If this keeps happening, your device's storage may be full.",
                    Transient,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_password_names_the_file() {
        let err = SeitenwerkError::EncryptedDocument {
            source_name: "tax-2025.pdf".into(),
            password_attempted: true,
        };
        let human = humanize_error(&err);
        assert!(human.message.contains("tax-2025.pdf"));
        assert!(human.message.contains("password"));
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
    }

    #[test]
    fn page_index_is_shown_one_based() {
        let err = SeitenwerkError::PageOutOfRange {
            index: 4,
            page_count: 3,
        };
        let human = humanize_error(&err);
        assert_eq!(human.message, "Page 5 doesn't exist.");
    }

    #[test]
    fn parse_failure_is_permanent() {
        let human = humanize_error(&SeitenwerkError::parse("scan.pdf", "bad xref"));
        assert_eq!(human.severity, Severity::Permanent);
    }

    #[test]
    fn ocr_failure_is_retriable() {
        let human = humanize_error(&SeitenwerkError::Ocr("engine busy".into()));
        assert!(human.retriable);
    }
}
