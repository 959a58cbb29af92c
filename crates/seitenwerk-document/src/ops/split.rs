// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Split / extract: one output document per page, or per page range.

use serde::{Deserialize, Serialize};
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{ArtifactKind, OutputArtifact, PageRange, Progress};
use tracing::{info, instrument};

use crate::model::Document;
use crate::pdf::{SaveOptions, save};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitMode {
    /// One single-page document per page, named `page-{n}.pdf`.
    AllPages,
    /// One document per range, in the order given. Ranges may overlap.
    Ranges(Vec<PageRange>),
}

/// Artifact name for a range: its label (with `.pdf` appended when
/// missing), or `pages-{start}-{end}.pdf`.
pub fn range_file_name(range: &PageRange) -> String {
    match range.label.as_deref().map(str::trim) {
        Some(label) if !label.is_empty() => {
            if label.to_ascii_lowercase().ends_with(".pdf") {
                label.to_string()
            } else {
                format!("{label}.pdf")
            }
        }
        _ => format!("pages-{}-{}.pdf", range.start, range.end),
    }
}

/// Plan the split: file names and zero-based page lists. Every range is
/// validated before anything is built.
fn plan(document: &Document, mode: &SplitMode) -> Result<Vec<(String, Vec<usize>)>> {
    let page_count = document.page_count();
    match mode {
        SplitMode::AllPages => {
            if page_count == 0 {
                return Err(SeitenwerkError::NoInput("document has no pages".into()));
            }
            Ok((0..page_count)
                .map(|i| (format!("page-{}.pdf", i + 1), vec![i]))
                .collect())
        }
        SplitMode::Ranges(ranges) => {
            if ranges.is_empty() {
                return Err(SeitenwerkError::InvalidPageRange {
                    range: "(none)".into(),
                    detail: "at least one page range is required".into(),
                });
            }
            for range in ranges {
                range.validate(page_count)?;
            }
            Ok(ranges
                .iter()
                .map(|range| (range_file_name(range), range.indices().collect()))
                .collect())
        }
    }
}

/// Split into named in-memory documents.
pub fn split_documents(document: &Document, mode: &SplitMode) -> Result<Vec<(String, Document)>> {
    plan(document, mode)?
        .into_iter()
        .map(|(name, indices)| Ok((name, document.extract(&indices)?)))
        .collect()
}

/// Split and serialise each part.
#[instrument(skip_all, fields(pages = document.page_count()))]
pub fn split(
    document: &Document,
    mode: &SplitMode,
    options: &SaveOptions,
    progress: &Progress,
) -> Result<Vec<OutputArtifact>> {
    let parts = plan(document, mode)?;
    let total = parts.len();
    let mut artifacts = Vec::with_capacity(total);
    for (i, (name, indices)) in parts.into_iter().enumerate() {
        progress.checkpoint()?;
        let part = document.extract(&indices)?;
        artifacts.push(OutputArtifact::new(name, save(&part, options)?, ArtifactKind::Pdf));
        progress.report(i + 1, total);
    }
    info!(parts = artifacts.len(), "Split complete");
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::merge::merge_documents;
    use crate::pdf::load_bytes;
    use crate::test_support;

    #[test]
    fn all_pages_then_merge_round_trips() {
        let doc = test_support::document_with_pages(&["1", "2", "3", "4"]);
        let parts = split_documents(&doc, &SplitMode::AllPages).unwrap();
        let names: Vec<_> = parts.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["page-1.pdf", "page-2.pdf", "page-3.pdf", "page-4.pdf"]);

        let documents: Vec<Document> = parts.into_iter().map(|(_, d)| d).collect();
        let rejoined = merge_documents(&documents, &Progress::none()).unwrap();
        assert_eq!(rejoined.fingerprints().unwrap(), doc.fingerprints().unwrap());
    }

    #[test]
    fn ranges_contain_exactly_their_pages() {
        let doc = test_support::document_with_pages(&["1", "2", "3", "4", "5"]);
        let fingerprints = doc.fingerprints().unwrap();
        let mode = SplitMode::Ranges(vec![PageRange::new(2, 3), PageRange::new(5, 5)]);
        let parts = split_documents(&doc, &mode).unwrap();
        assert_eq!(parts[0].1.fingerprints().unwrap(), fingerprints[1..3]);
        assert_eq!(parts[1].1.fingerprints().unwrap(), fingerprints[4..5]);
    }

    #[test]
    fn merged_then_split_by_ranges() {
        let a = test_support::document_with_pages(&["a1", "a2"]);
        let b = test_support::document_with_pages(&["b1", "b2", "b3"]);
        let merged = merge_documents(&[a, b], &Progress::none()).unwrap();
        let mode = SplitMode::Ranges(vec![PageRange::new(1, 2), PageRange::new(3, 5)]);
        let out = split(&merged, &mode, &SaveOptions::default(), &Progress::none()).unwrap();
        assert_eq!(out[0].file_name, "pages-1-2.pdf");
        assert_eq!(out[1].file_name, "pages-3-5.pdf");
        let counts: Vec<usize> = out
            .iter()
            .map(|a| load_bytes(&a.file_name, &a.bytes, None).unwrap().page_count())
            .collect();
        assert_eq!(counts, [2, 3]);
    }

    #[test]
    fn labels_name_the_artifacts() {
        assert_eq!(range_file_name(&PageRange::labelled(1, 2, "intro")), "intro.pdf");
        assert_eq!(range_file_name(&PageRange::labelled(1, 2, "Appendix.PDF")), "Appendix.PDF");
        assert_eq!(range_file_name(&PageRange::labelled(1, 2, "  ")), "pages-1-2.pdf");
    }

    #[test]
    fn invalid_range_fails_before_any_output() {
        let doc = test_support::document_with_pages(&["1", "2"]);
        let mode = SplitMode::Ranges(vec![PageRange::new(1, 1), PageRange::new(2, 3)]);
        let err = split(&doc, &mode, &SaveOptions::default(), &Progress::none()).unwrap_err();
        assert!(matches!(err, SeitenwerkError::InvalidPageRange { .. }));
    }

    #[test]
    fn empty_range_list_is_an_error() {
        let doc = test_support::document_with_pages(&["1"]);
        let err = split_documents(&doc, &SplitMode::Ranges(Vec::new())).unwrap_err();
        assert!(err.is_validation());
    }
}
