// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Merge: concatenate every page of several PDFs, in order.

use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{Progress, SourceFile};
use tracing::{debug, info, instrument};

use crate::model::Document;
use crate::pdf::load;

/// Load each source in turn and append all of its pages.
///
/// Progress is reported once per source. The first source that fails to
/// load aborts the merge; its error names the file.
#[instrument(skip_all, fields(sources = sources.len()))]
pub fn merge(sources: &[SourceFile], progress: &Progress) -> Result<Document> {
    if sources.is_empty() {
        return Err(SeitenwerkError::NoInput("merge needs at least one PDF".into()));
    }
    let mut merged = Document::new();
    for (i, source) in sources.iter().enumerate() {
        progress.checkpoint()?;
        let document = load(source)?;
        debug!(source = %source.name, pages = document.page_count(), "Appending source");
        merged.append_document(&document)?;
        progress.report(i + 1, sources.len());
    }
    info!(pages = merged.page_count(), "Merge complete");
    Ok(merged)
}

/// Merge already-loaded documents.
pub fn merge_documents(documents: &[Document], progress: &Progress) -> Result<Document> {
    if documents.is_empty() {
        return Err(SeitenwerkError::NoInput("merge needs at least one PDF".into()));
    }
    let mut merged = Document::new();
    for (i, document) in documents.iter().enumerate() {
        progress.checkpoint()?;
        merged.append_document(document)?;
        progress.report(i + 1, documents.len());
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use std::sync::{Arc, Mutex};

    fn source(name: &str, texts: &[&str]) -> SourceFile {
        SourceFile::new(name, test_support::pdf_with_pages(texts))
    }

    #[test]
    fn page_count_is_the_sum_and_content_matches() {
        let a = source("a.pdf", &["a1", "a2"]);
        let b = source("b.pdf", &["b1", "b2", "b3"]);
        let merged = merge(&[a.clone(), b.clone()], &Progress::none()).unwrap();
        assert_eq!(merged.page_count(), 5);

        let mut expected = load(&a).unwrap().fingerprints().unwrap();
        expected.extend(load(&b).unwrap().fingerprints().unwrap());
        assert_eq!(merged.fingerprints().unwrap(), expected);
        assert_eq!(merged.pages()[3].origin().source, "b.pdf");
    }

    #[test]
    fn shared_resources_are_stored_once() {
        let a = source("a.pdf", &["x"]);
        let b = source("b.pdf", &["y"]);
        let merged = merge(&[a, b], &Progress::none()).unwrap();
        assert_eq!(merged.pages()[0].resources(), merged.pages()[1].resources());
    }

    #[test]
    fn failing_source_is_named() {
        let good = source("good.pdf", &["x"]);
        let bad = SourceFile::new("broken.pdf", b"%PDF-1.7 garbage".to_vec());
        let err = merge(&[good, bad], &Progress::none()).unwrap_err();
        assert!(matches!(err, SeitenwerkError::Parse { ref source_name, .. } if source_name == "broken.pdf"));
    }

    #[test]
    fn progress_is_per_source() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |f| sink.lock().unwrap().push(f));
        let sources = [source("a.pdf", &["1"]), source("b.pdf", &["2"])];
        merge(&sources, &progress).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0.5, 1.0]);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            merge(&[], &Progress::none()),
            Err(SeitenwerkError::NoInput(_))
        ));
    }
}
