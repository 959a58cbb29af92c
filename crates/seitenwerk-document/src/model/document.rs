// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory document: ordered pages over a shared resource pool.

use std::collections::HashMap;

use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::DocumentId;
use seitenwerk_security::hash_bytes;

use super::metadata::Metadata;
use super::page::Page;
use super::pool::{ResourceId, ResourcePool};

/// A loaded or assembled PDF.
///
/// Operations never mutate their inputs; they clone or build a new
/// `Document`. Any mutation through the crate-internal accessors assigns a
/// fresh [`DocumentId`], which is what thumbnail caches key on.
#[derive(Debug, Clone)]
pub struct Document {
    id: DocumentId,
    pages: Vec<Page>,
    metadata: Metadata,
    pool: ResourcePool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document with no pages.
    pub fn new() -> Self {
        Self::from_parts(Vec::new(), Metadata::default(), ResourcePool::new())
    }

    pub(crate) fn from_parts(pages: Vec<Page>, metadata: Metadata, pool: ResourcePool) -> Self {
        Self {
            id: DocumentId::new(),
            pages,
            metadata,
            pool,
        }
    }

    pub fn id(&self) -> DocumentId {
        self.id
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn page(&self, index: usize) -> Result<&Page> {
        self.pages.get(index).ok_or(SeitenwerkError::PageOutOfRange {
            index,
            page_count: self.pages.len(),
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        self.touch();
        &mut self.metadata
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub(crate) fn page_mut(&mut self, index: usize) -> Result<&mut Page> {
        let page_count = self.pages.len();
        if index >= page_count {
            return Err(SeitenwerkError::PageOutOfRange { index, page_count });
        }
        self.touch();
        Ok(&mut self.pages[index])
    }

    pub(crate) fn pages_mut(&mut self) -> &mut Vec<Page> {
        self.touch();
        &mut self.pages
    }

    /// Split borrow for writers that intern resources while editing pages.
    pub(crate) fn pages_and_pool_mut(&mut self) -> (&mut Vec<Page>, &mut ResourcePool) {
        self.touch();
        (&mut self.pages, &mut self.pool)
    }

    fn touch(&mut self) {
        self.id = DocumentId::new();
    }

    /// Append copies of the given pages of `source`, interning their
    /// resources into this document's pool. All indices are checked first.
    pub fn append_pages_from(&mut self, source: &Document, indices: &[usize]) -> Result<()> {
        for &index in indices {
            source.page(index)?;
        }
        let mut memo: HashMap<ResourceId, ResourceId> = HashMap::new();
        let (pages, pool) = self.pages_and_pool_mut();
        for &index in indices {
            pages.push(source.pages[index].import(&source.pool, pool, &mut memo));
        }
        Ok(())
    }

    pub fn append_document(&mut self, source: &Document) -> Result<()> {
        let all: Vec<usize> = (0..source.page_count()).collect();
        self.append_pages_from(source, &all)
    }

    /// New document holding the given pages in the given order, with this
    /// document's metadata. Its pool only contains what those pages reach.
    pub fn extract(&self, indices: &[usize]) -> Result<Document> {
        let mut out = Document::new();
        out.append_pages_from(self, indices)?;
        out.metadata = self.metadata.clone();
        Ok(out)
    }

    /// Decoded bytes of the page's source content streams, joined by newlines.
    pub fn page_content(&self, index: usize) -> Result<Vec<u8>> {
        let page = self.page(index)?;
        Ok(join_streams(&self.pool, page.source_streams()))
    }

    pub fn overlay_content(&self, index: usize) -> Result<Vec<u8>> {
        let page = self.page(index)?;
        Ok(join_streams(&self.pool, page.overlay_streams()))
    }

    /// SHA-256 of the page's decoded source content. Stable across merge,
    /// split, reorder, rotate and save/load.
    pub fn page_fingerprint(&self, index: usize) -> Result<String> {
        Ok(hash_bytes(&self.page_content(index)?))
    }

    pub fn fingerprints(&self) -> Result<Vec<String>> {
        (0..self.page_count())
            .map(|i| self.page_fingerprint(i))
            .collect()
    }
}

fn join_streams(pool: &ResourcePool, streams: impl Iterator<Item = ResourceId>) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, id) in streams.enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        if let Some(data) = pool.stream_data(id) {
            out.extend_from_slice(&data);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::page::PageOrigin;
    use lopdf::{Dictionary, Object, Stream, dictionary};

    fn single_page_doc(content: &[u8]) -> Document {
        let mut pool = ResourcePool::new();
        let font = pool.intern(Object::Dictionary(dictionary! { "BaseFont" => "Helvetica" }));
        let res = pool.intern(Object::Dictionary(dictionary! {
            "Font" => dictionary! { "F1" => font.reference() },
        }));
        let stream = pool.intern(Object::Stream(Stream::new(Dictionary::new(), content.to_vec())));
        let mut page = Page::new(
            [0.0, 0.0, 612.0, 792.0],
            PageOrigin {
                source: "t.pdf".into(),
                index: 0,
            },
        );
        page.set_resources(Some(res));
        page.push_source(stream);
        Document::from_parts(vec![page], Metadata::default(), pool)
    }

    #[test]
    fn appending_shares_identical_resources() {
        let a = single_page_doc(b"BT /F1 12 Tf (a) Tj ET");
        let b = single_page_doc(b"BT /F1 12 Tf (b) Tj ET");
        let mut merged = Document::new();
        merged.append_document(&a).unwrap();
        merged.append_document(&b).unwrap();
        assert_eq!(merged.page_count(), 2);
        // font + resources shared, two distinct content streams
        assert_eq!(merged.pool().len(), 4);
        assert_eq!(merged.pages()[0].resources(), merged.pages()[1].resources());
    }

    #[test]
    fn fingerprints_survive_extract() {
        let a = single_page_doc(b"0 0 m 10 10 l S");
        let before = a.page_fingerprint(0).unwrap();
        let copy = a.extract(&[0]).unwrap();
        assert_eq!(copy.page_fingerprint(0).unwrap(), before);
        assert_ne!(copy.id(), a.id());
    }

    #[test]
    fn extract_rejects_bad_index_without_partial_work() {
        let a = single_page_doc(b"q Q");
        let err = a.extract(&[0, 3]).unwrap_err();
        assert!(matches!(
            err,
            SeitenwerkError::PageOutOfRange {
                index: 3,
                page_count: 1
            }
        ));
    }

    #[test]
    fn mutation_renews_identity() {
        let mut a = single_page_doc(b"q Q");
        let before = a.id();
        a.metadata_mut().title = Some("x".into());
        assert_ne!(a.id(), before);
    }

    #[test]
    fn missing_page_keeps_identity() {
        let mut a = single_page_doc(b"q Q");
        let before = a.id();
        assert!(matches!(
            a.page_mut(3),
            Err(SeitenwerkError::PageOutOfRange { index: 3, page_count: 1 })
        ));
        assert_eq!(a.id(), before);
        a.page_mut(0).unwrap();
        assert_ne!(a.id(), before);
    }
}
