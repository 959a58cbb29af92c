// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thumbnail cache for organise/reorder views.

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use seitenwerk_core::error::Result;
use seitenwerk_core::{DocumentId, Progress, Rotation};
use tracing::debug;

use super::Rasterizer;
use super::pipeline::render_pages;
use crate::model::Document;

/// Page bitmaps for one open document, keyed by page index and scale.
///
/// Bound to a single [`DocumentId`]. Presenting a document with a different
/// id (including a mutated copy of the same one) empties the cache first.
#[derive(Debug, Default)]
pub struct ThumbnailCache {
    document: Option<DocumentId>,
    entries: HashMap<(usize, u32), Arc<RgbaImage>>,
}

fn scale_key(scale: f32) -> u32 {
    (scale * 1000.0).round().max(0.0) as u32
}

impl ThumbnailCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn document(&self) -> Option<DocumentId> {
        self.document
    }

    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.document = None;
    }

    fn bind(&mut self, id: DocumentId) {
        if self.document != Some(id) {
            if self.document.is_some() {
                debug!(old = ?self.document, new = %id, "Thumbnail cache invalidated");
            }
            self.entries.clear();
            self.document = Some(id);
        }
    }

    pub fn get(&self, document: &Document, page_index: usize, scale: f32) -> Option<Arc<RgbaImage>> {
        if self.document != Some(document.id()) {
            return None;
        }
        self.entries.get(&(page_index, scale_key(scale))).cloned()
    }

    pub fn get_or_render(
        &mut self,
        rasterizer: &dyn Rasterizer,
        document: &Document,
        page_index: usize,
        scale: f32,
    ) -> Result<Arc<RgbaImage>> {
        self.bind(document.id());
        let key = (page_index, scale_key(scale));
        if let Some(hit) = self.entries.get(&key) {
            return Ok(Arc::clone(hit));
        }
        let bitmap = Arc::new(rasterizer.render(document, page_index, scale, Rotation::Deg0)?);
        self.entries.insert(key, Arc::clone(&bitmap));
        Ok(bitmap)
    }

    /// Thumbnails for every page, rendering only the missing ones.
    pub fn all_pages(
        &mut self,
        rasterizer: &dyn Rasterizer,
        document: &Document,
        scale: f32,
        workers: usize,
        progress: &Progress,
    ) -> Result<Vec<Arc<RgbaImage>>> {
        self.bind(document.id());
        let key = scale_key(scale);
        let missing: Vec<usize> = (0..document.page_count())
            .filter(|index| !self.entries.contains_key(&(*index, key)))
            .collect();
        debug!(missing = missing.len(), pages = document.page_count(), "Rendering thumbnails");
        let rendered = render_pages(
            rasterizer,
            document,
            &missing,
            scale,
            Rotation::Deg0,
            workers,
            progress,
        )?;
        for (index, bitmap) in missing.into_iter().zip(rendered) {
            self.entries.insert((index, key), Arc::new(bitmap));
        }
        Ok((0..document.page_count())
            .filter_map(|index| self.entries.get(&(index, key)).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::raster::CanvasRasterizer;
    use crate::test_support;

    #[derive(Default)]
    struct Counting {
        calls: AtomicUsize,
        inner: CanvasRasterizer,
    }

    impl Rasterizer for Counting {
        fn render(&self, document: &Document, page_index: usize, scale: f32, rotation: Rotation) -> Result<RgbaImage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.render(document, page_index, scale, rotation)
        }
    }

    #[test]
    fn repeated_requests_hit_the_cache() {
        let doc = test_support::document_with_pages(&["a", "b"]);
        let raster = Counting::default();
        let mut cache = ThumbnailCache::new();
        cache.get_or_render(&raster, &doc, 0, 0.3).unwrap();
        cache.get_or_render(&raster, &doc, 0, 0.3).unwrap();
        cache.get_or_render(&raster, &doc, 0, 0.5).unwrap();
        assert_eq!(raster.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn new_document_identity_clears_entries() {
        let doc = test_support::document_with_pages(&["a", "b"]);
        let raster = Counting::default();
        let mut cache = ThumbnailCache::new();
        cache.all_pages(&raster, &doc, 0.1, 2, &Progress::none()).unwrap();
        assert_eq!(cache.len(), 2);

        let mut edited = doc.clone();
        edited.metadata_mut().title = Some("changed".into());
        assert!(cache.get(&edited, 0, 0.1).is_none());
        cache.get_or_render(&raster, &edited, 0, 0.1).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.document(), Some(edited.id()));
    }

    #[test]
    fn all_pages_only_renders_missing() {
        let doc = test_support::document_with_pages(&["a", "b", "c"]);
        let raster = Counting::default();
        let mut cache = ThumbnailCache::new();
        cache.get_or_render(&raster, &doc, 1, 0.1).unwrap();
        let thumbs = cache.all_pages(&raster, &doc, 0.1, 2, &Progress::none()).unwrap();
        assert_eq!(thumbs.len(), 3);
        assert_eq!(raster.calls.load(Ordering::SeqCst), 3);
    }
}
