// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Async facade: bytes in, artifacts out.
//
// Every operation is synchronous underneath; the engine moves each call
// onto tokio's blocking pool so an async caller is never stalled by
// parsing or rendering.

use std::sync::{Arc, Mutex};

use image::RgbaImage;
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{ArtifactKind, EngineConfig, OutputArtifact, Progress, SourceFile};
use seitenwerk_security::ProtectionRequest;
use tracing::{debug, info};

use crate::model::Document;
use crate::ocr::OcrAdapter;
use crate::ops::{
    self, ComposeOptions, ExtractedText, OrganizePlan, OverlaySpec, SplitMode, TextMode,
};
use crate::package::{self, Delivery};
use crate::pdf::{self, SaveOptions};
use crate::raster::{self, CanvasRasterizer, RasterOptions, Rasterizer, ThumbnailCache};

/// Run `work` on the blocking pool.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| SeitenwerkError::Task(err.to_string()))?
}

/// One engine instance: configuration, a rasterizer, an optional OCR
/// backend, and the thumbnail cache for the currently open document.
#[derive(Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
    rasterizer: Arc<dyn Rasterizer>,
    ocr: Option<Arc<dyn OcrAdapter>>,
    thumbnails: Arc<Mutex<ThumbnailCache>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let rasterizer = Arc::new(CanvasRasterizer::new(config.max_raster_pixels));
        Self {
            config: Arc::new(config),
            rasterizer,
            ocr: None,
            thumbnails: Arc::new(Mutex::new(ThumbnailCache::new())),
        }
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_ocr(mut self, adapter: Arc<dyn OcrAdapter>) -> Self {
        self.ocr = Some(adapter);
        self
    }

    /// Attach the bundled `ocrs` backend.
    #[cfg(feature = "ocr")]
    pub fn with_ocrs(self, config: &crate::ocr::OcrConfig) -> Result<Self> {
        let adapter = crate::ocr::OcrsAdapter::new(config)?;
        Ok(self.with_ocr(Arc::new(adapter)))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    fn save_options(&self) -> SaveOptions {
        SaveOptions::from_config(&self.config)
    }

    /// Parse a source into a document, e.g. to open an organise session.
    pub async fn open(&self, source: SourceFile) -> Result<Document> {
        blocking(move || pdf::load(&source)).await
    }

    /// Merge `sources` in order into `merged.pdf`.
    pub async fn merge(&self, sources: Vec<SourceFile>, progress: Progress) -> Result<OutputArtifact> {
        let options = self.save_options();
        blocking(move || {
            let merged = ops::merge(&sources, &progress)?;
            let bytes = pdf::save(&merged, &options)?;
            Ok(OutputArtifact::new("merged.pdf", bytes, ArtifactKind::Pdf))
        })
        .await
    }

    pub async fn split(
        &self,
        source: SourceFile,
        mode: SplitMode,
        progress: Progress,
    ) -> Result<Vec<OutputArtifact>> {
        let options = self.save_options();
        blocking(move || {
            let document = pdf::load(&source)?;
            ops::split(&document, &mode, &options, &progress)
        })
        .await
    }

    /// Reorder, rotate and delete in one call.
    pub async fn organize(&self, source: SourceFile, plan: OrganizePlan) -> Result<OutputArtifact> {
        let options = self.save_options();
        blocking(move || {
            let document = pdf::load(&source)?;
            let organized = ops::organize(&document, &plan)?;
            let name = format!("{}-organized.pdf", source.stem());
            Ok(OutputArtifact::new(name, pdf::save(&organized, &options)?, ArtifactKind::Pdf))
        })
        .await
    }

    /// Apply each overlay in turn, e.g. a watermark then page numbers.
    pub async fn overlay(&self, source: SourceFile, specs: Vec<OverlaySpec>) -> Result<OutputArtifact> {
        if specs.is_empty() {
            return Err(SeitenwerkError::NoInput("no overlay requested".into()));
        }
        let options = self.save_options();
        blocking(move || {
            let mut document = pdf::load(&source)?;
            for spec in &specs {
                document = ops::apply_overlay(&document, spec)?;
            }
            let name = format!("{}-stamped.pdf", source.stem());
            Ok(OutputArtifact::new(name, pdf::save(&document, &options)?, ArtifactKind::Pdf))
        })
        .await
    }

    pub async fn protect(&self, source: SourceFile, request: ProtectionRequest) -> Result<OutputArtifact> {
        request.check_supported()?;
        let options = self.save_options();
        blocking(move || {
            let document = pdf::load(&source)?;
            let bytes = ops::protect(&document, &request, &options)?;
            let name = format!("{}-protected.pdf", source.stem());
            Ok(OutputArtifact::new(name, bytes, ArtifactKind::Pdf))
        })
        .await
    }

    pub async fn pdf_to_images(
        &self,
        source: SourceFile,
        options: RasterOptions,
        progress: Progress,
    ) -> Result<Vec<OutputArtifact>> {
        let rasterizer = Arc::clone(&self.rasterizer);
        let workers = self.config.workers();
        blocking(move || {
            let document = pdf::load(&source)?;
            raster::rasterize(rasterizer.as_ref(), &document, source.stem(), &options, workers, &progress)
        })
        .await
    }

    /// Thumbnails of every page at the configured scale.
    ///
    /// Bitmaps are cached per document identity; passing a different
    /// document (including an edited one) starts a fresh cache.
    pub async fn thumbnails(&self, document: Arc<Document>, progress: Progress) -> Result<Vec<Arc<RgbaImage>>> {
        let rasterizer = Arc::clone(&self.rasterizer);
        let cache = Arc::clone(&self.thumbnails);
        let scale = self.config.thumbnail_scale;
        let workers = self.config.workers();
        blocking(move || {
            let mut cache = cache
                .lock()
                .map_err(|_| SeitenwerkError::Task("thumbnail cache poisoned".into()))?;
            cache.all_pages(rasterizer.as_ref(), &document, scale, workers, &progress)
        })
        .await
    }

    /// Drop every cached thumbnail.
    pub fn clear_thumbnails(&self) {
        if let Ok(mut cache) = self.thumbnails.lock() {
            cache.invalidate();
        }
    }

    pub async fn images_to_pdf(
        &self,
        images: Vec<SourceFile>,
        options: Option<ComposeOptions>,
        progress: Progress,
    ) -> Result<OutputArtifact> {
        let options = options.unwrap_or_else(|| ComposeOptions::from_config(&self.config));
        blocking(move || {
            let bytes = ops::images_to_pdf(&images, &options, &progress)?;
            Ok(OutputArtifact::new("images.pdf", bytes, ArtifactKind::Pdf))
        })
        .await
    }

    /// Direct extraction, or OCR when `mode` asks for it. Choosing the mode
    /// is up to the caller.
    pub async fn extract_text(
        &self,
        source: SourceFile,
        mode: TextMode,
        progress: Progress,
    ) -> Result<ExtractedText> {
        match mode {
            TextMode::Direct => {
                blocking(move || {
                    let document = pdf::load(&source)?;
                    ops::extract_text(&document, &progress)
                })
                .await
            }
            TextMode::Ocr { scale, language } => {
                let Some(adapter) = self.ocr.clone() else {
                    return Err(SeitenwerkError::Ocr("no OCR backend is configured".into()));
                };
                let rasterizer = Arc::clone(&self.rasterizer);
                debug!(scale, language = %language, "Starting OCR extraction");
                blocking(move || {
                    let document = pdf::load(&source)?;
                    ops::ocr_text(
                        &document,
                        rasterizer.as_ref(),
                        adapter.as_ref(),
                        scale,
                        &language,
                        &progress,
                    )
                })
                .await
            }
        }
    }

    /// OCR mode with the configured scale and language.
    pub fn default_ocr_mode(&self) -> TextMode {
        TextMode::Ocr {
            scale: self.config.ocr_scale,
            language: self.config.ocr_language.clone(),
        }
    }

    pub async fn package(&self, artifacts: Vec<OutputArtifact>, archive_name: String) -> Result<Delivery> {
        let delivery = blocking(move || package::package(artifacts, &archive_name)).await?;
        info!(file = %delivery.artifact().file_name, "Delivery ready");
        Ok(delivery)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::split::SplitMode;
    use crate::test_support;
    use seitenwerk_core::{PageRange, RasterFormat};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pdf(name: &str, texts: &[&str]) -> SourceFile {
        SourceFile::new(name, test_support::pdf_with_pages(texts))
    }

    #[tokio::test]
    async fn merge_then_split_by_ranges() {
        let engine = Engine::default();
        let merged = engine
            .merge(vec![pdf("a.pdf", &["1", "2"]), pdf("b.pdf", &["3", "4", "5"])], Progress::none())
            .await
            .unwrap();
        assert_eq!(merged.file_name, "merged.pdf");

        let parts = engine
            .split(
                SourceFile::new("merged.pdf", merged.bytes),
                SplitMode::Ranges(vec![PageRange::new(1, 2), PageRange::new(3, 5)]),
                Progress::none(),
            )
            .await
            .unwrap();
        let counts: Vec<usize> = parts
            .iter()
            .map(|a| pdf::load_bytes(&a.file_name, &a.bytes, None).unwrap().page_count())
            .collect();
        assert_eq!(counts, [2, 3]);

        let Delivery::Archive(zip) = engine.package(parts, "parts".into()).await.unwrap() else {
            panic!("expected an archive");
        };
        assert_eq!(zip.file_name, "parts.zip");
    }

    #[tokio::test]
    async fn organize_applies_every_edit() {
        let engine = Engine::default();
        let plan = OrganizePlan {
            order: Some(vec![2, 1, 0]),
            rotations: vec![(0, 90)],
            deletions: vec![2],
        };
        let out = engine.organize(pdf("doc.pdf", &["a", "b", "c"]), plan).await.unwrap();
        assert_eq!(out.file_name, "doc-organized.pdf");
        let doc = pdf::load_bytes("doc.pdf", &out.bytes, None).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.pages()[0].rotation().degrees(), 90);
    }

    #[tokio::test]
    async fn overlays_stack_in_order() {
        let engine = Engine::default();
        let out = engine
            .overlay(
                pdf("doc.pdf", &["a", "b"]),
                vec![
                    OverlaySpec::watermark("DRAFT", ops::WatermarkBand::Middle),
                    OverlaySpec::page_numbers(ops::PageNumberPosition::BottomRight, "{n}/{total}"),
                ],
            )
            .await
            .unwrap();
        let doc = pdf::load_bytes("doc.pdf", &out.bytes, None).unwrap();
        let content = String::from_utf8(doc.page_content(1).unwrap()).unwrap();
        let draft = content.find("(DRAFT)").unwrap();
        let number = content.find("(2/2)").unwrap();
        assert!(draft < number);
    }

    #[tokio::test]
    async fn protect_refuses_before_working() {
        let engine = Engine::default();
        let request = ProtectionRequest::new("pw")
            .with_strength(seitenwerk_security::EncryptionStrength::Aes256);
        let err = engine.protect(pdf("doc.pdf", &["a"]), request).await.unwrap_err();
        assert!(matches!(err, SeitenwerkError::ProtectionUnsupported(_)));
    }

    #[tokio::test]
    async fn pdf_to_jpeg_images() {
        let engine = Engine::default();
        let options = RasterOptions::default().with_scale(0.5).with_format(RasterFormat::Jpeg);
        let images = engine
            .pdf_to_images(pdf("scan.pdf", &["a", "b"]), options, Progress::none())
            .await
            .unwrap();
        let names: Vec<&str> = images.iter().map(|a| a.file_name.as_str()).collect();
        assert_eq!(names, ["scan-page-1.jpg", "scan-page-2.jpg"]);
    }

    struct Counting(AtomicUsize);

    impl Rasterizer for Counting {
        fn render(
            &self,
            _document: &Document,
            _page_index: usize,
            _scale: f32,
            _rotation: seitenwerk_core::Rotation,
        ) -> Result<RgbaImage> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(RgbaImage::new(2, 2))
        }
    }

    #[tokio::test]
    async fn thumbnails_are_cached_per_document() {
        let counter = Arc::new(Counting(AtomicUsize::new(0)));
        let engine = Engine::default().with_rasterizer(counter.clone());
        let doc = Arc::new(test_support::document_with_pages(&["a", "b", "c"]));

        assert_eq!(engine.thumbnails(Arc::clone(&doc), Progress::none()).await.unwrap().len(), 3);
        engine.thumbnails(Arc::clone(&doc), Progress::none()).await.unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);

        let edited = Arc::new(ops::rotate(&doc, &[(0, 90)]).unwrap());
        engine.thumbnails(edited, Progress::none()).await.unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn compose_uses_configured_paper() {
        let engine = Engine::default();
        let images = (0..3)
            .map(|i| SourceFile::new(format!("{i}.jpg"), test_support::jpeg_bytes(800, 600)))
            .collect();
        let out = engine.images_to_pdf(images, None, Progress::none()).await.unwrap();
        let doc = pdf::load_bytes("images.pdf", &out.bytes, None).unwrap();
        assert_eq!(doc.page_count(), 3);
        let (w, h) = seitenwerk_core::PaperSize::A4.dimensions_pt();
        assert!((doc.pages()[0].width() - w).abs() < 0.5);
        assert!((doc.pages()[0].height() - h).abs() < 0.5);
    }

    struct Echo;

    impl OcrAdapter for Echo {
        fn recognize(&self, _bitmap: &RgbaImage, language: &str) -> Result<String> {
            Ok(format!("recognised in {language}"))
        }
    }

    #[tokio::test]
    async fn text_modes() {
        let engine = Engine::default();
        let direct = engine
            .extract_text(pdf("doc.pdf", &["Hello"]), TextMode::Direct, Progress::none())
            .await
            .unwrap();
        assert_eq!(direct.full_text, "Hello");

        let err = engine
            .extract_text(pdf("doc.pdf", &["Hello"]), engine.default_ocr_mode(), Progress::none())
            .await
            .unwrap_err();
        assert!(matches!(err, SeitenwerkError::Ocr(_)));

        let engine = engine.with_ocr(Arc::new(Echo));
        let mode = TextMode::Ocr {
            scale: 0.25,
            language: "eng".into(),
        };
        let ocr = engine
            .extract_text(pdf("doc.pdf", &["Hello"]), mode, Progress::none())
            .await
            .unwrap();
        assert_eq!(ocr.pages, ["recognised in eng"]);
    }

    #[tokio::test]
    async fn parse_errors_name_the_source() {
        let engine = Engine::default();
        let err = engine
            .split(SourceFile::new("junk.pdf", b"not a pdf".to_vec()), SplitMode::AllPages, Progress::none())
            .await
            .unwrap_err();
        assert!(matches!(err, SeitenwerkError::Parse { ref source_name, .. } if source_name == "junk.pdf"));
    }
}
