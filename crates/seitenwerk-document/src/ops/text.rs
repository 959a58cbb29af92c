// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text extraction, either straight from content streams or by OCR over
// rasterised pages.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use seitenwerk_core::error::Result;
use seitenwerk_core::{Color, Progress, Rotation};
use tracing::{debug, info, instrument};

use crate::content::{ContentSink, Matrix, TextRun, run_page};
use crate::image::ImageProcessor;
use crate::model::Document;
use crate::ocr::OcrAdapter;
use crate::raster::Rasterizer;

/// Glyphs whose baselines differ by less than this many ems share a line.
const LINE_TOLERANCE_EM: f32 = 0.5;
/// A horizontal gap wider than this many ems becomes a space.
const WORD_GAP_EM: f32 = 0.25;

/// Per-page text plus everything joined with blank lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub pages: Vec<String>,
    pub full_text: String,
}

impl ExtractedText {
    fn from_pages(pages: Vec<String>) -> Self {
        let full_text = pages.join("\n\n");
        Self { pages, full_text }
    }

    /// True when no page produced any non-whitespace text, as with scans.
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TextMode {
    Direct,
    Ocr { scale: f32, language: String },
}

#[derive(Debug, Clone)]
struct PlacedGlyph {
    text: String,
    /// Position along the baseline direction.
    along: f32,
    /// Position across it, larger is higher up.
    across: f32,
    advance: f32,
    size: f32,
}

/// Collects glyphs, including invisible text layers, grouped by the
/// direction their baseline runs in.
#[derive(Default)]
struct TextCollector {
    directions: Vec<(i32, Vec<PlacedGlyph>)>,
}

impl ContentSink for TextCollector {
    fn show_text(&mut self, run: &TextRun) {
        let size = run.font_size.abs().max(0.1);
        for glyph in run.glyphs.iter().filter(|g| !g.text.is_empty()) {
            // Baseline direction from the glyph's upright edge, which is
            // never degenerate even for zero-width glyphs.
            let [bl, _, _, tl] = glyph.quad;
            let (dx, dy) = (tl.1 - bl.1, bl.0 - tl.0);
            let len = dx.hypot(dy);
            let (dx, dy) = if len > f32::EPSILON { (dx / len, dy / len) } else { (1.0, 0.0) };
            let key = dy.atan2(dx).to_degrees().round() as i32;
            let (ox, oy) = glyph.origin;
            let placed = PlacedGlyph {
                text: glyph.text.clone(),
                along: ox * dx + oy * dy,
                across: oy * dx - ox * dy,
                advance: glyph.advance,
                size,
            };
            match self.directions.iter_mut().find(|(k, _)| *k == key) {
                Some((_, glyphs)) => glyphs.push(placed),
                None => self.directions.push((key, vec![placed])),
            }
        }
    }

    fn wants_images(&self) -> bool {
        false
    }
}

impl TextCollector {
    /// Text for each baseline direction in order of first appearance; within
    /// a direction, lines top to bottom and glyphs in reading order.
    fn into_text(self) -> String {
        let mut out = Vec::new();
        for (_, glyphs) in self.directions {
            lay_out_lines(glyphs, &mut out);
        }
        out.join("\n")
    }
}

fn lay_out_lines(mut glyphs: Vec<PlacedGlyph>, out: &mut Vec<String>) {
    glyphs.sort_by(|a, b| b.across.total_cmp(&a.across));
    let mut lines: Vec<Vec<PlacedGlyph>> = Vec::new();
    let mut line_across = f32::NAN;
    for glyph in glyphs {
        match lines.last_mut() {
            Some(line) if line_across - glyph.across <= LINE_TOLERANCE_EM * glyph.size => {
                line.push(glyph)
            }
            _ => {
                line_across = glyph.across;
                lines.push(vec![glyph]);
            }
        }
    }

    for mut line in lines {
        line.sort_by(|a, b| a.along.total_cmp(&b.along));
        let mut text = String::new();
        let mut pen: Option<f32> = None;
        for glyph in line {
            if let Some(end) = pen {
                let spaced = text.ends_with(char::is_whitespace)
                    || glyph.text.starts_with(char::is_whitespace);
                if glyph.along - end > WORD_GAP_EM * glyph.size && !spaced {
                    text.push(' ');
                }
            }
            text.push_str(&glyph.text);
            pen = Some(glyph.along + glyph.advance);
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            out.push(trimmed.to_string());
        }
    }
}

/// Text of one page in reading order.
pub fn page_text(document: &Document, page_index: usize) -> Result<String> {
    let mut collector = TextCollector::default();
    run_page(document, page_index, Matrix::IDENTITY, &mut collector, 0)?;
    Ok(collector.into_text())
}

/// Walk every page's text operators. Yields nothing for image-only pages.
#[instrument(skip_all, fields(pages = document.page_count()))]
pub fn extract_text(document: &Document, progress: &Progress) -> Result<ExtractedText> {
    let total = document.page_count();
    let mut pages = Vec::with_capacity(total);
    for index in 0..total {
        progress.checkpoint()?;
        pages.push(page_text(document, index)?);
        progress.report(index + 1, total);
    }
    let text = ExtractedText::from_pages(pages);
    info!(chars = text.full_text.len(), "Direct text extraction complete");
    Ok(text)
}

/// Rasterise each page at `scale` and hand it to `adapter`.
///
/// Pages are flattened onto white before recognition and processed one at
/// a time so only a single full-resolution bitmap is alive.
#[instrument(skip_all, fields(pages = document.page_count(), scale = scale, language = %language))]
pub fn ocr_text(
    document: &Document,
    rasterizer: &dyn Rasterizer,
    adapter: &dyn OcrAdapter,
    scale: f32,
    language: &str,
    progress: &Progress,
) -> Result<ExtractedText> {
    let total = document.page_count();
    let mut pages = Vec::with_capacity(total);
    for index in 0..total {
        progress.checkpoint()?;
        let bitmap = rasterizer.render(document, index, scale, Rotation::Deg0)?;
        let bitmap: RgbaImage = ImageProcessor::from_rgba(bitmap).flatten(Color::WHITE).into_rgba8();
        let text = adapter.recognize(&bitmap, language)?;
        debug!(page = index, chars = text.len(), "Page recognised");
        pages.push(text.trim().to_string());
        progress.report(index + 1, total);
    }
    let text = ExtractedText::from_pages(pages);
    info!(chars = text.full_text.len(), "OCR text extraction complete");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::organize::rotate;
    use crate::raster::CanvasRasterizer;
    use crate::test_support;
    use seitenwerk_core::CancelToken;
    use seitenwerk_core::error::SeitenwerkError;
    use std::sync::Mutex;

    const LETTER: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

    fn text_of(content: &str) -> String {
        page_text(&test_support::document_from_content(LETTER, content), 0).unwrap()
    }

    #[test]
    fn per_page_text_and_full_text() {
        let doc = test_support::document_with_pages(&["Hello world", "Second"]);
        let text = extract_text(&doc, &Progress::none()).unwrap();
        assert_eq!(text.pages, ["Hello world", "Second"]);
        assert_eq!(text.full_text, "Hello world\n\nSecond");
    }

    #[test]
    fn lines_follow_the_page_not_the_stream() {
        let content = "BT /F1 12 Tf 72 680 Td (Bottom) Tj ET BT /F1 12 Tf 72 700 Td (Top) Tj ET";
        assert_eq!(text_of(content), "Top\nBottom");
    }

    #[test]
    fn separate_runs_on_one_line_get_a_space() {
        let content = "BT /F1 12 Tf 300 700 Td (Right) Tj ET BT /F1 12 Tf 72 700 Td (Left) Tj ET";
        assert_eq!(text_of(content), "Left Right");
    }

    #[test]
    fn kerned_runs_stay_joined() {
        assert_eq!(text_of("BT /F1 12 Tf 72 700 Td [(Hel) -20 (lo)] TJ ET"), "Hello");
    }

    #[test]
    fn invisible_text_layers_are_extracted() {
        assert_eq!(text_of("BT 3 Tr /F1 12 Tf 72 700 Td (scanned) Tj ET"), "scanned");
    }

    #[test]
    fn image_only_pages_are_blank() {
        let doc = crate::pdf::load_bytes("img.pdf", &test_support::pdf_with_image(), None).unwrap();
        let text = extract_text(&doc, &Progress::none()).unwrap();
        assert!(text.is_blank());
    }

    #[test]
    fn page_rotation_does_not_scramble_lines() {
        let content = "BT /F1 12 Tf 72 700 Td (first) Tj 0 -20 Td (second) Tj ET";
        let doc = rotate(&test_support::document_from_content(LETTER, content), &[(0, 180)]).unwrap();
        assert_eq!(page_text(&doc, 0).unwrap(), "first\nsecond");
    }

    #[test]
    fn vertical_text_reads_along_its_baseline() {
        let content = "BT /F1 12 Tf 0 1 -1 0 100 100 Tm (up) Tj 0 -20 Td (next) Tj ET";
        assert_eq!(text_of(content), "up\nnext");
    }

    struct SizeReporter {
        languages: Mutex<Vec<String>>,
    }

    impl OcrAdapter for SizeReporter {
        fn recognize(&self, bitmap: &RgbaImage, language: &str) -> Result<String> {
            self.languages.lock().unwrap().push(language.to_string());
            assert!(bitmap.pixels().all(|p| p.0[3] == 255));
            Ok(format!(" {}x{} ", bitmap.width(), bitmap.height()))
        }
    }

    struct Failing;

    impl OcrAdapter for Failing {
        fn recognize(&self, _bitmap: &RgbaImage, _language: &str) -> Result<String> {
            Err(SeitenwerkError::Ocr("model missing".into()))
        }
    }

    #[test]
    fn ocr_renders_at_scale_and_passes_language() {
        let doc = test_support::document_with_pages(&["a", "b"]);
        let adapter = SizeReporter {
            languages: Mutex::new(Vec::new()),
        };
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress = Progress::new(move |f| sink.lock().unwrap().push(f));
        let text = ocr_text(&doc, &CanvasRasterizer::default(), &adapter, 0.5, "eng", &progress).unwrap();
        assert_eq!(text.pages, ["306x396", "306x396"]);
        assert_eq!(*adapter.languages.lock().unwrap(), ["eng", "eng"]);
        assert_eq!(*seen.lock().unwrap(), [0.5, 1.0]);
    }

    #[test]
    fn ocr_errors_propagate() {
        let doc = test_support::document_with_pages(&["a"]);
        let err = ocr_text(&doc, &CanvasRasterizer::default(), &Failing, 1.0, "eng", &Progress::none())
            .unwrap_err();
        assert!(matches!(err, SeitenwerkError::Ocr(_)));
    }

    #[test]
    fn cancelled_extraction_stops() {
        let doc = test_support::document_with_pages(&["a", "b"]);
        let token = CancelToken::new();
        token.cancel();
        let progress = Progress::none().with_cancel(token);
        let err = extract_text(&doc, &progress).unwrap_err();
        assert!(matches!(err, SeitenwerkError::Cancelled));
    }
}
