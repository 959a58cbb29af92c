// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Built-in rasterizer: paints interpreted page content onto an RGBA canvas
// with `imageproc`'s blending drawing primitives.

use image::{Pixel, Rgba, RgbaImage};
use imageproc::drawing::{Blend, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;
use seitenwerk_core::Rotation;
use seitenwerk_core::error::{Result, SeitenwerkError};
use tracing::{debug, instrument};

use super::Rasterizer;
use crate::content::{ContentSink, FillRule, Matrix, Paint, Subpath, TextRun, run_page};
use crate::image::ImageProcessor;
use crate::model::Document;

/// Coordinates beyond this are clamped before conversion to pixels.
const COORD_LIMIT: f32 = 1.0e6;
/// Strokes thinner than this (in pixels) are drawn as hairlines.
const HAIRLINE: f32 = 1.5;
/// Opacity multiplier for greeked glyph bars.
const GREEK_ALPHA: f32 = 0.45;

/// Renders pages by interpreting their content streams.
///
/// Text is greeked: each visible glyph becomes a bar from the baseline to
/// roughly x-height, in the fill colour. Clipping paths are ignored.
#[derive(Debug, Clone)]
pub struct CanvasRasterizer {
    max_pixels: u64,
}

impl CanvasRasterizer {
    /// `max_pixels` bounds the size of any one page bitmap.
    pub fn new(max_pixels: u64) -> Self {
        Self { max_pixels }
    }

    pub fn max_pixels(&self) -> u64 {
        self.max_pixels
    }
}

impl Default for CanvasRasterizer {
    fn default() -> Self {
        Self::new(seitenwerk_core::EngineConfig::default().max_raster_pixels)
    }
}

impl Rasterizer for CanvasRasterizer {
    #[instrument(skip(self, document, rotation), fields(rotation = rotation.degrees()))]
    fn render(
        &self,
        document: &Document,
        page_index: usize,
        scale: f32,
        rotation: Rotation,
    ) -> Result<RgbaImage> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(SeitenwerkError::Render {
                page_index,
                detail: format!("scale must be positive, got {scale}"),
            });
        }
        let page = document.page(page_index)?;
        let [llx, lly, urx, ury] = page.visible_box();
        let width = ((urx - llx) * scale).round().max(1.0) as u32;
        let height = ((ury - lly) * scale).round().max(1.0) as u32;
        let pixels = u64::from(width) * u64::from(height);
        if pixels > self.max_pixels {
            return Err(SeitenwerkError::Render {
                page_index,
                detail: format!(
                    "{width}x{height} bitmap exceeds the {} pixel limit",
                    self.max_pixels
                ),
            });
        }

        // User space (y up, origin at the box's lower-left) to pixels (y down).
        let base = Matrix::new(scale, 0.0, 0.0, -scale, -llx * scale, ury * scale);
        let mut canvas = Canvas {
            target: Blend(RgbaImage::new(width, height)),
        };
        run_page(document, page_index, base, &mut canvas, self.max_pixels)?;

        let turn = page.rotation().combine(rotation);
        debug!(width, height, turn = turn.degrees(), "Page painted");
        Ok(ImageProcessor::from_rgba(canvas.target.0)
            .rotate(turn)
            .into_rgba8())
    }
}

struct Canvas {
    target: Blend<RgbaImage>,
}

impl Canvas {
    fn polygon(&mut self, points: &[(f32, f32)], colour: Rgba<u8>) {
        let mut poly: Vec<Point<i32>> = Vec::with_capacity(points.len());
        for &(x, y) in points {
            let p = Point::new(to_pixel(x), to_pixel(y));
            if poly.last() != Some(&p) {
                poly.push(p);
            }
        }
        while poly.len() > 1 && poly.first() == poly.last() {
            poly.pop();
        }
        if poly.len() < 3 {
            if let [a, b] = poly.as_slice() {
                draw_line_segment_mut(
                    &mut self.target,
                    (a.x as f32, a.y as f32),
                    (b.x as f32, b.y as f32),
                    colour,
                );
            }
            return;
        }
        draw_polygon_mut(&mut self.target, &poly, colour);
    }

    fn segment(&mut self, from: (f32, f32), to: (f32, f32), width: f32, colour: Rgba<u8>) {
        if width < HAIRLINE {
            draw_line_segment_mut(&mut self.target, clamp(from), clamp(to), colour);
            return;
        }
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let length = dx.hypot(dy);
        if length < f32::EPSILON {
            return;
        }
        let (nx, ny) = (-dy / length * width / 2.0, dx / length * width / 2.0);
        self.polygon(
            &[
                (from.0 + nx, from.1 + ny),
                (to.0 + nx, to.1 + ny),
                (to.0 - nx, to.1 - ny),
                (from.0 - nx, from.1 - ny),
            ],
            colour,
        );
    }
}

impl ContentSink for Canvas {
    fn fill_path(&mut self, path: &[Subpath], _rule: FillRule, paint: Paint) {
        let colour = rgba(paint, 1.0);
        for subpath in path {
            self.polygon(&subpath.points, colour);
        }
    }

    fn stroke_path(&mut self, path: &[Subpath], width: f32, paint: Paint) {
        let colour = rgba(paint, 1.0);
        for subpath in path {
            for pair in subpath.points.windows(2) {
                self.segment(pair[0], pair[1], width, colour);
            }
            if subpath.closed && subpath.points.len() > 2 {
                if let (Some(&last), Some(&first)) = (subpath.points.last(), subpath.points.first()) {
                    self.segment(last, first, width, colour);
                }
            }
        }
    }

    fn draw_image(&mut self, image: &RgbaImage, placement: &Matrix, alpha: f32) {
        let Some(inverse) = placement.invert() else {
            return;
        };
        let corners = [
            placement.apply(0.0, 0.0),
            placement.apply(1.0, 0.0),
            placement.apply(1.0, 1.0),
            placement.apply(0.0, 1.0),
        ];
        let (canvas_w, canvas_h) = self.target.0.dimensions();
        let min_x = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min).floor().max(0.0);
        let max_x = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max).ceil().min(canvas_w as f32);
        let min_y = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min).floor().max(0.0);
        let max_y = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max).ceil().min(canvas_h as f32);
        if min_x >= max_x || min_y >= max_y {
            return;
        }
        let (src_w, src_h) = image.dimensions();
        if src_w == 0 || src_h == 0 {
            return;
        }
        for py in min_y as u32..max_y as u32 {
            for px in min_x as u32..max_x as u32 {
                let (u, v) = inverse.apply(px as f32 + 0.5, py as f32 + 0.5);
                if !(0.0..1.0).contains(&u) || !(0.0..1.0).contains(&v) {
                    continue;
                }
                // Image row 0 is the top of the unit square.
                let sx = ((u * src_w as f32) as u32).min(src_w - 1);
                let sy = (((1.0 - v) * src_h as f32) as u32).min(src_h - 1);
                let mut source = *image.get_pixel(sx, sy);
                source.0[3] = (f32::from(source.0[3]) * alpha).round() as u8;
                self.target.0.get_pixel_mut(px, py).blend(&source);
            }
        }
    }

    fn show_text(&mut self, run: &TextRun) {
        if run.is_invisible() {
            return;
        }
        let colour = rgba(run.paint, GREEK_ALPHA);
        for glyph in &run.glyphs {
            if glyph.text.trim().is_empty() {
                continue;
            }
            let [bl, br, tr, tl] = glyph.quad;
            let lerp = |a: (f32, f32), b: (f32, f32), t: f32| (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t);
            // Quad spans -0.2..0.8 em; the bar covers baseline to x-height.
            let bottom_left = lerp(bl, tl, 0.2);
            let top_left = lerp(bl, tl, 0.7);
            let bottom_right = lerp(br, tr, 0.2);
            let top_right = lerp(br, tr, 0.7);
            let inset = |a: (f32, f32), b: (f32, f32)| (lerp(a, b, 0.1), lerp(a, b, 0.9));
            let (bl, br) = inset(bottom_left, bottom_right);
            let (tl, tr) = inset(top_left, top_right);
            self.polygon(&[bl, br, tr, tl], colour);
        }
    }
}

fn to_pixel(v: f32) -> i32 {
    v.clamp(-COORD_LIMIT, COORD_LIMIT).floor() as i32
}

fn clamp(p: (f32, f32)) -> (f32, f32) {
    (
        p.0.clamp(-COORD_LIMIT, COORD_LIMIT),
        p.1.clamp(-COORD_LIMIT, COORD_LIMIT),
    )
}

fn rgba(paint: Paint, factor: f32) -> Rgba<u8> {
    let [r, g, b] = paint.color.to_rgb8();
    let a = (paint.alpha * factor * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba([r, g, b, a])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::load_bytes;
    use crate::test_support;

    fn render(document: &Document, scale: f32, rotation: Rotation) -> Result<RgbaImage> {
        CanvasRasterizer::new(10_000_000).render(document, 0, scale, rotation)
    }

    #[test]
    fn bitmap_is_page_size_times_scale() {
        let doc = test_support::document_with_pages(&["hello"]);
        let bitmap = render(&doc, 2.0, Rotation::Deg0).unwrap();
        assert_eq!(bitmap.dimensions(), (1224, 1584));
    }

    #[test]
    fn quarter_turn_swaps_dimensions() {
        let doc = test_support::document_from_content([0.0, 0.0, 200.0, 100.0], "");
        let bitmap = render(&doc, 1.0, Rotation::Deg90).unwrap();
        assert_eq!(bitmap.dimensions(), (100, 200));
    }

    #[test]
    fn page_rotation_is_combined_with_request() {
        let bytes = test_support::rotated_tree_pdf(90);
        let doc = load_bytes("rot.pdf", &bytes, None).unwrap();
        assert_eq!(render(&doc, 1.0, Rotation::Deg0).unwrap().dimensions(), (400, 300));
        assert_eq!(render(&doc, 1.0, Rotation::Deg270).unwrap().dimensions(), (300, 400));
    }

    #[test]
    fn filled_rectangle_lands_bottom_left() {
        let doc = test_support::document_from_content(
            [0.0, 0.0, 200.0, 100.0],
            "1 0 0 rg 0 0 100 50 re f",
        );
        let bitmap = render(&doc, 1.0, Rotation::Deg0).unwrap();
        assert_eq!(bitmap.get_pixel(10, 90).0, [255, 0, 0, 255]);
        assert_eq!(bitmap.get_pixel(150, 10).0[3], 0);
    }

    #[test]
    fn image_xobject_is_painted() {
        let doc = load_bytes("img.pdf", &test_support::pdf_with_image(), None).unwrap();
        let bitmap = render(&doc, 1.0, Rotation::Deg0).unwrap();
        assert_eq!(bitmap.get_pixel(10, 50).0, [255, 0, 0, 255]);
        assert_eq!(bitmap.get_pixel(90, 50).0, [0, 0, 255, 255]);
    }

    #[test]
    fn image_with_overflowing_dimensions_is_skipped() {
        let bytes = test_support::pdf_with_image_sized(4_294_967_296, 4_294_967_296);
        let doc = load_bytes("huge.pdf", &bytes, None).unwrap();
        let bitmap = render(&doc, 1.0, Rotation::Deg0).unwrap();
        assert_eq!(bitmap.dimensions(), (100, 100));
        assert_eq!(bitmap.get_pixel(50, 50).0[3], 0);
    }

    #[test]
    fn empty_bitmap_draws_nothing() {
        let mut canvas = Canvas {
            target: Blend(RgbaImage::new(4, 4)),
        };
        canvas.draw_image(&RgbaImage::new(0, 0), &Matrix::new(4.0, 0.0, 0.0, 4.0, 0.0, 0.0), 1.0);
        assert!(canvas.target.0.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn text_leaves_marks() {
        let doc = test_support::document_with_pages(&["MMMM"]);
        let bitmap = render(&doc, 1.0, Rotation::Deg0).unwrap();
        // Baseline at y=700 → row 92; x-height band sits just above it.
        let inked = (72..140).any(|x| bitmap.get_pixel(x, 85).0[3] > 0);
        assert!(inked);
    }

    #[test]
    fn oversized_bitmap_is_refused() {
        let doc = test_support::document_with_pages(&["x"]);
        let err = CanvasRasterizer::new(1_000)
            .render(&doc, 0, 1.0, Rotation::Deg0)
            .unwrap_err();
        assert!(matches!(err, SeitenwerkError::Render { page_index: 0, .. }));
    }

    #[test]
    fn non_positive_scale_is_refused() {
        let doc = test_support::document_with_pages(&["x"]);
        assert!(render(&doc, 0.0, Rotation::Deg0).is_err());
        assert!(render(&doc, f32::NAN, Rotation::Deg0).is_err());
    }
}
