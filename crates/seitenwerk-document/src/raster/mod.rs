// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterization: page → bitmap, shared by image export, thumbnails and OCR.

pub mod canvas;
pub mod pipeline;
pub mod thumbnails;

use image::RgbaImage;
use seitenwerk_core::Rotation;
use seitenwerk_core::error::Result;

use crate::model::Document;

pub use canvas::CanvasRasterizer;
pub use pipeline::{RasterOptions, rasterize, render_pages};
pub use thumbnails::ThumbnailCache;

/// Renders one page to an RGBA bitmap.
///
/// The bitmap covers the page's visible box at `scale` pixels per point and
/// is turned clockwise by the page's own rotation plus `rotation`.
pub trait Rasterizer: Send + Sync {
    fn render(
        &self,
        document: &Document,
        page_index: usize,
        scale: f32,
        rotation: Rotation,
    ) -> Result<RgbaImage>;
}
