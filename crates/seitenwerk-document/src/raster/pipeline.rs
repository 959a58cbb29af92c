// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Parallel page rendering and raster export.

use std::sync::atomic::{AtomicUsize, Ordering};

use image::RgbaImage;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{Color, EngineConfig, OutputArtifact, Progress, RasterFormat, Rotation};
use tracing::{info, instrument};

use super::Rasterizer;
use crate::image::ImageProcessor;
use crate::model::Document;

/// Parameters for PDF → image export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterOptions {
    /// Pixels per point.
    pub scale: f32,
    /// Extra clockwise turn on top of each page's own rotation.
    pub rotation: Rotation,
    pub format: RasterFormat,
    /// JPEG quality, 1-100.
    pub quality: u8,
    /// Fill for transparent areas when alpha is not kept.
    pub background: Color,
    /// Keep transparency in PNG output. Ignored for JPEG and WebP.
    pub keep_alpha: bool,
    /// Zero-based pages to export; every page when `None`.
    pub pages: Option<Vec<usize>>,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation: Rotation::Deg0,
            format: RasterFormat::Png,
            quality: 90,
            background: Color::WHITE,
            keep_alpha: false,
            pages: None,
        }
    }
}

impl RasterOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            quality: config.jpeg_quality,
            ..Self::default()
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_format(mut self, format: RasterFormat) -> Self {
        self.format = format;
        self
    }

    fn page_indices(&self, document: &Document) -> Result<Vec<usize>> {
        let indices = match &self.pages {
            Some(pages) => pages.clone(),
            None => (0..document.page_count()).collect(),
        };
        for &index in &indices {
            document.page(index)?;
        }
        Ok(indices)
    }
}

/// Run `work` for each page on at most `workers` threads, returning results
/// in the order of `indices`.
fn for_each_page<T, F>(
    indices: &[usize],
    workers: usize,
    progress: &Progress,
    work: F,
) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|err| SeitenwerkError::Task(format!("failed to start render workers: {err}")))?;
    let total = indices.len();
    let done = AtomicUsize::new(0);
    pool.install(|| {
        indices
            .par_iter()
            .map(|&index| {
                progress.checkpoint()?;
                let out = work(index)?;
                progress.report(done.fetch_add(1, Ordering::SeqCst) + 1, total);
                Ok(out)
            })
            .collect()
    })
}

/// Render `indices` to bitmaps, in the given order.
pub fn render_pages(
    rasterizer: &dyn Rasterizer,
    document: &Document,
    indices: &[usize],
    scale: f32,
    rotation: Rotation,
    workers: usize,
    progress: &Progress,
) -> Result<Vec<RgbaImage>> {
    for &index in indices {
        document.page(index)?;
    }
    for_each_page(indices, workers, progress, |index| {
        rasterizer.render(document, index, scale, rotation)
    })
}

/// Render and encode pages as artifacts named `{stem}-page-{n}.{ext}`.
#[instrument(skip_all, fields(stem = %stem, pages = document.page_count(), format = ?options.format, scale = options.scale))]
pub fn rasterize(
    rasterizer: &dyn Rasterizer,
    document: &Document,
    stem: &str,
    options: &RasterOptions,
    workers: usize,
    progress: &Progress,
) -> Result<Vec<OutputArtifact>> {
    let indices = options.page_indices(document)?;
    if indices.is_empty() {
        return Err(SeitenwerkError::NoInput("no pages selected for export".into()));
    }
    let kind = options.format.artifact_kind();
    let artifacts = for_each_page(&indices, workers, progress, |index| {
        let bitmap = rasterizer.render(document, index, options.scale, options.rotation)?;
        let processor = ImageProcessor::from_rgba(bitmap);
        let processor = if options.keep_alpha && options.format.supports_alpha() {
            processor
        } else {
            processor.flatten(options.background)
        };
        let bytes = processor.encode(options.format, options.quality)?;
        Ok(OutputArtifact::new(
            format!("{stem}-page-{}.{}", index + 1, kind.extension()),
            bytes,
            kind,
        ))
    })?;
    info!(count = artifacts.len(), "Pages exported as images");
    Ok(artifacts)
}
