// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tunables for one engine instance. The embedding application owns where
/// these come from; the engine never reads files itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Page size used by image → PDF composition when none is requested.
    pub default_paper_size: crate::PaperSize,
    /// Margin around composed images, in points.
    pub image_margin_pt: f32,
    /// Upper bound on pages rendered concurrently.
    pub raster_workers: usize,
    /// Scale factor for organise/reorder thumbnails.
    pub thumbnail_scale: f32,
    /// Scale factor used when rasterising pages for OCR.
    pub ocr_scale: f32,
    /// Default OCR language code.
    pub ocr_language: String,
    /// JPEG quality (1-100) for raster export.
    pub jpeg_quality: u8,
    /// Largest bitmap (in pixels) a single page render may allocate.
    pub max_raster_pixels: u64,
    /// Written into `/Producer` of every output document.
    pub producer: String,
    /// Flate-compress uncompressed streams on save.
    pub compress_output: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_paper_size: crate::PaperSize::A4,
            image_margin_pt: 20.0,
            raster_workers: 4,
            thumbnail_scale: 0.3,
            ocr_scale: 2.0,
            ocr_language: "eng".into(),
            jpeg_quality: 90,
            max_raster_pixels: 120_000_000,
            producer: "Seitenwerk".into(),
            compress_output: true,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration document; missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Worker limit, never below one.
    pub fn workers(&self) -> usize {
        self.raster_workers.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{ "raster_workers": 2, "jpeg_quality": 75 }"#)
            .unwrap();
        assert_eq!(config.raster_workers, 2);
        assert_eq!(config.jpeg_quality, 75);
        assert_eq!(config.ocr_language, "eng");
        assert_eq!(config.default_paper_size, crate::PaperSize::A4);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(EngineConfig::from_json("{ nope").is_err());
    }

    #[test]
    fn zero_workers_means_one() {
        let config = EngineConfig {
            raster_workers: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.workers(), 1);
    }
}
