// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR adapter contract.
//
// The engine only rasterises pages and hands the bitmaps over; recognition
// itself is an external capability. An `ocrs`-backed adapter is available
// behind the `ocr` feature.

#[cfg(feature = "ocr")]
pub mod ocrs_adapter;

use image::RgbaImage;
use seitenwerk_core::error::Result;

#[cfg(feature = "ocr")]
pub use ocrs_adapter::{OcrConfig, OcrsAdapter};

/// Recognises text in a page bitmap.
///
/// Failures are reported as [`seitenwerk_core::SeitenwerkError::Ocr`].
pub trait OcrAdapter: Send + Sync {
    /// `language` is an ISO 639 code such as `"eng"`.
    fn recognize(&self, bitmap: &RgbaImage, language: &str) -> Result<String>;
}
