// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// seitenwerk-document: The PDF transformation engine.
//
// Loads PDFs into an owned document model, runs page operations over it
// (merge, split, organise, overlay, protect), rasterises pages for image
// export, thumbnails and OCR, composes images into PDFs, extracts text, and
// packages the results for delivery.

pub mod content;
pub mod engine;
pub mod image;
pub mod model;
pub mod ocr;
pub mod ops;
pub mod package;
pub mod pdf;
pub mod raster;

#[cfg(test)]
mod test_support;

// Re-export the primary types so callers can use `seitenwerk_document::Engine` etc.
pub use crate::image::ImageProcessor;
pub use engine::Engine;
pub use model::{Document, Metadata, Page};
pub use ocr::OcrAdapter;
pub use package::{Delivery, package};
pub use pdf::{SaveOptions, load, load_bytes, save};
pub use raster::{CanvasRasterizer, RasterOptions, Rasterizer, ThumbnailCache};

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrsAdapter};
