// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compose: one PDF page per raster image, written with `printpdf` 0.8.
//
// Images are placed via `Op::UseXobject` at 72 dpi, so one pixel is one
// point before any scaling.

use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use serde::{Deserialize, Serialize};
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{Color, EngineConfig, Orientation, PaperSize, Progress, SourceFile, SourceKind};
use tracing::{debug, info, instrument, warn};

use crate::image::ImageProcessor;
use crate::model::Document;
use crate::pdf::load_bytes;

const PLACEMENT_DPI: f32 = 72.0;

/// How each composed page is sized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PageSizing {
    /// Page matches the image, one point per pixel.
    Native,
    /// Fixed paper; the image is centred inside the margin and shrunk to
    /// fit if needed, never enlarged.
    Paper {
        size: PaperSize,
        orientation: Orientation,
        margin_pt: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeOptions {
    pub sizing: PageSizing,
    pub title: Option<String>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl ComposeOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            sizing: PageSizing::Paper {
                size: config.default_paper_size,
                orientation: Orientation::Portrait,
                margin_pt: config.image_margin_pt,
            },
            title: None,
        }
    }

    pub fn native() -> Self {
        Self {
            sizing: PageSizing::Native,
            title: None,
        }
    }

    pub fn paper(size: PaperSize, orientation: Orientation, margin_pt: f32) -> Self {
        Self {
            sizing: PageSizing::Paper {
                size,
                orientation,
                margin_pt,
            },
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// Page size in points and the image transform for one image.
struct Placement {
    page_w: f32,
    page_h: f32,
    x: f32,
    y: f32,
    scale: f32,
}

fn place(sizing: &PageSizing, img_w: f32, img_h: f32) -> Result<Placement> {
    match *sizing {
        PageSizing::Native => Ok(Placement {
            page_w: img_w,
            page_h: img_h,
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }),
        PageSizing::Paper {
            size,
            orientation,
            margin_pt,
        } => {
            let (page_w, page_h) = orientation.apply(size.dimensions_pt());
            let usable_w = page_w - 2.0 * margin_pt;
            let usable_h = page_h - 2.0 * margin_pt;
            if !(margin_pt.is_finite() && margin_pt >= 0.0 && usable_w > 0.0 && usable_h > 0.0) {
                return Err(SeitenwerkError::Image(format!(
                    "margin of {margin_pt}pt leaves no room on {size:?} paper"
                )));
            }
            let scale = (usable_w / img_w).min(usable_h / img_h).min(1.0);
            Ok(Placement {
                page_w,
                page_h,
                x: margin_pt + (usable_w - img_w * scale) / 2.0,
                y: margin_pt + (usable_h - img_h * scale) / 2.0,
                scale,
            })
        }
    }
}

fn pt_to_mm(pt: f32) -> Mm {
    Mm(pt / 72.0 * 25.4)
}

/// Build a PDF with one page per image, in order.
#[instrument(skip_all, fields(images = images.len(), sizing = ?options.sizing))]
pub fn images_to_pdf(
    images: &[SourceFile],
    options: &ComposeOptions,
    progress: &Progress,
) -> Result<Vec<u8>> {
    if images.is_empty() {
        return Err(SeitenwerkError::NoInput("no images to compose".into()));
    }
    let title = options.title.as_deref().unwrap_or("Seitenwerk Images");
    let mut doc = PdfDocument::new(title);
    let mut pages = Vec::with_capacity(images.len());

    for (i, source) in images.iter().enumerate() {
        progress.checkpoint()?;
        let unsupported = |detail: String| SeitenwerkError::UnsupportedImageFormat {
            file_name: source.name.clone(),
            detail,
        };
        match SourceKind::sniff(&source.bytes) {
            Some(kind) if kind.is_image() => {}
            Some(kind) => return Err(unsupported(format!("{} is not an image", kind.mime_type()))),
            None => return Err(unsupported("unrecognised file signature".into())),
        }
        let decoded = ImageProcessor::from_bytes(&source.bytes)
            .map_err(|err| unsupported(err.to_string()))?;
        let (width, height) = (decoded.width(), decoded.height());
        if width == 0 || height == 0 {
            return Err(unsupported("image has no pixels".into()));
        }

        let rgb = decoded.flatten(Color::WHITE).into_dynamic().to_rgb8();
        let raw = RawImage {
            pixels: RawImageData::U8(rgb.into_raw()),
            width: width as usize,
            height: height as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let xobject_id = doc.add_image(&raw);

        let placement = place(&options.sizing, width as f32, height as f32)?;
        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(placement.x)),
                translate_y: Some(Pt(placement.y)),
                scale_x: Some(placement.scale),
                scale_y: Some(placement.scale),
                dpi: Some(PLACEMENT_DPI),
                rotate: None,
            },
        }];
        debug!(
            image = %source.name,
            width,
            height,
            scale = placement.scale,
            "Image placed on page"
        );
        pages.push(PdfPage::new(
            pt_to_mm(placement.page_w),
            pt_to_mm(placement.page_h),
            ops,
        ));
        progress.report(i + 1, images.len());
    }

    doc.with_pages(pages);
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
    if !warnings.is_empty() {
        warn!(count = warnings.len(), "PDF writer reported warnings");
    }
    info!(bytes = output.len(), "Images composed");
    Ok(output)
}

/// Compose and load the result into the document model.
pub fn compose(images: &[SourceFile], options: &ComposeOptions, progress: &Progress) -> Result<Document> {
    let bytes = images_to_pdf(images, options, progress)?;
    load_bytes("composed.pdf", &bytes, None)
}
