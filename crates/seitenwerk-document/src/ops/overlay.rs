// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text overlays: watermarks, page numbers, headers and footers.
//
// One mechanism serves all of them. Text is set in standard Helvetica
// (WinAnsi), positioned in the page's displayed orientation, and appended as
// an overlay layer so the source content is left byte-for-byte intact.

use lopdf::{Object, Stream, dictionary};
use serde::{Deserialize, Serialize};
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{Color, PageRange, Rotation};
use tracing::{debug, info, instrument};

use crate::content::Matrix;
use crate::content::fonts::{helvetica_width, win_ansi_byte};
use crate::model::{Document, Page, ResourceCategory, ResourceId, ResourcePool};
use crate::pdf::objects;

/// Helvetica cap height, in em.
const CAP_HEIGHT: f32 = 0.718;
const MAX_FONT_SIZE: f32 = 1000.0;

/// One of the nine grid positions on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Anchor {
    /// Horizontal and vertical placement, 0 = left/bottom, 1 = right/top.
    fn factors(self) -> (f32, f32) {
        match self {
            Self::TopLeft => (0.0, 1.0),
            Self::TopCenter => (0.5, 1.0),
            Self::TopRight => (1.0, 1.0),
            Self::MiddleLeft => (0.0, 0.5),
            Self::Center => (0.5, 0.5),
            Self::MiddleRight => (1.0, 0.5),
            Self::BottomLeft => (0.0, 0.0),
            Self::BottomCenter => (0.5, 0.0),
            Self::BottomRight => (1.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Position {
    Anchor(Anchor),
    /// Baseline start, in points from the displayed page's lower-left corner.
    Absolute { x: f32, y: f32 },
}

/// Distance kept between anchored text and each page edge, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub const fn uniform(points: f32) -> Self {
        Self {
            top: points,
            right: points,
            bottom: points,
            left: points,
        }
    }

    fn is_valid(&self) -> bool {
        [self.top, self.right, self.bottom, self.left]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(36.0)
    }
}

/// The six places page numbers can go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageNumberPosition {
    TopLeft,
    TopCenter,
    TopRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl From<PageNumberPosition> for Anchor {
    fn from(position: PageNumberPosition) -> Self {
        match position {
            PageNumberPosition::TopLeft => Anchor::TopLeft,
            PageNumberPosition::TopCenter => Anchor::TopCenter,
            PageNumberPosition::TopRight => Anchor::TopRight,
            PageNumberPosition::BottomLeft => Anchor::BottomLeft,
            PageNumberPosition::BottomCenter => Anchor::BottomCenter,
            PageNumberPosition::BottomRight => Anchor::BottomRight,
        }
    }
}

/// Vertical band for a watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatermarkBand {
    Top,
    Middle,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// What to draw and where.
///
/// `template` may contain `{n}` (the page's 1-based number in the document)
/// and `{total}` (the document's page count).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySpec {
    pub template: String,
    pub position: Position,
    pub margins: Margins,
    pub font_size: f32,
    pub color: Color,
    /// 0.0 (invisible) to 1.0 (opaque).
    pub opacity: f32,
    /// Counter-clockwise, about the text's centre for anchored positions.
    pub rotation_degrees: f32,
    /// Restrict to these pages (1-based, inclusive).
    pub pages: Option<PageRange>,
    pub skip_first_page: bool,
}

impl OverlaySpec {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            position: Position::Anchor(Anchor::Center),
            margins: Margins::default(),
            font_size: 12.0,
            color: Color::BLACK,
            opacity: 1.0,
            rotation_degrees: 0.0,
            pages: None,
            skip_first_page: false,
        }
    }

    /// Page numbers, e.g. `"Page {n} of {total}"`.
    pub fn page_numbers(position: PageNumberPosition, template: impl Into<String>) -> Self {
        Self {
            position: Position::Anchor(position.into()),
            font_size: 10.0,
            ..Self::new(template)
        }
    }

    /// Large, translucent, diagonal text.
    pub fn watermark(text: impl Into<String>, band: WatermarkBand) -> Self {
        let anchor = match band {
            WatermarkBand::Top => Anchor::TopCenter,
            WatermarkBand::Middle => Anchor::Center,
            WatermarkBand::Bottom => Anchor::BottomCenter,
        };
        Self {
            position: Position::Anchor(anchor),
            font_size: 48.0,
            color: Color::GRAY,
            opacity: 0.3,
            rotation_degrees: 45.0,
            ..Self::new(text)
        }
    }

    pub fn header(text: impl Into<String>, align: Align) -> Self {
        let anchor = match align {
            Align::Left => Anchor::TopLeft,
            Align::Center => Anchor::TopCenter,
            Align::Right => Anchor::TopRight,
        };
        Self {
            position: Position::Anchor(anchor),
            font_size: 10.0,
            ..Self::new(text)
        }
    }

    pub fn footer(text: impl Into<String>, align: Align) -> Self {
        let anchor = match align {
            Align::Left => Anchor::BottomLeft,
            Align::Center => Anchor::BottomCenter,
            Align::Right => Anchor::BottomRight,
        };
        Self {
            position: Position::Anchor(anchor),
            font_size: 10.0,
            ..Self::new(text)
        }
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_rotation(mut self, degrees: f32) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    pub fn with_margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn with_pages(mut self, range: PageRange) -> Self {
        self.pages = Some(range);
        self
    }

    pub fn skipping_first_page(mut self) -> Self {
        self.skip_first_page = true;
        self
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Position::Absolute { x, y };
        self
    }

    /// Check every parameter against a document of `page_count` pages.
    pub fn validate(&self, page_count: usize) -> Result<()> {
        let invalid = |detail: String| Err(SeitenwerkError::InvalidOverlay(detail));
        if self.template.trim().is_empty() {
            return invalid("text is empty".into());
        }
        if !(self.font_size.is_finite() && self.font_size > 0.0 && self.font_size <= MAX_FONT_SIZE) {
            return invalid(format!(
                "font size must be between 0 and {MAX_FONT_SIZE}, got {}",
                self.font_size
            ));
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return invalid(format!("opacity must be between 0 and 1, got {}", self.opacity));
        }
        if !self.rotation_degrees.is_finite() {
            return invalid("rotation is not a number".into());
        }
        if !self.margins.is_valid() {
            return invalid("margins must be finite and non-negative".into());
        }
        if let Position::Absolute { x, y } = self.position {
            if !(x.is_finite() && y.is_finite()) {
                return invalid("position is not a number".into());
            }
        }
        if let Some(range) = &self.pages {
            range.validate(page_count)?;
        }
        Ok(())
    }

    /// Template with `{n}` and `{total}` substituted.
    pub fn resolve_text(&self, page_number: usize, total: usize) -> String {
        self.template
            .replace("{n}", &page_number.to_string())
            .replace("{total}", &total.to_string())
    }

    /// Zero-based indices of the pages this overlay is drawn on.
    pub fn target_pages(&self, page_count: usize) -> Vec<usize> {
        (0..page_count)
            .filter(|&i| {
                let number = (i + 1) as u32;
                self.pages.as_ref().is_none_or(|r| r.contains_page(number))
                    && !(self.skip_first_page && i == 0)
            })
            .collect()
    }
}

/// Draw `spec` on every targeted page of a copy of `document`.
#[instrument(skip_all, fields(pages = document.page_count(), template = %spec.template))]
pub fn apply_overlay(document: &Document, spec: &OverlaySpec) -> Result<Document> {
    let total = document.page_count();
    spec.validate(total)?;
    let targets = spec.target_pages(total);

    let mut out = document.clone();
    let (pages, pool) = out.pages_and_pool_mut();
    let font = pool.intern(Object::Dictionary(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    }));
    let opacity = objects::real_or_integer(spec.opacity);
    let gstate = pool.intern(Object::Dictionary(dictionary! {
        "Type" => "ExtGState",
        "ca" => opacity.clone(),
        "CA" => opacity,
    }));

    for &index in &targets {
        let page = &mut pages[index];
        let text = encode_win_ansi(&spec.resolve_text(index + 1, total));
        let width: f32 = text.iter().map(|&b| helvetica_width(b)).sum::<f32>() * spec.font_size / 1000.0;
        let matrix = placement(page, spec, width);

        let font_name = free_name(page, pool, ResourceCategory::Font, "SwF", font);
        let gs_name = free_name(page, pool, ResourceCategory::ExtGState, "SwGS", gstate);
        let Color { r, g, b } = spec.color.clamped();
        let content = format!(
            "q /{gs_name} gs {} {} {} rg BT /{font_name} {} Tf {} {} {} {} {} {} Tm ({}) Tj ET Q\n",
            num(r),
            num(g),
            num(b),
            num(spec.font_size),
            num(matrix.a),
            num(matrix.b),
            num(matrix.c),
            num(matrix.d),
            num(matrix.e),
            num(matrix.f),
            objects::escape_literal(&text),
        );
        let stream = pool.intern(Object::Stream(Stream::new(
            lopdf::Dictionary::new(),
            content.into_bytes(),
        )));
        page.add_overlay(
            stream,
            &[
                (ResourceCategory::Font, font_name.as_str(), font),
                (ResourceCategory::ExtGState, gs_name.as_str(), gstate),
            ],
        );
        debug!(page = index, font = %font_name, gstate = %gs_name, "Overlay stamped");
    }
    info!(stamped = targets.len(), "Overlay applied");
    Ok(out)
}

/// WinAnsi bytes for `text`; characters outside the encoding become `?`
/// and control characters become spaces.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| {
            if c.is_control() {
                b' '
            } else {
                win_ansi_byte(c).unwrap_or(b'?')
            }
        })
        .collect()
}

/// Size of the displayed page and the map from displayed coordinates to
/// user space, honouring `/Rotate`.
fn display_frame(page: &Page) -> (f32, f32, Matrix) {
    let [llx, lly, urx, ury] = page.visible_box();
    let (w, h) = (urx - llx, ury - lly);
    let (dw, dh, turn) = match page.rotation() {
        Rotation::Deg0 => (w, h, Matrix::IDENTITY),
        Rotation::Deg90 => (h, w, Matrix::new(0.0, 1.0, -1.0, 0.0, w, 0.0)),
        Rotation::Deg180 => (w, h, Matrix::new(-1.0, 0.0, 0.0, -1.0, w, h)),
        Rotation::Deg270 => (h, w, Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, h)),
    };
    (dw, dh, turn.then(&Matrix::translate(llx, lly)))
}

/// Text matrix placing a line of `text_width` points on `page`.
fn placement(page: &Page, spec: &OverlaySpec, text_width: f32) -> Matrix {
    let (sin, cos) = spec.rotation_degrees.to_radians().sin_cos();
    let (display_w, display_h, to_user) = display_frame(page);
    let (x, y) = match spec.position {
        Position::Absolute { x, y } => (x, y),
        Position::Anchor(anchor) => {
            let (fx, fy) = anchor.factors();
            let half_w = text_width / 2.0;
            let half_h = spec.font_size * CAP_HEIGHT / 2.0;
            // Half extents of the rotated text box.
            let extent_x = (half_w * cos).abs() + (half_h * sin).abs();
            let extent_y = (half_w * sin).abs() + (half_h * cos).abs();
            let m = &spec.margins;
            let cx = lerp(m.left + extent_x, display_w - m.right - extent_x, fx);
            let cy = lerp(m.bottom + extent_y, display_h - m.top - extent_y, fy);
            (
                cx - (cos * half_w - sin * half_h),
                cy - (sin * half_w + cos * half_h),
            )
        }
    };
    Matrix::new(cos, sin, -sin, cos, x, y).then(&to_user)
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// A resource name for `id` that does not clash with the page's own
/// resources or with another overlay's.
fn free_name(
    page: &Page,
    pool: &ResourcePool,
    category: ResourceCategory,
    prefix: &str,
    id: ResourceId,
) -> String {
    let source = page
        .resources()
        .and_then(|res| pool.dict_by_id(res))
        .and_then(|res| pool.lookup(res, category.key()))
        .and_then(|sub| pool.dict(sub));
    let taken = |name: &str| {
        source.is_some_and(|dict| dict.has(name.as_bytes()))
            || page
                .overlay_resources()
                .any(|(c, n, other)| c == category && n == name && other != id)
    };
    let mut name = format!("{prefix}{}", id.index());
    while taken(&name) {
        name.push('x');
    }
    name
}

fn num(v: f32) -> String {
    let s = format!("{v:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" || s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}
