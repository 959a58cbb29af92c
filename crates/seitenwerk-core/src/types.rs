// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Seitenwerk document engine.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SeitenwerkError};

/// Identity of one in-memory document revision.
///
/// A fresh id is issued whenever a document is created or mutated, so caches
/// keyed by it never serve stale renderings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported input kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Pdf,
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl SourceKind {
    /// Classify raw bytes by their magic number.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        // PDF headers may be preceded by junk; readers accept it within 1 KiB.
        let head = &bytes[..bytes.len().min(1024)];
        if head.windows(5).any(|w| w == b"%PDF-") {
            return Some(Self::Pdf);
        }
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            return Some(Self::Png);
        }
        if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }
        if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }
        None
    }

    /// MIME type string.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
        }
    }

    /// Infer the kind from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "gif" => Some(Self::Gif),
            "webp" => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        !matches!(self, Self::Pdf)
    }
}

/// One caller-supplied input file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Display name, used in error messages and artifact naming.
    pub name: String,
    pub bytes: Vec<u8>,
    /// Password for encrypted PDFs.
    pub password: Option<String>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            password: None,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(dot) if dot > 0 => &self.name[..dot],
            _ => &self.name,
        }
    }
}

/// Kind of an output artifact's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Pdf,
    Png,
    Jpeg,
    WebP,
    Zip,
    Text,
}

impl ArtifactKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Zip => "application/zip",
            Self::Text => "text/plain",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
            Self::Zip => "zip",
            Self::Text => "txt",
        }
    }

    /// Payloads that gain nothing from another round of deflate.
    pub fn is_precompressed(&self) -> bool {
        matches!(self, Self::Png | Self::Jpeg | Self::WebP | Self::Zip)
    }
}

/// A named byte payload produced by an operation, pending delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub kind: ArtifactKind,
}

impl OutputArtifact {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>, kind: ArtifactKind) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
            kind,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.kind.mime_type()
    }
}

/// Raster encodings offered by the PDF → image export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RasterFormat {
    Png,
    Jpeg,
    WebP,
}

impl RasterFormat {
    pub fn artifact_kind(&self) -> ArtifactKind {
        match self {
            Self::Png => ArtifactKind::Png,
            Self::Jpeg => ArtifactKind::Jpeg,
            Self::WebP => ArtifactKind::WebP,
        }
    }

    /// Only PNG output keeps an alpha channel.
    pub fn supports_alpha(&self) -> bool {
        matches!(self, Self::Png)
    }
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaperSize {
    A3,
    A4,
    A5,
    Letter,
    Legal,
    Tabloid,
    Custom { width_mm: u32, height_mm: u32 },
}

impl PaperSize {
    /// Dimensions in millimetres (width, height), portrait.
    pub fn dimensions_mm(&self) -> (u32, u32) {
        match self {
            Self::A3 => (297, 420),
            Self::A4 => (210, 297),
            Self::A5 => (148, 210),
            Self::Letter => (216, 279),
            Self::Legal => (216, 356),
            Self::Tabloid => (279, 432),
            Self::Custom {
                width_mm,
                height_mm,
            } => (*width_mm, *height_mm),
        }
    }

    /// Dimensions in PDF points (width, height), portrait.
    ///
    /// The US sizes use their exact inch definitions rather than the
    /// rounded millimetre values.
    pub fn dimensions_pt(&self) -> (f32, f32) {
        match self {
            Self::Letter => (612.0, 792.0),
            Self::Legal => (612.0, 1008.0),
            Self::Tabloid => (792.0, 1224.0),
            _ => {
                let (w, h) = self.dimensions_mm();
                (mm_to_pt(w as f32), mm_to_pt(h as f32))
            }
        }
    }

    /// Parse a caller-facing size name such as `"A4"` or `"letter"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "a3" => Some(Self::A3),
            "a4" => Some(Self::A4),
            "a5" => Some(Self::A5),
            "letter" => Some(Self::Letter),
            "legal" => Some(Self::Legal),
            "tabloid" | "ledger" => Some(Self::Tabloid),
            _ => None,
        }
    }
}

/// Convert millimetres to PDF points (1/72 inch).
pub fn mm_to_pt(mm: f32) -> f32 {
    mm / 25.4 * 72.0
}

/// Page orientation for composed pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Portrait,
    Landscape,
}

impl Orientation {
    /// Orient a (width, height) pair.
    pub fn apply(&self, (w, h): (f32, f32)) -> (f32, f32) {
        let (short, long) = if w <= h { (w, h) } else { (h, w) };
        match self {
            Self::Portrait => (short, long),
            Self::Landscape => (long, short),
        }
    }
}

/// Quarter-turn page rotation, clockwise, as stored in `/Rotate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Exact conversion; rejects anything that is not a multiple of 90.
    pub fn from_degrees(degrees: i32) -> Result<Self> {
        if degrees % 90 != 0 {
            return Err(SeitenwerkError::InvalidRotation(degrees));
        }
        Ok(Self::from_quarter_turns(degrees.div_euclid(90)))
    }

    /// Lenient conversion for values read from untrusted files: snaps to the
    /// nearest quarter turn.
    pub fn snapped(degrees: i64) -> Self {
        let quarter = ((degrees as f64) / 90.0).round() as i64;
        Self::from_quarter_turns(quarter.rem_euclid(4) as i32)
    }

    fn from_quarter_turns(turns: i32) -> Self {
        match turns.rem_euclid(4) {
            0 => Self::Deg0,
            1 => Self::Deg90,
            2 => Self::Deg180,
            _ => Self::Deg270,
        }
    }

    pub fn degrees(&self) -> i32 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Accumulate a delta (multiple of 90, may be negative), normalised mod 360.
    pub fn rotated_by(&self, delta: i32) -> Result<Self> {
        let delta = Self::from_degrees(delta)?;
        Ok(self.combine(delta))
    }

    pub fn combine(&self, other: Rotation) -> Self {
        Self::from_quarter_turns(self.degrees() / 90 + other.degrees() / 90)
    }

    /// True when width and height swap on screen.
    pub fn is_sideways(&self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// A 1-based, inclusive page range with an optional name for its artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
    pub label: Option<String>,
}

impl PageRange {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            label: None,
        }
    }

    pub fn labelled(start: u32, end: u32, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: Some(label.into()),
        }
    }

    /// Enforce `1 <= start <= end <= page_count`. Invalid ranges are
    /// rejected, never clamped.
    pub fn validate(&self, page_count: usize) -> Result<()> {
        let detail = if self.start == 0 {
            Some("pages are numbered from 1".to_string())
        } else if self.start > self.end {
            Some("start is after end".to_string())
        } else if self.end as usize > page_count {
            Some(format!("document has only {page_count} pages"))
        } else {
            None
        };
        match detail {
            Some(detail) => Err(SeitenwerkError::InvalidPageRange {
                range: self.to_string(),
                detail,
            }),
            None => Ok(()),
        }
    }

    /// Zero-based page indices covered by this range. Only meaningful after
    /// [`validate`](Self::validate).
    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        (self.start as usize - 1)..=(self.end as usize - 1)
    }

    pub fn len(&self) -> usize {
        (self.end.saturating_sub(self.start) + 1) as usize
    }

    pub fn contains_page(&self, page_number: u32) -> bool {
        (self.start..=self.end).contains(&page_number)
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{label} ({}-{})", self.start, self.end),
            None => write!(f, "{}-{}", self.start, self.end),
        }
    }
}

/// An RGB colour with components in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const GRAY: Color = Color::rgb(0.5, 0.5, 0.5);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` / `rrggbb`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::from_rgb8(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    pub fn to_rgb8(&self) -> [u8; 3] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b)]
    }

    /// Clamp every component into 0.0..=1.0.
    pub fn clamped(&self) -> Self {
        Self::rgb(
            self.r.clamp(0.0, 1.0),
            self.g.clamp(0.0, 1.0),
            self.b.clamp(0.0, 1.0),
        )
    }
}
