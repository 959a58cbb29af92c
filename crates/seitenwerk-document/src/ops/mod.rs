// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation library: pure functions over the document model.

pub mod compose;
pub mod merge;
pub mod organize;
pub mod overlay;
pub mod protect;
pub mod split;
pub mod text;

pub use compose::{ComposeOptions, PageSizing, compose, images_to_pdf};
pub use merge::{merge, merge_documents};
pub use organize::{OrganizePlan, delete, inverse_permutation, organize, reorder, rotate};
pub use overlay::{
    Align, Anchor, Margins, OverlaySpec, PageNumberPosition, Position, WatermarkBand,
    apply_overlay,
};
pub use protect::protect;
pub use split::{SplitMode, range_file_name, split, split_documents};
pub use text::{ExtractedText, TextMode, extract_text, ocr_text, page_text};
