// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page content decoding: fonts, image XObjects and the operator interpreter.

pub mod fonts;
pub(crate) mod images;
pub mod interpreter;

pub use fonts::helvetica_text_width;
pub use interpreter::{ContentSink, FillRule, Glyph, Matrix, Paint, Subpath, TextRun, run_page};
