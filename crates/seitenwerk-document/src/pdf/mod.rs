// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF input and output using `lopdf`.

pub(crate) mod crypt;
pub mod loader;
pub(crate) mod objects;
pub mod serializer;

pub use loader::{load, load_bytes};
pub use serializer::{SaveOptions, save};
