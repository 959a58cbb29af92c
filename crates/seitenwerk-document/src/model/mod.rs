// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document model: pages, metadata, and the shared resource pool.

pub mod document;
pub mod metadata;
pub mod page;
pub mod pool;

pub use document::Document;
pub use metadata::Metadata;
pub use page::{ContentLayer, Page, PageOrigin, ResourceCategory};
pub use pool::{ResourceId, ResourcePool};
