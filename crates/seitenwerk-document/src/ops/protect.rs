// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Protect: serialise with the standard security handler and prove the
// result opens with the user password before handing it back.

use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_security::ProtectionRequest;
use tracing::{info, instrument, warn};

use crate::model::Document;
use crate::pdf::{SaveOptions, load_bytes, save};

/// Encrypt `document` according to `request`.
///
/// Unsupported requests fail before any bytes are produced. The encrypted
/// output is loaded back with the user password; if that does not yield the
/// same number of pages the call fails instead of returning a file whose
/// protection cannot be trusted.
#[instrument(skip_all, fields(pages = document.page_count(), strength = ?request.strength))]
pub fn protect(
    document: &Document,
    request: &ProtectionRequest,
    options: &SaveOptions,
) -> Result<Vec<u8>> {
    request.check_supported()?;
    let options = options.clone().with_protection(request.clone());
    let bytes = save(document, &options)?;

    let reloaded = load_bytes("protected.pdf", &bytes, Some(&request.user_password))
        .map_err(|err| {
            warn!(%err, "Protected output did not reload");
            SeitenwerkError::ProtectionUnsupported(format!("output failed verification: {err}"))
        })?;
    if reloaded.page_count() != document.page_count() {
        return Err(SeitenwerkError::ProtectionUnsupported(format!(
            "output failed verification: expected {} pages, found {}",
            document.page_count(),
            reloaded.page_count()
        )));
    }
    info!(bytes = bytes.len(), "Document protected");
    Ok(bytes)
}
