// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// seitenwerk-security: Content fingerprints and PDF password protection.
//
// Provides:
// - SHA-256 fingerprinting used by the resource pool and page fidelity checks.
// - The PDF Standard Security Handler (RC4 128-bit, revision 3): owner/user
//   entries, per-object keys, and password authentication.

pub mod integrity;
pub mod protect;

pub use integrity::hash_bytes;
pub use protect::{
    EncryptParams, EncryptionStrength, Permissions, ProtectionRequest, StandardSecurity,
    generate_file_id,
};
