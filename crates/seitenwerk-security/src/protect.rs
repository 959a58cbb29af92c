// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF Standard Security Handler, revision 3 (RC4, 128-bit key).
//
// Computes the /O and /U entries of the encryption dictionary, derives the
// file key and per-object keys, and authenticates user or owner passwords
// against an existing encryption dictionary.

use md5::{Digest, Md5};
use rc4::consts::U16;
use rc4::{KeyInit, Rc4, StreamCipher};
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use seitenwerk_core::error::{Result, SeitenwerkError};

/// Password padding string from the PDF reference (Algorithm 2, step a).
const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Longest password the revision 3 handler can represent.
pub const MAX_PASSWORD_BYTES: usize = 32;

const KEY_LEN: usize = 16;

/// Bits 7-8 and 13-32 are reserved and must be set for revision 3.
const RESERVED_PERMISSION_BITS: u32 = 0xFFFF_F0C0;

/// Requested cipher strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EncryptionStrength {
    /// RC4 with a 128-bit key (security handler revision 3).
    #[default]
    Rc4_128,
    /// AES-256 (revision 6). Not implemented by this handler.
    Aes256,
}

/// What a user opening the document with the user password may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub print: bool,
    pub modify: bool,
    pub copy: bool,
    pub annotate: bool,
    pub fill_forms: bool,
    pub accessibility: bool,
    pub assemble: bool,
    pub print_high_quality: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self::all()
    }
}

impl Permissions {
    pub fn all() -> Self {
        Self {
            print: true,
            modify: true,
            copy: true,
            annotate: true,
            fill_forms: true,
            accessibility: true,
            assemble: true,
            print_high_quality: true,
        }
    }

    pub fn none() -> Self {
        Self {
            print: false,
            modify: false,
            copy: false,
            annotate: false,
            fill_forms: false,
            accessibility: false,
            assemble: false,
            print_high_quality: false,
        }
    }

    /// The signed 32-bit /P value.
    pub fn to_p(self) -> i32 {
        let flags = [
            (self.print, 1u32 << 2),
            (self.modify, 1 << 3),
            (self.copy, 1 << 4),
            (self.annotate, 1 << 5),
            (self.fill_forms, 1 << 8),
            (self.accessibility, 1 << 9),
            (self.assemble, 1 << 10),
            (self.print_high_quality, 1 << 11),
        ];
        let bits = flags
            .iter()
            .filter(|(allowed, _)| *allowed)
            .fold(RESERVED_PERMISSION_BITS, |acc, (_, bit)| acc | bit);
        bits as i32
    }

    pub fn from_p(p: i32) -> Self {
        let bits = p as u32;
        let has = |bit: u32| bits & (1 << bit) != 0;
        Self {
            print: has(2),
            modify: has(3),
            copy: has(4),
            annotate: has(5),
            fill_forms: has(8),
            accessibility: has(9),
            assemble: has(10),
            print_high_quality: has(11),
        }
    }
}

/// Parameters for protecting a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectionRequest {
    /// Password required to open the document. May be empty when an owner
    /// password is given.
    pub user_password: String,
    /// Password granting full access. Falls back to the user password.
    pub owner_password: Option<String>,
    #[serde(default)]
    pub permissions: Permissions,
    #[serde(default)]
    pub strength: EncryptionStrength,
}

impl ProtectionRequest {
    pub fn new(user_password: impl Into<String>) -> Self {
        Self {
            user_password: user_password.into(),
            owner_password: None,
            permissions: Permissions::all(),
            strength: EncryptionStrength::Rc4_128,
        }
    }

    pub fn with_owner_password(mut self, owner: impl Into<String>) -> Self {
        self.owner_password = Some(owner.into());
        self
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_strength(mut self, strength: EncryptionStrength) -> Self {
        self.strength = strength;
        self
    }

    /// Reject anything this handler cannot honour exactly.
    ///
    /// Runs before any output is produced so an unsupported request never
    /// yields an unprotected file.
    pub fn check_supported(&self) -> Result<()> {
        if self.strength != EncryptionStrength::Rc4_128 {
            return Err(SeitenwerkError::ProtectionUnsupported(format!(
                "{:?} encryption is not available; use Rc4_128",
                self.strength
            )));
        }
        let owner = self.owner_password.as_deref().unwrap_or("");
        if self.user_password.is_empty() && owner.is_empty() {
            return Err(SeitenwerkError::ProtectionUnsupported(
                "no password supplied".into(),
            ));
        }
        password_bytes(&self.user_password)?;
        password_bytes(owner)?;
        Ok(())
    }

    fn effective_owner(&self) -> &str {
        match self.owner_password.as_deref() {
            Some(owner) if !owner.is_empty() => owner,
            _ => &self.user_password,
        }
    }
}

/// Encryption parameters read back from an existing /Encrypt dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptParams {
    pub filter: String,
    pub version: i64,
    pub revision: i64,
    pub key_length_bits: i64,
    pub owner_entry: Vec<u8>,
    pub user_entry: Vec<u8>,
    pub permissions: i32,
}

impl EncryptParams {
    /// Whether this handler can authenticate against these parameters.
    pub fn is_supported(&self) -> bool {
        self.filter == "Standard"
            && self.version == 2
            && self.revision == 3
            && self.key_length_bits == 128
            && self.owner_entry.len() >= 32
            && self.user_entry.len() >= 16
    }
}

/// A configured revision 3 security handler for one output file.
#[derive(Clone)]
pub struct StandardSecurity {
    key: [u8; KEY_LEN],
    owner_entry: [u8; 32],
    user_entry: [u8; 32],
    permissions: i32,
}

impl std::fmt::Debug for StandardSecurity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardSecurity")
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

impl StandardSecurity {
    /// Derive the /O, /U entries and file key for `request`.
    ///
    /// `file_id` is the first element of the trailer /ID array.
    #[instrument(skip_all, fields(id_len = file_id.len()))]
    pub fn new(request: &ProtectionRequest, file_id: &[u8]) -> Result<Self> {
        request.check_supported()?;

        let user = password_bytes(&request.user_password)?;
        let owner = password_bytes(request.effective_owner())?;
        let permissions = request.permissions.to_p();

        let owner_entry = compute_owner_entry(&owner, &user);
        let key = compute_file_key(&user, &owner_entry, permissions, file_id);
        let user_entry = compute_user_entry(&key, file_id);

        debug!(permissions, "standard security handler configured");
        Ok(Self {
            key,
            owner_entry,
            user_entry,
            permissions,
        })
    }

    pub fn owner_entry(&self) -> &[u8] {
        &self.owner_entry
    }

    pub fn user_entry(&self) -> &[u8] {
        &self.user_entry
    }

    pub fn permissions_value(&self) -> i32 {
        self.permissions
    }

    /// Encrypt (or decrypt; RC4 is symmetric) the data of one indirect object.
    pub fn apply_object_cipher(&self, object_number: u32, generation: u16, data: &mut [u8]) {
        let key = object_key(&self.key, object_number, generation);
        rc4_apply(&key, data);
    }

    /// Check `password` against an existing encryption dictionary, trying it
    /// first as the user password and then as the owner password.
    pub fn authenticate(params: &EncryptParams, file_id: &[u8], password: &str) -> bool {
        Self::unlock(params, file_id, password).is_some()
    }

    /// Authenticate `password` and return a handler holding the file key, or
    /// `None` when the password is wrong or the parameters are unsupported.
    pub fn unlock(params: &EncryptParams, file_id: &[u8], password: &str) -> Option<Self> {
        if !params.is_supported() {
            return None;
        }
        let candidate = password_bytes(password).ok()?;
        let user = if authenticate_user(params, file_id, &candidate) {
            candidate
        } else {
            let recovered = recover_user_password(params, &candidate);
            if !authenticate_user(params, file_id, &recovered) {
                return None;
            }
            recovered
        };

        let mut owner_entry = [0u8; 32];
        owner_entry.copy_from_slice(&params.owner_entry[..32]);
        let mut user_entry = [0u8; 32];
        let take = params.user_entry.len().min(32);
        user_entry[..take].copy_from_slice(&params.user_entry[..take]);

        Some(Self {
            key: compute_file_key(&user, &owner_entry, params.permissions, file_id),
            owner_entry,
            user_entry,
            permissions: params.permissions,
        })
    }

    /// Permissions granted to a user who opened the file with the user password.
    pub fn permissions(&self) -> Permissions {
        Permissions::from_p(self.permissions)
    }
}

/// Generate a fresh 16-byte file identifier for the trailer /ID array.
pub fn generate_file_id() -> Result<[u8; 16]> {
    let rng = SystemRandom::new();
    let mut id = [0u8; 16];
    rng.fill(&mut id)
        .map_err(|_| SeitenwerkError::Pdf("system random source unavailable".into()))?;
    Ok(id)
}

// ---------------------------------------------------------------------------
// Algorithms
// ---------------------------------------------------------------------------

/// Encode a password in PDFDocEncoding. Only Latin-1 is representable.
fn password_bytes(password: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(password.len());
    for ch in password.chars() {
        let code = ch as u32;
        if code > 0xFF {
            return Err(SeitenwerkError::ProtectionUnsupported(format!(
                "password character {ch:?} cannot be encoded"
            )));
        }
        out.push(code as u8);
    }
    if out.len() > MAX_PASSWORD_BYTES {
        return Err(SeitenwerkError::ProtectionUnsupported(format!(
            "password is {} bytes; at most {MAX_PASSWORD_BYTES} are supported",
            out.len()
        )));
    }
    Ok(out)
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let take = password.len().min(32);
    padded[..take].copy_from_slice(&password[..take]);
    padded[take..].copy_from_slice(&PASSWORD_PADDING[..32 - take]);
    padded
}

fn md5(parts: &[&[u8]]) -> [u8; 16] {
    let mut hasher = Md5::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn rc4_apply(key: &[u8; KEY_LEN], data: &mut [u8]) {
    let mut cipher = Rc4::<U16>::new(key.into());
    cipher.apply_keystream(data);
}

fn xor_key(key: &[u8; KEY_LEN], round: u8) -> [u8; KEY_LEN] {
    let mut out = *key;
    for b in &mut out {
        *b ^= round;
    }
    out
}

/// Owner-password key (Algorithm 3, steps a-d).
fn owner_key(owner: &[u8]) -> [u8; KEY_LEN] {
    let mut hash = md5(&[&pad_password(owner)]);
    for _ in 0..50 {
        hash = md5(&[&hash]);
    }
    hash
}

/// Algorithm 3: the /O entry.
fn compute_owner_entry(owner: &[u8], user: &[u8]) -> [u8; 32] {
    let key = owner_key(owner);
    let mut data = pad_password(user);
    for round in 0..=19u8 {
        rc4_apply(&xor_key(&key, round), &mut data);
    }
    data
}

/// Algorithm 2: the file encryption key.
fn compute_file_key(user: &[u8], owner_entry: &[u8], permissions: i32, file_id: &[u8]) -> [u8; KEY_LEN] {
    let p = permissions.to_le_bytes();
    let mut hash = md5(&[&pad_password(user), &owner_entry[..32], &p, file_id]);
    for _ in 0..50 {
        hash = md5(&[&hash]);
    }
    hash
}

/// Algorithm 5: the /U entry. The trailing 16 bytes are arbitrary padding.
fn compute_user_entry(key: &[u8; KEY_LEN], file_id: &[u8]) -> [u8; 32] {
    let mut data = md5(&[&PASSWORD_PADDING, file_id]);
    for round in 0..=19u8 {
        rc4_apply(&xor_key(key, round), &mut data);
    }
    let mut entry = [0u8; 32];
    entry[..16].copy_from_slice(&data);
    entry[16..].copy_from_slice(&PASSWORD_PADDING[..16]);
    entry
}

/// Algorithm 1: key for a single object.
fn object_key(file_key: &[u8; KEY_LEN], object_number: u32, generation: u16) -> [u8; KEY_LEN] {
    let num = object_number.to_le_bytes();
    let generation = generation.to_le_bytes();
    // Key length n + 5 exceeds 16, so the full digest is used.
    md5(&[file_key, &num[..3], &generation])
}

/// Algorithm 6.
fn authenticate_user(params: &EncryptParams, file_id: &[u8], user: &[u8]) -> bool {
    let key = compute_file_key(user, &params.owner_entry, params.permissions, file_id);
    let entry = compute_user_entry(&key, file_id);
    entry[..16] == params.user_entry[..16]
}

/// Algorithm 7: decrypt /O with the owner key to recover the user password.
fn recover_user_password(params: &EncryptParams, owner: &[u8]) -> Vec<u8> {
    let key = owner_key(owner);
    let mut data = [0u8; 32];
    data.copy_from_slice(&params.owner_entry[..32]);
    for round in (0..=19u8).rev() {
        rc4_apply(&xor_key(&key, round), &mut data);
    }
    data.to_vec()
}
