// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch packager: hand back a single artifact as-is, or bundle several into
// one ZIP archive.

use std::collections::HashSet;
use std::io::{Cursor, Write};

use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{ArtifactKind, OutputArtifact};
use tracing::{debug, info, instrument};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// What the caller receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Exactly one artifact was produced.
    Single(OutputArtifact),
    /// Several artifacts, bundled.
    Archive(OutputArtifact),
}

impl Delivery {
    pub fn artifact(&self) -> &OutputArtifact {
        match self {
            Self::Single(artifact) | Self::Archive(artifact) => artifact,
        }
    }

    pub fn into_artifact(self) -> OutputArtifact {
        match self {
            Self::Single(artifact) | Self::Archive(artifact) => artifact,
        }
    }
}

/// Package `artifacts` for delivery. `archive_name` names the bundle when
/// one is needed; `.zip` is appended if missing.
#[instrument(skip_all, fields(artifacts = artifacts.len(), archive = %archive_name))]
pub fn package(mut artifacts: Vec<OutputArtifact>, archive_name: &str) -> Result<Delivery> {
    match artifacts.len() {
        0 => Err(SeitenwerkError::NoInput("no artifacts to package".into())),
        1 => Ok(Delivery::Single(artifacts.remove(0))),
        _ => Ok(Delivery::Archive(build_archive(&artifacts, archive_name)?)),
    }
}

/// Reject names that would escape the archive root or carry no name.
fn check_entry_name(name: &str) -> Result<()> {
    let bad = |detail: &str| Err(SeitenwerkError::Archive(format!("entry \"{name}\" {detail}")));
    if name.trim().is_empty() {
        return bad("has no name");
    }
    let absolute = name.starts_with('/')
        || name.starts_with('\\')
        || name.as_bytes().get(1) == Some(&b':');
    if absolute {
        return bad("is an absolute path");
    }
    if name.split(['/', '\\']).any(|part| part == "..") {
        return bad("points outside the archive");
    }
    Ok(())
}

/// Bundle every artifact into one ZIP. Entry names are the artifacts' file
/// names; a repeated name is an error rather than an overwrite.
pub fn build_archive(artifacts: &[OutputArtifact], archive_name: &str) -> Result<OutputArtifact> {
    if artifacts.is_empty() {
        return Err(SeitenwerkError::NoInput("no artifacts to package".into()));
    }
    let mut seen = HashSet::with_capacity(artifacts.len());
    for artifact in artifacts {
        check_entry_name(&artifact.file_name)?;
        if !seen.insert(artifact.file_name.as_str()) {
            return Err(SeitenwerkError::ArchiveNamingCollision {
                file_name: artifact.file_name.clone(),
            });
        }
    }

    let archive_err = |err: zip::result::ZipError| SeitenwerkError::Archive(err.to_string());
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for artifact in artifacts {
        let method = if artifact.kind.is_precompressed() {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        let options = SimpleFileOptions::default().compression_method(method);
        zip.start_file(artifact.file_name.as_str(), options)
            .map_err(archive_err)?;
        zip.write_all(&artifact.bytes)?;
        debug!(entry = %artifact.file_name, bytes = artifact.bytes.len(), ?method, "Entry written");
    }
    let bytes = zip.finish().map_err(archive_err)?.into_inner();

    let file_name = if archive_name.to_ascii_lowercase().ends_with(".zip") {
        archive_name.to_string()
    } else {
        format!("{archive_name}.zip")
    };
    info!(entries = artifacts.len(), bytes = bytes.len(), "Archive built");
    Ok(OutputArtifact::new(file_name, bytes, ArtifactKind::Zip))
}
