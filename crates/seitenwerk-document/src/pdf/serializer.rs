// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Serializer: write the document model out as a standalone PDF 1.7 file,
// optionally protected with the standard security handler (RC4, 128-bit).

use std::collections::HashMap;

use lopdf::{Dictionary, Object, ObjectId, Stream, StringFormat, dictionary};
use seitenwerk_core::EngineConfig;
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_security::{ProtectionRequest, StandardSecurity, generate_file_id};
use tracing::{debug, info, instrument};

use super::{crypt, objects};
use crate::model::{Document, Page, ResourceId};

/// Options for one save.
#[derive(Debug, Clone)]
pub struct SaveOptions {
    pub protection: Option<ProtectionRequest>,
    /// Flate-compress streams that carry no filter yet.
    pub compress: bool,
    /// Value written to `/Producer`.
    pub producer: String,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            protection: None,
            compress: true,
            producer: "Seitenwerk".into(),
        }
    }
}

impl SaveOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            protection: None,
            compress: config.compress_output,
            producer: config.producer.clone(),
        }
    }

    pub fn with_protection(mut self, request: ProtectionRequest) -> Self {
        self.protection = Some(request);
        self
    }
}

/// Serialise `document` to PDF bytes.
///
/// Only pool entries reachable from the pages are written. Overlay layers
/// are appended after the source content, which is wrapped in `q`/`Q` so
/// graphics state left unbalanced by the source cannot leak into them.
#[instrument(skip_all, fields(pages = document.page_count(), protected = options.protection.is_some()))]
pub fn save(document: &Document, options: &SaveOptions) -> Result<Vec<u8>> {
    if let Some(request) = &options.protection {
        request.check_supported()?;
    }
    if document.page_count() == 0 {
        return Err(SeitenwerkError::NoInput("document has no pages".into()));
    }

    let pool = document.pool();
    let mut out = lopdf::Document::with_version("1.7");

    let reachable = pool.reachable(
        document
            .pages()
            .iter()
            .flat_map(Page::referenced_resources),
    );
    let mapping: Vec<(ResourceId, ObjectId)> = reachable
        .iter()
        .map(|&rid| (rid, out.new_object_id()))
        .collect();
    let ids: HashMap<ResourceId, ObjectId> = mapping.iter().copied().collect();
    for &(rid, oid) in &mapping {
        if let Some(object) = pool.get(rid) {
            out.objects.insert(oid, remap(object, &ids));
        }
    }

    let pages_id = out.new_object_id();
    let mut wrappers: Option<(ObjectId, ObjectId)> = None;
    let mut kids = Vec::with_capacity(document.page_count());
    for page in document.pages() {
        let mut contents: Vec<Object> = Vec::new();
        let source_refs = page
            .source_streams()
            .filter_map(|id| ids.get(&id))
            .map(|&oid| Object::Reference(oid));
        let resources = if page.has_overlays() {
            let (open, close) = *wrappers.get_or_insert_with(|| {
                (
                    out.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec())),
                    out.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec())),
                )
            });
            contents.push(Object::Reference(open));
            contents.extend(source_refs);
            contents.push(Object::Reference(close));
            contents.extend(
                page.overlay_streams()
                    .filter_map(|id| ids.get(&id))
                    .map(|&oid| Object::Reference(oid)),
            );
            remap(&Object::Dictionary(page.effective_resources(pool)), &ids)
        } else {
            contents.extend(source_refs);
            page.resources()
                .and_then(|id| ids.get(&id))
                .map_or_else(|| Object::Dictionary(Dictionary::new()), |&oid| Object::Reference(oid))
        };

        let mut dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => objects::rect_object(page.media_box()),
            "Resources" => resources,
        };
        if let Some(crop) = page.crop_box() {
            dict.set("CropBox", objects::rect_object(crop));
        }
        if page.rotation().degrees() != 0 {
            dict.set("Rotate", page.rotation().degrees() as i64);
        }
        match contents.len() {
            0 => {}
            1 => {
                dict.set("Contents", contents.remove(0));
            }
            _ => {
                dict.set("Contents", contents);
            }
        }
        kids.push(Object::Reference(out.add_object(dict)));
    }

    let count = kids.len() as i64;
    out.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = out.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });

    let mut metadata = document.metadata().clone();
    metadata.stamp(&options.producer);
    let info_id = out.add_object(metadata.to_info());

    let file_id = generate_file_id()?;
    out.trailer.set("Root", catalog_id);
    out.trailer.set("Info", info_id);
    out.trailer.set(
        "ID",
        vec![
            Object::String(file_id.to_vec(), StringFormat::Hexadecimal),
            Object::String(file_id.to_vec(), StringFormat::Hexadecimal),
        ],
    );

    if options.compress {
        out.compress();
    }

    if let Some(request) = &options.protection {
        let security = StandardSecurity::new(request, &file_id)?;
        for (&id, object) in out.objects.iter_mut() {
            crypt::apply_cipher(&security, id, object);
        }
        let encrypt_id = out.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 2,
            "R" => 3,
            "Length" => 128,
            "O" => Object::String(security.owner_entry().to_vec(), StringFormat::Hexadecimal),
            "U" => Object::String(security.user_entry().to_vec(), StringFormat::Hexadecimal),
            "P" => security.permissions_value() as i64,
        });
        out.trailer.set("Encrypt", encrypt_id);
        debug!("Standard security handler applied");
    }

    let mut buffer = Vec::new();
    out.save_to(&mut buffer)
        .map_err(|err| SeitenwerkError::Pdf(format!("failed to serialise PDF: {err}")))?;

    info!(bytes = buffer.len(), objects = out.objects.len(), "PDF written");
    Ok(buffer)
}

/// Rewrite pool references to output object ids. Unmapped ids become null.
fn remap(object: &Object, ids: &HashMap<ResourceId, ObjectId>) -> Object {
    match object {
        Object::Reference(_) => ResourceId::from_reference(object)
            .and_then(|rid| ids.get(&rid))
            .map_or(Object::Null, |&oid| Object::Reference(oid)),
        Object::Array(items) => Object::Array(items.iter().map(|i| remap(i, ids)).collect()),
        Object::Dictionary(dict) => Object::Dictionary(remap_dict(dict, ids)),
        Object::Stream(stream) => {
            Object::Stream(Stream::new(remap_dict(&stream.dict, ids), stream.content.clone()))
        }
        plain => plain.clone(),
    }
}

fn remap_dict(dict: &Dictionary, ids: &HashMap<ResourceId, ObjectId>) -> Dictionary {
    let mut out = Dictionary::new();
    for (key, value) in dict.iter() {
        out.set(key.clone(), remap(value, ids));
    }
    out
}
