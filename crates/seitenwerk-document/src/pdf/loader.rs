// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF loader: parse bytes with `lopdf`, unlock standard-security files, and
// lift the page tree into the document model.
//
// Encrypted files are parsed with the trailer's `/Encrypt` key renamed, so
// lopdf reads every object as-is and the standard security handler decrypts
// them afterwards. Handlers we do not implement fall back to lopdf's own
// empty-password path.
//
// Inherited page attributes (MediaBox, CropBox, Rotate, Resources) are
// resolved through `/Parent` here so every page in the model is
// self-contained. Objects reachable from a page are interned into the
// resource pool; reference cycles and dangling references become null.
// Annotations are not carried over.

use std::collections::{BTreeMap, HashMap, HashSet};

use lopdf::{Dictionary, Object, ObjectId};
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{Rotation, SourceFile};
use seitenwerk_security::StandardSecurity;
use tracing::{debug, info, instrument, warn};

use super::{crypt, objects};
use crate::model::{Document, Metadata, Page, PageOrigin, ResourceId, ResourcePool};

/// US Letter, used when no `/MediaBox` is found anywhere up the tree.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// How far into the file the `%PDF-` marker may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// How far from the end of the file `startxref` may appear.
const TRAILER_SEARCH_WINDOW: usize = 1024;

const ENCRYPT_KEY: &[u8] = b"/Encrypt";

/// Same length as `/Encrypt`, so cross-reference offsets stay valid.
const HELD_ENCRYPT_KEY: &[u8] = b"/SwCrypt";

const HELD_OBJECT_STREAM: &[u8] = b"SwObjStm";

type ObjectFilter = fn(ObjectId, &mut Object) -> Option<(ObjectId, Object)>;

/// Parse a source file, using its password if one was supplied.
#[instrument(skip_all, fields(source = %source.name, bytes = source.bytes.len()))]
pub fn load(source: &SourceFile) -> Result<Document> {
    load_bytes(&source.name, &source.bytes, source.password.as_deref())
}

pub fn load_bytes(name: &str, bytes: &[u8], password: Option<&str>) -> Result<Document> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    let Some(header_at) = find(window, b"%PDF-") else {
        return Err(SeitenwerkError::parse(name, "missing %PDF- header"));
    };

    let raw = match trailer_encrypt_key(bytes, header_at) {
        Some(key_at) => open_encrypted(name, bytes, key_at, password)?,
        None => lopdf::Document::load_mem(bytes)
            .map_err(|err| SeitenwerkError::parse(name, err.to_string()))?,
    };

    let document = lift(&raw, name)?;
    info!(pages = document.page_count(), resources = document.pool().len(), "PDF loaded");
    Ok(document)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}

fn is_name_end(byte: u8) -> bool {
    byte == 0 || byte.is_ascii_whitespace() || b"()<>[]{}/%".contains(&byte)
}

/// Absolute offset of the `/Encrypt` key in the last trailer, if it has one.
///
/// Only the section `startxref` points at is searched: the classic trailer,
/// or the dictionary of a cross-reference stream. The same bytes anywhere
/// else in the file do not make it encrypted.
fn trailer_encrypt_key(bytes: &[u8], header_at: usize) -> Option<usize> {
    let tail_start = bytes.len().saturating_sub(TRAILER_SEARCH_WINDOW);
    let marker = tail_start + rfind(&bytes[tail_start..], b"startxref")?;
    let digits: String = bytes[marker + b"startxref".len()..]
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| char::from(b))
        .collect();
    let section_start = header_at.checked_add(digits.parse::<usize>().ok()?)?;
    let mut section = bytes.get(section_start..marker)?;
    if let Some(stream_at) = find(section, b"stream") {
        section = &section[..stream_at];
    }

    let mut from = 0;
    while let Some(at) = find(&section[from..], ENCRYPT_KEY) {
        let key_at = from + at;
        if section.get(key_at + ENCRYPT_KEY.len()).is_none_or(|&b| is_name_end(b)) {
            return Some(section_start + key_at);
        }
        from = key_at + 1;
    }
    None
}

fn encrypted_error(name: &str, password: Option<&str>) -> SeitenwerkError {
    SeitenwerkError::EncryptedDocument {
        source_name: name.to_string(),
        password_attempted: password.is_some(),
    }
}

/// Parse with the trailer key held back, then decrypt every object in place.
fn open_encrypted(
    name: &str,
    bytes: &[u8],
    key_at: usize,
    password: Option<&str>,
) -> Result<lopdf::Document> {
    let mut held = bytes.to_vec();
    held[key_at..key_at + ENCRYPT_KEY.len()].copy_from_slice(HELD_ENCRYPT_KEY);
    let reader = lopdf::Reader {
        buffer: &held,
        document: lopdf::Document::new(),
        encryption_state: None,
        raw_objects: BTreeMap::new(),
    };
    let mut raw = reader
        .read(Some(hold_object_stream as ObjectFilter))
        .map_err(|err| SeitenwerkError::parse(name, err.to_string()))?;

    let encrypt_entry = raw
        .trailer
        .remove(&HELD_ENCRYPT_KEY[1..])
        .ok_or_else(|| SeitenwerkError::parse(name, "missing /Encrypt entry"))?;
    let encrypt_id = encrypt_entry.as_reference().ok();
    let params = match objects::deref(&raw, &encrypt_entry) {
        Object::Dictionary(dict) => crypt::encrypt_params(&raw, dict),
        _ => return Err(SeitenwerkError::parse(name, "malformed /Encrypt entry")),
    };
    if !params.is_supported() {
        warn!(
            filter = %params.filter,
            v = params.version,
            r = params.revision,
            "Security handler not built in, trying lopdf"
        );
        return open_with_lopdf(name, bytes, password);
    }

    let file_id = crypt::file_id(&raw);
    let security = StandardSecurity::unlock(&params, &file_id, password.unwrap_or(""))
        .ok_or_else(|| encrypted_error(name, password))?;
    for (&id, object) in raw.objects.iter_mut() {
        if Some(id) == encrypt_id || crypt::is_exempt(object) {
            continue;
        }
        crypt::apply_cipher(&security, id, object);
    }
    if let Some(id) = encrypt_id {
        raw.objects.remove(&id);
    }
    expand_object_streams(&mut raw);
    debug!("Standard security handler unlocked");
    Ok(raw)
}

/// lopdf only ever tries the empty user password.
fn open_with_lopdf(name: &str, bytes: &[u8], password: Option<&str>) -> Result<lopdf::Document> {
    if password.is_some_and(|pw| !pw.is_empty()) {
        return Err(encrypted_error(name, password));
    }
    let mut raw = lopdf::Document::load_mem(bytes).map_err(|err| {
        debug!(%err, "lopdf could not open the encrypted file");
        encrypted_error(name, password)
    })?;
    if raw.encryption_state.is_none() {
        return Err(encrypted_error(name, password));
    }
    raw.trailer.remove(b"Encrypt");
    Ok(raw)
}

/// Rename `/Type /ObjStm` so lopdf keeps the still-encrypted container
/// instead of failing to unpack it.
fn hold_object_stream(id: ObjectId, object: &mut Object) -> Option<(ObjectId, Object)> {
    if let Object::Stream(stream) = object {
        if stream.dict.get(b"Type").ok().and_then(objects::name) == Some(b"ObjStm".as_slice()) {
            stream.dict.set("Type", Object::Name(HELD_OBJECT_STREAM.to_vec()));
        }
    }
    // lopdf keeps the object it passed in; the returned pair is ignored.
    Some((id, Object::Null))
}

/// Unpack held object streams once their payload is plaintext.
fn expand_object_streams(raw: &mut lopdf::Document) {
    let mut unpacked = BTreeMap::new();
    for object in raw.objects.values_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        if stream.dict.get(b"Type").ok().and_then(objects::name) != Some(HELD_OBJECT_STREAM) {
            continue;
        }
        stream.dict.set("Type", Object::Name(b"ObjStm".to_vec()));
        match lopdf::ObjectStream::new(stream) {
            Ok(container) => unpacked.extend(container.objects),
            Err(err) => warn!(%err, "Skipping unreadable object stream"),
        }
    }
    for (id, object) in unpacked {
        raw.objects.entry(id).or_insert(object);
    }
}

/// Build the model from a decrypted `lopdf` document.
fn lift(raw: &lopdf::Document, name: &str) -> Result<Document> {
    let page_ids: Vec<ObjectId> = raw.get_pages().into_values().collect();
    if page_ids.is_empty() {
        return Err(SeitenwerkError::parse(name, "document has no pages"));
    }

    let mut pool = ResourcePool::new();
    let mut pages = Vec::with_capacity(page_ids.len());
    {
        let mut importer = Importer::new(raw, &mut pool);
        for (index, page_id) in page_ids.into_iter().enumerate() {
            let dict = raw
                .get_dictionary(page_id)
                .map_err(|err| SeitenwerkError::parse(name, format!("page {}: {err}", index + 1)))?;
            pages.push(lift_page(raw, &mut importer, dict, name, index));
        }
    }

    let metadata = read_info(raw);
    Ok(Document::from_parts(pages, metadata, pool))
}

fn lift_page(
    raw: &lopdf::Document,
    importer: &mut Importer<'_>,
    dict: &Dictionary,
    name: &str,
    index: usize,
) -> Page {
    let origin = PageOrigin {
        source: name.to_string(),
        index,
    };
    let media_box = inherited(raw, dict, b"MediaBox")
        .and_then(|obj| objects::rect(objects::deref(raw, obj)))
        .unwrap_or_else(|| {
            warn!(page = index + 1, "No usable /MediaBox, assuming US Letter");
            DEFAULT_MEDIA_BOX
        });
    let mut page = Page::new(media_box, origin);

    page.set_crop_box(
        inherited(raw, dict, b"CropBox").and_then(|obj| objects::rect(objects::deref(raw, obj))),
    );
    if let Some(degrees) =
        inherited(raw, dict, b"Rotate").and_then(|obj| objects::integer(objects::deref(raw, obj)))
    {
        page.set_rotation(Rotation::snapped(degrees));
    }
    page.set_resources(inherited(raw, dict, b"Resources").and_then(|obj| importer.intern_value(obj)));

    for stream_id in content_stream_ids(raw, dict) {
        match importer.import_ref(stream_id) {
            Some(id) if importer.pool.stream(id).is_some() => page.push_source(id),
            _ => warn!(page = index + 1, ?stream_id, "Skipping non-stream /Contents entry"),
        }
    }
    page
}

/// Look `key` up on the page, then on its ancestors. Returns the raw value.
fn inherited<'a>(raw: &'a lopdf::Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut current = page;
    for _ in 0..objects::MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        match current.get(b"Parent") {
            Ok(Object::Reference(parent)) => current = raw.get_dictionary(*parent).ok()?,
            _ => return None,
        }
    }
    None
}

fn content_stream_ids(raw: &lopdf::Document, page: &Dictionary) -> Vec<ObjectId> {
    let refs = |items: &[Object]| -> Vec<ObjectId> {
        items
            .iter()
            .filter_map(|item| match item {
                Object::Reference(id) => Some(*id),
                _ => None,
            })
            .collect()
    };
    match page.get(b"Contents") {
        Ok(Object::Reference(id)) => match raw.get_object(*id) {
            Ok(Object::Array(items)) => refs(items),
            Ok(_) => vec![*id],
            Err(_) => Vec::new(),
        },
        Ok(Object::Array(items)) => refs(items),
        _ => Vec::new(),
    }
}

fn read_info(raw: &lopdf::Document) -> Metadata {
    let info = match raw.trailer.get(b"Info") {
        Ok(entry) => match objects::deref(raw, entry) {
            Object::Dictionary(dict) => dict,
            _ => return Metadata::default(),
        },
        Err(_) => return Metadata::default(),
    };
    Metadata::from_info(|key| match info.get(key).map(|v| objects::deref(raw, v)) {
        Ok(Object::String(bytes, _)) => Some(bytes.clone()),
        _ => None,
    })
}

/// Copies objects reachable from pages into the pool, children first.
struct Importer<'a> {
    raw: &'a lopdf::Document,
    pool: &'a mut ResourcePool,
    memo: HashMap<ObjectId, ResourceId>,
    visiting: HashSet<ObjectId>,
}

impl<'a> Importer<'a> {
    fn new(raw: &'a lopdf::Document, pool: &'a mut ResourcePool) -> Self {
        Self {
            raw,
            pool,
            memo: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    fn import_ref(&mut self, id: ObjectId) -> Option<ResourceId> {
        if let Some(&done) = self.memo.get(&id) {
            return Some(done);
        }
        if !self.visiting.insert(id) {
            warn!(?id, "Reference cycle, replacing back-edge with null");
            return None;
        }
        let raw = self.raw;
        let result = match raw.get_object(id) {
            Ok(object) => {
                let converted = self.convert(object);
                Some(self.pool.intern(converted))
            }
            Err(_) => {
                warn!(?id, "Dangling reference, replacing with null");
                None
            }
        };
        self.visiting.remove(&id);
        if let Some(done) = result {
            self.memo.insert(id, done);
        }
        result
    }

    /// Intern a value that may be a reference or a direct object.
    fn intern_value(&mut self, object: &Object) -> Option<ResourceId> {
        match self.convert(object) {
            Object::Null => None,
            reference @ Object::Reference(_) => ResourceId::from_reference(&reference),
            direct => Some(self.pool.intern(direct)),
        }
    }

    fn convert(&mut self, object: &Object) -> Object {
        match object {
            Object::Reference(id) => self
                .import_ref(*id)
                .map_or(Object::Null, ResourceId::reference),
            Object::Array(items) => Object::Array(items.iter().map(|i| self.convert(i)).collect()),
            Object::Dictionary(dict) => Object::Dictionary(self.convert_dict(dict)),
            Object::Stream(stream) => {
                let dict = self.convert_dict(&stream.dict);
                Object::Stream(lopdf::Stream::new(dict, stream.content.clone()))
            }
            plain => plain.clone(),
        }
    }

    fn convert_dict(&mut self, dict: &Dictionary) -> Dictionary {
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            out.set(key.clone(), self.convert(value));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::{SaveOptions, save};
    use crate::test_support;
    use lopdf::{Stream, dictionary};
    use seitenwerk_security::ProtectionRequest;

    fn protected(texts: &[&str], request: ProtectionRequest) -> Vec<u8> {
        let doc = test_support::document_with_pages(texts);
        save(&doc, &SaveOptions::default().with_protection(request)).unwrap()
    }

    #[test]
    fn loads_pages_in_order_with_inherited_box() {
        let bytes = test_support::pdf_with_pages(&["page one", "page two", "page three"]);
        let doc = load_bytes("three.pdf", &bytes, None).unwrap();
        assert_eq!(doc.page_count(), 3);
        assert_eq!(doc.pages()[0].media_box(), [0.0, 0.0, 612.0, 792.0]);
        let first = String::from_utf8(doc.page_content(0).unwrap()).unwrap();
        let third = String::from_utf8(doc.page_content(2).unwrap()).unwrap();
        assert!(first.contains("page one"));
        assert!(third.contains("page three"));
        assert_eq!(doc.pages()[2].origin().index, 2);
    }

    #[test]
    fn shared_font_is_interned_once() {
        let bytes = test_support::pdf_with_pages(&["a", "b"]);
        let doc = load_bytes("two.pdf", &bytes, None).unwrap();
        assert_eq!(doc.pages()[0].resources(), doc.pages()[1].resources());
    }

    #[test]
    fn inherited_rotation_is_applied() {
        let bytes = test_support::rotated_tree_pdf(90);
        let doc = load_bytes("rot.pdf", &bytes, None).unwrap();
        assert_eq!(doc.pages()[0].rotation(), Rotation::Deg90);
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        let err = load_bytes("notes.txt", b"hello world", None).unwrap_err();
        assert!(matches!(err, SeitenwerkError::Parse { ref source_name, .. } if source_name == "notes.txt"));
    }

    #[test]
    fn truncated_file_is_a_parse_error() {
        let bytes = test_support::pdf_with_pages(&["x"]);
        let err = load_bytes("cut.pdf", &bytes[..40], None).unwrap_err();
        assert!(matches!(err, SeitenwerkError::Parse { .. }));
    }

    #[test]
    fn reads_info_dictionary() {
        let bytes = test_support::pdf_with_title("Annual report");
        let doc = load_bytes("info.pdf", &bytes, None).unwrap();
        assert_eq!(doc.metadata().title.as_deref(), Some("Annual report"));
    }

    #[test]
    fn protected_file_opens_with_the_user_password() {
        let bytes = protected(&["one", "two"], ProtectionRequest::new("hunter2"));
        let doc = load_bytes("locked.pdf", &bytes, Some("hunter2")).unwrap();
        assert_eq!(doc.page_count(), 2);
        let second = String::from_utf8(doc.page_content(1).unwrap()).unwrap();
        assert!(second.contains("two"));
    }

    #[test]
    fn protected_file_opens_with_the_owner_password() {
        let request = ProtectionRequest::new("reader").with_owner_password("admin");
        let bytes = protected(&["owned"], request);
        let doc = load_bytes("owned.pdf", &bytes, Some("admin")).unwrap();
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn protected_trailer_key_is_found() {
        let bytes = protected(&["x"], ProtectionRequest::new("pw"));
        let key_at = trailer_encrypt_key(&bytes, 0).unwrap();
        assert_eq!(&bytes[key_at..key_at + ENCRYPT_KEY.len()], ENCRYPT_KEY);
    }

    #[test]
    fn encrypt_inside_page_content_is_not_encryption() {
        let bytes = test_support::pdf_with_pages(&["/Encrypt 9 0 R"]);
        assert_eq!(trailer_encrypt_key(&bytes, 0), None);
        let doc = load_bytes("mention.pdf", &bytes, None).unwrap();
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn malformed_file_mentioning_encrypt_is_a_parse_error() {
        let bytes = test_support::pdf_with_pages(&["/Encrypt 9 0 R"]);
        let cut = &bytes[..bytes.len() - 40];
        let err = load_bytes("broken.pdf", cut, None).unwrap_err();
        assert!(matches!(err, SeitenwerkError::Parse { .. }), "{err:?}");
    }

    #[test]
    fn object_streams_are_held_for_decryption() {
        let mut object = Object::Stream(Stream::new(dictionary! { "Type" => "ObjStm" }, Vec::new()));
        hold_object_stream((4, 0), &mut object).unwrap();
        let Object::Stream(stream) = &object else {
            panic!("expected a stream");
        };
        assert_eq!(stream.dict.get(b"Type").unwrap().as_name().unwrap(), HELD_OBJECT_STREAM);
    }
}
