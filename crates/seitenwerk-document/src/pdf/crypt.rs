// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Applying the standard security handler's object cipher to whole objects.

use lopdf::{Dictionary, Object, ObjectId};
use seitenwerk_security::{EncryptParams, StandardSecurity};

use super::objects;

/// RC4 every string and stream payload inside `object`. The cipher is its
/// own inverse, so the same call encrypts and decrypts.
pub(crate) fn apply_cipher(security: &StandardSecurity, id: ObjectId, object: &mut Object) {
    let (number, generation) = id;
    match object {
        Object::String(bytes, _) => security.apply_object_cipher(number, generation, bytes),
        Object::Array(items) => {
            for item in items.iter_mut() {
                apply_cipher(security, id, item);
            }
        }
        Object::Dictionary(dict) => apply_cipher_dict(security, id, dict),
        Object::Stream(stream) => {
            apply_cipher_dict(security, id, &mut stream.dict);
            security.apply_object_cipher(number, generation, &mut stream.content);
        }
        _ => {}
    }
}

fn apply_cipher_dict(security: &StandardSecurity, id: ObjectId, dict: &mut Dictionary) {
    for (_, value) in dict.iter_mut() {
        apply_cipher(security, id, value);
    }
}

/// Cross-reference streams are never encrypted.
pub(crate) fn is_exempt(object: &Object) -> bool {
    match object {
        Object::Stream(stream) => stream
            .dict
            .get(b"Type")
            .ok()
            .and_then(objects::name)
            .is_some_and(|t| t == b"XRef"),
        _ => false,
    }
}

/// Read the `/Encrypt` dictionary entries the standard handler needs.
pub(crate) fn encrypt_params(doc: &lopdf::Document, dict: &Dictionary) -> EncryptParams {
    let get = |key: &[u8]| dict.get(key).ok().map(|v| objects::deref(doc, v));
    let bytes = |key: &[u8]| match get(key) {
        Some(Object::String(b, _)) => b.clone(),
        _ => Vec::new(),
    };
    let int = |key: &[u8], default: i64| get(key).and_then(objects::integer).unwrap_or(default);
    EncryptParams {
        filter: get(b"Filter")
            .and_then(objects::name)
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default(),
        version: int(b"V", 0),
        revision: int(b"R", 0),
        key_length_bits: int(b"Length", 40),
        owner_entry: bytes(b"O"),
        user_entry: bytes(b"U"),
        permissions: int(b"P", 0) as i32,
    }
}

/// First element of the trailer `/ID` array.
pub(crate) fn file_id(doc: &lopdf::Document) -> Vec<u8> {
    let Ok(id) = doc.trailer.get(b"ID") else {
        return Vec::new();
    };
    match objects::deref(doc, id) {
        Object::Array(items) => match items.first().map(|first| objects::deref(doc, first)) {
            Some(Object::String(bytes, _)) => bytes.clone(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Stream, StringFormat, dictionary};
    use seitenwerk_security::ProtectionRequest;

    fn payload(object: &Object) -> (Vec<u8>, Vec<u8>) {
        let Object::Stream(stream) = object else {
            panic!("expected a stream");
        };
        let Ok(Object::String(title, _)) = stream.dict.get(b"Title") else {
            panic!("expected a title string");
        };
        (title.clone(), stream.content.clone())
    }

    #[test]
    fn cipher_round_trips_nested_objects() {
        let security = StandardSecurity::new(&ProtectionRequest::new("pw"), &[7u8; 16]).unwrap();
        let mut object = Object::Stream(Stream::new(
            dictionary! {
                "Title" => Object::String(b"secret".to_vec(), StringFormat::Literal),
            },
            b"BT (hello) Tj ET".to_vec(),
        ));
        let original = payload(&object);
        apply_cipher(&security, (5, 0), &mut object);
        assert_ne!(payload(&object), original);
        apply_cipher(&security, (5, 0), &mut object);
        assert_eq!(payload(&object), original);
    }

    #[test]
    fn xref_streams_are_exempt() {
        let xref = Object::Stream(Stream::new(dictionary! { "Type" => "XRef" }, Vec::new()));
        assert!(is_exempt(&xref));
        assert!(!is_exempt(&Object::Integer(3)));
    }
}
