// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Small helpers over `lopdf` objects shared by the loader, serializer,
// content interpreter, and overlay writer.

use lopdf::{Object, Stream};
use tracing::warn;

/// Bound on `/Parent` walks and reference chains in untrusted files.
pub(crate) const MAX_TREE_DEPTH: usize = 32;

/// What dangling references resolve to.
pub(crate) static NULL: Object = Object::Null;

/// Follow references in a raw `lopdf` document.
pub(crate) fn deref<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..MAX_TREE_DEPTH {
        let Object::Reference(id) = current else {
            return current;
        };
        match doc.get_object(*id) {
            Ok(next) => current = next,
            Err(_) => return &NULL,
        }
    }
    &NULL
}

/// Numeric value of an integer or real object.
pub(crate) fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v as f32),
        _ => None,
    }
}

/// Integer value, accepting reals with no fractional part.
pub(crate) fn integer(obj: &Object) -> Option<i64> {
    match obj {
        Object::Integer(v) => Some(*v),
        Object::Real(v) => {
            let v = *v as f64;
            (v.fract() == 0.0).then_some(v as i64)
        }
        _ => None,
    }
}

pub(crate) fn name(obj: &Object) -> Option<&[u8]> {
    match obj {
        Object::Name(bytes) => Some(bytes.as_slice()),
        _ => None,
    }
}

/// Parse a rectangle array into `[llx, lly, urx, ury]` with min/max ordering.
pub(crate) fn rect(obj: &Object) -> Option<[f32; 4]> {
    let Object::Array(items) = obj else {
        return None;
    };
    if items.len() != 4 {
        return None;
    }
    let v = [
        number(&items[0])?,
        number(&items[1])?,
        number(&items[2])?,
        number(&items[3])?,
    ];
    let normalised = [v[0].min(v[2]), v[1].min(v[3]), v[0].max(v[2]), v[1].max(v[3])];
    let has_area = normalised[2] > normalised[0] && normalised[3] > normalised[1];
    (has_area && normalised.iter().all(|c| c.is_finite())).then_some(normalised)
}

pub(crate) fn rect_object(r: [f32; 4]) -> Object {
    Object::Array(r.iter().map(|&v| real_or_integer(v)).collect())
}

/// Write whole numbers as integers so boxes like `[0 0 612 792]` stay tidy.
pub(crate) fn real_or_integer(v: f32) -> Object {
    if v.fract() == 0.0 && v.abs() < 1.0e9 {
        Object::Integer(v as i64)
    } else {
        Object::Real(v.into())
    }
}

/// Names of the filters applied to a stream, outermost first.
pub(crate) fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items.iter().filter_map(name).map(<[u8]>::to_vec).collect(),
        _ => Vec::new(),
    }
}

/// Stream payload with its filters removed. Undecodable data is returned raw.
pub(crate) fn decode_stream(stream: &Stream) -> Vec<u8> {
    if stream.dict.get(b"Filter").is_err() {
        return stream.content.clone();
    }
    match stream.decompressed_content() {
        Ok(data) => data,
        Err(err) => {
            warn!(%err, "Cannot decode stream, using raw bytes");
            stream.content.clone()
        }
    }
}

/// Escape bytes for a PDF literal string body (without the parentheses).
pub(crate) fn escape_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 8);
    for &b in bytes {
        match b {
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{b:03o}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, Stream};

    #[test]
    fn rect_normalises_corner_order() {
        let obj = Object::Array(vec![612.into(), 792.into(), 0.into(), 0.into()]);
        assert_eq!(rect(&obj), Some([0.0, 0.0, 612.0, 792.0]));
    }

    #[test]
    fn rect_rejects_degenerate_boxes() {
        let flat = Object::Array(vec![0.into(), 0.into(), 100.into(), 0.into()]);
        assert_eq!(rect(&flat), None);
        let short = Object::Array(vec![0.into(), 0.into(), 100.into()]);
        assert_eq!(rect(&short), None);
    }

    #[test]
    fn integral_reals_count_as_integers() {
        assert_eq!(integer(&Object::Real(90.0)), Some(90));
        assert_eq!(integer(&Object::Real(90.5)), None);
    }

    #[test]
    fn unfiltered_stream_is_returned_verbatim() {
        let stream = Stream::new(Dictionary::new(), b"0 0 m 10 10 l S".to_vec());
        assert_eq!(decode_stream(&stream), b"0 0 m 10 10 l S");
    }

    #[test]
    fn literal_escaping() {
        assert_eq!(escape_literal(b"a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(escape_literal(&[0xE9]), "\\351");
    }
}
