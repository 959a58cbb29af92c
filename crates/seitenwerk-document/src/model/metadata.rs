// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document information dictionary: text strings and `D:` dates.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use lopdf::{Dictionary, Object, StringFormat};
use serde::{Deserialize, Serialize};

/// The `/Info` entries Seitenwerk reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub created: Option<DateTime<FixedOffset>>,
    pub modified: Option<DateTime<FixedOffset>>,
}

impl Metadata {
    /// Build from raw `/Info` string values. `lookup` returns the bytes of the
    /// string stored under a key, already dereferenced.
    pub(crate) fn from_info(lookup: impl Fn(&[u8]) -> Option<Vec<u8>>) -> Self {
        let text = |key: &[u8]| lookup(key).map(|raw| decode_text_string(&raw));
        let date = |key: &[u8]| lookup(key).and_then(|raw| parse_date(&decode_text_string(&raw)));
        Self {
            title: text(b"Title"),
            author: text(b"Author"),
            subject: text(b"Subject"),
            keywords: text(b"Keywords"),
            creator: text(b"Creator"),
            producer: text(b"Producer"),
            created: date(b"CreationDate"),
            modified: date(b"ModDate"),
        }
    }

    /// Record a write by `producer` now.
    pub fn stamp(&mut self, producer: &str) {
        let now: DateTime<FixedOffset> = Utc::now().into();
        self.producer = Some(producer.to_string());
        self.modified = Some(now);
        if self.created.is_none() {
            self.created = Some(now);
        }
    }

    pub(crate) fn to_info(&self) -> Dictionary {
        let mut info = Dictionary::new();
        let fields = [
            ("Title", &self.title),
            ("Author", &self.author),
            ("Subject", &self.subject),
            ("Keywords", &self.keywords),
            ("Creator", &self.creator),
            ("Producer", &self.producer),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                info.set(key, encode_text_string(value));
            }
        }
        if let Some(created) = &self.created {
            info.set("CreationDate", Object::string_literal(format_date(created)));
        }
        if let Some(modified) = &self.modified {
            info.set("ModDate", Object::string_literal(format_date(modified)));
        }
        info
    }
}

/// PDFDocEncoding code points 0x80..=0x9F that differ from Latin-1.
const PDF_DOC_HIGH: [char; 32] = [
    '\u{2022}', '\u{2020}', '\u{2021}', '\u{2026}', '\u{2014}', '\u{2013}', '\u{0192}', '\u{2044}',
    '\u{2039}', '\u{203A}', '\u{2212}', '\u{2030}', '\u{201E}', '\u{201C}', '\u{201D}', '\u{2018}',
    '\u{2019}', '\u{201A}', '\u{2122}', '\u{FB01}', '\u{FB02}', '\u{0141}', '\u{0152}', '\u{0160}',
    '\u{0178}', '\u{017D}', '\u{0131}', '\u{0142}', '\u{0153}', '\u{0161}', '\u{017E}', '\u{FFFD}',
];

fn pdf_doc_char(b: u8) -> char {
    match b {
        0x80..=0x9F => PDF_DOC_HIGH[(b - 0x80) as usize],
        0xA0 => '\u{20AC}',
        _ => b as char,
    }
}

fn pdf_doc_byte(c: char) -> Option<u8> {
    match c {
        '\u{20AC}' => Some(0xA0),
        c if (c as u32) < 0x80 || ((c as u32) > 0xA0 && (c as u32) <= 0xFF) => Some(c as u8),
        c => PDF_DOC_HIGH
            .iter()
            .position(|&m| m == c && m != '\u{FFFD}')
            .map(|i| 0x80 + i as u8),
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8 with BOM, or PDFDocEncoding.
pub(crate) fn decode_text_string(raw: &[u8]) -> String {
    if let Some(body) = raw.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = body
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(body) = raw.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(body).into_owned();
    }
    raw.iter().map(|&b| pdf_doc_char(b)).collect()
}

/// Encode text as PDFDocEncoding when possible, else UTF-16BE with BOM.
pub(crate) fn encode_text_string(text: &str) -> Object {
    let doc: Option<Vec<u8>> = text.chars().map(pdf_doc_byte).collect();
    match doc {
        Some(bytes) => Object::String(bytes, StringFormat::Literal),
        None => {
            let mut bytes = vec![0xFE, 0xFF];
            for unit in text.encode_utf16() {
                bytes.extend_from_slice(&unit.to_be_bytes());
            }
            Object::String(bytes, StringFormat::Hexadecimal)
        }
    }
}

/// Parse `D:YYYYMMDDHHmmSSOHH'mm'`. Every field after the year is optional.
pub(crate) fn parse_date(text: &str) -> Option<DateTime<FixedOffset>> {
    let s = text.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);
    let digits: String = s.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.len() < 4 {
        return None;
    }
    let field = |from: usize, len: usize, default: u32| -> u32 {
        digits
            .get(from..from + len)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    };
    let year = digits.get(0..4)?.parse::<i32>().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(4, 2, 1), field(6, 2, 1))?;
    let naive = date.and_hms_opt(field(8, 2, 0), field(10, 2, 0), field(12, 2, 0))?;

    let rest = &s[digits.len()..];
    let offset_secs = match rest.chars().next() {
        Some(sign @ ('+' | '-')) => {
            let tz: String = rest[1..].chars().filter(|c| c.is_ascii_digit()).collect();
            let hours: i32 = tz.get(0..2).and_then(|v| v.parse().ok()).unwrap_or(0);
            let minutes: i32 = tz.get(2..4).and_then(|v| v.parse().ok()).unwrap_or(0);
            let secs = hours * 3600 + minutes * 60;
            if sign == '-' { -secs } else { secs }
        }
        _ => 0,
    };
    let offset = FixedOffset::east_opt(offset_secs)?;
    offset.from_local_datetime(&naive).single()
}

pub(crate) fn format_date(date: &DateTime<FixedOffset>) -> String {
    let secs = date.offset().local_minus_utc();
    let sign = if secs < 0 { '-' } else { '+' };
    let secs = secs.abs();
    format!(
        "D:{}{sign}{:02}'{:02}'",
        date.format("%Y%m%d%H%M%S"),
        secs / 3600,
        (secs % 3600) / 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_full_date_with_offset() {
        let d = parse_date("D:20240315103000+01'00'").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2024, 3, 15));
        assert_eq!((d.hour(), d.minute()), (10, 30));
        assert_eq!(d.offset().local_minus_utc(), 3600);
    }

    #[test]
    fn parses_year_only_and_z_suffix() {
        let d = parse_date("D:1999").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (1999, 1, 1));
        let z = parse_date("D:20200101000000Z").unwrap();
        assert_eq!(z.offset().local_minus_utc(), 0);
    }

    #[test]
    fn format_then_parse_keeps_instant() {
        let d = parse_date("D:20231231235959-05'30'").unwrap();
        assert_eq!(format_date(&d), "D:20231231235959-05'30'");
        assert_eq!(parse_date(&format_date(&d)), Some(d));
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("D:20241340"), None);
    }

    #[test]
    fn text_strings_use_pdf_doc_encoding_when_possible() {
        assert_eq!(
            encode_text_string("Café – €5"),
            Object::String(b"Caf\xE9 \x85 \xA05".to_vec(), StringFormat::Literal)
        );
        assert_eq!(decode_text_string(b"Caf\xE9 \x85 \xA05"), "Café – €5");
    }

    #[test]
    fn text_strings_fall_back_to_utf16() {
        let Object::String(bytes, _) = encode_text_string("日本") else {
            panic!("expected a string");
        };
        assert_eq!(&bytes[..2], &[0xFE, 0xFF]);
        assert_eq!(decode_text_string(&bytes), "日本");
    }

    #[test]
    fn info_round_trip() {
        let mut meta = Metadata {
            title: Some("Quarterly report".into()),
            author: Some("Zoë".into()),
            ..Metadata::default()
        };
        meta.stamp("Seitenwerk");
        let info = meta.to_info();
        let back = Metadata::from_info(|key| match info.get(key) {
            Ok(Object::String(bytes, _)) => Some(bytes.clone()),
            _ => None,
        });
        assert_eq!(back.title, meta.title);
        assert_eq!(back.author, meta.author);
        assert_eq!(back.producer.as_deref(), Some("Seitenwerk"));
        assert_eq!(
            back.modified.map(|d| d.timestamp()),
            meta.modified.map(|d| d.timestamp())
        );
    }
}
