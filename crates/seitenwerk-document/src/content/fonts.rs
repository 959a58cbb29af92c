// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font dictionaries: character codes, Unicode mapping, and glyph widths.

use std::collections::HashMap;

use lopdf::{Dictionary, Object};

use crate::model::{ResourceId, ResourcePool};
use crate::pdf::objects;

/// Helvetica advance widths for codes 32..=126, in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 32-47
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 48-63
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 64-79
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 80-95
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 96-111
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 112-126
];

/// WinAnsiEncoding 0x80..=0x9F. Unassigned slots are `None`.
const WIN_ANSI_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), None, Some('\u{201A}'), Some('\u{0192}'),
    Some('\u{201E}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02C6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017D}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201C}'),
    Some('\u{201D}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02DC}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203A}'),
    Some('\u{0153}'), None, Some('\u{017E}'), Some('\u{0178}'),
];

pub(crate) fn win_ansi_char(code: u8) -> Option<char> {
    match code {
        0x80..=0x9F => WIN_ANSI_HIGH[(code - 0x80) as usize],
        _ => Some(code as char),
    }
}

/// Encode one character as WinAnsi, if it has a code.
pub(crate) fn win_ansi_byte(c: char) -> Option<u8> {
    let cp = c as u32;
    if cp < 0x80 || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    WIN_ANSI_HIGH
        .iter()
        .position(|&slot| slot == Some(c))
        .map(|i| 0x80 + i as u8)
}

/// Helvetica width of a WinAnsi code, in 1/1000 em.
pub(crate) fn helvetica_width(code: u8) -> f32 {
    match code {
        32..=126 => f32::from(HELVETICA_WIDTHS[(code - 32) as usize]),
        0xA0 => 278.0,
        0x80..=0xFF => 556.0,
        _ => 0.0,
    }
}

/// Width of `text` set in Helvetica at `size` points. Characters outside
/// WinAnsi are measured as `?`.
pub fn helvetica_text_width(text: &str, size: f32) -> f32 {
    let units: f32 = text
        .chars()
        .map(|c| helvetica_width(win_ansi_byte(c).unwrap_or(b'?')))
        .sum();
    units * size / 1000.0
}

/// Unicode for the common glyph names used in `/Differences` arrays.
fn glyph_name_to_unicode(name: &[u8]) -> Option<String> {
    let name = std::str::from_utf8(name).ok()?;
    let base = name.split('.').next().unwrap_or(name);
    if base.len() == 1 {
        return Some(base.to_string());
    }
    if let Some(hex) = base.strip_prefix("uni") {
        let units: Option<Vec<u16>> = hex
            .as_bytes()
            .chunks(4)
            .map(|chunk| std::str::from_utf8(chunk).ok().and_then(|h| u16::from_str_radix(h, 16).ok()))
            .collect();
        return units.map(|u| String::from_utf16_lossy(&u));
    }
    if let Some(hex) = base.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Some(c.to_string());
            }
        }
    }
    let c = match base {
        "space" => ' ',
        "exclam" => '!',
        "quotedbl" => '"',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "ampersand" => '&',
        "quotesingle" => '\'',
        "parenleft" => '(',
        "parenright" => ')',
        "asterisk" => '*',
        "plus" => '+',
        "comma" => ',',
        "hyphen" | "minus" => '-',
        "period" => '.',
        "slash" => '/',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "colon" => ':',
        "semicolon" => ';',
        "less" => '<',
        "equal" => '=',
        "greater" => '>',
        "question" => '?',
        "at" => '@',
        "bracketleft" => '[',
        "backslash" => '\\',
        "bracketright" => ']',
        "asciicircum" => '^',
        "underscore" => '_',
        "grave" => '`',
        "braceleft" => '{',
        "bar" => '|',
        "braceright" => '}',
        "asciitilde" => '~',
        "bullet" => '\u{2022}',
        "endash" => '\u{2013}',
        "emdash" => '\u{2014}',
        "quoteleft" => '\u{2018}',
        "quoteright" => '\u{2019}',
        "quotedblleft" => '\u{201C}',
        "quotedblright" => '\u{201D}',
        "ellipsis" => '\u{2026}',
        "Euro" => '\u{20AC}',
        "copyright" => '\u{00A9}',
        "registered" => '\u{00AE}',
        "degree" => '\u{00B0}',
        "germandbls" => '\u{00DF}',
        "adieresis" => '\u{00E4}',
        "odieresis" => '\u{00F6}',
        "udieresis" => '\u{00FC}',
        "Adieresis" => '\u{00C4}',
        "Odieresis" => '\u{00D6}',
        "Udieresis" => '\u{00DC}',
        "eacute" => '\u{00E9}',
        "egrave" => '\u{00E8}',
        "agrave" => '\u{00E0}',
        "ccedilla" => '\u{00E7}',
        "fi" => return Some("fi".into()),
        "fl" => return Some("fl".into()),
        "ff" => return Some("ff".into()),
        _ => return None,
    };
    Some(c.to_string())
}

/// What the interpreter needs to know about a font.
#[derive(Debug, Clone)]
pub struct FontInfo {
    composite: bool,
    widths: HashMap<u32, f32>,
    default_width: f32,
    to_unicode: HashMap<u32, String>,
    encoding: HashMap<u8, String>,
    helvetica_fallback: bool,
}

impl Default for FontInfo {
    fn default() -> Self {
        Self {
            composite: false,
            widths: HashMap::new(),
            default_width: 500.0,
            to_unicode: HashMap::new(),
            encoding: HashMap::new(),
            helvetica_fallback: true,
        }
    }
}

impl FontInfo {
    pub fn from_dict(pool: &ResourcePool, dict: &Dictionary) -> Self {
        let subtype = pool.lookup(dict, b"Subtype").and_then(objects::name);
        let mut info = FontInfo {
            composite: subtype == Some(b"Type0".as_slice()),
            ..FontInfo::default()
        };

        if let Some(data) = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(ResourceId::from_reference)
            .and_then(|id| pool.stream_data(id))
        {
            info.to_unicode = parse_to_unicode(&data);
        }

        if info.composite {
            info.load_cid_widths(pool, dict);
        } else {
            info.load_simple_encoding(pool, dict);
            info.load_simple_widths(pool, dict);
        }
        info
    }

    pub fn is_composite(&self) -> bool {
        self.composite
    }

    fn load_simple_encoding(&mut self, pool: &ResourcePool, dict: &Dictionary) {
        let Some(Object::Dictionary(encoding)) = pool.lookup(dict, b"Encoding") else {
            return;
        };
        let Some(Object::Array(diffs)) = pool.lookup(encoding, b"Differences") else {
            return;
        };
        let mut code: i64 = 0;
        for item in diffs {
            match pool.resolve(item) {
                Object::Integer(n) => code = *n,
                Object::Name(glyph) => {
                    if let (Ok(byte), Some(text)) = (u8::try_from(code), glyph_name_to_unicode(glyph)) {
                        self.encoding.insert(byte, text);
                    }
                    code += 1;
                }
                _ => {}
            }
        }
    }

    fn load_simple_widths(&mut self, pool: &ResourcePool, dict: &Dictionary) {
        let first = pool
            .lookup(dict, b"FirstChar")
            .and_then(objects::integer)
            .unwrap_or(0);
        if let Some(Object::Array(widths)) = pool.lookup(dict, b"Widths") {
            self.helvetica_fallback = false;
            for (i, w) in widths.iter().enumerate() {
                if let (Some(w), Ok(code)) = (objects::number(pool.resolve(w)), u32::try_from(first + i as i64)) {
                    self.widths.insert(code, w);
                }
            }
        }
        if let Some(missing) = pool
            .lookup(dict, b"FontDescriptor")
            .and_then(|fd| pool.dict(fd))
            .and_then(|fd| pool.lookup(fd, b"MissingWidth"))
            .and_then(objects::number)
        {
            self.default_width = missing;
        }
        let base = pool
            .lookup(dict, b"BaseFont")
            .and_then(objects::name)
            .unwrap_or_default();
        if base.starts_with(b"Courier") {
            self.helvetica_fallback = false;
            self.default_width = 600.0;
        }
    }

    fn load_cid_widths(&mut self, pool: &ResourcePool, dict: &Dictionary) {
        let descendant = match pool.lookup(dict, b"DescendantFonts") {
            Some(Object::Array(items)) => items.first().and_then(|d| pool.dict(d)),
            _ => None,
        };
        self.helvetica_fallback = false;
        self.default_width = 1000.0;
        let Some(cid_font) = descendant else {
            return;
        };
        if let Some(dw) = pool.lookup(cid_font, b"DW").and_then(objects::number) {
            self.default_width = dw;
        }
        let Some(Object::Array(w)) = pool.lookup(cid_font, b"W") else {
            return;
        };
        let mut i = 0;
        while i < w.len() {
            let Some(start) = objects::integer(pool.resolve(&w[i])) else {
                break;
            };
            match w.get(i + 1).map(|o| pool.resolve(o)) {
                Some(Object::Array(list)) => {
                    for (offset, width) in list.iter().enumerate() {
                        if let Some(width) = objects::number(pool.resolve(width)) {
                            self.widths.insert((start + offset as i64) as u32, width);
                        }
                    }
                    i += 2;
                }
                Some(end) => {
                    let end = objects::integer(end).unwrap_or(start);
                    let width = w.get(i + 2).and_then(|o| objects::number(pool.resolve(o)));
                    if let Some(width) = width {
                        for cid in start..=end.min(start + 0xFFFF) {
                            self.widths.insert(cid as u32, width);
                        }
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    /// Split a string operand into character codes.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.composite {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => (u32::from(*hi) << 8) | u32::from(*lo),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        }
    }

    /// Advance width in 1/1000 text space units.
    pub fn width(&self, code: u32) -> f32 {
        if let Some(&w) = self.widths.get(&code) {
            return w;
        }
        if self.helvetica_fallback {
            if let Ok(byte) = u8::try_from(code) {
                return helvetica_width(byte);
            }
        }
        self.default_width
    }

    /// Unicode text for a code. Unknown codes map to U+FFFD.
    pub fn unicode(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.get(&code) {
            return text.clone();
        }
        if self.composite {
            return '\u{FFFD}'.to_string();
        }
        let Ok(byte) = u8::try_from(code) else {
            return '\u{FFFD}'.to_string();
        };
        if let Some(text) = self.encoding.get(&byte) {
            return text.clone();
        }
        win_ansi_char(byte).unwrap_or('\u{FFFD}').to_string()
    }

    /// Word spacing applies to the single-byte code 32 only.
    pub fn is_word_space(&self, code: u32) -> bool {
        !self.composite && code == 32
    }
}

#[derive(Debug, PartialEq)]
enum CmapToken {
    Hex(Vec<u8>),
    Word(String),
    Open,
    Close,
}

fn tokenize_cmap(data: &[u8]) -> Vec<CmapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'<' if data.get(i + 1) != Some(&b'<') => {
                let end = data[i..].iter().position(|&b| b == b'>').map_or(data.len(), |p| i + p);
                let digits: Vec<u8> = data[i + 1..end]
                    .iter()
                    .copied()
                    .filter(u8::is_ascii_hexdigit)
                    .collect();
                let bytes = digits
                    .chunks(2)
                    .filter_map(|pair| {
                        let s = std::str::from_utf8(pair).ok()?;
                        let padded = if s.len() == 1 { format!("{s}0") } else { s.to_string() };
                        u8::from_str_radix(&padded, 16).ok()
                    })
                    .collect();
                tokens.push(CmapToken::Hex(bytes));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CmapToken::Open);
                i += 1;
            }
            b']' => {
                tokens.push(CmapToken::Close);
                i += 1;
            }
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len() && !data[i].is_ascii_whitespace() && !b"<>[]%".contains(&data[i]) {
                    i += 1;
                }
                if i == start {
                    i += 1;
                    continue;
                }
                tokens.push(CmapToken::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }
    tokens
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub(crate) fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let tokens = tokenize_cmap(data);
    let mut map = HashMap::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            CmapToken::Word(w) if w == "beginbfchar" => {
                i += 1;
                while let (Some(CmapToken::Hex(src)), Some(CmapToken::Hex(dst))) =
                    (tokens.get(i), tokens.get(i + 1))
                {
                    map.insert(code_of(src), utf16_text(dst));
                    i += 2;
                }
            }
            CmapToken::Word(w) if w == "beginbfrange" => {
                i += 1;
                loop {
                    let (Some(CmapToken::Hex(lo)), Some(CmapToken::Hex(hi))) =
                        (tokens.get(i), tokens.get(i + 1))
                    else {
                        break;
                    };
                    let (lo, hi) = (code_of(lo), code_of(hi));
                    match tokens.get(i + 2) {
                        Some(CmapToken::Hex(dst)) => {
                            let mut units: Vec<u16> = dst
                                .chunks(2)
                                .map(|p| match p {
                                    [a, b] => u16::from_be_bytes([*a, *b]),
                                    [a] => u16::from(*a),
                                    _ => 0,
                                })
                                .collect();
                            for code in lo..=hi.min(lo + 0xFFFF) {
                                map.insert(code, String::from_utf16_lossy(&units));
                                if let Some(last) = units.last_mut() {
                                    *last = last.wrapping_add(1);
                                }
                            }
                            i += 3;
                        }
                        Some(CmapToken::Open) => {
                            let mut j = i + 3;
                            let mut code = lo;
                            while let Some(CmapToken::Hex(dst)) = tokens.get(j) {
                                if code <= hi {
                                    map.insert(code, utf16_text(dst));
                                }
                                code += 1;
                                j += 1;
                            }
                            i = j + 1;
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }
    map
}
