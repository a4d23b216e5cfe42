//! PDF text string decoding
//!
//! Outline titles and destination names show up in every encoding a PDF
//! producer ever used. Supports UTF-16BE, UTF-8, Shift-JIS, EUC-JP,
//! ISO-2022-JP, and Latin-1.

use encoding_rs::{EUC_JP, Encoding, ISO_2022_JP, SHIFT_JIS};
use log::trace;

const LEGACY_ENCODINGS: [&Encoding; 3] = [SHIFT_JIS, EUC_JP, ISO_2022_JP];

/// Decode a PDF text string (outline titles, metadata)
///
/// Order of attempts:
/// - UTF-16BE when the bytes start with the 0xFE 0xFF BOM
/// - UTF-8
/// - the legacy Japanese encoding producing the most kana/kanji without
///   replacement or control characters
/// - Latin-1/PDFDocEncoding
pub fn decode_pdf_string(obj: &lopdf::Object) -> Option<String> {
    match obj {
        lopdf::Object::String(bytes, _) => Some(decode_text_bytes(bytes, true)),
        _ => None,
    }
}

/// Decode a destination name, which may be a string or a name object
///
/// Names take the first clean legacy decoding instead of scoring them,
/// since they are looked up, not displayed.
pub fn decode_name_string(obj: &lopdf::Object) -> Option<String> {
    match obj {
        lopdf::Object::String(bytes, _) => Some(decode_text_bytes(bytes, false)),
        lopdf::Object::Name(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
        _ => None,
    }
}

/// Decode UTF-16BE bytes following a BOM; returns None without the BOM
pub fn decode_utf16be(bytes: &[u8]) -> Option<String> {
    if bytes.len() < 2 || bytes[0] != 0xFE || bytes[1] != 0xFF {
        return None;
    }
    let units: Vec<u16> = bytes[2..]
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).ok()
}

fn decode_text_bytes(bytes: &[u8], score_candidates: bool) -> String {
    if let Some(s) = decode_utf16be(bytes) {
        trace!("decoded {} bytes as UTF-16BE", bytes.len());
        return s;
    }
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    let legacy = if score_candidates {
        best_legacy_decoding(bytes)
    } else {
        first_clean_legacy_decoding(bytes)
    };

    legacy.unwrap_or_else(|| {
        trace!("falling back to Latin-1 for {} bytes", bytes.len());
        bytes.iter().map(|&b| b as char).collect()
    })
}

fn clean_decode(encoding: &'static Encoding, bytes: &[u8]) -> Option<String> {
    let (decoded, _, had_errors) = encoding.decode(bytes);
    if had_errors || decoded.contains('\u{FFFD}') {
        None
    } else {
        Some(decoded.into_owned())
    }
}

fn first_clean_legacy_decoding(bytes: &[u8]) -> Option<String> {
    LEGACY_ENCODINGS
        .iter()
        .find_map(|encoding| clean_decode(encoding, bytes))
}

fn best_legacy_decoding(bytes: &[u8]) -> Option<String> {
    let mut best: Option<(i32, String)> = None;
    for encoding in LEGACY_ENCODINGS {
        let Some(decoded) = clean_decode(encoding, bytes) else {
            continue;
        };
        let score = japanese_score(&decoded);
        trace!("{} scored {} for {:?}", encoding.name(), score, decoded);
        if best.as_ref().is_none_or(|(best_score, _)| score > *best_score) {
            best = Some((score, decoded));
        }
    }
    best.map(|(_, s)| s)
}

/// Reward kana and kanji, punish stray control characters
fn japanese_score(s: &str) -> i32 {
    let japanese = s.chars().filter(|&c| is_japanese(c)).count() as i32;
    let control = s
        .chars()
        .filter(|&c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
        .count() as i32;
    japanese * 10 - control * 50
}

fn is_japanese(c: char) -> bool {
    ('\u{3040}'..='\u{309F}').contains(&c) // Hiragana
        || ('\u{30A0}'..='\u{30FF}').contains(&c) // Katakana
        || ('\u{4E00}'..='\u{9FFF}').contains(&c) // CJK Unified Ideographs
        || ('\u{3400}'..='\u{4DBF}').contains(&c) // CJK Extension A
}
