//! Text normalizer for raw extracted text.
//!
//! Cleans text coming out of upstream extraction (web scrapes, PDF parsers,
//! forum APIs) into a single-spaced, printable Latin-1 string suitable for
//! chunking and scoring.
//!
//! # Steps
//!
//! 1. If the whole input looks like a base64 payload, decode it. A payload
//!    that cannot be decoded into text is reported as
//!    [`NormalizeError::UndecodablePayload`] by [`try_normalize`];
//!    [`normalize`] falls back to cleaning the original text.
//! 2. Strip ASCII and C1 control characters (`0x00–0x1F`, `0x7F–0x9F`),
//!    turning whitespace controls into spaces so words never fuse.
//! 3. Drop characters outside printable ASCII plus the Latin-1 supplement.
//! 4. Unescape literal `\n`, `\r`, `\t` (to spaces) and `\"` (to `"`).
//! 5. Remove leftover PDF structural markers (`endstream`, `endobj`, ...).
//! 6. Collapse whitespace runs to single spaces and trim.
//!
//! The output is a fixed point: `normalize(normalize(x)) == normalize(x)`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Shortest input considered for base64 decoding. Real chunks contain
/// spaces, so a long unbroken run of base64 alphabet is an encoded payload.
const MIN_BASE64_LEN: usize = 24;

/// Whole-word markers left behind by naive PDF stream extraction.
const PDF_MARKERS: &[&str] = &["endstream", "endobj", "stream", "obj"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("input looks like base64 but does not decode to text: {0}")]
    UndecodablePayload(String),
}

/// Normalize raw text, best-effort.
///
/// An undecodable base64-looking payload is cleaned as ordinary text
/// instead of failing.
pub fn normalize(raw: &str) -> String {
    match try_normalize(raw) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!(error = %e, "falling back to cleaning undecoded text");
            clean(raw)
        }
    }
}

/// Normalize raw text, reporting payloads that could not be decoded.
pub fn try_normalize(raw: &str) -> Result<String, NormalizeError> {
    let trimmed = raw.trim();
    let mut text = if looks_like_base64(trimmed) {
        clean(&decode_base64_text(trimmed)?)
    } else {
        clean(raw)
    };

    // Cleaning can expose a payload (a stripped control character or PDF
    // marker), so decode until the text is stable. Each decode shrinks it.
    while looks_like_base64(&text) {
        match decode_base64_text(&text) {
            Ok(decoded) => text = clean(&decoded),
            Err(_) => break,
        }
    }
    Ok(text)
}

/// Whether `s` is a single run of base64 alphabet with valid padding that
/// reads like encoded data rather than a long word or identifier.
///
/// Unpadded runs must mix upper case, lower case and digits; a plain word,
/// a lowercase hex digest or a CamelCase name does not qualify.
pub fn looks_like_base64(s: &str) -> bool {
    if s.len() < MIN_BASE64_LEN || s.len() % 4 != 0 {
        return false;
    }
    let body = s.trim_end_matches('=');
    let padding = s.len() - body.len();
    if padding > 2 {
        return false;
    }
    if !body
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
    {
        return false;
    }
    if padding > 0 {
        return true;
    }
    let has = |pred: fn(&u8) -> bool| body.as_bytes().iter().any(pred);
    has(u8::is_ascii_uppercase) && has(u8::is_ascii_lowercase) && has(u8::is_ascii_digit)
}

fn decode_base64_text(s: &str) -> Result<String, NormalizeError> {
    let bytes = STANDARD
        .decode(s)
        .map_err(|e| NormalizeError::UndecodablePayload(e.to_string()))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| NormalizeError::UndecodablePayload(e.to_string()))?;
    // Decoded prose has word breaks; binary that happens to be UTF-8 rarely does.
    if !text.trim().contains(char::is_whitespace) {
        return Err(NormalizeError::UndecodablePayload(
            "decoded payload has no word boundaries".to_string(),
        ));
    }
    Ok(text)
}

fn clean(text: &str) -> String {
    let printable: String = text
        .chars()
        .filter_map(|c| {
            if c.is_whitespace() {
                Some(' ')
            } else if is_control(c) || !is_printable_latin1(c) {
                None
            } else {
                Some(c)
            }
        })
        .collect();

    let unescaped = unescape(&printable);
    let stripped = strip_filter_dicts(&unescaped);

    stripped
        .split_whitespace()
        .filter(|word| !is_pdf_marker(word))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_control(c: char) -> bool {
    matches!(c as u32, 0x00..=0x1F | 0x7F..=0x9F)
}

fn is_printable_latin1(c: char) -> bool {
    matches!(c as u32, 0x20..=0x7E | 0xA0..=0xFF)
}

/// Replace escape sequences until none remain.
///
/// A single pass can expose a new sequence (`\\"` becomes `\"`), so the
/// loop runs to a fixed point. Every replacement shortens the string.
fn unescape(text: &str) -> String {
    let mut out = text.to_string();
    loop {
        let next = out
            .replace("\\n", " ")
            .replace("\\r", " ")
            .replace("\\t", " ")
            .replace("\\\"", "\"");
        if next == out {
            return out;
        }
        out = next;
    }
}

/// Remove `<</Filter ... >>` stream dictionaries.
fn strip_filter_dicts(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("<</Filter") {
        match rest[start..].find(">>") {
            Some(len) => {
                out.push_str(&rest[..start]);
                out.push(' ');
                rest = &rest[start + len + 2..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}

fn is_pdf_marker(word: &str) -> bool {
    PDF_MARKERS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize("  rent \n\n increase\t notice  "), "rent increase notice");
    }

    #[test]
    fn test_strips_control_characters() {
        assert_eq!(normalize("land\u{0}lord\u{7f} \u{85}notice"), "landlord notice");
    }

    #[test]
    fn test_newlines_do_not_fuse_words() {
        assert_eq!(normalize("security\ndeposit"), "security deposit");
    }

    #[test]
    fn test_drops_non_latin1() {
        assert_eq!(normalize("caf\u{e9} \u{2014} \u{1F600}ok"), "caf\u{e9} ok");
    }

    #[test]
    fn test_unescapes_literal_sequences() {
        assert_eq!(
            normalize(r#"Section 42\nNotice of \"rent increase\""#),
            r#"Section 42 Notice of "rent increase""#
        );
    }

    #[test]
    fn test_removes_pdf_markers() {
        assert_eq!(
            normalize("12 0 obj <</Filter/FlateDecode/Length 123>> stream text endstream endobj"),
            "12 0 text"
        );
    }

    #[test]
    fn test_decodes_base64_payload() {
        let encoded = STANDARD.encode("The landlord must return the deposit within 15 days.");
        assert_eq!(
            normalize(&encoded),
            "The landlord must return the deposit within 15 days."
        );
    }

    #[test]
    fn test_undecodable_payload_is_reported() {
        let encoded = STANDARD.encode([
            0xffu8, 0xfe, 0x00, 0x10, 0x80, 0x81, 0x82, 0x83, 0x84, 0x85, 0x86, 0x87, 0x88, 0x89,
            0x8a, 0x8b, 0x8c, 0x8d,
        ]);
        assert!(matches!(
            try_normalize(&encoded),
            Err(NormalizeError::UndecodablePayload(_))
        ));
        // Best-effort path keeps the original characters.
        assert_eq!(normalize(&encoded), encoded);
    }

    #[test]
    fn test_payload_exposed_by_cleaning_is_decoded() {
        let encoded = STANDARD.encode("The landlord must return the deposit.");
        let (head, tail) = encoded.split_at(10);
        let with_control = format!("{}\u{1}{}", head, tail);
        let with_marker = format!("{} endobj", encoded);

        for raw in [with_control, with_marker] {
            assert_eq!(normalize(&raw), "The landlord must return the deposit.");
        }
    }

    #[test]
    fn test_long_identifiers_are_not_base64() {
        // Lowercase hex digest, CamelCase name, single long word.
        for word in [
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
            "ResidentialTenancyActSectionFortyTwo",
            "antidisestablishmentarianism",
        ] {
            assert!(!looks_like_base64(word), "{} treated as base64", word);
            assert_eq!(try_normalize(word).unwrap(), word);
        }
    }

    #[test]
    fn test_short_words_are_not_base64() {
        assert!(!looks_like_base64("landlord"));
        assert_eq!(normalize("landlord"), "landlord");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" \n\t "), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Plain text.",
            "  Messy\r\n\r\ntext   with \u{0}junk\u{7}  ",
            r#"\\"quoted\\" and \\\n escaped"#,
            "a \u{1}\\\u{2}n b",
            "endstream stream\\nobj tail",
            "\u{a0}non\u{a0}breaking\u{a0}",
            "VGhpcyBpcyBhIGJhc2U2NCBlbmNvZGVkIHNlbnRlbmNlLg==",
            "QUFBQUFBQUFBQUFBQUFBQUFBQUFBQUFB",
            // Payloads that only become base64 once cleaned.
            "VGhlIGxhbmRsb3JkIG11c3QgcmV0d\u{1}XJuIHRoZSBkZXBvc2l0Lg==",
            "VGhlIGxhbmRsb3JkIG11c3QgcmV0dXJuIHRoZSBkZXBvc2l0Lg== endobj",
        ];
        for s in samples {
            let once = normalize(s);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", s);
        }
    }
}
