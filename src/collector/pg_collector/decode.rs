//! Query text decoding.
//!
//! Query text arrives as raw bytes together with the owning database's
//! declared encoding. Decoding never fails: bytes that cannot be honored
//! are replaced with U+FFFD.

use std::borrow::Cow;

use tracing::debug;

/// Decodes raw query bytes declared to be in `encoding`.
pub fn decode_query(bytes: &[u8], encoding: Option<&str>) -> String {
    // Text crosses the wire converted to the client encoding, so valid UTF-8
    // wins whatever the database declares.
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }

    match encoding.map(|e| e.to_ascii_uppercase()).as_deref() {
        Some("LATIN1") | Some("ISO_8859_1") => bytes.iter().map(|&b| b as char).collect(),
        other => {
            debug!(
                encoding = other.unwrap_or("unknown"),
                len = bytes.len(),
                "lossy query text decode"
            );
            match String::from_utf8_lossy(bytes) {
                Cow::Borrowed(text) => text.to_string(),
                Cow::Owned(text) => text,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_passes_through() {
        assert_eq!(decode_query("SELECT 'été'".as_bytes(), Some("UTF8")), "SELECT 'été'");
        assert_eq!(decode_query(b"SELECT 1", None), "SELECT 1");
    }

    #[test]
    fn latin1_bytes_are_mapped() {
        let bytes = b"SELECT '\xe9t\xe9'";
        assert_eq!(decode_query(bytes, Some("LATIN1")), "SELECT 'été'");
    }

    #[test]
    fn unknown_encoding_is_lossy() {
        let bytes = b"SELECT '\xff\xfe'";
        let text = decode_query(bytes, Some("EUC_JP"));
        assert!(text.starts_with("SELECT '"));
        assert!(text.contains('\u{FFFD}'));
        let text = decode_query(bytes, Some("SQL_ASCII"));
        assert!(text.contains('\u{FFFD}'));
    }
}
