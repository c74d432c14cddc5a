//! Turning response bytes into text.

use encoding_rs::{Encoding, UTF_8};

/// Charsets tried after the server-declared one, in order.
const FALLBACK_LABELS: [&str; 4] = ["utf-8", "latin1", "iso-8859-1", "cp1252"];

/// Decode `bytes`, preferring a BOM, then `declared`, then the fallback list.
///
/// Every label is tried strictly; when all of them reject the input the
/// charset is sniffed from `<meta>` tags and decoded lossily.
pub fn decode_body(bytes: &[u8], declared: Option<&str>) -> (String, &'static Encoding) {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return (text.into_owned(), encoding);
    }

    let labels = declared.into_iter().chain(FALLBACK_LABELS);
    for label in labels {
        let Some(encoding) = Encoding::for_label(label.trim().as_bytes()) else {
            tracing::warn!(%label, "unknown charset label");
            continue;
        };
        match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            Some(text) => {
                tracing::debug!(encoding = encoding.name(), "decoded response body");
                return (text.into_owned(), encoding);
            }
            None => tracing::debug!(encoding = encoding.name(), "charset rejected response body"),
        }
    }

    let encoding = sniff_meta_charset(bytes).unwrap_or(UTF_8);
    tracing::info!(encoding = encoding.name(), "falling back to lossy decoding");
    let (text, _, _) = encoding.decode(bytes);
    (text.into_owned(), encoding)
}

/// Charset from a `<meta charset>` or `http-equiv` declaration in the first KiB.
pub fn sniff_meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]).to_ascii_lowercase();
    let mut rest = head.as_str();
    while let Some(pos) = rest.find("charset=") {
        rest = &rest[pos + "charset=".len()..];
        let label: String = rest
            .trim_start_matches(['"', '\''])
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
            .collect();
        if let Some(encoding) = Encoding::for_label(label.as_bytes()) {
            return Some(encoding);
        }
    }
    None
}

/// Charset parameter of a `Content-Type` header value.
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches(['"', '\'']).to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declared_charset_is_tried_first() {
        // "café" in ISO-8859-1
        let bytes = b"caf\xe9";
        let (text, encoding) = decode_body(bytes, Some("iso-8859-1"));
        assert_eq!(text, "café");
        assert_eq!(encoding.name(), "windows-1252");
    }

    #[test]
    fn utf8_wins_when_nothing_is_declared() {
        let (text, encoding) = decode_body("ação".as_bytes(), None);
        assert_eq!(text, "ação");
        assert_eq!(encoding, UTF_8);
    }

    #[test]
    fn invalid_utf8_falls_through_to_latin1() {
        let (text, encoding) = decode_body(b"na\xefve", Some("utf-8"));
        assert_eq!(text, "naïve");
        assert_eq!(encoding.name(), "windows-1252");
    }

    #[test]
    fn unknown_declared_label_is_skipped() {
        let (text, _) = decode_body(b"plain", Some("x-made-up"));
        assert_eq!(text, "plain");
    }

    #[test]
    fn bom_overrides_declaration() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("olá".as_bytes());
        let (text, encoding) = decode_body(&bytes, Some("iso-8859-1"));
        assert_eq!(text, "olá");
        assert_eq!(encoding, UTF_8);
    }

    #[test]
    fn parses_content_type_charset() {
        assert_eq!(
            charset_from_content_type("text/html; charset=\"ISO-8859-1\""),
            Some("ISO-8859-1".to_string())
        );
        assert_eq!(charset_from_content_type("text/html"), None);
    }

    #[test]
    fn sniffs_meta_charset() {
        let html = br#"<html><head><meta charset="windows-1251"></head></html>"#;
        assert_eq!(sniff_meta_charset(html).map(|e| e.name()), Some("windows-1251"));
        assert!(sniff_meta_charset(b"<html></html>").is_none());
    }
}
