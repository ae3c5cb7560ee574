//! Plain-text extraction for uploaded documents.
//!
//! Callers supply bytes plus a content type; this module returns UTF-8
//! text that is then normalized and chunked by the ingestion pipeline.

use std::path::Path;

use scraper::{Html, Node};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_HTML: &str = "text/html";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported content-type: {0}")]
    UnsupportedContentType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("text is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Guess a content type from a file extension.
pub fn content_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(MIME_PDF),
        "txt" | "text" => Some(MIME_TEXT),
        "md" | "markdown" => Some(MIME_MARKDOWN),
        "html" | "htm" => Some(MIME_HTML),
        _ => None,
    }
}

pub fn extract_text(bytes: &[u8], content_type: &str) -> Result<String, ExtractError> {
    match content_type {
        MIME_PDF => extract_pdf(bytes),
        MIME_TEXT | MIME_MARKDOWN => Ok(String::from_utf8(bytes.to_vec())?),
        MIME_HTML => Ok(html_to_text(&String::from_utf8(bytes.to_vec())?)),
        _ => Err(ExtractError::UnsupportedContentType(
            content_type.to_string(),
        )),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// Elements whose text is never document content.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Visible text of an HTML document.
///
/// Parsed with a real HTML5 parser, so entities are decoded and a stray
/// `<` in prose stays text. Text nodes are joined with spaces; the
/// normalizer collapses the runs.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len() / 2);

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| match ancestor.value() {
            Node::Element(element) => HIDDEN_ELEMENTS.contains(&element.name()),
            _ => false,
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_content_type_returns_error() {
        let err = extract_text(b"x", "application/zip").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedContentType(_)));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", MIME_PDF).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_utf8_text_returns_error() {
        let err = extract_text(&[0xff, 0xfe, 0x00], MIME_TEXT).unwrap_err();
        assert!(matches!(err, ExtractError::Encoding(_)));
    }

    #[test]
    fn html_tags_scripts_and_entities_removed() {
        let html = r#"<html><head><style>p{color:red}</style><SCRIPT>var x = 1;</SCRIPT></head>
<body><h1>Notice &amp; Rent</h1><p class="a">Tenant&#39;s rights</p></body></html>"#;
        let text = html_to_text(html);
        assert!(text.contains("Notice & Rent"));
        assert!(text.contains("Tenant's rights"));
        assert!(!text.contains("color"));
        assert!(!text.contains("var x"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn html_bare_less_than_keeps_prose() {
        let html = "<p>Rent rises if 2 < 3 and the landlord gives notice.</p><p>Section 42</p>";
        let text = html_to_text(html);
        assert!(text.contains("Rent rises if 2 < 3 and the landlord gives notice."));
        assert!(text.contains("Section 42"));
    }

    #[test]
    fn html_named_and_numeric_entities_decoded() {
        let text = html_to_text("<p>tenant&rsquo;s deposit &#8212; &#x24;500</p>");
        assert!(text.contains("tenant\u{2019}s deposit \u{2014} $500"), "{:?}", text);
    }

    #[test]
    fn html_extraction_through_content_type() {
        let text = extract_text(b"<body><main>Notice to end tenancy</main></body>", MIME_HTML).unwrap();
        assert_eq!(text.trim(), "Notice to end tenancy");
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(content_type_for_path(Path::new("a/b.PDF")), Some(MIME_PDF));
        assert_eq!(content_type_for_path(Path::new("notes.md")), Some(MIME_MARKDOWN));
        assert_eq!(content_type_for_path(Path::new("page.htm")), Some(MIME_HTML));
        assert_eq!(content_type_for_path(Path::new("image.png")), None);
        assert_eq!(content_type_for_path(Path::new("README")), None);
    }
}
