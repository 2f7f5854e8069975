//! Plain-text extraction for uploaded documents.
//!
//! Dispatch is on the lowercase file extension. Extraction never panics on
//! bad input; the caller gets an [`ExtractError`] and skips the document.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

/// Extensions [`extract_text`] accepts, lowercase, without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md", "csv", "docx"];

/// Maximum decompressed bytes to read from `word/document.xml` (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
}

/// Lowercase extension of `filename`, or `""` when there is none.
pub fn extension_of(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn is_supported(filename: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension_of(filename).as_str())
}

/// Extracts plain text from the bytes of `filename`.
pub fn extract_text(bytes: &[u8], filename: &str) -> Result<String, ExtractError> {
    match extension_of(filename).as_str() {
        "pdf" => extract_pdf(bytes),
        "txt" | "md" => Ok(decode_lossy(bytes)),
        "csv" => Ok(extract_csv(bytes)),
        "docx" => extract_docx(bytes),
        "" => Err(ExtractError::UnsupportedFormat("(none)".to_string())),
        other => Err(ExtractError::UnsupportedFormat(format!(".{}", other))),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
}

/// UTF-8 decode dropping invalid sequences. A U+FFFD present in the input
/// is kept.
fn decode_lossy(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

/// One line per record, fields separated by two spaces.
fn extract_csv(bytes: &[u8]) -> String {
    csv_records(&decode_lossy(bytes))
        .into_iter()
        .map(|fields| fields.join("  "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse CSV text into records, honouring double-quoted fields and `""`
/// escapes. A quoted field may span lines; its line breaks become spaces.
/// Blank records are dropped.
fn csv_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field).trim().to_string()),
            '\r' | '\n' if in_quotes => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                field.push(' ');
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                fields.push(std::mem::take(&mut field).trim().to_string());
                push_record(&mut records, std::mem::take(&mut fields));
            }
            _ => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    push_record(&mut records, fields);
    records
}

fn push_record(records: &mut Vec<Vec<String>>, fields: Vec<String>) {
    if fields.iter().any(|f| !f.is_empty()) {
        records.push(fields);
    }
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let xml = document_xml(bytes, MAX_XML_ENTRY_BYTES)?;
    docx_paragraphs(&xml)
}

/// The main document part of a docx, refused when it would inflate past
/// `limit` bytes. Both the declared size and the bytes actually read count.
fn document_xml(bytes: &[u8], limit: u64) -> Result<Vec<u8>, ExtractError> {
    const PART: &str = "word/document.xml";
    let too_large = || ExtractError::Docx(format!("{} is larger than {} bytes", PART, limit));

    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let part = archive
        .by_name(PART)
        .map_err(|e| ExtractError::Docx(format!("missing {}: {}", PART, e)))?;
    if part.size() > limit {
        return Err(too_large());
    }

    let mut xml = Vec::with_capacity(part.size() as usize);
    part.take(limit + 1)
        .read_to_end(&mut xml)
        .map_err(|e| ExtractError::Docx(format!("reading {}: {}", PART, e)))?;
    if xml.len() as u64 > limit {
        return Err(too_large());
    }
    Ok(xml)
}

/// Text of each `w:p`, one paragraph per line.
fn docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"p" => current.clear(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => current.push('\t'),
                b"br" => current.push('\n'),
                b"p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        );
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn unsupported_extension_returns_error() {
        let err = extract_text(b"foo", "slides.pptx").unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(ref ext) if ext == ".pptx"));
        assert!(matches!(
            extract_text(b"foo", "README").unwrap_err(),
            ExtractError::UnsupportedFormat(_)
        ));
    }

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(extract_text(b"hello", "NOTES.TXT").unwrap(), "hello");
        assert!(is_supported("Report.PDF"));
        assert!(!is_supported("image.png"));
    }

    #[test]
    fn txt_drops_invalid_utf8() {
        let bytes = b"caf\xc3\xa9 \xff\xfebar";
        assert_eq!(extract_text(bytes, "a.txt").unwrap(), "café bar");
    }

    #[test]
    fn txt_keeps_literal_replacement_character() {
        let text = "status: \u{FFFD} unknown";
        assert_eq!(extract_text(text.as_bytes(), "a.txt").unwrap(), text);

        let mut mixed = b"ok \xff".to_vec();
        mixed.extend_from_slice("\u{FFFD}".as_bytes());
        assert_eq!(extract_text(&mixed, "b.txt").unwrap(), "ok \u{FFFD}");
    }

    #[test]
    fn markdown_is_plain_text() {
        assert_eq!(extract_text(b"# Title\nbody", "a.md").unwrap(), "# Title\nbody");
    }

    #[test]
    fn csv_records_become_lines() {
        let csv = b"name,role\r\nAda,\"engineer, lead\"\r\n\r\nBob,\"says \"\"hi\"\"\"\r\n";
        let text = extract_text(csv, "people.csv").unwrap();
        assert_eq!(
            text,
            "name  role\nAda  engineer, lead\nBob  says \"hi\""
        );
    }

    #[test]
    fn csv_quoted_field_spans_lines() {
        let csv = b"id,note\n1,\"first line\nsecond line\"\n2,plain\r\n3,\"a\r\nb, c\"";
        let text = extract_text(csv, "notes.csv").unwrap();
        assert_eq!(
            text,
            "id  note\n1  first line second line\n2  plain\n3  a b, c"
        );
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_text(b"not a pdf", "a.pdf").unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_text(b"not a zip", "a.docx").unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn docx_paragraphs_one_per_line() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>Refunds are </w:t></w:r><w:r><w:t>accepted.</w:t></w:r></w:p>\
             <w:p/>\
             <w:p><w:r><w:t>Within 30 days &amp; with receipt.</w:t></w:r></w:p>",
        );
        let text = extract_text(&bytes, "policy.docx").unwrap();
        assert_eq!(
            text,
            "Refunds are accepted.\n\nWithin 30 days & with receipt."
        );
    }

    #[test]
    fn docx_without_document_xml_is_error() {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        zip.start_file("other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        zip.write_all(b"<x/>").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let err = extract_text(&bytes, "broken.docx").unwrap_err();
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn docx_document_part_is_bounded() {
        let bytes = docx_with_body("<w:p><w:r><w:t>hello</w:t></w:r></w:p>");
        let full = document_xml(&bytes, MAX_XML_ENTRY_BYTES).unwrap();

        let err = document_xml(&bytes, full.len() as u64 - 1).unwrap_err();
        assert!(err.to_string().contains("larger than"), "{}", err);
        assert_eq!(document_xml(&bytes, full.len() as u64).unwrap(), full);
    }
}
