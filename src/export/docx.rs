//! Rich-text export as a minimal WordprocessingML (`.docx`) package.
//!
//! The package holds three parts: `[Content_Types].xml`, `_rels/.rels` and
//! `word/document.xml`. Each retained page becomes one `<w:p>` whose text is
//! `"Page {index}:\n{text}\n"`; newlines inside it are `<w:br/>` and tabs are
//! `<w:tab/>`, which is how Word stores line breaks within a paragraph.
//!
//! Output is byte-for-byte reproducible: entries are always written in the
//! same order with the fixed DOS epoch timestamp (1980-01-01).

use crate::error::PipelineError;
use crate::export::{page_block, write_atomic};
use crate::output::{AggregatedText, ArtifactKind, ExportedArtifact};
use crate::pipeline::input::base_name;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// MIME type of a `.docx` file.
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const CONTENT_TYPES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"</Types>"#,
);

const RELS_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    "\n",
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#,
);

const DOCUMENT_PART: &str = "word/document.xml";

/// Filename of the rich-text artifact for `source_name`.
pub fn docx_filename(source_name: &str) -> String {
    format!("{}.docx", base_name(source_name))
}

/// Export `text` as `{base}.docx` into `export_dir`.
pub async fn export_rich_text(
    export_dir: &Path,
    source_name: &str,
    text: &AggregatedText,
) -> Result<ExportedArtifact, PipelineError> {
    let filename = docx_filename(source_name);
    let bytes = render_docx(text)?;
    let path = write_atomic(export_dir.join(&filename), bytes).await?;

    info!("Rich-text artifact: {} ({} page(s))", path.display(), text.len());
    Ok(ExportedArtifact {
        filename,
        path,
        kind: ArtifactKind::RichText,
    })
}

/// Build the `.docx` package in memory.
pub fn render_docx(text: &AggregatedText) -> Result<Vec<u8>, PipelineError> {
    let zip_err =
        |e: zip::result::ZipError| PipelineError::Internal(format!("docx packaging: {}", e));
    let io_err = |e: std::io::Error| PipelineError::Internal(format!("docx packaging: {}", e));

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", RELS_XML.to_string()),
        (DOCUMENT_PART, document_xml(text)),
    ] {
        zip.start_file(name, options).map_err(zip_err)?;
        zip.write_all(body.as_bytes()).map_err(io_err)?;
    }

    Ok(zip.finish().map_err(zip_err)?.into_inner())
}

fn document_xml(text: &AggregatedText) -> String {
    let mut xml = String::from(concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        "\n",
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
        "<w:body>"
    ));
    for page in text {
        push_paragraph(&mut xml, &page_block(page.page, &page.text));
    }
    xml.push_str("<w:sectPr/></w:body></w:document>");
    xml
}

fn push_paragraph(xml: &mut String, text: &str) {
    let text = xml_safe(text);
    xml.push_str("<w:p><w:r>");
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            xml.push_str("<w:br/>");
        }
        for (j, chunk) in line.split('\t').enumerate() {
            if j > 0 {
                xml.push_str("<w:tab/>");
            }
            if !chunk.is_empty() {
                xml.push_str(r#"<w:t xml:space="preserve">"#);
                xml.push_str(&escape(chunk));
                xml.push_str("</w:t>");
            }
        }
    }
    xml.push_str("</w:r></w:p>");
}

/// Normalise line endings and drop characters XML 1.0 cannot carry.
fn xml_safe(text: &str) -> String {
    text.replace("\r\n", "\n")
        .chars()
        .map(|c| if c == '\r' { '\n' } else { c })
        .filter(|&c| {
            matches!(c, '\t' | '\n')
                || (c >= '\u{20}' && c != '\u{FFFE}' && c != '\u{FFFF}')
        })
        .collect()
}

/// Read the paragraph texts back out of a `.docx` package.
///
/// `<w:br/>` becomes `\n` and `<w:tab/>` becomes `\t`, so paragraphs produced
/// by [`render_docx`] read back as `"Page {index}:\n{text}\n"`.
pub fn read_paragraphs(bytes: &[u8]) -> Result<Vec<String>, PipelineError> {
    let bad = |detail: String| PipelineError::Internal(format!("docx read: {}", detail));

    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|e| bad(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| bad(e.to_string()))?
        .read_to_string(&mut xml)
        .map_err(|e| bad(e.to_string()))?;

    let mut reader = Reader::from_str(&xml);
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event().map_err(|e| bad(e.to_string()))? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:p" => current = Some(String::new()),
                b"w:t" => in_text = true,
                _ => {}
            },
            Event::Empty(e) => {
                if let Some(p) = current.as_mut() {
                    match e.name().as_ref() {
                        b"w:br" => p.push('\n'),
                        b"w:tab" => p.push('\t'),
                        _ => {}
                    }
                }
            }
            Event::Text(t) if in_text => {
                if let Some(p) = current.as_mut() {
                    p.push_str(&t.unescape().map_err(|e| bad(e.to_string()))?);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:p" => paragraphs.extend(current.take()),
                b"w:t" => in_text = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(paragraphs)
}
