//! Source reading: PDF, DOCX and plain transcripts to normalized text.
//!
//! Reading never fails a batch. A file that yields no text comes back as
//! [`SourceText::Unreadable`] with a reason, and the caller skips it.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::markup::decode_entities;

/// Kind of source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Pdf,
    Docx,
    Text,
}

impl SourceFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceFormat::Pdf => "pdf",
            SourceFormat::Docx => "docx",
            SourceFormat::Text => "text",
        }
    }

    /// Format from the file extension, if it is one we read.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(SourceFormat::Pdf),
            "docx" => Some(SourceFormat::Docx),
            "txt" | "text" | "md" => Some(SourceFormat::Text),
            _ => None,
        }
    }

    /// Format from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            Some(SourceFormat::Pdf)
        } else if bytes.starts_with(b"PK\x03\x04") {
            Some(SourceFormat::Docx)
        } else {
            None
        }
    }

    /// Magic bytes first, then the extension, then plain text.
    pub fn infer(path: &Path, bytes: &[u8]) -> Self {
        Self::sniff(bytes)
            .or_else(|| Self::from_path(path))
            .unwrap_or(SourceFormat::Text)
    }
}

/// Text read from one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceText {
    /// Normalized, non-empty text.
    Text(String),
    /// Nothing usable could be read.
    Unreadable { reason: String },
}

impl SourceText {
    fn unreadable(reason: impl Into<String>) -> Self {
        SourceText::Unreadable {
            reason: reason.into(),
        }
    }

    pub fn is_readable(&self) -> bool {
        matches!(self, SourceText::Text(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            SourceText::Text(text) => Some(text),
            SourceText::Unreadable { .. } => None,
        }
    }

    /// The text, or [`Error::SourceUnreadable`] naming `path`.
    pub fn require(self, path: impl Into<PathBuf>) -> Result<String> {
        match self {
            SourceText::Text(text) => Ok(text),
            SourceText::Unreadable { reason } => Err(Error::SourceUnreadable {
                path: path.into(),
                reason,
            }),
        }
    }
}

/// Collapse whitespace within each line, drop blank lines.
pub fn normalize_text(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn finish(raw: &str) -> SourceText {
    let text = normalize_text(raw);
    if text.is_empty() {
        SourceText::unreadable("no text")
    } else {
        SourceText::Text(text)
    }
}

/// Read in-memory bytes of a known format.
pub fn read_bytes(bytes: &[u8], format: SourceFormat) -> SourceText {
    match format {
        SourceFormat::Pdf => read_pdf(bytes),
        SourceFormat::Docx => read_docx(bytes),
        SourceFormat::Text => read_plain(bytes),
    }
}

/// Read a file, inferring its format.
pub fn read_file(path: impl AsRef<Path>) -> SourceText {
    let path = path.as_ref();
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read source");
            return SourceText::unreadable(e.to_string());
        }
    };
    let format = SourceFormat::infer(path, &bytes);
    debug!(path = %path.display(), format = format.as_str(), bytes = bytes.len(), "reading source");
    read_bytes(&bytes, format)
}

/// Every `.pdf`, `.docx` and `.txt` file directly in `dir`, sorted.
pub fn source_paths(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let wanted = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "pdf" | "docx" | "txt"))
            .unwrap_or(false);
        if wanted {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Read every source file directly in `dir`, sorted by path.
pub fn read_dir_sources(dir: impl AsRef<Path>) -> Result<Vec<(PathBuf, SourceText)>> {
    Ok(source_paths(dir)?
        .into_iter()
        .map(|path| {
            let text = read_file(&path);
            (path, text)
        })
        .collect())
}

fn read_plain(bytes: &[u8]) -> SourceText {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => finish(text),
        Err(e) => SourceText::unreadable(format!("invalid UTF-8: {}", e)),
    }
}

#[cfg(feature = "pdf")]
fn read_pdf(bytes: &[u8]) -> SourceText {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => finish(&text),
        Err(e) => SourceText::unreadable(format!("pdf: {}", e)),
    }
}

#[cfg(not(feature = "pdf"))]
fn read_pdf(_bytes: &[u8]) -> SourceText {
    SourceText::unreadable("built without the `pdf` feature")
}

static PARAGRAPH_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</w:p>").unwrap());
static SOFT_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<w:(?:tab|br|cr)\b[^>]*/>").unwrap());
static XML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Plain text from WordprocessingML: one line per paragraph.
pub fn docx_xml_to_text(xml: &str) -> String {
    let text = PARAGRAPH_END.replace_all(xml, "\n");
    let text = SOFT_BREAK.replace_all(&text, " ");
    let text = XML_TAG.replace_all(&text, "");
    decode_entities(&text)
}

#[cfg(feature = "docx")]
fn read_docx(bytes: &[u8]) -> SourceText {
    use std::io::Read;

    let mut archive = match zip::ZipArchive::new(std::io::Cursor::new(bytes)) {
        Ok(archive) => archive,
        Err(e) => return SourceText::unreadable(format!("docx: {}", e)),
    };
    let mut xml = String::new();
    let read = archive
        .by_name("word/document.xml")
        .map_err(|e| e.to_string())
        .and_then(|mut file| file.read_to_string(&mut xml).map_err(|e| e.to_string()));
    match read {
        Ok(_) => finish(&docx_xml_to_text(&xml)),
        Err(e) => SourceText::unreadable(format!("docx: {}", e)),
    }
}

#[cfg(not(feature = "docx"))]
fn read_docx(_bytes: &[u8]) -> SourceText {
    SourceText::unreadable("built without the `docx` feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_inference() {
        assert_eq!(SourceFormat::sniff(b"%PDF-1.7 ..."), Some(SourceFormat::Pdf));
        assert_eq!(SourceFormat::sniff(b"PK\x03\x04rest"), Some(SourceFormat::Docx));
        assert_eq!(SourceFormat::sniff(b"plain"), None);
        assert_eq!(
            SourceFormat::from_path(Path::new("Lecture.DOCX")),
            Some(SourceFormat::Docx)
        );
        // magic wins over a misleading extension
        assert_eq!(
            SourceFormat::infer(Path::new("notes.txt"), b"%PDF-1.4"),
            SourceFormat::Pdf
        );
        assert_eq!(
            SourceFormat::infer(Path::new("transcript"), b"hello"),
            SourceFormat::Text
        );
    }

    #[test]
    fn normalizes_whitespace_per_line() {
        assert_eq!(
            normalize_text("  Neurons   fire \n\n\t\nGlia\tsupport  them "),
            "Neurons fire\nGlia support them"
        );
    }

    #[test]
    fn plain_text_strips_bom() {
        let bytes = b"\xEF\xBB\xBFAxon: a long projection.";
        assert_eq!(
            read_bytes(bytes, SourceFormat::Text),
            SourceText::Text("Axon: a long projection.".into())
        );
    }

    #[test]
    fn empty_and_invalid_text_unreadable() {
        assert_eq!(
            read_bytes(b"  \n \n", SourceFormat::Text),
            SourceText::Unreadable {
                reason: "no text".into()
            }
        );
        assert!(!read_bytes(&[0xff, 0xfe, 0x00], SourceFormat::Text).is_readable());
    }

    #[test]
    fn docx_xml_paragraphs_become_lines() {
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>Dopamine:</w:t></w:r><w:r><w:tab/><w:t>A neurotransmitter &amp; hormone.</w:t></w:r></w:p><w:p><w:r><w:t>Second line</w:t></w:r></w:p></w:body></w:document>"#;
        assert_eq!(
            normalize_text(&docx_xml_to_text(xml)),
            "Dopamine: A neurotransmitter & hormone.\nSecond line"
        );
    }

    #[test]
    fn require_maps_to_error() {
        let err = SourceText::Unreadable {
            reason: "no text".into(),
        }
        .require("empty.txt")
        .unwrap_err();
        assert!(matches!(err, Error::SourceUnreadable { .. }));
    }

    #[test]
    fn missing_file_unreadable() {
        assert!(!read_file("/definitely/not/here.pdf").is_readable());
    }

    #[test]
    fn dir_sources_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "Glia: support cells.").unwrap();
        std::fs::write(dir.path().join("a.TXT"), "Axon: a long projection.").unwrap();
        std::fs::write(dir.path().join("notes.md"), "# skipped").unwrap();
        std::fs::create_dir(dir.path().join("nested.txt")).unwrap();

        let sources = read_dir_sources(dir.path()).unwrap();
        let names: Vec<_> = sources
            .iter()
            .map(|(path, _)| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.TXT", "b.txt"]);
        assert_eq!(sources[1].1.text(), Some("Glia: support cells."));
    }
}
