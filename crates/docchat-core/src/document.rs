use crate::DocchatError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// File types accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Portable Document Format.
    Pdf,
    /// Plain UTF-8 text.
    Txt,
    /// Word document.
    Docx,
    /// Comma-separated values.
    Csv,
}

impl DocumentFormat {
    /// All supported formats.
    pub const ALL: [DocumentFormat; 4] = [
        DocumentFormat::Pdf,
        DocumentFormat::Txt,
        DocumentFormat::Docx,
        DocumentFormat::Csv,
    ];

    /// Lowercase tag, identical to the file extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Csv => "csv",
        }
    }

    /// Detects the format from a file's extension.
    pub fn from_path(path: &Path) -> Result<Self, DocchatError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                DocchatError::UnsupportedFormat(format!(
                    "'{}' has no file extension",
                    path.display()
                ))
            })?;
        ext.parse()
    }
}

impl FromStr for DocumentFormat {
    type Err = DocchatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "txt" => Ok(DocumentFormat::Txt),
            "docx" => Ok(DocumentFormat::Docx),
            "csv" => Ok(DocumentFormat::Csv),
            other => Err(DocchatError::UnsupportedFormat(format!(
                "'{other}' (expected one of pdf, txt, docx, csv)"
            ))),
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of extracted text (a page, a CSV row, a whole text file).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Extracted text.
    pub text: String,
    /// Per-segment metadata (e.g. `page`, `row`).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Segment {
    /// Creates a segment without metadata.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    /// Adds a metadata key. Chainable builder method.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Raw text of an uploaded file plus its source metadata.
///
/// Immutable once extracted; dropped with the session that indexed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier, referenced by every chunk cut from this document.
    pub id: Uuid,
    /// Original file name.
    pub source: String,
    /// File type the text was extracted from.
    pub format: DocumentFormat,
    /// Extracted text, in document order.
    pub segments: Vec<Segment>,
}

impl Document {
    /// Creates a document from already extracted segments.
    pub fn new(source: impl Into<String>, format: DocumentFormat, segments: Vec<Segment>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            format,
            segments,
        }
    }

    /// Creates a single-segment plain-text document.
    pub fn from_text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(source, DocumentFormat::Txt, vec![Segment::new(text)])
    }

    /// Total number of characters across all segments.
    pub fn char_count(&self) -> usize {
        self.segments.iter().map(|s| s.text.chars().count()).sum()
    }

    /// Whether the document holds no non-whitespace text.
    pub fn is_blank(&self) -> bool {
        self.segments.iter().all(|s| s.text.trim().is_empty())
    }
}

/// A contiguous substring of one segment of a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// The document this chunk was cut from.
    pub document_id: Uuid,
    /// Position of the chunk within the whole document.
    pub sequence: usize,
    /// Index of the segment within the document.
    pub segment: usize,
    /// Start offset in characters within the segment text (inclusive).
    pub start: usize,
    /// End offset in characters within the segment text (exclusive).
    pub end: usize,
    /// The chunk text, exactly `segment.text[start..end]` by characters.
    pub content: String,
    /// Metadata inherited from the segment, plus `source`.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Chunk {
    /// Length in characters.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the chunk covers no characters.
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse_case_insensitive() {
        assert_eq!("PDF".parse::<DocumentFormat>().unwrap(), DocumentFormat::Pdf);
        assert_eq!(".csv".parse::<DocumentFormat>().unwrap(), DocumentFormat::Csv);
        assert_eq!("Docx".parse::<DocumentFormat>().unwrap(), DocumentFormat::Docx);
    }

    #[test]
    fn test_format_unsupported() {
        let err = "xlsx".parse::<DocumentFormat>().unwrap_err();
        assert!(matches!(err, DocchatError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_format_from_path() {
        let fmt = DocumentFormat::from_path(Path::new("/tmp/report.TXT")).unwrap();
        assert_eq!(fmt, DocumentFormat::Txt);
        assert!(DocumentFormat::from_path(Path::new("/tmp/README")).is_err());
    }

    #[test]
    fn test_document_blank() {
        let doc = Document::from_text("a.txt", "  \n\t");
        assert!(doc.is_blank());
        let doc = Document::from_text("a.txt", "héllo");
        assert!(!doc.is_blank());
        assert_eq!(doc.char_count(), 5);
    }
}
