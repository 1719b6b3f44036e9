use async_trait::async_trait;
use docchat_core::{DocchatError, DocchatResult, Document, DocumentFormat, Segment};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Turns an uploaded file into extracted text segments.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extract the file at `path`, which has already been identified as `format`.
    async fn extract(&self, path: &Path, format: DocumentFormat) -> DocchatResult<Document>;
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn source_value(path: &Path) -> serde_json::Value {
    serde_json::Value::String(path.display().to_string())
}

/// Reads a UTF-8 text file as a single segment.
#[derive(Debug, Default)]
pub struct TextLoader;

#[async_trait]
impl DocumentExtractor for TextLoader {
    async fn extract(&self, path: &Path, format: DocumentFormat) -> DocchatResult<Document> {
        let text = tokio::fs::read_to_string(path).await?;
        let segment = Segment::new(text).with_metadata("source", source_value(path));
        Ok(Document::new(file_name(path), format, vec![segment]))
    }
}

/// Reads a CSV file, one segment per record rendered as `header: value` lines.
#[derive(Debug, Default)]
pub struct CsvLoader;

impl CsvLoader {
    /// Render CSV text into segments. The first record is the header.
    pub fn render(text: &str, source: &Path) -> DocchatResult<Vec<Segment>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());
        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let mut segments = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(csv_error)?;
            let lines: Vec<String> = record
                .iter()
                .enumerate()
                .map(|(col, value)| {
                    let key = headers
                        .get(col)
                        .cloned()
                        .unwrap_or_else(|| format!("column_{col}"));
                    format!("{key}: {value}")
                })
                .collect();
            segments.push(
                Segment::new(lines.join("\n"))
                    .with_metadata("source", source_value(source))
                    .with_metadata("row", serde_json::json!(row)),
            );
        }
        Ok(segments)
    }
}

fn csv_error(e: csv::Error) -> DocchatError {
    match e.into_kind() {
        csv::ErrorKind::Io(io) => DocchatError::Io(io),
        other => DocchatError::UnsupportedFormat(format!("malformed CSV: {other:?}")),
    }
}

#[async_trait]
impl DocumentExtractor for CsvLoader {
    async fn extract(&self, path: &Path, format: DocumentFormat) -> DocchatResult<Document> {
        let text = tokio::fs::read_to_string(path).await?;
        let segments = Self::render(&text, path)?;
        Ok(Document::new(file_name(path), format, segments))
    }
}

/// How to invoke an external text extractor. `{path}` in `args` is replaced
/// by the file path; if absent, the path is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLoaderConfig {
    /// Program to run.
    pub program: String,
    /// Arguments, with `{path}` placeholders.
    #[serde(default)]
    pub args: Vec<String>,
}

/// Delegates extraction to an external program that prints text on stdout.
///
/// Form feeds in the output (page breaks from `pdftotext`) split the text
/// into one segment per page.
#[derive(Debug, Clone)]
pub struct CommandLoader {
    config: CommandLoaderConfig,
}

impl CommandLoader {
    /// Create a loader from its command line.
    pub fn new(config: CommandLoaderConfig) -> Self {
        Self { config }
    }

    fn build_args(&self, path: &Path) -> Vec<String> {
        let path_str = path.display().to_string();
        let mut args: Vec<String> = self
            .config
            .args
            .iter()
            .map(|a| a.replace("{path}", &path_str))
            .collect();
        if !self.config.args.iter().any(|a| a.contains("{path}")) {
            args.push(path_str);
        }
        args
    }

    /// Split extractor output into page segments.
    pub fn paginate(output: &str, source: &Path) -> Vec<Segment> {
        let mut pages: Vec<&str> = output.split('\u{c}').collect();
        if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
            pages.pop();
        }
        if pages.len() == 1 {
            return vec![Segment::new(pages[0]).with_metadata("source", source_value(source))];
        }
        pages
            .into_iter()
            .enumerate()
            .map(|(i, page)| {
                Segment::new(page)
                    .with_metadata("source", source_value(source))
                    .with_metadata("page", serde_json::json!(i + 1))
            })
            .collect()
    }
}

#[async_trait]
impl DocumentExtractor for CommandLoader {
    async fn extract(&self, path: &Path, format: DocumentFormat) -> DocchatResult<Document> {
        let args = self.build_args(path);
        debug!(program = %self.config.program, ?args, "Running external extractor");

        let output = tokio::process::Command::new(&self.config.program)
            .args(&args)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DocchatError::UnsupportedFormat(format!(
                        "{format} extraction requires '{}', which is not installed",
                        self.config.program
                    ))
                } else {
                    DocchatError::Io(e)
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DocchatError::Io(std::io::Error::other(format!(
                "'{}' failed (exit {}): {}",
                self.config.program,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            ))));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        Ok(Document::new(
            file_name(path),
            format,
            Self::paginate(&text, path),
        ))
    }
}

/// External extractors for the binary formats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// PDF extractor (default `pdftotext -layout {path} -`).
    #[serde(default = "default_pdf_command")]
    pub pdf: CommandLoaderConfig,
    /// DOCX extractor (default `docx2txt {path} -`).
    #[serde(default = "default_docx_command")]
    pub docx: CommandLoaderConfig,
}

fn default_pdf_command() -> CommandLoaderConfig {
    CommandLoaderConfig {
        program: "pdftotext".to_string(),
        args: vec!["-layout".into(), "{path}".into(), "-".into()],
    }
}

fn default_docx_command() -> CommandLoaderConfig {
    CommandLoaderConfig {
        program: "docx2txt".to_string(),
        args: vec!["{path}".into(), "-".into()],
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            pdf: default_pdf_command(),
            docx: default_docx_command(),
        }
    }
}

/// Maps each [`DocumentFormat`] to the extractor that handles it.
#[derive(Default, Clone)]
pub struct LoaderRegistry {
    loaders: HashMap<DocumentFormat, Arc<dyn DocumentExtractor>>,
}

impl LoaderRegistry {
    /// An empty registry: every format is unsupported until registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Text and CSV loaders plus the configured external extractors.
    pub fn from_config(config: &LoaderConfig) -> Self {
        let mut registry = Self::new();
        registry.register(DocumentFormat::Txt, Arc::new(TextLoader));
        registry.register(DocumentFormat::Csv, Arc::new(CsvLoader));
        registry.register(
            DocumentFormat::Pdf,
            Arc::new(CommandLoader::new(config.pdf.clone())),
        );
        registry.register(
            DocumentFormat::Docx,
            Arc::new(CommandLoader::new(config.docx.clone())),
        );
        registry
    }

    /// Register (or replace) the extractor for a format.
    pub fn register(&mut self, format: DocumentFormat, extractor: Arc<dyn DocumentExtractor>) {
        self.loaders.insert(format, extractor);
    }

    /// Whether an extractor is registered for `format`.
    pub fn supports(&self, format: DocumentFormat) -> bool {
        self.loaders.contains_key(&format)
    }

    /// Load a file, detecting its format from the extension.
    pub async fn load(&self, path: &Path) -> DocchatResult<Document> {
        let format = DocumentFormat::from_path(path)?;
        self.load_as(path, format).await
    }

    /// Load a file with an explicit format.
    pub async fn load_as(&self, path: &Path, format: DocumentFormat) -> DocchatResult<Document> {
        let loader = self.loaders.get(&format).ok_or_else(|| {
            DocchatError::UnsupportedFormat(format!("no extractor registered for '{format}'"))
        })?;
        let document = loader.extract(path, format).await?;
        info!(
            path = %path.display(),
            format = %format,
            document_id = %document.id,
            segments = document.segments.len(),
            "Document extracted"
        );
        Ok(document)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_render_quotes_and_crlf() {
        let segments = CsvLoader::render(
            "a,b\r\n\"x, y\",\"say \"\"hi\"\"\"\r\n\r\n1,\n",
            Path::new("q.csv"),
        )
        .unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "a: x, y\nb: say \"hi\"");
        assert_eq!(segments[1].text, "a: 1\nb: ");
    }

    #[test]
    fn test_csv_render_multiline_field() {
        let segments =
            CsvLoader::render("note\n\"line one\nline two\"", Path::new("m.csv")).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "note: line one\nline two");
    }

    #[test]
    fn test_csv_render_header_only_and_empty() {
        assert!(CsvLoader::render("", Path::new("e.csv")).unwrap().is_empty());
        assert!(CsvLoader::render("a,b\n", Path::new("h.csv"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_csv_render_rows() {
        let segments =
            CsvLoader::render("name,age\nAda,36\nGrace,45,extra\n", Path::new("p.csv")).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "name: Ada\nage: 36");
        assert_eq!(segments[1].text, "name: Grace\nage: 45\ncolumn_2: extra");
        assert_eq!(segments[1].metadata["row"], serde_json::json!(1));
    }

    #[test]
    fn test_paginate_form_feeds() {
        let pages = CommandLoader::paginate("first\u{c}second\u{c}", Path::new("d.pdf"));
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].text, "second");
        assert_eq!(pages[1].metadata["page"], serde_json::json!(2));

        let single = CommandLoader::paginate("only text", Path::new("d.docx"));
        assert_eq!(single.len(), 1);
        assert!(!single[0].metadata.contains_key("page"));
    }

    #[test]
    fn test_build_args_placeholder() {
        let loader = CommandLoader::new(default_pdf_command());
        assert_eq!(
            loader.build_args(Path::new("/tmp/a.pdf")),
            vec!["-layout", "/tmp/a.pdf", "-"]
        );
        let loader = CommandLoader::new(CommandLoaderConfig {
            program: "cat".into(),
            args: vec![],
        });
        assert_eq!(loader.build_args(Path::new("/tmp/a.pdf")), vec!["/tmp/a.pdf"]);
    }

    #[tokio::test]
    async fn test_missing_program_is_unsupported() {
        let loader = CommandLoader::new(CommandLoaderConfig {
            program: "docchat-no-such-extractor".into(),
            args: vec![],
        });
        let err = loader
            .extract(Path::new("/tmp/a.pdf"), DocumentFormat::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, DocchatError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn test_empty_registry_rejects_everything() {
        let registry = LoaderRegistry::new();
        assert!(!registry.supports(DocumentFormat::Txt));
        let err = registry.load(Path::new("/tmp/a.txt")).await.unwrap_err();
        assert!(matches!(err, DocchatError::UnsupportedFormat(_)));
    }
}
