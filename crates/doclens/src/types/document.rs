//! Source document and chunk types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generated identifier of an ingested document
pub type DocumentId = Uuid;

/// Supported file types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// PDF document
    Pdf,
    /// Microsoft Word document (.docx)
    Docx,
    /// Microsoft PowerPoint presentation (.pptx)
    Pptx,
    /// Plain text file
    Txt,
    /// Markdown file
    Markdown,
    /// Excel spreadsheet (.xlsx)
    Xlsx,
    /// Legacy Excel spreadsheet (.xls)
    Xls,
    /// OpenDocument Spreadsheet
    Ods,
    /// HTML document
    Html,
    /// CSV file
    Csv,
    /// Source code or structured text with language
    Code(String),
    /// Unknown file type
    Unknown,
}

impl FileType {
    /// Detect file type from extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "pptx" => Self::Pptx,
            "txt" | "text" => Self::Txt,
            "md" | "markdown" => Self::Markdown,
            "xlsx" => Self::Xlsx,
            "xls" => Self::Xls,
            "ods" => Self::Ods,
            "html" | "htm" => Self::Html,
            "csv" => Self::Csv,
            other => code_language(other)
                .map(|lang| Self::Code(lang.to_string()))
                .unwrap_or(Self::Unknown),
        }
    }

    /// Detect file type from a declared file name
    pub fn from_name(name: &str) -> Self {
        match std::path::Path::new(name).extension() {
            Some(ext) => Self::from_extension(&ext.to_string_lossy()),
            None => Self::Unknown,
        }
    }

    /// Whether a loader exists for this type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Short human-readable label
    pub fn display_name(&self) -> &str {
        match self {
            Self::Pdf => "PDF",
            Self::Docx => "Word",
            Self::Pptx => "PowerPoint",
            Self::Txt => "text",
            Self::Markdown => "Markdown",
            Self::Xlsx | Self::Xls => "Excel",
            Self::Ods => "OpenDocument spreadsheet",
            Self::Html => "HTML",
            Self::Csv => "CSV",
            Self::Code(lang) => lang,
            Self::Unknown => "unknown",
        }
    }
}

/// Source and config formats indexed as plain text
fn code_language(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "rs" => "rust",
        "py" => "python",
        "js" => "javascript",
        "ts" => "typescript",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" => "cpp",
        "sql" => "sql",
        "sh" | "bash" => "bash",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        _ => return None,
    })
}

/// A document represented in the index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Generated document ID
    pub id: DocumentId,
    /// Declared name (identity within a session)
    pub name: String,
    /// File type
    pub file_type: FileType,
    /// SHA-256 of the raw bytes, hex encoded
    pub content_hash: String,
    /// File size in bytes
    pub size_bytes: u64,
    /// Pages (or sheets, slides) extracted
    pub total_pages: u32,
    /// Chunks inserted into the index
    pub total_chunks: u32,
    /// Ingestion timestamp
    pub ingested_at: chrono::DateTime<chrono::Utc>,
}

impl SourceDocument {
    /// Create a new document record with a fresh ID
    pub fn new(name: String, file_type: FileType, content_hash: String, size_bytes: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            file_type,
            content_hash,
            size_bytes,
            total_pages: 0,
            total_chunks: 0,
            ingested_at: chrono::Utc::now(),
        }
    }

    /// MIME type guessed from the declared name
    pub fn mime_type(&self) -> String {
        mime_guess::from_path(&self.name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

/// A contiguous span of extracted text from one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk ID
    pub id: Uuid,
    /// Parent document ID
    pub document_id: DocumentId,
    /// Declared name of the parent document
    pub document_name: String,
    /// Text content
    pub text: String,
    /// 0-based order within the document
    pub position: u32,
    /// Page number (1-indexed) when the format has pages
    pub page_number: Option<u32>,
    /// Character span in the extracted document text
    pub char_start: usize,
    pub char_end: usize,
    /// Whitespace tokens in `text`
    pub token_count: usize,
}

impl Chunk {
    /// Format the source tag used in prompts
    pub fn format_citation(&self) -> String {
        match self.page_number {
            Some(page) => format!("source: {}, page {}", self.document_name, page),
            None => format!("source: {}", self.document_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_name("report.PDF"), FileType::Pdf);
        assert_eq!(FileType::from_name("notes.md"), FileType::Markdown);
        assert_eq!(FileType::from_name("data.ods"), FileType::Ods);
        assert_eq!(FileType::from_name("main.rs"), FileType::Code("rust".into()));
        assert_eq!(FileType::from_name("archive.tar.gz"), FileType::Unknown);
        assert_eq!(FileType::from_name("README"), FileType::Unknown);
        assert!(!FileType::Unknown.is_supported());
    }

    #[test]
    fn test_citation_format() {
        let chunk = Chunk {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            document_name: "guide.pdf".into(),
            text: "hello".into(),
            position: 0,
            page_number: Some(2),
            char_start: 0,
            char_end: 5,
            token_count: 1,
        };
        assert_eq!(chunk.format_citation(), "source: guide.pdf, page 2");
    }

    #[test]
    fn test_mime_type() {
        let doc = SourceDocument::new("a.pdf".into(), FileType::Pdf, "00".into(), 3);
        assert_eq!(doc.mime_type(), "application/pdf");
    }
}
