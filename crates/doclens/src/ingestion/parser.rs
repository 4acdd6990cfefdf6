//! Multi-format document loader

use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::OnceLock;

use super::external_parser::{split_form_feeds, PdfToText};
use crate::error::{Error, Result};
use crate::types::FileType;

/// Parsed document with extracted text and structural metadata
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// File type
    pub file_type: FileType,
    /// Extracted text, pages joined by blank lines
    pub content: String,
    /// SHA-256 of the raw bytes
    pub content_hash: String,
    /// Pages, slides or sheets found in the source
    pub total_pages: u32,
    /// Non-empty sections in document order
    pub pages: Vec<PageContent>,
    /// Document metadata (extractor used, sheet names, ...)
    pub metadata: HashMap<String, String>,
}

impl ParsedDocument {
    fn empty(file_type: FileType, data: &[u8]) -> Self {
        Self {
            file_type,
            content: String::new(),
            content_hash: hash_bytes(data),
            total_pages: 0,
            pages: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Assemble a document from raw page texts. Page numbers follow the input
    /// order; pages with no text are counted but not kept.
    fn from_pages(file_type: FileType, data: &[u8], raw_pages: Vec<String>) -> Self {
        let total_pages = raw_pages.len() as u32;
        let mut content = String::new();
        let mut char_count = 0usize;
        let mut pages = Vec::new();

        for (idx, text) in raw_pages.into_iter().enumerate() {
            let text = normalize_whitespace(&text);
            if text.is_empty() {
                continue;
            }
            if !content.is_empty() {
                content.push_str("\n\n");
                char_count += 2;
            }
            pages.push(PageContent {
                page_number: idx as u32 + 1,
                char_offset: char_count,
                content: text.clone(),
            });
            char_count += text.chars().count();
            content.push_str(&text);
        }

        Self {
            file_type,
            content,
            content_hash: hash_bytes(data),
            total_pages,
            pages,
            metadata: HashMap::new(),
        }
    }

    fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Whether any text was extracted
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Content from a single page
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Text content of the page
    pub content: String,
    /// Character offset in the joined document text
    pub char_offset: usize,
}

/// Loader options
#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Fall back to `pdftotext` when in-process extraction fails
    pub use_pdftotext: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self { use_pdftotext: true }
    }
}

/// Multi-format document loader
#[derive(Debug, Clone, Default)]
pub struct FileParser {
    options: ParserOptions,
    pdftotext: PdfToText,
}

impl FileParser {
    /// Create a loader with the given options
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            pdftotext: PdfToText::default(),
        }
    }

    /// Extract text from `data`, dispatching on the extension of `declared_name`
    pub fn load(&self, data: &[u8], declared_name: &str) -> Result<ParsedDocument> {
        let file_type = FileType::from_name(declared_name);
        if !file_type.is_supported() {
            let ext = std::path::Path::new(declared_name)
                .extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_else(|| declared_name.to_string());
            return Err(Error::UnsupportedFormat(ext));
        }

        if data.is_empty() {
            return Ok(ParsedDocument::empty(file_type, data));
        }

        match file_type {
            FileType::Pdf => self.parse_pdf(declared_name, data),
            FileType::Docx => Self::parse_docx(declared_name, data),
            FileType::Pptx => Self::parse_pptx(declared_name, data),
            FileType::Txt | FileType::Code(_) => Ok(Self::parse_text(file_type, data)),
            FileType::Markdown => Ok(Self::parse_markdown(data)),
            FileType::Html => Ok(Self::parse_html(data)),
            FileType::Csv => Self::parse_csv(declared_name, data),
            FileType::Xlsx | FileType::Xls | FileType::Ods => {
                Self::parse_spreadsheet(declared_name, file_type, data)
            }
            FileType::Unknown => Err(Error::UnsupportedFormat(declared_name.to_string())),
        }
    }

    /// Parse PDF document
    #[cfg(feature = "pdf")]
    fn parse_pdf(&self, filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::extraction(filename, format!("corrupt PDF: {}", e)))?;
        if doc.is_encrypted() {
            return Err(Error::extraction(filename, "PDF is encrypted or password-protected"));
        }

        let (pages, extractor) = match pdf_extract::extract_text_from_mem_by_pages(data) {
            Ok(pages) if has_text(&pages) => (pages, "pdf-extract"),
            Ok(_) => {
                tracing::warn!(file = %filename, "pdf-extract found no text, trying lopdf");
                (Self::extract_pdf_text_fallback(&doc), "lopdf")
            }
            Err(e) => {
                tracing::warn!(file = %filename, error = %e, "pdf-extract failed, trying lopdf");
                (Self::extract_pdf_text_fallback(&doc), "lopdf")
            }
        };

        let (pages, extractor) = if has_text(&pages) {
            (pages, extractor)
        } else if self.options.use_pdftotext {
            (self.pdftotext.extract_pages(filename, data)?, "pdftotext")
        } else {
            (pages, extractor)
        };

        let pages: Vec<String> = pages.iter().map(|p| cleanup_pdf_text(p)).collect();
        let parsed = ParsedDocument::from_pages(FileType::Pdf, data, pages);
        if parsed.is_empty() {
            return Err(Error::extraction(
                filename,
                "no extractable text (image-only or empty PDF)",
            ));
        }
        Ok(parsed.with_meta("extractor", extractor))
    }

    #[cfg(not(feature = "pdf"))]
    fn parse_pdf(&self, filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        if !self.options.use_pdftotext {
            return Err(Error::UnsupportedFormat("pdf".to_string()));
        }
        let pages = self.pdftotext.extract_pages(filename, data)?;
        let pages: Vec<String> = pages.iter().map(|p| cleanup_pdf_text(p)).collect();
        let parsed = ParsedDocument::from_pages(FileType::Pdf, data, pages);
        if parsed.is_empty() {
            return Err(Error::extraction(filename, "no extractable text"));
        }
        Ok(parsed.with_meta("extractor", "pdftotext"))
    }

    /// Page-by-page extraction straight from the content streams
    #[cfg(feature = "pdf")]
    fn extract_pdf_text_fallback(doc: &lopdf::Document) -> Vec<String> {
        doc.get_pages()
            .keys()
            .map(|page_num| match doc.extract_text(&[*page_num]) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!("Could not extract page {}: {}", page_num, e);
                    String::new()
                }
            })
            .collect()
    }

    /// Parse DOCX document
    #[cfg(feature = "docx")]
    fn parse_docx(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let doc = docx_rs::read_docx(data)
            .map_err(|e| Error::extraction(filename, e.to_string()))?;

        let mut text = String::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
                text.push('\n');
            }
        }

        // DOCX carries no reliable page boundaries
        let parsed = ParsedDocument::from_pages(FileType::Docx, data, vec![text]);
        if parsed.is_empty() {
            return Err(Error::extraction(filename, "document contains no text"));
        }
        Ok(parsed)
    }

    #[cfg(not(feature = "docx"))]
    fn parse_docx(_filename: &str, _data: &[u8]) -> Result<ParsedDocument> {
        Err(Error::UnsupportedFormat("docx".to_string()))
    }

    /// Parse PowerPoint presentation (.pptx), one page per slide
    fn parse_pptx(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        use std::io::Read;

        let cursor = std::io::Cursor::new(data);
        let mut archive = zip::ZipArchive::new(cursor)
            .map_err(|e| Error::extraction(filename, e.to_string()))?;

        let mut slide_names: Vec<(u32, String)> = archive
            .file_names()
            .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
            .filter_map(|name| {
                name.trim_start_matches("ppt/slides/slide")
                    .trim_end_matches(".xml")
                    .parse::<u32>()
                    .ok()
                    .map(|n| (n, name.to_string()))
            })
            .collect();
        slide_names.sort();

        if slide_names.is_empty() {
            return Err(Error::extraction(filename, "no slides found in presentation"));
        }

        let mut slides = Vec::with_capacity(slide_names.len());
        for (_, slide_name) in slide_names {
            let mut xml = String::new();
            archive
                .by_name(&slide_name)
                .map_err(|e| Error::extraction(filename, e.to_string()))?
                .read_to_string(&mut xml)
                .map_err(|e| Error::extraction(filename, e.to_string()))?;
            slides.push(extract_text_from_slide_xml(&xml));
        }

        Ok(ParsedDocument::from_pages(FileType::Pptx, data, slides))
    }

    /// Parse plain text or code; form feeds separate pages
    fn parse_text(file_type: FileType, data: &[u8]) -> ParsedDocument {
        let text = String::from_utf8_lossy(data);
        ParsedDocument::from_pages(file_type, data, split_form_feeds(&text))
    }

    /// Parse markdown into plain text, keeping block boundaries as line breaks
    fn parse_markdown(data: &[u8]) -> ParsedDocument {
        let text = String::from_utf8_lossy(data);
        let pages = split_form_feeds(&text)
            .iter()
            .map(|page| markdown_to_text(page))
            .collect();
        ParsedDocument::from_pages(FileType::Markdown, data, pages)
    }

    /// Parse HTML document body
    fn parse_html(data: &[u8]) -> ParsedDocument {
        let html = String::from_utf8_lossy(data);
        let document = scraper::Html::parse_document(&html);

        let mut content = String::new();
        let body = scraper::Selector::parse("body")
            .ok()
            .and_then(|selector| document.select(&selector).next());

        if let Some(body) = body {
            for text in body.text() {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    if !content.is_empty() {
                        content.push(' ');
                    }
                    content.push_str(trimmed);
                }
            }
        }

        ParsedDocument::from_pages(FileType::Html, data, vec![content])
    }

    /// Parse CSV file, one line per record with cells joined by ` | `
    fn parse_csv(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data);

        let mut content = String::new();
        for record in reader.records() {
            let record = record.map_err(|e| Error::extraction(filename, e.to_string()))?;
            content.push_str(&record.iter().collect::<Vec<_>>().join(" | "));
            content.push('\n');
        }

        Ok(ParsedDocument::from_pages(FileType::Csv, data, vec![content]))
    }

    /// Parse spreadsheet, one page per sheet
    #[cfg(feature = "xlsx")]
    fn parse_spreadsheet(filename: &str, file_type: FileType, data: &[u8]) -> Result<ParsedDocument> {
        use calamine::Reader;

        let cursor = std::io::Cursor::new(data);
        let mut workbook = calamine::open_workbook_auto_from_rs(cursor)
            .map_err(|e| Error::extraction(filename, e.to_string()))?;

        let sheet_names = workbook.sheet_names().to_vec();
        let mut sheets = Vec::with_capacity(sheet_names.len());

        for sheet_name in &sheet_names {
            let range = workbook
                .worksheet_range(sheet_name)
                .map_err(|e| Error::extraction(filename, e.to_string()))?;

            let mut sheet_content = format!("Sheet: {}\n", sheet_name);
            for row in range.rows() {
                let cells: Vec<String> = row
                    .iter()
                    .map(|cell| match cell {
                        calamine::Data::Empty => String::new(),
                        calamine::Data::String(s) => s.clone(),
                        calamine::Data::Float(f) => f.to_string(),
                        calamine::Data::Int(i) => i.to_string(),
                        calamine::Data::Bool(b) => b.to_string(),
                        calamine::Data::DateTime(dt) => dt.to_string(),
                        other => other.to_string(),
                    })
                    .collect();

                if !cells.iter().all(|s| s.is_empty()) {
                    sheet_content.push_str(&cells.join(" | "));
                    sheet_content.push('\n');
                }
            }
            sheets.push(sheet_content);
        }

        Ok(ParsedDocument::from_pages(file_type, data, sheets)
            .with_meta("sheets", sheet_names.join(",")))
    }

    #[cfg(not(feature = "xlsx"))]
    fn parse_spreadsheet(_filename: &str, file_type: FileType, _data: &[u8]) -> Result<ParsedDocument> {
        Err(Error::UnsupportedFormat(file_type.display_name().to_string()))
    }
}

/// Hex-encoded SHA-256 of raw bytes
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(feature = "pdf")]
fn has_text(pages: &[String]) -> bool {
    pages.iter().any(|p| !p.trim().is_empty())
}

/// Extract `<a:t>` runs from slide XML, one line per paragraph
fn extract_text_from_slide_xml(xml: &str) -> String {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    let mut reader = Reader::from_str(xml);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(e)) if in_text => {
                if let Ok(text) = e.unescape() {
                    current.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    if !current.trim().is_empty() {
                        lines.push(current.trim().to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    if !current.trim().is_empty() {
        lines.push(current.trim().to_string());
    }
    lines.join("\n")
}

fn markdown_to_text(markdown: &str) -> String {
    use pulldown_cmark::{Event, Parser, TagEnd};

    let mut text = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak | Event::HardBreak => text.push(' '),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableRow,
            ) => text.push('\n'),
            Event::End(TagEnd::TableCell) => text.push_str(" | "),
            _ => {}
        }
    }
    text
}

/// Replace typographic glyphs that PDF fonts commonly emit with ASCII
fn cleanup_pdf_text(text: &str) -> String {
    const REPLACEMENTS: &[(char, &str)] = &[
        ('\u{2010}', "-"),
        ('\u{2011}', "-"),
        ('\u{2013}', "-"),
        ('\u{2014}', "--"),
        ('\u{2018}', "'"),
        ('\u{2019}', "'"),
        ('\u{201C}', "\""),
        ('\u{201D}', "\""),
        ('\u{2022}', "* "),
        ('\u{2026}', "..."),
        ('\u{00A0}', " "),
        ('\u{FB00}', "ff"),
        ('\u{FB01}', "fi"),
        ('\u{FB02}', "fl"),
        ('\u{FB03}', "ffi"),
        ('\u{FB04}', "ffl"),
    ];

    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match REPLACEMENTS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out
}

/// Strip NULs, collapse runs of spaces, trim lines and drop blank-line runs
fn normalize_whitespace(text: &str) -> String {
    static SPACES: OnceLock<Regex> = OnceLock::new();
    static BLANK_LINES: OnceLock<Regex> = OnceLock::new();
    let spaces =
        SPACES.get_or_init(|| Regex::new(r"[ \t\u{00A0}]+").expect("valid whitespace pattern"));
    let blank_lines =
        BLANK_LINES.get_or_init(|| Regex::new(r"\n{3,}").expect("valid blank-line pattern"));

    let text = text.replace('\0', "").replace("\r\n", "\n");
    let text = spaces.replace_all(&text, " ");
    let text = text
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");
    let text = blank_lines.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> FileParser {
        FileParser::new(ParserOptions { use_pdftotext: false })
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let err = parser().load(b"MZ\x90", "tool.exe").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(ext) if ext == "exe"));
    }

    #[test]
    fn test_empty_input_yields_no_pages() {
        let parsed = parser().load(b"", "empty.pdf").unwrap();
        assert!(parsed.pages.is_empty());
        assert_eq!(parsed.total_pages, 0);
    }

    #[test]
    fn test_text_form_feed_pages() {
        let parsed = parser()
            .load(b"Page1 content.\x0cPage2 content.", "doc.txt")
            .unwrap();

        assert_eq!(parsed.total_pages, 2);
        assert_eq!(parsed.pages.len(), 2);
        assert_eq!(parsed.pages[0].page_number, 1);
        assert_eq!(parsed.pages[0].content, "Page1 content.");
        assert_eq!(parsed.pages[1].page_number, 2);
        assert_eq!(parsed.pages[1].char_offset, "Page1 content.\n\n".len());
        assert_eq!(parsed.content, "Page1 content.\n\nPage2 content.");
    }

    #[test]
    fn test_blank_pages_keep_numbering() {
        let parsed = parser().load(b"one\x0c   \x0cthree", "doc.txt").unwrap();
        let numbers: Vec<u32> = parsed.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 3]);
        assert_eq!(parsed.total_pages, 3);
    }

    #[test]
    fn test_whitespace_cleanup() {
        let parsed = parser().load(b"a\0b   c\t\td\r\n\n\n\n\ne", "x.txt").unwrap();
        assert_eq!(parsed.content, "ab c d\n\ne");
    }

    #[test]
    fn test_normalize_whitespace_always_applies() {
        assert_eq!(
            normalize_whitespace("  one\u{00A0}\u{00A0}two  \n\n\n\n  three \t "),
            "one two\n\nthree"
        );
        // second call reuses the compiled patterns
        assert_eq!(normalize_whitespace("a \t b"), "a b");
    }

    #[test]
    fn test_markdown() {
        let parsed = parser()
            .load(b"# Title\n\nSome *emphasis* and `code`.\n\n- item one\n- item two\n", "r.md")
            .unwrap();
        assert_eq!(parsed.file_type, FileType::Markdown);
        assert!(parsed.content.contains("Title"));
        assert!(parsed.content.contains("Some emphasis and code."));
        assert!(parsed.content.contains("item two"));
        assert!(!parsed.content.contains('#'));
    }

    #[test]
    fn test_html_body_text() {
        let html = b"<html><head><title>T</title></head><body><h1>Hello</h1><p>World</p></body></html>";
        let parsed = parser().load(html, "page.HTML").unwrap();
        assert_eq!(parsed.content, "Hello World");
    }

    #[test]
    fn test_csv_rows() {
        let parsed = parser().load(b"name,age\nalice,30\nbob\n", "people.csv").unwrap();
        assert_eq!(parsed.content, "name | age\nalice | 30\nbob");
    }

    #[test]
    fn test_code_is_text() {
        let parsed = parser().load(b"fn main() {}\n", "main.rs").unwrap();
        assert_eq!(parsed.file_type, FileType::Code("rust".into()));
        assert_eq!(parsed.content, "fn main() {}");
    }

    #[test]
    fn test_corrupt_pptx_is_extraction_error() {
        let err = parser().load(b"not a zip", "deck.pptx").unwrap_err();
        assert!(matches!(err, Error::Extraction { ref filename, .. } if filename == "deck.pptx"));
    }

    #[test]
    fn test_pptx_slides() {
        use std::io::Write;

        let mut buf = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            for (n, text) in [(2, "Second slide"), (1, "First slide")] {
                zip.start_file(format!("ppt/slides/slide{}.xml", n), options).unwrap();
                write!(
                    zip,
                    r#"<p:sld xmlns:p="p" xmlns:a="a"><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:sld>"#,
                    text
                )
                .unwrap();
            }
            zip.finish().unwrap();
        }

        let parsed = parser().load(buf.get_ref(), "deck.pptx").unwrap();
        assert_eq!(parsed.pages.len(), 2);
        assert_eq!(parsed.pages[0].content, "First slide");
        assert_eq!(parsed.pages[1].page_number, 2);
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_corrupt_pdf_is_extraction_error() {
        let err = parser().load(b"%PDF-1.4 garbage", "broken.pdf").unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[test]
    fn test_hash_is_of_raw_bytes() {
        let a = parser().load(b"same text", "a.txt").unwrap();
        let b = parser().load(b"same  text", "b.txt").unwrap();
        assert_eq!(a.content, b.content);
        assert_ne!(a.content_hash, b.content_hash);
        assert_eq!(a.content_hash.len(), 64);
    }

    #[test]
    fn test_cleanup_pdf_glyphs() {
        assert_eq!(cleanup_pdf_text("e\u{FB03}cient \u{201C}x\u{201D}"), "efficient \"x\"");
    }
}
