//! PDF extraction through the poppler `pdftotext` binary

use std::path::PathBuf;
use std::process::Command;

use crate::error::{Error, Result};

/// Wrapper around an external `pdftotext` executable
#[derive(Debug, Clone)]
pub struct PdfToText {
    binary: PathBuf,
}

impl Default for PdfToText {
    fn default() -> Self {
        Self::new("pdftotext")
    }
}

impl PdfToText {
    /// Use the given executable
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Extract text, one entry per page.
    ///
    /// The bytes are written into a scoped temporary directory that is removed
    /// when this function returns, whether extraction succeeded or not.
    pub fn extract_pages(&self, filename: &str, data: &[u8]) -> Result<Vec<String>> {
        let temp_dir = tempfile::Builder::new()
            .prefix("doclens-pdf-")
            .tempdir()
            .map_err(|e| Error::extraction(filename, format!("temp dir: {}", e)))?;

        let input_path = temp_dir.path().join("input.pdf");
        let output_path = temp_dir.path().join("output.txt");
        std::fs::write(&input_path, data)
            .map_err(|e| Error::extraction(filename, format!("temp file: {}", e)))?;

        let output = Command::new(&self.binary)
            .arg("-layout")
            .arg("-enc")
            .arg("UTF-8")
            .arg(&input_path)
            .arg(&output_path)
            .output()
            .map_err(|e| Error::extraction(filename, format!("pdftotext failed to start: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::extraction(
                filename,
                format!("pdftotext exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let raw = std::fs::read(&output_path)
            .map_err(|e| Error::extraction(filename, format!("pdftotext output: {}", e)))?;

        Ok(split_form_feeds(&String::from_utf8_lossy(&raw)))
    }
}

/// Split text into pages on form feed characters, dropping the empty tail
/// `pdftotext` leaves after the last page.
pub fn split_form_feeds(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\x0c').map(str::to_string).collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_form_feeds() {
        assert_eq!(split_form_feeds("a\x0cb\x0c"), vec!["a", "b"]);
        assert_eq!(split_form_feeds("single"), vec!["single"]);
        assert_eq!(split_form_feeds("a\x0c\x0cc"), vec!["a", "", "c"]);
    }

    #[test]
    fn test_missing_binary_is_extraction_error() {
        let tool = PdfToText::new("/nonexistent/pdftotext-doclens");
        let err = tool.extract_pages("a.pdf", b"%PDF-1.4").unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }
}
