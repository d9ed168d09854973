use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Pdf,
    StructuredText,
    Unsupported,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Self {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("pdf") => DocumentKind::Pdf,
            Some("json") | Some("txt") | Some("md") => DocumentKind::StructuredText,
            _ => DocumentKind::Unsupported,
        }
    }

    pub fn is_supported(self) -> bool {
        self != DocumentKind::Unsupported
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: usize,
    pub source_path: PathBuf,
    pub offset: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFingerprint {
    pub source_path: PathBuf,
    pub kind: DocumentKind,
    pub checksum: String,
    pub char_count: usize,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub documents: Vec<DocumentFingerprint>,
    pub skipped_files: Vec<PathBuf>,
    pub chunk_count: usize,
    pub dimensions: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub chunks: Vec<Chunk>,
    pub vectors: Vec<Vec<f32>>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub chunk_id: usize,
    pub distance: f32,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::DocumentKind;
    use std::path::Path;

    #[test]
    fn kinds_follow_extension_case_insensitively() {
        assert_eq!(DocumentKind::from_path(Path::new("a/Report.PDF")), DocumentKind::Pdf);
        assert_eq!(
            DocumentKind::from_path(Path::new("metrics.json")),
            DocumentKind::StructuredText
        );
        assert_eq!(
            DocumentKind::from_path(Path::new("notes.docx")),
            DocumentKind::Unsupported
        );
        assert_eq!(DocumentKind::from_path(Path::new("README")), DocumentKind::Unsupported);
    }
}
