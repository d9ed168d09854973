use crate::error::IngestError;
use crate::models::DocumentKind;
use base64::{engine::general_purpose::STANDARD, Engine};
use lopdf::Document;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
struct LlmOcrRequest {
    pdf_base64: String,
    source_path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmOcrResponse {
    pages: Option<Vec<LlmOcrPage>>,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct LlmOcrPage {
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OcrEndpointConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

impl OcrEndpointConfig {
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("LLM_OCR_ENDPOINT").ok()?;
        let endpoint = endpoint.trim().to_string();
        if endpoint.is_empty() {
            return None;
        }

        let api_key = std::env::var("LLM_OCR_API_KEY")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|key| !key.is_empty());

        Some(Self { endpoint, api_key })
    }
}

pub trait PdfExtractor: Send + Sync {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Default)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let failed = |error: lopdf::Error| IngestError::ExtractionFailed {
            path: path.to_path_buf(),
            reason: error.to_string(),
        };
        let document = Document::load(path).map_err(failed)?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document.extract_text(&[page_no]).map_err(failed)?;
            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

#[derive(Clone)]
pub struct TextExtractor {
    pdf: Arc<dyn PdfExtractor>,
    ocr: Option<OcrEndpointConfig>,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new(Arc::new(LopdfExtractor), OcrEndpointConfig::from_env())
    }
}

impl TextExtractor {
    pub fn new(pdf: Arc<dyn PdfExtractor>, ocr: Option<OcrEndpointConfig>) -> Self {
        Self { pdf, ocr }
    }

    /// `Ok(None)` marks an unsupported document, which callers skip.
    pub async fn extract(&self, path: &Path) -> Result<Option<String>, IngestError> {
        match DocumentKind::from_path(path) {
            DocumentKind::Pdf => self.extract_pdf(path).await.map(Some),
            DocumentKind::StructuredText => read_text_file(path).await.map(Some),
            DocumentKind::Unsupported => Ok(None),
        }
    }

    async fn extract_pdf(&self, path: &Path) -> Result<String, IngestError> {
        let pdf = Arc::clone(&self.pdf);
        let owned: PathBuf = path.to_path_buf();
        let pages = tokio::task::spawn_blocking(move || pdf.extract_pages(&owned))
            .await
            .map_err(|error| IngestError::ExtractionFailed {
                path: path.to_path_buf(),
                reason: format!("pdf decoder task failed: {error}"),
            })??;

        debug!(path = %path.display(), pages = pages.len(), "decoded pdf");

        // lopdf emits a newline per text object, so a page of empty text
        // objects decodes to whitespace.
        if pages.iter().all(|page| page.text.trim().is_empty()) {
            let Some(cfg) = &self.ocr else {
                debug!(path = %path.display(), "pdf has no text layer");
                return Ok(String::new());
            };
            info!(path = %path.display(), "pdf has no text layer, trying OCR endpoint");
            let ocr_pages = extract_with_llm_ocr(cfg, path).await?;
            return Ok(join_pages(&ocr_pages));
        }

        Ok(join_pages(&pages))
    }
}

async fn read_text_file(path: &Path) -> Result<String, IngestError> {
    let bytes = tokio::fs::read(path).await?;
    String::from_utf8(bytes).map_err(|error| IngestError::ExtractionFailed {
        path: path.to_path_buf(),
        reason: format!("not valid utf-8: {error}"),
    })
}

fn join_pages(pages: &[PageText]) -> String {
    let mut text = String::new();
    for page in pages {
        text.push_str(&page.text);
        if !page.text.is_empty() && !page.text.ends_with('\n') {
            text.push('\n');
        }
    }
    text
}

async fn extract_with_llm_ocr(
    cfg: &OcrEndpointConfig,
    path: &Path,
) -> Result<Vec<PageText>, IngestError> {
    let pdf = tokio::fs::read(path).await?;
    let payload = LlmOcrRequest {
        pdf_base64: STANDARD.encode(pdf),
        source_path: path.to_string_lossy().to_string(),
    };

    let mut request = Client::new()
        .post(&cfg.endpoint)
        .header("content-type", "application/json")
        .json(&payload);

    if let Some(api_key) = &cfg.api_key {
        request = request.bearer_auth(api_key);
    }

    let response = request.send().await?;

    if !response.status().is_success() {
        return Err(IngestError::OcrFailed(format!(
            "multimodal OCR request to {} returned {}",
            cfg.endpoint,
            response.status()
        )));
    }

    let payload: LlmOcrResponse = response.json().await?;
    payload_to_pages(&payload, path)
}

fn payload_to_pages(payload: &LlmOcrResponse, path: &Path) -> Result<Vec<PageText>, IngestError> {
    if let Some(listed) = &payload.pages {
        let listed = listed
            .iter()
            .filter_map(|page| {
                let text = page.text.as_deref().map(str::trim).unwrap_or_default();
                if text.is_empty() {
                    None
                } else {
                    Some(PageText {
                        number: page.page.unwrap_or(1),
                        text: text.to_string(),
                    })
                }
            })
            .collect::<Vec<_>>();

        if !listed.is_empty() {
            return Ok(listed);
        }
    }

    if let Some(raw_text) = &payload.text {
        let pages = raw_text
            .split('\u{000c}')
            .enumerate()
            .filter_map(|(index, chunk)| {
                let normalized = chunk.trim();
                if normalized.is_empty() {
                    None
                } else {
                    Some(PageText {
                        number: (index + 1) as u32,
                        text: normalized.to_string(),
                    })
                }
            })
            .collect::<Vec<_>>();

        if !pages.is_empty() {
            return Ok(pages);
        }
    }

    Err(IngestError::OcrFailed(format!(
        "multimodal OCR response was empty for {}",
        path.display()
    )))
}
