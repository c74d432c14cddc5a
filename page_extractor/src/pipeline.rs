//! End-to-end extraction: load, prepare, collect, assemble, format, save.

use chrono::Local;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, timeout_at};
use tracing::{info, warn};

use crate::assemble::assemble;
use crate::collect::{collect, metadata};
use crate::config::ExtractorConfig;
use crate::document::{Document, StaticDocument};
use crate::error::ExtractError;
use crate::fetch::decode::decode_body;
use crate::fetch::{fetch_with_retry, ReqwestFetcher, StaticFetch};
use crate::format::format_artifact;
use crate::prepare::prepare;
use crate::render::RenderedDocument;
use crate::store::ArtifactStore;
use crate::{ExtractionRequest, ExtractionResult, Mode, PageMetadata};

/// A finished extraction, not yet persisted.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub url: String,
    pub mode: Mode,
    pub metadata: PageMetadata,
    pub body: String,
    pub candidate_count: usize,
    /// Header plus body, as written to disk.
    pub artifact: String,
}

impl Extraction {
    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn method(&self) -> &'static str {
        self.mode.label()
    }
}

/// Runs extractions with a shared configuration and HTTP capability.
#[derive(Clone)]
pub struct Extractor {
    config: ExtractorConfig,
    fetcher: Arc<dyn StaticFetch>,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self::with_fetcher(config, Arc::new(ReqwestFetcher))
    }

    pub fn with_fetcher(config: ExtractorConfig, fetcher: Arc<dyn StaticFetch>) -> Self {
        Self { config, fetcher }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract the readable text of `url` within the configured deadline.
    ///
    /// In rendered mode the browser session is released on every path,
    /// after the deadline has been applied to the work itself.
    pub async fn extract(&self, url: &str, mode: Mode) -> Result<Extraction, ExtractError> {
        let started = Instant::now();
        let deadline = self.config.deadline;
        info!(%mode, "extraction started: {url}");

        let extraction = match mode {
            Mode::Static => timeout(deadline, self.extract_static(url))
                .await
                .map_err(|_| ExtractError::DeadlineExceeded(deadline))?,
            Mode::Rendered => self.extract_rendered(url).await,
        }?;

        info!(
            %mode,
            elapsed = ?started.elapsed(),
            candidates = extraction.candidate_count,
            chars = extraction.body.chars().count(),
            "extraction finished: {url}"
        );
        Ok(extraction)
    }

    async fn extract_static(&self, url: &str) -> Result<Extraction, ExtractError> {
        let response = fetch_with_retry(self.fetcher.as_ref(), url, &self.config.retry).await?;
        let (source, encoding) =
            decode_body(&response.body, response.declared_encoding.as_deref());
        info!(encoding = encoding.name(), chars = source.len(), "page decoded");

        let mut doc = StaticDocument::parse(&source);
        analyze(&mut doc, url).await
    }

    async fn extract_rendered(&self, url: &str) -> Result<Extraction, ExtractError> {
        let deadline = self.config.deadline;
        let until = tokio::time::Instant::now() + deadline;

        let mut doc = timeout_at(until, RenderedDocument::open(url, &self.config.render))
            .await
            .map_err(|_| ExtractError::DeadlineExceeded(deadline))??;

        let outcome = timeout_at(until, analyze(&mut doc, url)).await;
        doc.release().await;
        outcome.map_err(|_| ExtractError::DeadlineExceeded(deadline))?
    }

    /// Run one request end to end and save the result into `store`.
    ///
    /// Never fails: every error becomes an unsuccessful [`ExtractionResult`].
    pub async fn process(
        &self,
        request: &ExtractionRequest,
        store: &ArtifactStore,
    ) -> ExtractionResult {
        let Some(url) = normalize_url(&request.url) else {
            return ExtractionResult::failed("URL is required", None);
        };
        let mode = request.mode.unwrap_or(self.config.default_mode);
        let name = ArtifactStore::artifact_name(&url, request.filename.as_deref(), Local::now());
        if let Err(err) = ArtifactStore::check_name(&name) {
            return ExtractionResult::failed("Invalid file name", Some(err.to_string()));
        }

        let extraction = match self.extract(&url, mode).await {
            Ok(extraction) => extraction,
            Err(err) => {
                warn!(%mode, error = %err, "extraction failed: {url}");
                return ExtractionResult::failed(
                    format!("Could not extract text from {url}"),
                    Some(err.to_string()),
                );
            }
        };

        match store.save(&name, &extraction.artifact).await {
            Ok(size) => ExtractionResult::saved(name, size),
            Err(err) => {
                warn!(error = %err, "could not save artifact {name}");
                ExtractionResult::failed("Could not save the extracted text", Some(err.to_string()))
            }
        }
    }
}

async fn analyze<D: Document + ?Sized>(doc: &mut D, url: &str) -> Result<Extraction, ExtractError> {
    let mode = doc.mode();
    let meta = metadata(&*doc).await;
    prepare(doc).await;
    let candidates = collect(&*doc).await;
    let body = assemble(&candidates);
    let artifact = format_artifact(url, &meta, &body, mode, Local::now());

    Ok(Extraction {
        url: url.to_string(),
        mode,
        metadata: meta,
        body,
        candidate_count: candidates.len(),
        artifact,
    })
}

/// Trimmed URL with `https://` added when no scheme is given; `None` when blank.
pub fn normalize_url(raw: &str) -> Option<String> {
    let url = raw.trim();
    if url.is_empty() {
        return None;
    }
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Some(url.to_string())
    } else {
        Some(format!("https://{url}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_https_when_scheme_is_missing() {
        assert_eq!(normalize_url(" example.com/a "), Some("https://example.com/a".into()));
        assert_eq!(normalize_url("HTTP://x.org"), Some("HTTP://x.org".into()));
        assert_eq!(normalize_url("   "), None);
    }

    #[tokio::test]
    async fn analyzes_a_static_page() {
        let mut doc = StaticDocument::parse(
            "<html><head><title>T</title></head><body><h1>H</h1>\
             <p>Paragraph text here.</p><script>x()</script></body></html>",
        );
        let extraction = analyze(&mut doc, "https://example.com").await.unwrap();
        assert_eq!(extraction.title(), "T");
        assert_eq!(extraction.method(), Mode::Static.label());
        assert!(extraction.body.contains("Paragraph text here."));
        assert!(!extraction.body.contains("x()"));
        assert!(extraction.artifact.starts_with("=== EXTRAÇÃO AVANÇADA DE TEXTO ==="));
    }
}
