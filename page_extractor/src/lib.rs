pub mod assemble;
pub mod collect;
pub mod config;
pub mod document;
pub mod error;
pub mod fetch;
pub mod format;
pub mod pipeline;
pub mod prepare;
pub mod render;
pub mod store;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use config::{ExtractorConfig, RenderConfig, RetryConfig};
pub use error::{ExtractError, FetchError, RenderError, StoreError};
pub use pipeline::{Extraction, Extractor};
pub use store::ArtifactStore;

/// Which capability loads the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Plain HTTP GET and HTML parsing, no script execution.
    Static,
    /// Live DOM driven through a WebDriver session.
    Rendered,
}

impl Mode {
    /// Label written to the `MÉTODO:` header line.
    pub fn label(self) -> &'static str {
        match self {
            Mode::Static => "HTTP estático + parser HTML",
            Mode::Rendered => "Navegador renderizado (WebDriver)",
        }
    }

    /// Distinct candidates below which the whole body is added as a fallback.
    pub fn fallback_threshold(self) -> usize {
        match self {
            Mode::Static => 5,
            Mode::Rendered => 10,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Static => f.write_str("static"),
            Mode::Rendered => f.write_str("rendered"),
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Mode::Static),
            "rendered" | "browser" => Ok(Mode::Rendered),
            other => Err(format!("unknown extraction mode `{other}`")),
        }
    }
}

/// Extraction technique that produced a candidate.
///
/// Declaration order is the output priority used by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StrategyType {
    Header,
    MainSelector,
    Paragraph,
    DivBlock,
    List,
    Table,
    Span,
    Link,
    VisibleElement,
    BodyFallback,
}

impl StrategyType {
    pub const PRIORITY: [StrategyType; 10] = [
        StrategyType::Header,
        StrategyType::MainSelector,
        StrategyType::Paragraph,
        StrategyType::DivBlock,
        StrategyType::List,
        StrategyType::Table,
        StrategyType::Span,
        StrategyType::Link,
        StrategyType::VisibleElement,
        StrategyType::BodyFallback,
    ];
}

/// A trimmed, non-empty text fragment tagged with the strategy that found it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub kind: StrategyType,
    pub text: String,
}

impl Candidate {
    /// Returns `None` for text that is empty after trimming.
    pub fn new(kind: StrategyType, text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            kind,
            text: text.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionRequest {
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub mode: Option<Mode>,
}

impl ExtractionRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: None,
            mode: None,
        }
    }
}

/// Outcome reported to API and CLI callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExtractionResult {
    pub fn saved(artifact_name: String, size_bytes: u64) -> Self {
        Self {
            success: true,
            artifact_name: Some(artifact_name),
            size_bytes: Some(size_bytes),
            message: "Extraction completed successfully".to_string(),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            success: false,
            artifact_name: None,
            size_bytes: None,
            message: message.into(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_rejects_blank_text() {
        assert!(Candidate::new(StrategyType::Paragraph, "   \n\t").is_none());
        let c = Candidate::new(StrategyType::Paragraph, "  hello  ").unwrap();
        assert_eq!(c.text, "hello");
        assert_eq!(c.len(), 5);
    }

    #[test]
    fn candidate_length_counts_chars() {
        let c = Candidate::new(StrategyType::Header, "Título").unwrap();
        assert_eq!(c.len(), 6);
    }

    #[test]
    fn priority_matches_declaration_order() {
        let mut sorted = StrategyType::PRIORITY;
        sorted.sort();
        assert_eq!(sorted, StrategyType::PRIORITY);
        assert!(StrategyType::Header < StrategyType::Paragraph);
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("STATIC".parse::<Mode>(), Ok(Mode::Static));
        assert_eq!("rendered".parse::<Mode>(), Ok(Mode::Rendered));
        assert!("fast".parse::<Mode>().is_err());
    }

    #[test]
    fn result_serializes_camel_case() {
        let json = serde_json::to_value(ExtractionResult::saved("a.txt".into(), 12)).unwrap();
        assert_eq!(json["artifactName"], "a.txt");
        assert_eq!(json["sizeBytes"], 12);
        assert_eq!(json["success"], true);
        assert!(json.get("error").is_none());
    }
}
