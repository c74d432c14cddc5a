//! Candidate collection: independent flat scans over the prepared page.
//!
//! Overlap between strategies is expected (a paragraph's text also shows up
//! inside its parent div and the main-content block); the assembler sorts it
//! out.

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::document::{Document, TextJoin};
use crate::{Candidate, Mode, PageMetadata, StrategyType};

/// Semantic elements and common CMS containers for the main content.
pub const MAIN_CONTENT_SELECTORS: [&str; 40] = [
    "main",
    "article",
    "section",
    ".content",
    ".main-content",
    "#content",
    ".container",
    ".post-content",
    ".entry-content",
    ".article-content",
    ".page-content",
    ".single-content",
    ".blog-content",
    ".post-body",
    ".entry-body",
    ".article-body",
    ".content-area",
    ".primary-content",
    ".main-area",
    ".text-content",
    ".body-text",
    ".article-text",
    ".story-content",
    ".news-content",
    ".post",
    ".article",
    ".story",
    ".news-item",
    ".blog-post",
    ".news-article",
    "[role=\"main\"]",
    "[role=\"article\"]",
    ".wrapper",
    ".inner",
    ".site-content",
    "#main",
    "#main-content",
    ".main",
    ".page",
    ".entry",
];

const AUTHOR_SELECTORS: [&str; 4] = [".author", ".by-author", ".post-author", "[rel=\"author\"]"];

/// Exclusive length bounds, in characters.
#[derive(Debug, Clone, Copy)]
struct Bounds {
    min: usize,
    max: Option<usize>,
}

impl Bounds {
    const fn above(min: usize) -> Self {
        Self { min, max: None }
    }

    const fn between(min: usize, max: usize) -> Self {
        Self {
            min,
            max: Some(max),
        }
    }

    fn accepts(self, len: usize) -> bool {
        len > self.min && self.max.map_or(true, |max| len < max)
    }
}

struct Strategy {
    kind: StrategyType,
    selectors: &'static [&'static str],
    join: TextJoin,
    bounds: Bounds,
}

/// Selector scans in run order. Visible elements and the body fallback
/// are handled separately.
const STRATEGIES: [Strategy; 8] = [
    Strategy {
        kind: StrategyType::MainSelector,
        selectors: &MAIN_CONTENT_SELECTORS,
        join: TextJoin::SPACE,
        bounds: Bounds::above(20),
    },
    Strategy {
        kind: StrategyType::Paragraph,
        selectors: &["p"],
        join: TextJoin::Natural,
        bounds: Bounds::above(10),
    },
    Strategy {
        kind: StrategyType::DivBlock,
        selectors: &["div"],
        join: TextJoin::Natural,
        bounds: Bounds::between(15, 2000),
    },
    Strategy {
        kind: StrategyType::Header,
        selectors: &["h1", "h2", "h3", "h4", "h5", "h6"],
        join: TextJoin::Natural,
        bounds: Bounds::above(3),
    },
    Strategy {
        kind: StrategyType::Span,
        selectors: &["span"],
        join: TextJoin::Natural,
        bounds: Bounds::above(10),
    },
    Strategy {
        kind: StrategyType::Link,
        selectors: &["a"],
        join: TextJoin::Natural,
        bounds: Bounds::above(5),
    },
    Strategy {
        kind: StrategyType::List,
        selectors: &["ul, ol"],
        join: TextJoin::SPACE,
        bounds: Bounds::above(10),
    },
    Strategy {
        kind: StrategyType::Table,
        selectors: &["table"],
        join: TextJoin::CELLS,
        bounds: Bounds::above(10),
    },
];

const VISIBLE_BOUNDS: Bounds = Bounds::between(15, 2000);

fn push_accepted(out: &mut Vec<Candidate>, kind: StrategyType, texts: Vec<String>, bounds: Bounds) {
    out.extend(
        texts
            .iter()
            .filter_map(|text| Candidate::new(kind, text))
            .filter(|c| bounds.accepts(c.len())),
    );
}

/// Run every strategy over `doc` and return the candidates in collection order.
pub async fn collect<D: Document + ?Sized>(doc: &D) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for strategy in &STRATEGIES {
        let before = candidates.len();
        for selector in strategy.selectors {
            match doc.select_text(selector, strategy.join).await {
                Ok(texts) => push_accepted(&mut candidates, strategy.kind, texts, strategy.bounds),
                Err(err) => warn!(kind = ?strategy.kind, %selector, error = %err, "strategy skipped"),
            }
        }
        debug!(kind = ?strategy.kind, found = candidates.len() - before, "strategy finished");
    }

    match doc.visible_texts().await {
        Ok(Some(texts)) => {
            let before = candidates.len();
            push_accepted(&mut candidates, StrategyType::VisibleElement, texts, VISIBLE_BOUNDS);
            debug!(found = candidates.len() - before, "visible element scan finished");
        }
        Ok(None) => {}
        Err(err) => warn!(error = %err, "visible element scan skipped"),
    }

    let distinct = candidates.iter().map(|c| c.text.as_str()).collect::<HashSet<_>>().len();
    if distinct < doc.mode().fallback_threshold() {
        info!(distinct, "few candidates found, adding the whole body");
        match doc.select_text("body", TextJoin::SPACE).await {
            Ok(texts) => {
                push_accepted(&mut candidates, StrategyType::BodyFallback, texts, Bounds::above(0))
            }
            Err(err) => warn!(error = %err, "body fallback skipped"),
        }
    }

    info!(total = candidates.len(), mode = %doc.mode(), "candidates collected");
    candidates
}

/// Title plus the description/author/keywords meta tags.
pub async fn metadata<D: Document + ?Sized>(doc: &D) -> PageMetadata {
    let title = doc.title().await.unwrap_or_else(|err| {
        warn!(error = %err, "could not read page title");
        String::new()
    });

    let author = match meta_content(doc, "author").await {
        Some(author) => Some(author),
        None => first_text(doc, &AUTHOR_SELECTORS).await,
    };

    PageMetadata {
        title,
        description: meta_content(doc, "description").await,
        author,
        keywords: meta_content(doc, "keywords").await,
    }
}

async fn meta_content<D: Document + ?Sized>(doc: &D, name: &str) -> Option<String> {
    let selector = format!("meta[name=\"{name}\"]");
    match doc.select_attr(&selector, "content").await {
        Ok(values) => values
            .into_iter()
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty()),
        Err(err) => {
            debug!(%name, error = %err, "meta tag lookup failed");
            None
        }
    }
}

async fn first_text<D: Document + ?Sized>(doc: &D, selectors: &[&str]) -> Option<String> {
    for selector in selectors {
        if let Ok(texts) = doc.select_text(selector, TextJoin::Natural).await {
            if let Some(text) = texts.into_iter().find(|t| !t.is_empty()) {
                return Some(text);
            }
        }
    }
    None
}
