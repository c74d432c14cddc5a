//! A loaded page, as seen by the preparer and the candidate collector.
//!
//! Both the parsed-HTML backend ([`StaticDocument`]) and the WebDriver backend
//! ([`crate::render::RenderedDocument`]) expose the same flat queries, so the
//! extraction strategies never know which one they are scanning.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};

use crate::error::ExtractError;
use crate::Mode;

/// How an element's text nodes are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextJoin {
    /// The element's text as it reads, trimmed at both ends.
    Natural,
    /// Every text node trimmed, empty ones dropped, joined with a separator.
    Separator(&'static str),
}

impl TextJoin {
    pub const SPACE: TextJoin = TextJoin::Separator(" ");
    pub const CELLS: TextJoin = TextJoin::Separator(" | ");

    pub(crate) fn separator(self) -> Option<&'static str> {
        match self {
            TextJoin::Natural => None,
            TextJoin::Separator(sep) => Some(sep),
        }
    }
}

#[async_trait(?Send)]
pub trait Document {
    fn mode(&self) -> Mode;

    async fn title(&self) -> Result<String, ExtractError>;

    /// Text of every element matching `selector`, in document order.
    async fn select_text(&self, selector: &str, join: TextJoin)
        -> Result<Vec<String>, ExtractError>;

    /// Value of attribute `name` on every matching element that carries it.
    async fn select_attr(&self, selector: &str, name: &str) -> Result<Vec<String>, ExtractError>;

    /// Detach every matching element, returning how many were removed.
    async fn remove(&mut self, selector: &str) -> Result<usize, ExtractError>;

    /// Texts of elements that are actually laid out on screen.
    ///
    /// `None` when the backend has no layout information.
    async fn visible_texts(&self) -> Result<Option<Vec<String>>, ExtractError> {
        Ok(None)
    }

    /// Click away cookie/consent overlays. Returns whether anything was clicked.
    async fn dismiss_popups(&mut self) -> bool {
        false
    }

    /// Trigger lazy-loaded content. A no-op without an interactive backend.
    async fn materialize(&mut self) {}
}

/// A page parsed from a static HTTP response.
pub struct StaticDocument {
    html: Html,
}

impl StaticDocument {
    pub fn parse(source: &str) -> Self {
        let html = Html::parse_document(source);
        if !html.errors.is_empty() {
            tracing::debug!(errors = html.errors.len(), "html parser recovered from errors");
        }
        Self { html }
    }

    fn selector(selector: &str) -> Result<Selector, ExtractError> {
        Selector::parse(selector).map_err(|_| ExtractError::Selector(selector.to_string()))
    }

    fn element_text(element: ElementRef<'_>, join: TextJoin) -> String {
        match join.separator() {
            None => element.text().collect::<String>().trim().to_string(),
            Some(sep) => element
                .text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(sep),
        }
    }
}

#[async_trait(?Send)]
impl Document for StaticDocument {
    fn mode(&self) -> Mode {
        Mode::Static
    }

    async fn title(&self) -> Result<String, ExtractError> {
        let selector = Self::selector("title")?;
        Ok(self
            .html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default())
    }

    async fn select_text(
        &self,
        selector: &str,
        join: TextJoin,
    ) -> Result<Vec<String>, ExtractError> {
        let selector = Self::selector(selector)?;
        Ok(self
            .html
            .select(&selector)
            .map(|el| Self::element_text(el, join))
            .collect())
    }

    async fn select_attr(&self, selector: &str, name: &str) -> Result<Vec<String>, ExtractError> {
        let selector = Self::selector(selector)?;
        Ok(self
            .html
            .select(&selector)
            .filter_map(|el| el.value().attr(name))
            .map(str::to_string)
            .collect())
    }

    async fn remove(&mut self, selector: &str) -> Result<usize, ExtractError> {
        let selector = Self::selector(selector)?;
        let ids: Vec<_> = self.html.select(&selector).map(|el| el.id()).collect();
        let mut removed = 0;
        for id in ids {
            if let Some(mut node) = self.html.tree.get_mut(id) {
                node.detach();
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title> Sample </title>
        <meta name="description" content="A page">
        </head><body>
        <p>Hello <b>world</b></p>
        <ul><li>one</li>
            <li>two</li></ul>
        <table><tr><td>a</td><td>b</td></tr></table>
        <script>var x = 1;</script>
        </body></html>"#;

    #[tokio::test]
    async fn reads_title_and_attributes() {
        let doc = StaticDocument::parse(PAGE);
        assert_eq!(doc.title().await.unwrap(), "Sample");
        let desc = doc.select_attr("meta[name=\"description\"]", "content").await.unwrap();
        assert_eq!(desc, vec!["A page".to_string()]);
    }

    #[tokio::test]
    async fn joins_text_nodes() {
        let doc = StaticDocument::parse(PAGE);
        assert_eq!(doc.select_text("p", TextJoin::Natural).await.unwrap(), vec!["Hello world"]);
        assert_eq!(doc.select_text("ul", TextJoin::SPACE).await.unwrap(), vec!["one two"]);
        assert_eq!(doc.select_text("table", TextJoin::CELLS).await.unwrap(), vec!["a | b"]);
    }

    #[tokio::test]
    async fn remove_detaches_matches() {
        let mut doc = StaticDocument::parse(PAGE);
        assert_eq!(doc.remove("script").await.unwrap(), 1);
        let body = doc.select_text("body", TextJoin::SPACE).await.unwrap();
        assert!(!body[0].contains("var x"));
        assert_eq!(doc.remove("script").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn invalid_selector_is_an_error() {
        let doc = StaticDocument::parse(PAGE);
        let err = doc.select_text("p[", TextJoin::Natural).await.unwrap_err();
        assert!(matches!(err, ExtractError::Selector(_)));
    }

    #[tokio::test]
    async fn static_pages_have_no_layout() {
        let mut doc = StaticDocument::parse(PAGE);
        assert!(doc.visible_texts().await.unwrap().is_none());
        assert!(!doc.dismiss_popups().await);
    }
}
