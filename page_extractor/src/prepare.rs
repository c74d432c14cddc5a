use tracing::{debug, info};

use crate::document::Document;

/// Elements that never carry readable text.
pub const NOISE_TAGS: [&str; 3] = ["script", "style", "noscript"];

/// Advertisement and sponsor blocks.
///
/// Navigation, footers and widgets stay in the page; the assembler's
/// containment check deals with whatever text they contribute.
pub const AD_SELECTORS: [&str; 9] = [
    ".advertisement",
    ".ads",
    ".ad",
    ".banner-ad",
    ".google-ads",
    ".adsense",
    ".sponsored",
    ".promo",
    ".promotion",
];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PrepareReport {
    pub popup_dismissed: bool,
    pub removed: usize,
}

/// Dismiss overlays, load lazy content, then strip scripts, styles and ads.
pub async fn prepare<D: Document + ?Sized>(doc: &mut D) -> PrepareReport {
    let mut report = PrepareReport {
        popup_dismissed: doc.dismiss_popups().await,
        ..PrepareReport::default()
    };
    doc.materialize().await;

    for selector in NOISE_TAGS.iter().chain(AD_SELECTORS.iter()) {
        match doc.remove(selector).await {
            Ok(n) => report.removed += n,
            Err(err) => debug!(%selector, error = %err, "could not remove elements"),
        }
    }

    info!(
        mode = %doc.mode(),
        removed = report.removed,
        popup_dismissed = report.popup_dismissed,
        "page prepared"
    );
    report
}
