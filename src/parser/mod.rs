pub mod schema;
pub mod tables;
pub mod template;

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Parse a static CSS selector. Only called with literals.
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e}"))
}

/// Text content of an element with runs of whitespace collapsed and trimmed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    let raw: String = el.text().collect();
    WS_RE.replace_all(raw.trim(), " ").into_owned()
}
