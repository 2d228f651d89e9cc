use tracing::info;

use super::{element_text, selector};
use crate::error::{Error, Result};
use crate::fetch::Fetch;
use crate::settings::Settings;

/// Anchor texts whose href starts with `filter`, in document order. Duplicates are kept.
pub fn extract_table_names(html: &str, filter: &str) -> Vec<String> {
    let doc = scraper::Html::parse_document(html);
    let anchors = selector("a[href]");

    doc.select(&anchors)
        .filter(|a| {
            a.value()
                .attr("href")
                .is_some_and(|href| href.starts_with(filter))
        })
        .map(element_text)
        .collect()
}

/// Fetch the ingestion overview page and list every table it links to.
pub fn fetch_supported_tables(fetcher: &impl Fetch, settings: &Settings) -> Result<Vec<String>> {
    let url = settings.supported_tables_url();
    let html = fetcher.get(&url)?;
    let tables = extract_table_names(&html, &settings.tables_path);
    if tables.is_empty() {
        return Err(Error::NoTables {
            url,
            filter: settings.tables_path.clone(),
        });
    }
    info!("Discovered {} supported tables", tables.len());
    Ok(tables)
}
