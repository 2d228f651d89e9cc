use serde::Serialize;
use tracing::{debug, info};

use super::{element_text, selector};
use crate::error::{Error, Result};
use crate::fetch::Fetch;
use crate::settings::Settings;

/// Column holding the workspace tenant; never declared in a stream.
pub const TENANT_FIELD: &str = "TenantId";
/// Prefix of workspace-internal columns.
pub const RESERVED_PREFIX: char = '_';

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Column {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// Read the column list of `table` from the last `<table>` on its reference page.
///
/// The first row is the header. Reserved and tenant rows are dropped; every
/// other row must carry at least a name cell and a type cell, otherwise the
/// whole table fails rather than yielding a partial schema.
pub fn extract_columns(table: &str, html: &str) -> Result<Vec<Column>> {
    let doc = scraper::Html::parse_document(html);
    let schema = doc
        .select(&selector("table"))
        .last()
        .ok_or_else(|| Error::NoSchemaTable(table.to_string()))?;

    let rows = selector("tr");
    let cells = selector("td");
    let mut columns = Vec::new();

    for (i, row) in schema.select(&rows).enumerate().skip(1) {
        if element_text(row).starts_with(RESERVED_PREFIX) {
            continue;
        }
        let tds: Vec<String> = row.select(&cells).map(element_text).collect();
        if tds.first().is_some_and(|name| name == TENANT_FIELD) {
            continue;
        }
        match tds.as_slice() {
            [name, kind, ..] => columns.push(Column::new(name.as_str(), kind.as_str())),
            _ => {
                return Err(Error::MalformedRow {
                    table: table.to_string(),
                    row: i,
                    cells: tds.len(),
                })
            }
        }
    }

    debug!("{}: {} columns", table, columns.len());
    Ok(columns)
}

pub fn fetch_columns(fetcher: &impl Fetch, settings: &Settings, table: &str) -> Result<Vec<Column>> {
    let html = fetcher.get(&settings.table_url(table))?;
    let columns = extract_columns(table, &html)?;
    info!("Schema for {}: {} columns", table, columns.len());
    Ok(columns)
}
