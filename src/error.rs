use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("no tables linked under {filter} at {url}")]
    NoTables { url: String, filter: String },

    #[error("no schema table found on the page for {0}")]
    NoSchemaTable(String),

    #[error("malformed schema row {row} for {table}: expected at least 2 cells, found {cells}")]
    MalformedRow {
        table: String,
        row: usize,
        cells: usize,
    },

    #[error("template is not valid JSON: {0}")]
    TemplateJson(#[from] serde_json::Error),

    #[error("template is missing {0}")]
    TemplateShape(&'static str),

    #[error("could not serialize template: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("writing {} failed: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
