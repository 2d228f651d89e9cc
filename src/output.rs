use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::dcr::Template;
use crate::error::{Error, Result};

/// `dcr-Combined-<n>.json` for several tables, `dcr-<table>-1.json` for one.
pub fn file_name(tables: &[String]) -> String {
    match tables {
        [single] => format!("dcr-{}-1.json", sanitize(single)),
        _ => format!("dcr-Combined-{}.json", tables.len()),
    }
}

/// Table names come from scraped links; keep them inside the output directory.
fn sanitize(table: &str) -> String {
    table
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect()
}

/// Write `template` as pretty JSON under `dir`, creating it if needed.
pub fn write_template(dir: &Path, tables: &[String], template: &Template) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|source| Error::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    let path = dir.join(file_name(tables));
    let json = serde_json::to_string_pretty(template.as_value()).map_err(Error::Serialize)?;
    fs::write(&path, json).map_err(|source| Error::Write {
        path: path.clone(),
        source,
    })?;
    info!("Wrote {}", path.display());
    Ok(path)
}
