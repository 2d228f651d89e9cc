use std::path::PathBuf;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

const BASE_URL: &str = "https://learn.microsoft.com";
const SUPPORTED_TABLES_PATH: &str =
    "/en-us/azure/azure-monitor/logs/logs-ingestion-api-overview#supported-tables";
const TABLES_PATH: &str = "/en-us/azure/azure-monitor/reference/tables/";
const TEMPLATE_URL: &str =
    "https://docs.cribl.io/stream/usecase-webhook-azure-sentinel-dcr-template/";
const OUTPUT_DIR: &str = "templates";
const TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_url: String,
    pub supported_tables_path: String,
    /// Href filter for discovery and path prefix for per-table schema pages.
    pub tables_path: String,
    pub template_url: String,
    /// Local skeleton; replaces the scraped reference template when set.
    pub template_file: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub timeout_secs: u64,
}

impl Settings {
    /// Defaults overlaid with `DCR_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("base_url", BASE_URL)?
            .set_default("supported_tables_path", SUPPORTED_TABLES_PATH)?
            .set_default("tables_path", TABLES_PATH)?
            .set_default("template_url", TEMPLATE_URL)?
            .set_default("output_dir", OUTPUT_DIR)?
            .set_default("timeout_secs", TIMEOUT_SECS)?
            .add_source(Environment::with_prefix("DCR"))
            .build()?
            .try_deserialize()
    }

    pub fn supported_tables_url(&self) -> String {
        join_url(&self.base_url, &self.supported_tables_path)
    }

    pub fn table_url(&self, table: &str) -> String {
        format!("{}{}", join_url(&self.base_url, &self.tables_path), table)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
pub(crate) fn test_settings(base_url: &str) -> Settings {
    Settings {
        base_url: base_url.to_string(),
        supported_tables_path: "/logs/overview".to_string(),
        tables_path: "/reference/tables/".to_string(),
        template_url: format!("{}/dcr-template", base_url),
        template_file: None,
        output_dir: PathBuf::from(OUTPUT_DIR),
        timeout_secs: 5,
    }
}
