use std::path::PathBuf;

use tracing::info;

use super::selector;
use crate::dcr::Template;
use crate::error::Result;
use crate::fetch::Fetch;
use crate::settings::Settings;

/// Where the reference DCR template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Documentation page whose `<code>` blocks, joined in order, form the template.
    Page(String),
    /// Versioned JSON template on disk.
    File(PathBuf),
}

impl TemplateSource {
    pub fn from_settings(settings: &Settings) -> Self {
        match &settings.template_file {
            Some(path) => TemplateSource::File(path.clone()),
            None => TemplateSource::Page(settings.template_url.clone()),
        }
    }

    /// Load the template and blank out its stream declarations and data flows.
    pub fn load_skeleton(&self, fetcher: &impl Fetch) -> Result<Template> {
        let text = match self {
            TemplateSource::Page(url) => join_code_blocks(&fetcher.get(url)?),
            TemplateSource::File(path) => std::fs::read_to_string(path)?,
        };
        let skeleton = Template::parse(&text)?.into_skeleton()?;
        info!("Loaded DCR skeleton from {:?}", self);
        Ok(skeleton)
    }
}

/// Text of every `<code>` element, concatenated in document order.
pub fn join_code_blocks(html: &str) -> String {
    let doc = scraper::Html::parse_document(html);
    let code = selector("code");
    let text: String = doc.select(&code).flat_map(|el| el.text()).collect();
    text
}
