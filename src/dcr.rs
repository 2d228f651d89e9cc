use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::parser::schema::Column;
use crate::selection::same_table;

pub const INPUT_STREAM_PREFIX: &str = "Custom-";
pub const OUTPUT_STREAM_PREFIX: &str = "Microsoft-";
pub const DESTINATION: &str = "logAnalyticsWorkspace";
pub const TRANSFORM_KQL: &str = "source";

const STREAMS_KEY: &str = "streamDeclarations";
const FLOWS_KEY: &str = "dataFlows";

/// Key a table's columns are declared under.
pub fn stream_id(table: &str) -> String {
    format!("{}{}", INPUT_STREAM_PREFIX, table)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamDeclaration {
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFlow {
    pub streams: Vec<String>,
    pub destinations: Vec<String>,
    pub transform_kql: String,
    pub output_stream: String,
}

impl DataFlow {
    pub fn for_table(table: &str) -> Self {
        DataFlow {
            streams: vec![stream_id(table)],
            destinations: vec![DESTINATION.to_string()],
            transform_kql: TRANSFORM_KQL.to_string(),
            output_stream: format!("{}{}", OUTPUT_STREAM_PREFIX, table),
        }
    }
}

/// A DCR deployment template. The first resource's `properties` is
/// guaranteed to hold a `streamDeclarations` object and a `dataFlows` array.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    root: Value,
}

impl Template {
    pub fn parse(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)?;
        Self::from_value(root)
    }

    pub fn from_value(mut root: Value) -> Result<Self> {
        let props = properties_mut(&mut root)
            .ok_or(Error::TemplateShape("resources[0].properties"))?;
        if !props.get(STREAMS_KEY).is_some_and(Value::is_object) {
            return Err(Error::TemplateShape(
                "resources[0].properties.streamDeclarations object",
            ));
        }
        if !props.get(FLOWS_KEY).is_some_and(Value::is_array) {
            return Err(Error::TemplateShape("resources[0].properties.dataFlows array"));
        }
        Ok(Template { root })
    }

    /// Empty both variable collections, keeping everything else.
    pub fn into_skeleton(mut self) -> Result<Self> {
        self.streams_mut()?.clear();
        self.flows_mut()?.clear();
        Ok(self)
    }

    pub fn stream_declarations(&self) -> Result<&Map<String, Value>> {
        properties(&self.root)
            .and_then(|p| p.get(STREAMS_KEY))
            .and_then(Value::as_object)
            .ok_or(Error::TemplateShape(STREAMS_KEY))
    }

    pub fn data_flows(&self) -> Result<&Vec<Value>> {
        properties(&self.root)
            .and_then(|p| p.get(FLOWS_KEY))
            .and_then(Value::as_array)
            .ok_or(Error::TemplateShape(FLOWS_KEY))
    }

    pub fn has_stream(&self, stream: &str) -> Result<bool> {
        Ok(self.stream_declarations()?.contains_key(stream))
    }

    /// Declare `table`'s stream and route it to the built-in table.
    pub fn add_table(&mut self, table: &str, columns: Vec<Column>) -> Result<()> {
        let declaration =
            serde_json::to_value(StreamDeclaration { columns }).map_err(Error::Serialize)?;
        let flow = serde_json::to_value(DataFlow::for_table(table)).map_err(Error::Serialize)?;
        self.streams_mut()?.insert(stream_id(table), declaration);
        self.flows_mut()?.push(flow);
        Ok(())
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    fn streams_mut(&mut self) -> Result<&mut Map<String, Value>> {
        properties_mut(&mut self.root)
            .and_then(|p| p.get_mut(STREAMS_KEY))
            .and_then(Value::as_object_mut)
            .ok_or(Error::TemplateShape(STREAMS_KEY))
    }

    fn flows_mut(&mut self) -> Result<&mut Vec<Value>> {
        properties_mut(&mut self.root)
            .and_then(|p| p.get_mut(FLOWS_KEY))
            .and_then(Value::as_array_mut)
            .ok_or(Error::TemplateShape(FLOWS_KEY))
    }
}

fn properties(root: &Value) -> Option<&Map<String, Value>> {
    root.get("resources")?.get(0)?.get("properties")?.as_object()
}

fn properties_mut(root: &mut Value) -> Option<&mut Map<String, Value>> {
    root.get_mut("resources")?
        .get_mut(0)?
        .get_mut("properties")?
        .as_object_mut()
}

#[derive(Debug)]
pub enum SkipReason {
    /// Not among the discovered tables.
    Unsupported,
    Schema(Error),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Unsupported => write!(f, "not a supported table"),
            SkipReason::Schema(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Debug)]
pub struct Skipped {
    pub table: String,
    pub reason: SkipReason,
}

pub struct Assembly {
    pub template: Template,
    /// Canonical names that made it into the template, in order.
    pub tables: Vec<String>,
    pub skipped: Vec<Skipped>,
}

/// Build a template for `requested` on a fresh copy of `skeleton`.
///
/// Each request resolves to the first case-insensitive match in `discovered`.
/// Tables already declared are not fetched again. Unsupported tables and
/// tables whose schema cannot be read are reported in `skipped` and left out.
pub fn assemble<F>(
    skeleton: &Template,
    discovered: &[String],
    requested: &[String],
    mut columns_for: F,
) -> Result<Assembly>
where
    F: FnMut(&str) -> Result<Vec<Column>>,
{
    let mut template = skeleton.clone();
    let mut tables = Vec::new();
    let mut skipped = Vec::new();

    for table in requested {
        let Some(canonical) = discovered.iter().find(|d| same_table(d, table)) else {
            warn!("Skipping {}: not a supported table", table);
            skipped.push(Skipped {
                table: table.clone(),
                reason: SkipReason::Unsupported,
            });
            continue;
        };

        if template.has_stream(&stream_id(canonical))? {
            debug!("{} already declared", canonical);
            continue;
        }

        match columns_for(canonical) {
            Ok(columns) => {
                template.add_table(canonical, columns)?;
                tables.push(canonical.clone());
            }
            Err(e) => {
                warn!("Skipping {}: {}", canonical, e);
                skipped.push(Skipped {
                    table: canonical.clone(),
                    reason: SkipReason::Schema(e),
                });
            }
        }
    }

    Ok(Assembly {
        template,
        tables,
        skipped,
    })
}
