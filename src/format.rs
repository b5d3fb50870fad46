//! Output formatting for the command line: plain text, JSON, YAML and markdown.

use crate::config::{MetadataRegistry, RedundantEntry, SourceKind, StringMap};
use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// `key = value` lines, same syntax as config files
    #[default]
    Text,
    Json,
    Yaml,
    Markdown,
}

/// Format a key/value map.
pub fn format_entries(entries: &StringMap, format: OutputFormat, title: &str) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => crate::config::render(entries),
        OutputFormat::Json => serde_json::to_string_pretty(entries)? + "\n",
        OutputFormat::Yaml => serde_yaml::to_string(entries)?,
        OutputFormat::Markdown => {
            let mut md = format!("# {} ({})\n\n", title, entries.len());
            if !entries.is_empty() {
                md.push_str("| Key | Value |\n|-----|-------|\n");
                for (key, value) in entries {
                    md.push_str(&format!("| `{}` | {} |\n", key, escape_cell(value)));
                }
            }
            md
        }
    })
}

/// Format a single resolved value.
pub fn format_value(key: &str, value: &str, format: OutputFormat) -> Result<String> {
    let mut map = StringMap::new();
    map.insert(key.to_string(), value.to_string());

    Ok(match format {
        OutputFormat::Text => format!("{}\n", value),
        OutputFormat::Json => serde_json::to_string(&map)? + "\n",
        OutputFormat::Yaml => serde_yaml::to_string(&map)?,
        OutputFormat::Markdown => format!("- **{}**: {}\n", key, value),
    })
}

#[derive(Serialize)]
struct LayerRow<'a> {
    kind: String,
    name: &'a str,
}

/// Format the source stack, highest precedence first.
pub fn format_layers(layers: &[(SourceKind, String)], format: OutputFormat) -> Result<String> {
    let rows: Vec<LayerRow> = layers
        .iter()
        .map(|(kind, name)| LayerRow {
            kind: kind.to_string(),
            name,
        })
        .collect();

    Ok(match format {
        OutputFormat::Text => rows
            .iter()
            .enumerate()
            .map(|(i, r)| format!("{}. {} ({})\n", i + 1, r.name, r.kind))
            .collect(),
        OutputFormat::Json => serde_json::to_string_pretty(&rows)? + "\n",
        OutputFormat::Yaml => serde_yaml::to_string(&rows)?,
        OutputFormat::Markdown => {
            let mut md = String::from("# Sources\n\n");
            for (i, r) in rows.iter().enumerate() {
                md.push_str(&format!("{}. `{}` ({})\n", i + 1, r.name, r.kind));
            }
            md
        }
    })
}

#[derive(Serialize)]
struct RedundantRow<'a> {
    source: &'a str,
    key: &'a str,
    value: &'a str,
}

/// Format the result of a default-elimination pass.
pub fn format_redundant(entries: &[RedundantEntry], format: OutputFormat) -> Result<String> {
    let rows: Vec<RedundantRow> = entries
        .iter()
        .map(|e| RedundantRow {
            source: &e.source_name,
            key: &e.key,
            value: &e.value,
        })
        .collect();

    Ok(match format {
        OutputFormat::Text => {
            if rows.is_empty() {
                "No redundant entries.\n".to_string()
            } else {
                rows.iter()
                    .map(|r| format!("{}: {} = {}\n", r.source, r.key, r.value))
                    .collect()
            }
        }
        OutputFormat::Json => serde_json::to_string_pretty(&rows)? + "\n",
        OutputFormat::Yaml => serde_yaml::to_string(&rows)?,
        OutputFormat::Markdown => {
            let mut md = format!("# Redundant entries ({})\n\n", rows.len());
            for r in &rows {
                md.push_str(&format!("- `{}` = {} ({})\n", r.key, r.value, r.source));
            }
            md
        }
    })
}

#[derive(Serialize)]
struct SchemaRow<'a> {
    key: &'a str,
    default: &'a str,
    #[serde(rename = "type")]
    value_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    safemode: Option<&'a str>,
    description: &'a str,
}

/// Format the declared variables.
pub fn format_schema(registry: &MetadataRegistry, format: OutputFormat) -> Result<String> {
    let rows: Vec<SchemaRow> = registry
        .iter()
        .map(|v| {
            let (min, max) = v.bounds();
            SchemaRow {
                key: v.key(),
                default: v.default_value(),
                value_type: v.get_value_type().to_string(),
                min,
                max,
                read_only: v.is_read_only(),
                safemode: v.safemode_value(),
                description: v.get_description(),
            }
        })
        .collect();

    Ok(match format {
        OutputFormat::Text => rows
            .iter()
            .map(|r| {
                let mut line = format!("{} ({}) = {}", r.key, r.value_type, r.default);
                if r.read_only {
                    line.push_str(" [read-only]");
                }
                if !r.description.is_empty() {
                    line.push_str(&format!("  # {}", r.description));
                }
                line.push('\n');
                line
            })
            .collect(),
        OutputFormat::Json => serde_json::to_string_pretty(&rows)? + "\n",
        OutputFormat::Yaml => serde_yaml::to_string(&rows)?,
        OutputFormat::Markdown => {
            let mut md = format!("# Variables ({})\n\n", rows.len());
            md.push_str("| Key | Type | Default | Description |\n|-----|------|---------|-------------|\n");
            for r in &rows {
                md.push_str(&format!(
                    "| `{}` | {} | {} | {} |\n",
                    r.key,
                    r.value_type,
                    escape_cell(r.default),
                    escape_cell(r.description)
                ));
            }
            md
        }
    })
}

fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}
