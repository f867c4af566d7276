//! Output formatting for overflow.
//!
//! Concise text by default, JSON with `--json`.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format - machine-readable output
    Json,
    /// Plain text format - one `key:value` line per record
    #[default]
    Text,
}

/// Fields printed first, bare, when present.
const ID_KEYS: [&str; 3] = ["issue_id", "comment_id", "id"];

/// Formatter that can output data in text or JSON format
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format data according to the configured output format
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
            OutputFormat::Text => Ok(render_text(&serde_json::to_value(data)?)),
        }
    }

    /// Format and print data to stdout
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print<T: Serialize>(&self, data: &T) -> Result<()> {
        let output = self.format(data)?;
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{output}")?;
        Ok(())
    }

    /// Print one record of a stream: a single compact JSON line, or a text line.
    ///
    /// Flushes so the line shows up while the stream is still running.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print_line<T: Serialize>(&self, data: &T) -> Result<()> {
        let output = match self.format {
            OutputFormat::Json => serde_json::to_string(data)?,
            OutputFormat::Text => render_text(&serde_json::to_value(data)?),
        };
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{output}")?;
        stdout.flush()?;
        Ok(())
    }

    /// Format and print a list with a custom empty message
    ///
    /// For JSON format, wraps the array in a named object with a count field.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails
    pub fn print_list<T: Serialize>(
        &self,
        data: &[T],
        empty_message: &str,
        collection_name: &str,
    ) -> Result<()> {
        match self.format {
            OutputFormat::Json => self.print(&list_envelope(data, collection_name)?),
            OutputFormat::Text if data.is_empty() => {
                let mut stdout = io::stdout().lock();
                writeln!(stdout, "{empty_message}")?;
                Ok(())
            }
            OutputFormat::Text => self.print(&data),
        }
    }
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(OutputFormat::default())
    }
}

fn list_envelope<T: Serialize>(data: &[T], collection_name: &str) -> Result<Value> {
    let mut envelope = serde_json::Map::new();
    envelope.insert(collection_name.to_string(), serde_json::to_value(data)?);
    envelope.insert("count".to_string(), serde_json::json!(data.len()));
    Ok(Value::Object(envelope))
}

/// Render a JSON value as concise text
fn render_text(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut parts: Vec<String> = ID_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .map(render_field_value)
                .collect();

            for (key, val) in map {
                if ID_KEYS.contains(&key.as_str()) {
                    continue;
                }
                match val {
                    Value::Array(arr) if arr.is_empty() => {}
                    Value::Null => {}
                    Value::Array(arr) if arr.iter().all(Value::is_object) => {
                        // Nested records read better one per line, indented.
                        parts.push(format!("{key}:"));
                        for item in arr {
                            parts.push(format!("\n  {}", render_text(item)));
                        }
                    }
                    _ => parts.push(format!("{key}:{}", render_field_value(val))),
                }
            }
            join_parts(&parts)
        }
        Value::Array(arr) => arr.iter().map(render_text).collect::<Vec<_>>().join("\n"),
        _ => render_field_value(value),
    }
}

fn join_parts(parts: &[String]) -> String {
    let mut out = String::new();
    for part in parts {
        if !out.is_empty() && !part.starts_with('\n') {
            out.push_str("  ");
        }
        out.push_str(part);
    }
    out
}

/// Render a single field value as concise text
fn render_field_value(value: &Value) -> String {
    match value {
        Value::String(s) => {
            if s.contains(' ') || s.contains('\n') {
                format!("\"{}\"", s.replace('\n', "\\n"))
            } else {
                s.clone()
            }
        }
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(render_field_value).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| format!("{k}:{}", render_field_value(v)))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
    }
}
