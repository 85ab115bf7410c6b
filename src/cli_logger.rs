use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use std::path::PathBuf;

use crate::FilterSummary;

pub struct CliLogger {
    json: bool,
    no_color: bool,
}

impl CliLogger {
    pub fn new(json: bool, no_color: bool) -> Self {
        Self { json, no_color }
    }

    pub fn print_serialized<T: Serialize>(&self, value: &T) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(value)?);
            return Ok(());
        }
        println!("{}", render(&serde_json::to_value(value)?, 0));
        Ok(())
    }

    pub fn print_filter_summary(&self, summary: &FilterSummary) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(summary)?);
            return Ok(());
        }

        let mut out = String::new();
        out.push_str(&format!(
            "{} {}\n",
            self.style("testprof filter", "36;1"),
            summary.input.display()
        ));
        out.push_str(&format!("{} {}\n", self.style("edges in", "90"), summary.edges_in));
        out.push_str(&format!("{} {}\n", self.style("edges out", "90"), summary.edges_out));
        let removed = if summary.removed > 0 {
            self.style(&summary.removed.to_string(), "33;1")
        } else {
            summary.removed.to_string()
        };
        out.push_str(&format!("{} {removed}\n", self.style("removed", "90")));
        if let Some(path) = &summary.output {
            out.push_str(&format!("{} {}\n", self.style("written", "90"), path.display()));
        }
        println!("{}", out.trim_end());
        Ok(())
    }

    pub fn print_paths(&self, label: &str, paths: &[PathBuf]) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(paths)?);
            return Ok(());
        }
        if paths.is_empty() {
            println!("{} none", self.style(label, "90"));
            return Ok(());
        }
        for path in paths {
            println!("{} {}", self.style(label, "90"), path.display());
        }
        Ok(())
    }

    pub fn print_error(&self, msg: &str) {
        if self.json {
            let out = serde_json::json!({
                "status": "error",
                "message": msg,
            });
            println!("{out}");
            return;
        }
        eprintln!("{} {msg}", self.style("error", "31;1"));
    }

    fn style(&self, text: &str, ansi: &str) -> String {
        if self.no_color {
            return text.to_string();
        }
        format!("\x1b[{ansi}m{text}\x1b[0m")
    }
}

fn render(value: &Value, indent: usize) -> String {
    let pad = " ".repeat(indent);
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Number(v) => v.to_string(),
        Value::String(v) => v.clone(),
        Value::Array(items) if items.is_empty() => "[]".to_string(),
        Value::Object(map) if map.is_empty() => "{}".to_string(),
        Value::Array(items) => items
            .iter()
            .map(|item| nested(&format!("{pad}-"), item, indent))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| nested(&format!("{pad}{key}:"), item, indent))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn nested(head: &str, value: &Value, indent: usize) -> String {
    match value {
        Value::Object(m) if !m.is_empty() => format!("{head}\n{}", render(value, indent + 2)),
        Value::Array(a) if !a.is_empty() => format!("{head}\n{}", render(value, indent + 2)),
        _ => format!("{head} {}", render(value, indent + 2)),
    }
}
