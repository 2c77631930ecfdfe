//! Value-to-string formatting and Markdown table emission.

use crate::value::{number_to_string, value_to_json, Value};

/// Format a value for a table cell.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::Null | Value::Undefined => String::new(),
        Value::Str(s) => s.clone(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => number_to_string(*f),
        Value::Bool(b) => b.to_string(),
        Value::Date(d) => crate::value::format_date(d),
        Value::Duration(ms) => crate::duration::format_duration(*ms),
        Value::List(items) => items
            .iter()
            .map(format_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) => {
            // Path-shaped objects (links) prefer their display text.
            if let Some(Value::Str(path)) = map.get("path") {
                if let Some(Value::Str(display)) = map.get("display") {
                    if !display.is_empty() {
                        return display.clone();
                    }
                }
                return path.clone();
            }
            match value_to_json(value) {
                Ok(json) => serde_json::to_string(&json)
                    .unwrap_or_else(|_| value.to_display_string()),
                Err(_) => value.to_display_string(),
            }
        }
        other => match value_to_json(other) {
            Ok(json) => {
                serde_json::to_string(&json).unwrap_or_else(|_| other.to_display_string())
            }
            Err(_) => other.to_display_string(),
        },
    }
}

/// Escape a cell for a Markdown table: pipes and newlines would break
/// the row structure.
pub fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace(['\n', '\r'], "<br>")
}

/// Render a `[header, ...rows]` matrix as a Markdown table. An empty
/// matrix produces the placeholder table.
pub fn render_table(rows: &[Vec<String>]) -> String {
    let Some(header) = rows.first().filter(|h| !h.is_empty()) else {
        return "|  |\n| --- |".to_string();
    };

    let mut out = String::new();
    out.push_str(&render_row(header));
    out.push('\n');
    out.push_str(&render_row(&vec!["---".to_string(); header.len()]));
    for row in &rows[1..] {
        out.push('\n');
        out.push_str(&render_row(row));
    }
    out
}

fn render_row(cells: &[String]) -> String {
    let mut out = String::from("|");
    for cell in cells {
        out.push(' ');
        out.push_str(&escape_cell(cell));
        out.push_str(" |");
    }
    out
}

/// Full output for one materialized view.
pub fn render_view(view_name: &str, rows: &[Vec<String>]) -> String {
    format!("# {}\n\n{}\n", view_name, render_table(rows))
}
