// impctl - CLI for the impCentral device management API
// Copyright (C) 2025 The impctl authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::Result;
use clap::ValueEnum;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::client::ResponseData;

/// Set once from the global `--full-ids` flag.
pub static FULL_IDS: OnceLock<bool> = OnceLock::new();

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
    Raw,
}

pub fn render_response(
    response: ResponseData,
    output: OutputFormat,
    columns: Option<&[&str]>,
) -> Result<()> {
    match output {
        OutputFormat::Raw => {
            println!("{}", response.body);
        }
        OutputFormat::Json => {
            if let Some(json) = response.json {
                println!("{}", serde_json::to_string(&json)?);
            } else {
                println!("{}", response.body);
            }
        }
        OutputFormat::Pretty => {
            if let Some(json) = response.json {
                if !print_table(&json, columns) {
                    println!("{}", serde_json::to_string_pretty(&json)?);
                }
            } else {
                println!("{}", response.body);
            }
        }
    }

    Ok(())
}

/// Flatten the JSON:API `data` member into table rows: one row per record,
/// the record's `id` merged with its `attributes`. A single-record `data`
/// object becomes a one-row table.
fn table_rows(json: &Value) -> Option<Vec<Map<String, Value>>> {
    match json.get("data") {
        Some(Value::Array(items)) => Some(items.iter().filter_map(flatten_record).collect()),
        Some(item @ Value::Object(_)) => flatten_record(item).map(|row| vec![row]),
        _ => None,
    }
}

fn flatten_record(item: &Value) -> Option<Map<String, Value>> {
    let record = item.as_object()?;
    let mut row = Map::new();
    if let Some(id) = record.get("id") {
        row.insert("id".to_string(), id.clone());
    }
    if let Some(Value::Object(attributes)) = record.get("attributes") {
        for (key, value) in attributes {
            row.insert(key.clone(), value.clone());
        }
    }
    Some(row)
}

fn select_columns(rows: &[Map<String, Value>], hint: Option<&[&str]>) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    let present = |key: &str| {
        rows.iter()
            .any(|row| row.get(key).map(is_non_empty).unwrap_or(false))
    };

    if let Some(hint) = hint {
        for key in hint {
            if present(key) {
                columns.push((*key).to_string());
            }
        }
    }

    if columns.is_empty()
        && let Some(first) = rows.first()
    {
        for key in first.keys() {
            if present(key) {
                columns.push(key.clone());
            }
            if columns.len() >= 8 {
                break;
            }
        }
    }

    if !columns.contains(&"id".to_string()) && present("id") {
        columns.push("id".to_string());
    }

    columns
}

fn print_table(json: &Value, columns_hint: Option<&[&str]>) -> bool {
    let Some(rows) = table_rows(json) else {
        return false;
    };

    if rows.is_empty() {
        println!("No entities found.");
        return true;
    }

    let columns = select_columns(&rows, columns_hint);
    if columns.is_empty() {
        return false;
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.len()).collect();
    let mut table: Vec<Vec<String>> = Vec::new();

    for row in &rows {
        let mut out_row = Vec::new();
        for col in &columns {
            let value = row.get(col).unwrap_or(&Value::Null);
            let mut rendered = value_to_str(value);
            if col == "id" && !*FULL_IDS.get().unwrap_or(&false) && rendered.len() > 12 {
                rendered = format!("{}…", &rendered[..12]);
            }
            out_row.push(rendered);
        }
        for (idx, cell) in out_row.iter().enumerate() {
            widths[idx] = widths[idx].max(cell.len());
        }
        table.push(out_row);
    }

    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            print!("  ");
        }
        print!("{:width$}", col, width = widths[i]);
    }
    println!();
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            print!("  ");
        }
        print!("{:-<width$}", "", width = *width);
    }
    println!();
    for row in table {
        for (i, cell) in row.iter().enumerate() {
            if i > 0 {
                print!("  ");
            }
            print!("{:width$}", cell, width = widths[i]);
        }
        println!();
    }

    true
}

fn value_to_str(value: &Value) -> String {
    match value {
        Value::Null => "".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn is_non_empty(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(_) => true,
        Value::Number(_) => true,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(arr) => !arr.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
