//! Parse command implementation.

use super::read_body;
use serde::Serialize;
use std::path::Path;
use tether_codec::{parse, parse_framed, WireMap};

/// One protocol4 field.
#[derive(Debug, Serialize)]
pub struct Field {
    /// Field name.
    pub name: String,
    /// Field value.
    pub value: String,
}

/// Parse result.
#[derive(Debug, Serialize)]
pub struct ParseResult {
    /// Input path.
    pub path: String,
    /// Whether length prefixes were enforced.
    pub strict: bool,
    /// Fields in body order.
    pub fields: Vec<Field>,
}

/// Parses a body into a result.
pub fn inspect(path: &Path, strict: bool) -> Result<ParseResult, Box<dyn std::error::Error>> {
    let body = read_body(path)?;
    let map: WireMap = if strict {
        parse_framed(&body)?
    } else {
        parse(&body)
    };

    Ok(ParseResult {
        path: path.display().to_string(),
        strict,
        fields: map
            .into_iter()
            .map(|(name, value)| Field { name, value })
            .collect(),
    })
}

/// Runs the parse command.
pub fn run(path: &Path, strict: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, strict)?;
    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }
    Ok(())
}

fn print_text_output(result: &ParseResult) {
    println!("{} ({} fields)", result.path, result.fields.len());
    let width = result
        .fields
        .iter()
        .map(|field| field.name.len())
        .max()
        .unwrap_or(0);
    for field in &result.fields {
        println!("  {:width$}  {:?}", field.name, field.value);
    }
}
