//! Parsed directive value types
//!
//! Rewrite and header/metadata transfer rules are stored as delimited text
//! (entries separated by `,`, fields by whitespace) but handled everywhere
//! else as typed lists. Parsing, validation, and serialization live here so
//! no caller re-splits raw strings.

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};

/// A URL rewrite: regex pattern plus replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteRule {
    pub pattern: String,
    pub replacement: String,
}

/// Header (or gRPC metadata) transfer operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderOp {
    Add,
    Edit,
    Del,
}

impl HeaderOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeaderOp::Add => "add",
            HeaderOp::Edit => "edit",
            HeaderOp::Del => "del",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "add" => Some(HeaderOp::Add),
            "edit" => Some(HeaderOp::Edit),
            "del" => Some(HeaderOp::Del),
            _ => None,
        }
    }
}

/// A header/metadata transfer directive: operation, header name, value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderDirective {
    pub op: HeaderOp,
    pub name: String,
    pub value: String,
}

fn entries(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|e| !e.is_empty())
}

/// Parse a rewrite directive list. Each entry must split into exactly two
/// fields and the pattern must be a valid regex. An empty input is an empty
/// list, not an error.
pub fn parse_rewrites(raw: &str) -> Result<Vec<RewriteRule>> {
    let mut rules = Vec::new();

    for entry in entries(raw) {
        let fields: Vec<&str> = entry.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(AppError::MalformedDirective {
                entry: entry.to_string(),
                reason: format!("expected 2 fields, found {}", fields.len()),
            });
        }

        if let Err(e) = regex_lite::Regex::new(fields[0]) {
            return Err(AppError::MalformedDirective {
                entry: entry.to_string(),
                reason: format!("invalid pattern: {}", e),
            });
        }

        rules.push(RewriteRule {
            pattern: fields[0].to_string(),
            replacement: fields[1].to_string(),
        });
    }

    Ok(rules)
}

/// Serialize a rewrite directive list into its canonical text encoding
pub fn serialize_rewrites(rules: &[RewriteRule]) -> String {
    rules
        .iter()
        .map(|r| format!("{} {}", r.pattern, r.replacement))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a header/metadata transfer list. Each entry must split into exactly
/// three fields with a known operation.
pub fn parse_transfers(raw: &str) -> Result<Vec<HeaderDirective>> {
    let mut directives = Vec::new();

    for entry in entries(raw) {
        let fields: Vec<&str> = entry.split_whitespace().collect();
        if fields.len() != 3 {
            return Err(AppError::MalformedDirective {
                entry: entry.to_string(),
                reason: format!("expected 3 fields, found {}", fields.len()),
            });
        }

        let Some(op) = HeaderOp::parse(fields[0]) else {
            return Err(AppError::MalformedDirective {
                entry: entry.to_string(),
                reason: format!("unknown operation `{}`", fields[0]),
            });
        };

        directives.push(HeaderDirective {
            op,
            name: fields[1].to_string(),
            value: fields[2].to_string(),
        });
    }

    Ok(directives)
}

/// Serialize a transfer directive list into its canonical text encoding
pub fn serialize_transfers(directives: &[HeaderDirective]) -> String {
    directives
        .iter()
        .map(|d| format!("{} {} {}", d.op.as_str(), d.name, d.value))
        .collect::<Vec<_>>()
        .join(",")
}
