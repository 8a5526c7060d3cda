use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::base::{Shim, ShimCapabilities};
use crate::wrap::{Method, Object};

/// Classification of a SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStatement {
    pub operation: String,
    pub collection: String,
}

impl ParsedStatement {
    fn other() -> Self {
        Self {
            operation: "other".to_string(),
            collection: "unknown".to_string(),
        }
    }
}

fn operation_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?is)^\s*(select|insert|update|delete)\b").expect("operation pattern is valid")
    })
}

fn collection_pattern(operation: &str) -> &'static Regex {
    static FROM: OnceLock<Regex> = OnceLock::new();
    static INTO: OnceLock<Regex> = OnceLock::new();
    static UPDATE: OnceLock<Regex> = OnceLock::new();

    let (cell, source) = match operation {
        "insert" => (&INTO, r#"(?is)\binto\s+([\w.`"\[\]]+)"#),
        "update" => (&UPDATE, r#"(?is)^\s*update\s+([\w.`"\[\]]+)"#),
        _ => (&FROM, r#"(?is)\bfrom\s+([\w.`"\[\]]+)"#),
    };
    cell.get_or_init(|| Regex::new(source).expect("collection pattern is valid"))
}

/// Extracts operation and collection from a SQL statement. Anything that
/// is not select/insert/update/delete classifies as `other`/`unknown`.
pub fn parse_statement(sql: &str) -> ParsedStatement {
    let Some(caps) = operation_pattern().captures(sql) else {
        return ParsedStatement::other();
    };
    let operation = caps[1].to_ascii_lowercase();

    let collection = collection_pattern(&operation)
        .captures(sql)
        .map(|c| {
            c[1].trim_matches(|ch| matches!(ch, '`' | '"' | '[' | ']'))
                .to_string()
        })
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "unknown".to_string());

    ParsedStatement {
        operation,
        collection,
    }
}

/// Shim for database clients. Segment names follow
/// `Datastore/operation/{product}/{op}` and
/// `Datastore/statement/{product}/{collection}/{op}`.
#[derive(Debug, Clone)]
pub struct DatastoreShim {
    base: Shim,
    product: String,
}

impl DatastoreShim {
    pub fn new(base: Shim, product: impl Into<String>) -> Self {
        Self {
            base,
            product: product.into(),
        }
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn operation_name(&self, operation: &str) -> String {
        format!("Datastore/operation/{}/{}", self.product, operation)
    }

    pub fn statement_name(&self, parsed: &ParsedStatement) -> String {
        format!(
            "Datastore/statement/{}/{}/{}",
            self.product, parsed.collection, parsed.operation
        )
    }

    /// Records calls that are not queries (connect, ping, ...).
    pub fn record_operation(&self, owner: &Object, name: &str, operation: &str) -> Option<Method> {
        let segment_name = self.operation_name(operation);
        self.record(owner, name, &segment_name)
    }

    /// Records calls whose first argument is a SQL string.
    pub fn record_query(&self, owner: &Object, name: &str) -> Option<Method> {
        let shim = self.clone();
        self.record_with(owner, name, move |args| {
            let parsed = match args.first() {
                Some(Value::String(sql)) => parse_statement(sql),
                _ => ParsedStatement::other(),
            };
            shim.statement_name(&parsed)
        })
    }
}

impl ShimCapabilities for DatastoreShim {
    fn base(&self) -> &Shim {
        &self.base
    }
}
