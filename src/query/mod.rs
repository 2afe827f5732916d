//! SQL text produced from attribute maps and filter trees.

pub mod evaluate;
pub mod filter;
pub mod predicate;
pub mod statement;

/// Quotes an identifier for the engine, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Renders a string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
