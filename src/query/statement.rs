//! INSERT, UPDATE and DELETE text built from column maps.
//!
//! Values are embedded as engine literals. Statements that address a record by identifier
//! expect as many identifier components as key fields; callers check this beforehand and a
//! mismatch here panics.

use super::{quote_ident, quote_literal};
use crate::{split_key, AttributeMap};

pub fn insert_statement(attributes: &AttributeMap, table: &str) -> String {
    let columns = attributes
        .keys()
        .map(|column| quote_ident(column))
        .collect::<Vec<_>>()
        .join(", ");
    let values = attributes
        .values()
        .map(|value| quote_literal(value))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {} ({columns}) VALUES ({values})", quote_ident(table))
}

/// `None` when every attribute is a key field and there is nothing to set. Key fields are
/// recognized case-insensitively, as the engine resolves column names.
pub fn update_statement(
    attributes: &AttributeMap,
    uid: &str,
    key_separator: &str,
    key_fields: &[String],
    table: &str,
) -> Option<String> {
    let assignments = attributes
        .iter()
        .filter(|(column, _)| !key_fields.iter().any(|key| key.eq_ignore_ascii_case(column)))
        .map(|(column, value)| format!("{} = {}", quote_ident(column), quote_literal(value)))
        .collect::<Vec<_>>();
    if assignments.is_empty() {
        return None;
    }

    Some(format!(
        "UPDATE {} SET {} WHERE {}",
        quote_ident(table),
        assignments.join(", "),
        key_clause(uid, key_separator, key_fields)
    ))
}

pub fn delete_statement(uid: &str, key_separator: &str, key_fields: &[String], table: &str) -> String {
    format!(
        "DELETE FROM {} WHERE {}",
        quote_ident(table),
        key_clause(uid, key_separator, key_fields)
    )
}

fn key_clause(uid: &str, key_separator: &str, key_fields: &[String]) -> String {
    let components = split_key(uid, key_separator);
    assert_eq!(
        components.len(),
        key_fields.len(),
        "identifier {uid:?} has {} components for {} key fields",
        components.len(),
        key_fields.len()
    );

    key_fields
        .iter()
        .zip(components)
        .map(|(key, value)| format!("{} = {}", quote_ident(key), quote_literal(value)))
        .collect::<Vec<_>>()
        .join(" AND ")
}
