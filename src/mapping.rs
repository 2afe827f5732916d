//! Conversions between engine rows, host records and the column maps statements are built
//! from.

use crate::config::CsvDirConfig;
use crate::engine::Row;
use crate::storage::Columns;
use crate::{join_key, Attribute, AttributeMap, DatabaseError, GuardedString, Record, Result, Uid, Value};

/// Identity of a record.
pub const UID: &str = "__UID__";
/// Naming attribute; carries the identifier on read, the single key value on write.
pub const NAME: &str = "__NAME__";
pub const PASSWORD: &str = "__PASSWORD__";
pub const ENABLE: &str = "__ENABLE__";

pub struct RowMapper<'a> {
    config: &'a CsvDirConfig,
}

impl<'a> RowMapper<'a> {
    pub fn new(config: &'a CsvDirConfig) -> Self {
        RowMapper { config }
    }

    /// Key column values joined in key order. A null key value contributes an empty
    /// component.
    pub fn uid_of(&self, row: &Row) -> Uid {
        let values: Vec<&str> = self
            .config
            .key_column_names
            .iter()
            .map(|key| row.get(key).unwrap_or_default())
            .collect();
        Uid(join_key(&values, &self.config.key_separator))
    }

    /// Builds the host record for a row, keeping only the attributes selected by `columns`.
    /// Identity and name are always present.
    pub fn to_record(&self, row: &Row, columns: &Columns) -> Record {
        let uid = self.uid_of(row);
        let mut record = Record::new(uid.clone());
        record.insert(NAME, Value::Text(uid.0));

        for (column, value) in row.iter() {
            let (name, value) = if self.config.is_password_column(column) {
                (
                    PASSWORD.to_string(),
                    Value::Secret(GuardedString::new(value.unwrap_or_default())),
                )
            } else if self.config.is_status_column(column) {
                (ENABLE.to_string(), Value::Bool(self.status_of(value)))
            } else {
                (column.to_string(), Value::Multi(self.split_multivalue(value)))
            };

            if selected(columns, &name, column) {
                record.insert(name, value);
            }
        }

        record
    }

    /// The row as the engine holds it, for filters evaluated in memory. Every non-null column
    /// keeps its stored text under its own name; multivalues stay joined. The password and
    /// enable attributes are added alongside their columns.
    pub fn to_stored_record(&self, row: &Row) -> Record {
        let mut record = Record::new(self.uid_of(row));

        for (column, value) in row.iter() {
            if self.config.is_status_column(column) {
                record.insert(ENABLE, Value::Bool(self.status_of(value)));
            }
            let Some(value) = value else {
                continue;
            };
            if self.config.is_password_column(column) {
                record.insert(PASSWORD, Value::Secret(GuardedString::new(value)));
            }
            record.insert(column, Value::Text(value.to_string()));
        }

        record
    }

    /// Resolves a status column value; blank means the configured default.
    pub fn status_of(&self, value: Option<&str>) -> bool {
        let token = match value {
            Some(value) if !value.trim().is_empty() => value,
            _ => self.config.default_status_value.as_str(),
        };
        token == self.config.enabled_status_value
    }

    /// Splits a stored value into its parts. A null or empty value has no parts; without a
    /// separator the whole value is one part.
    pub fn split_multivalue(&self, value: Option<&str>) -> Vec<String> {
        match (value, self.config.multivalue_separator()) {
            (None, _) | (Some(""), _) => vec![],
            (Some(value), None) => vec![value.to_string()],
            (Some(value), Some(separator)) => value.split(separator).map(String::from).collect(),
        }
    }

    pub fn join_multivalue(&self, name: &str, values: &[String]) -> Result<String> {
        match (values, self.config.multivalue_separator()) {
            ([], _) => Ok(String::new()),
            ([single], None) => Ok(single.clone()),
            (_, None) => Err(invalid_attribute(
                name,
                "several values but no multivalue separator is configured",
            )),
            (values, Some(separator)) => {
                if values.iter().any(|value| value.contains(separator)) {
                    return Err(invalid_attribute(name, "value contains the multivalue separator"));
                }
                Ok(values.join(separator))
            }
        }
    }

    /// Column map for insert and update statements.
    ///
    /// The name attribute fills the key column when there is exactly one. The password
    /// attribute fills the password column, an explicit null becoming the empty string. The
    /// status column is written whenever one is configured, the default token standing in for
    /// an absent enable attribute.
    pub fn to_attribute_map(&self, attributes: &[Attribute]) -> Result<AttributeMap> {
        let mut map = AttributeMap::new();
        let mut status: Option<bool> = None;

        for attr in attributes {
            if attr.is(UID) {
                continue;
            } else if attr.is(NAME) {
                if let [key] = self.config.key_column_names.as_slice() {
                    map.insert(key.clone(), self.column_text(attr)?);
                }
            } else if attr.is(ENABLE) {
                status = match &attr.value {
                    None => None,
                    Some(Value::Bool(flag)) => Some(*flag),
                    Some(Value::Text(text)) => Some(text.eq_ignore_ascii_case("true")),
                    Some(_) => return Err(invalid_attribute(&attr.name, "expected a boolean")),
                };
            } else if attr.is(PASSWORD) {
                let Some(column) = &self.config.password_column_name else {
                    return Err(invalid_attribute(&attr.name, "no password column is configured"));
                };
                let clear = match &attr.value {
                    None => String::new(),
                    Some(Value::Secret(secret)) => secret.reveal().to_string(),
                    Some(Value::Text(text)) => text.clone(),
                    Some(_) => return Err(invalid_attribute(&attr.name, "expected a password")),
                };
                map.insert(column.clone(), clear);
            } else {
                map.insert(attr.name.clone(), self.column_text(attr)?);
            }
        }

        if let Some(column) = &self.config.status_column {
            let token = match status {
                None => &self.config.default_status_value,
                Some(true) => &self.config.enabled_status_value,
                Some(false) => &self.config.disabled_status_value,
            };
            map.insert(column.clone(), token.clone());
        }

        Ok(map)
    }

    fn column_text(&self, attr: &Attribute) -> Result<String> {
        match &attr.value {
            None => Ok(String::new()),
            Some(Value::Text(text)) => Ok(text.clone()),
            Some(Value::Multi(values)) => self.join_multivalue(&attr.name, values),
            Some(Value::Bool(flag)) => Ok(flag.to_string()),
            Some(Value::Secret(secret)) => Ok(secret.reveal().to_string()),
            Some(Value::Binary(_)) => Err(invalid_attribute(&attr.name, "binary values are not supported")),
        }
    }

    /// Identifier of the record a column map describes. Every key column must be present,
    /// under any letter case, and free of the key separator.
    pub fn uid_from_columns(&self, columns: &AttributeMap) -> Result<Uid> {
        let separator = &self.config.key_separator;
        let mut values = Vec::with_capacity(self.config.key_column_names.len());

        for key in &self.config.key_column_names {
            let found = columns.get(key).or_else(|| {
                columns
                    .iter()
                    .find(|(column, _)| column.eq_ignore_ascii_case(key))
                    .map(|(_, value)| value)
            });
            let Some(value) = found else {
                return Err(DatabaseError::InvalidIdentifier {
                    uid: String::new(),
                    reason: format!("key column {key} is missing"),
                });
            };
            if value.contains(separator.as_str()) {
                return Err(DatabaseError::InvalidIdentifier {
                    uid: value.clone(),
                    reason: format!("key column {key} contains the key separator {separator:?}"),
                });
            }
            values.push(value.as_str());
        }

        Ok(Uid(join_key(&values, separator)))
    }

    /// Rejects identifiers whose component count differs from the key column count.
    pub fn check_uid(&self, uid: &Uid) -> Result<()> {
        let expected = self.config.key_column_names.len();
        let found = uid.components(&self.config.key_separator).len();
        if found != expected {
            return Err(DatabaseError::InvalidIdentifier {
                uid: uid.0.clone(),
                reason: format!("{found} key components, expected {expected}"),
            });
        }
        Ok(())
    }
}

fn selected(columns: &Columns, name: &str, column: &str) -> bool {
    match columns {
        Columns::All => true,
        Columns::Selection(wanted) => wanted
            .iter()
            .any(|want| want.eq_ignore_ascii_case(name) || want.eq_ignore_ascii_case(column)),
    }
}

fn invalid_attribute(name: &str, reason: &str) -> DatabaseError {
    DatabaseError::InvalidAttribute {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
