use crate::{DatabaseError, Result};
use regex::Regex;
use std::path::PathBuf;

/// Connector configuration. Fields are public and defaulted; call [`CsvDirConfig::validate`]
/// before use.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvDirConfig {
    /// Directory holding the source files.
    pub source_path: PathBuf,
    /// Regular expression a file name must match in full to be a source file.
    pub file_mask: Option<String>,
    pub field_delimiter: char,
    pub text_qualifier: char,
    /// First line of every source file is a header and is not data.
    pub ignore_header: bool,
    /// Column names, in file order. Empty means "take them from the header line".
    pub fields: Vec<String>,
    pub key_column_names: Vec<String>,
    pub key_separator: String,
    pub password_column_name: Option<String>,
    pub delete_column_name: Option<String>,
    pub status_column: Option<String>,
    pub enabled_status_value: String,
    pub disabled_status_value: String,
    pub default_status_value: String,
    pub multivalue_separator: Option<String>,
    /// File created to receive inserts when no source file exists yet.
    pub default_file_name: String,
    /// Backing database file. `None` keeps the engine in memory.
    pub database_path: Option<PathBuf>,
}

impl Default for CsvDirConfig {
    fn default() -> Self {
        CsvDirConfig {
            source_path: PathBuf::new(),
            file_mask: None,
            field_delimiter: ',',
            text_qualifier: '"',
            ignore_header: true,
            fields: Vec::new(),
            key_column_names: Vec::new(),
            key_separator: String::from(","),
            password_column_name: None,
            delete_column_name: None,
            status_column: None,
            enabled_status_value: String::from("true"),
            disabled_status_value: String::from("false"),
            default_status_value: String::from("true"),
            multivalue_separator: None,
            default_file_name: String::from("accounts.csv"),
            database_path: None,
        }
    }
}

impl CsvDirConfig {
    pub fn new(
        source_path: impl Into<PathBuf>,
        file_mask: impl Into<String>,
        key_column_names: Vec<String>,
    ) -> Self {
        CsvDirConfig {
            source_path: source_path.into(),
            file_mask: Some(file_mask.into()),
            key_column_names,
            ..CsvDirConfig::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.source_path.is_dir() {
            return Err(invalid(format!(
                "source path {:?} is not a directory",
                self.source_path
            )));
        }

        let mask = self.file_mask_regex()?;
        if !mask.is_match(&self.default_file_name) {
            return Err(invalid(format!(
                "default file name {} does not match the file mask",
                self.default_file_name
            )));
        }

        if self.field_delimiter == self.text_qualifier {
            return Err(invalid("field delimiter and text qualifier must differ"));
        }
        if self.key_column_names.is_empty() {
            return Err(invalid("at least one key column is required"));
        }
        if self.key_separator.is_empty() {
            return Err(invalid("key separator must not be empty"));
        }

        if !self.ignore_header && self.fields.is_empty() {
            return Err(invalid("fields are required when files carry no header"));
        }

        if !self.fields.is_empty() {
            let special = [
                &self.password_column_name,
                &self.delete_column_name,
                &self.status_column,
            ];
            for column in self
                .key_column_names
                .iter()
                .chain(special.into_iter().flatten())
            {
                if !self.fields.iter().any(|field| field == column) {
                    return Err(invalid(format!("column {column} is not among the fields")));
                }
            }
        }

        if self.status_column.is_some() {
            if self.enabled_status_value == self.disabled_status_value {
                return Err(invalid("enabled and disabled status values must differ"));
            }
            if self.default_status_value != self.enabled_status_value
                && self.default_status_value != self.disabled_status_value
            {
                return Err(invalid(
                    "default status value must be the enabled or the disabled value",
                ));
            }
        }

        Ok(())
    }

    /// The file mask as an anchored regular expression.
    pub fn file_mask_regex(&self) -> Result<Regex> {
        let mask = self
            .file_mask
            .as_deref()
            .ok_or_else(|| invalid("file mask is required"))?;
        Regex::new(&format!("^(?:{mask})$")).map_err(|e| invalid(format!("bad file mask: {e}")))
    }

    pub fn is_key_column(&self, column: &str) -> bool {
        self.key_column_names
            .iter()
            .any(|key| key.eq_ignore_ascii_case(column))
    }

    pub(crate) fn is_password_column(&self, column: &str) -> bool {
        matches!(&self.password_column_name, Some(p) if p.eq_ignore_ascii_case(column))
    }

    pub(crate) fn is_status_column(&self, column: &str) -> bool {
        matches!(&self.status_column, Some(s) if s.eq_ignore_ascii_case(column))
    }

    pub(crate) fn multivalue_separator(&self) -> Option<&str> {
        self.multivalue_separator
            .as_deref()
            .filter(|separator| !separator.is_empty())
    }
}

fn invalid(reason: impl Into<String>) -> DatabaseError {
    DatabaseError::Configuration(reason.into())
}
