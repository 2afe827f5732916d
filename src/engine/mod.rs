pub mod materialize;
pub mod naming;
pub mod session;

use crate::config::CsvDirConfig;
use crate::storage::{FileBasedStorage, TextFormat};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

pub use naming::{IdGenerator, SequentialIds, UuidIds};

/// One operation's hold on the query engine.
///
/// A session owns its connection, every table it materialized and one union view over the
/// tables loaded for querying. All of them are dropped when the session is closed or dropped,
/// whichever comes first; teardown runs exactly once.
pub struct Session {
    config: CsvDirConfig,
    storage: FileBasedStorage,
    format: TextFormat,
    // None once torn down
    conn: Option<Connection>,
    session_id: String,
    view_name: String,
    // Tables the view currently spans, in file order
    view_tables: Vec<String>,
    // Owned tables by name
    tables: BTreeMap<String, MaterializedTable>,
}

/// A table loaded from one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedTable {
    pub name: String,
    pub source: PathBuf,
    pub columns: Vec<String>,
}

/// A row read back from the engine. Absent and SQL NULL values are both `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Rc<[String]>,
    values: Vec<Option<String>>,
}

impl Row {
    pub fn new(columns: Rc<[String]>, values: Vec<Option<String>>) -> Self {
        Row { columns, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a column by name, compared case-insensitively.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
            .and_then(|idx| self.values[idx].as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Option::as_deref))
    }
}
