use regex::Regex;
use std::path::PathBuf;

pub mod data;
pub mod file_storage;

/// Which columns of a row to hand back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Columns {
    All,
    Selection(Vec<String>),
}

impl From<Option<Vec<String>>> for Columns {
    fn from(value: Option<Vec<String>>) -> Self {
        match value {
            Some(v) => Self::Selection(v),
            None => Self::All,
        }
    }
}

/// Field delimiter and text qualifier of the source files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextFormat {
    pub delimiter: char,
    pub qualifier: char,
}

/// Content of one delimited source file. An unquoted empty field is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataFile {
    pub header: Option<Vec<String>>,
    pub data: Vec<Vec<Option<String>>>,
}

/// Monotonic marker of the last synchronization: modification time in milliseconds since the
/// Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SyncToken(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub modified: SyncToken,
}

/// The directory of source files, filtered by the configured file mask.
#[derive(Debug, Clone)]
pub struct FileBasedStorage {
    base_path: PathBuf,
    mask: Regex,
}
