use crate::engine::naming::table_name;
use crate::engine::session::query_error;
use crate::engine::{MaterializedTable, Session};
use crate::observability::{log_debug, log_info};
use crate::query::quote_ident;
use crate::storage::{DataFile, SourceFile, SyncToken};
use crate::{DatabaseError, Result};
use rusqlite::params_from_iter;
use std::path::{Path, PathBuf};

impl Session {
    /// Returns the table that receives new rows: the most recently modified source file, or
    /// a freshly created `default_file_name` when the directory holds no source file yet.
    pub fn materialize_for_insert(&mut self) -> Result<String> {
        let target = match self.storage.last_modified()? {
            Some(file) => file.path,
            None => self.create_source_file()?,
        };
        self.regenerate(&target)
    }

    /// Reloads the table of one source file, for statements that must reach every file.
    pub fn materialize_for_mutation(&mut self, file: &Path) -> Result<String> {
        self.regenerate(file)
    }

    /// Loads every file modified after `token` and points the view at them.
    pub fn materialize_for_sync(&mut self, token: SyncToken) -> Result<Vec<String>> {
        let files = self.storage.modified_since(token)?;
        self.materialize_files(&files)
    }

    /// Loads every source file and points the view at them.
    pub fn materialize_all(&mut self) -> Result<Vec<String>> {
        let files = self.storage.all_files()?;
        self.materialize_files(&files)
    }

    fn materialize_files(&mut self, files: &[SourceFile]) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(files.len());
        for file in files {
            names.push(self.regenerate(&file.path)?);
        }
        self.refresh_view(&names)?;
        Ok(names)
    }

    /// (Re)creates the table for `path` and loads the file's rows into it.
    fn regenerate(&mut self, path: &Path) -> Result<String> {
        let width = (!self.config.fields.is_empty()).then_some(self.config.fields.len());
        let data = self
            .storage
            .read_file(path, &self.format, self.config.ignore_header, width)?;
        let columns = self.columns_for(path, &data)?;
        let name = self.name_for(path);

        // Recorded before creation so teardown covers a half-loaded table too.
        self.tables.insert(
            name.clone(),
            MaterializedTable {
                name: name.clone(),
                source: path.to_path_buf(),
                columns: columns.clone(),
            },
        );
        self.load_table(&name, &columns, path, data)?;

        log_debug!(
            component = "materialize",
            event = "table_loaded",
            table = %name,
            path = ?path,
        );
        Ok(name)
    }

    fn columns_for(&self, path: &Path, data: &DataFile) -> Result<Vec<String>> {
        if !self.config.fields.is_empty() {
            return Ok(self.config.fields.clone());
        }
        match &data.header {
            Some(header) if !header.is_empty() => Ok(header.clone()),
            _ => Err(DatabaseError::MalformedSource {
                path: path.to_path_buf(),
                reason: String::from("no column names: file has no header and no fields are configured"),
            }),
        }
    }

    /// Name of the table for `path`; stable within the session and distinct for distinct
    /// files.
    fn name_for(&self, path: &Path) -> String {
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let base = table_name(&stem, &self.session_id);

        let mut candidate = base.clone();
        let mut suffix = 2;
        while let Some(existing) = self.tables.get(&candidate) {
            if existing.source == path {
                break;
            }
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        candidate
    }

    fn load_table(
        &self,
        name: &str,
        columns: &[String],
        path: &Path,
        data: DataFile,
    ) -> Result<()> {
        let conn = self.connection()?;
        let table = quote_ident(name);

        let drop = format!("DROP TABLE IF EXISTS {table}");
        conn.execute_batch(&drop).map_err(|e| query_error(&drop, e))?;

        let column_defs = columns
            .iter()
            .map(|column| format!("{} TEXT", quote_ident(column)))
            .collect::<Vec<_>>()
            .join(", ");
        let create = format!("CREATE TABLE {table} ({column_defs})");
        conn.execute_batch(&create)
            .map_err(|e| query_error(&create, e))?;

        let placeholders = vec!["?"; columns.len()].join(", ");
        let insert = format!("INSERT INTO {table} VALUES ({placeholders})");
        let mut stmt = conn.prepare(&insert).map_err(|e| query_error(&insert, e))?;

        for (line, mut row) in data.data.into_iter().enumerate() {
            if row.len() > columns.len() {
                return Err(DatabaseError::MalformedSource {
                    path: path.to_path_buf(),
                    reason: format!(
                        "record {} has {} fields, expected at most {}",
                        line + 1,
                        row.len(),
                        columns.len()
                    ),
                });
            }
            row.resize(columns.len(), None);
            stmt.execute(params_from_iter(row.iter().map(Option::as_deref)))
                .map_err(|e| query_error(&insert, e))?;
        }

        Ok(())
    }

    /// Rebuilds the union view over `names`. Every table must have the same columns.
    fn refresh_view(&mut self, names: &[String]) -> Result<()> {
        let view = quote_ident(&self.view_name);
        let drop = format!("DROP VIEW IF EXISTS {view}");
        self.connection()?
            .execute_batch(&drop)
            .map_err(|e| query_error(&drop, e))?;
        self.view_tables.clear();

        let Some(first) = names.first().and_then(|name| self.tables.get(name)) else {
            return Ok(());
        };
        for name in names {
            if let Some(table) = self.tables.get(name) {
                if table.columns != first.columns {
                    return Err(DatabaseError::MalformedSource {
                        path: table.source.clone(),
                        reason: format!(
                            "columns {:?} differ from {:?} of {:?}",
                            table.columns, first.columns, first.source
                        ),
                    });
                }
            }
        }

        let select = names
            .iter()
            .map(|name| format!("SELECT * FROM {}", quote_ident(name)))
            .collect::<Vec<_>>()
            .join(" UNION ALL ");
        let create = format!("CREATE VIEW {view} AS {select}");
        self.connection()?
            .execute_batch(&create)
            .map_err(|e| query_error(&create, e))?;
        self.view_tables = names.to_vec();

        log_info!(
            component = "materialize",
            event = "view_created",
            view = %self.view_name,
            tables = names.len(),
        );
        Ok(())
    }

    /// Creates `default_file_name` holding only the header line.
    fn create_source_file(&self) -> Result<PathBuf> {
        if self.config.fields.is_empty() {
            return Err(DatabaseError::Configuration(String::from(
                "cannot create a source file without configured fields",
            )));
        }
        let path = self.storage.path_for(&self.config.default_file_name);
        let header = self
            .config
            .ignore_header
            .then(|| self.config.fields.clone());
        self.storage
            .write_file(&path, &DataFile::new(header, vec![]), &self.format)?;

        log_info!(component = "materialize", event = "source_created", path = ?path);
        Ok(path)
    }
}
