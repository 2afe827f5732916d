use crate::config::CsvDirConfig;
use crate::engine::{IdGenerator, Row, Session};
use crate::observability::{log_debug, log_error, log_info, log_warn};
use crate::query::predicate::Predicate;
use crate::query::quote_ident;
use crate::storage::{DataFile, FileBasedStorage, TextFormat};
use crate::{DatabaseError, Result};
use rusqlite::config::DbConfig;
use rusqlite::{params_from_iter, Connection};
use std::collections::BTreeMap;
use std::rc::Rc;

impl Session {
    /// Opens a fresh engine connection. Statements run in auto-commit mode, each one atomic on
    /// its own.
    pub fn open(config: &CsvDirConfig, ids: &dyn IdGenerator) -> Result<Session> {
        let storage = FileBasedStorage::from_config(config)?;

        let conn = match &config.database_path {
            Some(path) => Connection::open(path),
            None => Connection::open_in_memory(),
        }
        .map_err(DatabaseError::Connection)?;
        // forces the database file to be read
        conn.pragma_query_value(None, "user_version", |row| row.get::<_, i64>(0))
            .map_err(DatabaseError::Connection)?;
        // a double-quoted name that is not a column must fail instead of becoming a string
        for flag in [DbConfig::SQLITE_DBCONFIG_DQS_DML, DbConfig::SQLITE_DBCONFIG_DQS_DDL] {
            conn.set_db_config(flag, false)
                .map_err(DatabaseError::Connection)?;
        }
        if !conn.is_autocommit() {
            return Err(DatabaseError::Configuration(String::from(
                "engine connection is not in auto-commit mode",
            )));
        }

        let session_id = ids.next_id();
        let view_name = format!("USER_EX_{session_id}");
        log_info!(component = "session", event = "session_opened", view = %view_name);

        Ok(Session {
            config: config.clone(),
            storage,
            format: TextFormat {
                delimiter: config.field_delimiter,
                qualifier: config.text_qualifier,
            },
            conn: Some(conn),
            session_id,
            view_name,
            view_tables: Vec::new(),
            tables: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &CsvDirConfig {
        &self.config
    }

    pub fn storage(&self) -> &FileBasedStorage {
        &self.storage
    }

    pub fn view_name(&self) -> &str {
        &self.view_name
    }

    /// Names of every table this session created and has not dropped yet.
    pub fn tables(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    pub(crate) fn connection(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(DatabaseError::SessionClosed)
    }

    /// Runs `SELECT *` over the union view, optionally restricted by `predicate`, feeding
    /// rows to `visit` in order until it returns `false`. Nothing is visited while no table has
    /// been loaded for querying.
    pub fn query<F>(&self, predicate: Option<&Predicate>, mut visit: F) -> Result<()>
    where
        F: FnMut(Row) -> Result<bool>,
    {
        if self.view_tables.is_empty() {
            return Ok(());
        }

        let mut statement = format!("SELECT * FROM {}", quote_ident(&self.view_name));
        let params = match predicate.filter(|p| !p.is_empty()) {
            Some(predicate) => {
                statement.push_str(" WHERE ");
                statement.push_str(predicate.clause());
                predicate.params()
            }
            None => &[][..],
        };
        log_debug!(
            component = "session",
            event = "query",
            statement = %statement,
            params = params.len(),
        );

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&statement).map_err(|e| query_error(&statement, e))?;
        let columns: Rc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
            .into();
        let mut rows = stmt
            .query(params_from_iter(params.iter().map(|p| p.value.as_deref())))
            .map_err(|e| query_error(&statement, e))?;

        while let Some(row) = rows.next().map_err(|e| query_error(&statement, e))? {
            let values = (0..columns.len())
                .map(|idx| row.get::<_, Option<String>>(idx))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| query_error(&statement, e))?;
            if !visit(Row::new(columns.clone(), values))? {
                break;
            }
        }

        Ok(())
    }

    /// Runs one mutating statement against `table` and returns the number of affected rows.
    /// When rows were affected the table is written back to its source file.
    pub fn execute(&mut self, table: &str, statement: &str) -> Result<usize> {
        log_debug!(component = "session", event = "execute", statement = %statement);

        let affected = {
            let conn = self.connection()?;
            let mut stmt = conn.prepare(statement).map_err(|e| query_error(statement, e))?;
            stmt.execute([]).map_err(|e| query_error(statement, e))?
        };

        if affected > 0 {
            self.write_back(table)?;
        }
        Ok(affected)
    }

    /// Rewrites the source file of `table` from the table's current rows.
    fn write_back(&self, table: &str) -> Result<()> {
        let Some(materialized) = self.tables.get(table) else {
            return Err(DatabaseError::Configuration(format!(
                "table {table} is not owned by this session"
            )));
        };

        let column_list = materialized
            .columns
            .iter()
            .map(|column| quote_ident(column))
            .collect::<Vec<_>>()
            .join(", ");
        let statement = format!(
            "SELECT {} FROM {} ORDER BY rowid",
            column_list,
            quote_ident(table)
        );

        let conn = self.connection()?;
        let mut stmt = conn.prepare(&statement).map_err(|e| query_error(&statement, e))?;
        let width = materialized.columns.len();
        let data = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|idx| row.get::<_, Option<String>>(idx))
                    .collect::<rusqlite::Result<Vec<_>>>()
            })
            .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
            .map_err(|e| query_error(&statement, e))?;

        let header = self
            .config
            .ignore_header
            .then(|| materialized.columns.clone());
        self.storage
            .write_file(&materialized.source, &DataFile::new(header, data), &self.format)?;

        log_info!(
            component = "session",
            event = "source_written",
            table = %table,
            path = ?materialized.source,
        );
        Ok(())
    }

    /// Drops the view and every owned table, then closes the connection.
    pub fn close(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        let drop_view = format!("DROP VIEW IF EXISTS {}", quote_ident(&self.view_name));
        if let Err(e) = conn.execute_batch(&drop_view) {
            log_warn!(component = "session", event = "drop_view_failed", view = %self.view_name, error = %e);
        }
        for table in self.tables.keys() {
            let drop_table = format!("DROP TABLE IF EXISTS {}", quote_ident(table));
            if let Err(e) = conn.execute_batch(&drop_table) {
                log_warn!(component = "session", event = "drop_table_failed", table = %table, error = %e);
            }
        }
        self.tables.clear();
        self.view_tables.clear();

        if let Err((_, e)) = conn.close() {
            log_warn!(component = "session", event = "close_failed", error = %e);
        }
        log_info!(component = "session", event = "session_closed", view = %self.view_name);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

pub(crate) fn query_error(statement: &str, source: rusqlite::Error) -> DatabaseError {
    log_error!(component = "session", event = "statement_failed", statement = %statement, error = %source);
    DatabaseError::Query {
        statement: statement.to_string(),
        source,
    }
}
