//! Host-facing operations. Each call opens its own [`Session`], does its work and tears the
//! session down before returning, whether the work succeeded or not.

use crate::config::CsvDirConfig;
use crate::engine::{IdGenerator, Row, Session, UuidIds};
use crate::mapping::{RowMapper, UID};
use crate::observability::{log_debug, log_info, log_warn};
use crate::query::filter::{Filter, FilterCompiler};
use crate::query::statement::{delete_statement, insert_statement, update_statement};
use crate::storage::{Columns, SyncToken};
use crate::{Attribute, DatabaseError, Record, Result, Uid};

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Attributes to return. `None` returns the configured fields, or every column when no
    /// fields are configured.
    pub attributes_to_get: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDeltaKind {
    CreateOrUpdate,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncDelta {
    pub token: SyncToken,
    pub kind: SyncDeltaKind,
    pub record: Record,
}

pub struct CsvDirConnector<G: IdGenerator = UuidIds> {
    config: CsvDirConfig,
    ids: G,
}

impl CsvDirConnector<UuidIds> {
    pub fn new(config: CsvDirConfig) -> Result<Self> {
        Self::with_id_generator(config, UuidIds)
    }
}

impl<G: IdGenerator> CsvDirConnector<G> {
    pub fn with_id_generator(config: CsvDirConfig, ids: G) -> Result<Self> {
        config.validate()?;
        Ok(CsvDirConnector { config, ids })
    }

    pub fn config(&self) -> &CsvDirConfig {
        &self.config
    }

    /// Runs `work` inside a fresh session which is closed on every exit path.
    fn with_session<T, F>(&self, operation: &str, work: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let mut session = Session::open(&self.config, &self.ids)?;
        let result = work(&mut session);
        session.close();

        if let Err(e) = &result {
            log_warn!(component = "connector", event = "operation_failed", operation = operation, error = %e);
        }
        result
    }

    fn projection(&self, options: &SearchOptions) -> Columns {
        match &options.attributes_to_get {
            None if !self.config.fields.is_empty() => Columns::Selection(self.config.fields.clone()),
            selection => Columns::from(selection.clone()),
        }
    }

    fn is_deleted(&self, row: &Row) -> bool {
        self.config
            .delete_column_name
            .as_deref()
            .and_then(|column| row.get(column))
            .is_some_and(|marker| marker.eq_ignore_ascii_case("true"))
    }

    /// Delivers every live record matching `filter` to `handler` until it returns `false`.
    ///
    /// Filters the engine cannot evaluate in full are re-checked in memory against each row's
    /// stored values.
    pub fn search<F>(&self, filter: Option<&Filter>, options: &SearchOptions, mut handler: F) -> Result<()>
    where
        F: FnMut(Record) -> bool,
    {
        let compiler = FilterCompiler::new(&self.config);
        let predicate = filter.and_then(|filter| compiler.compile(filter, false));
        let residual = filter.filter(|filter| !compiler.is_exact(filter));
        let mapper = RowMapper::new(&self.config);
        let columns = self.projection(options);

        log_debug!(
            component = "connector",
            event = "search",
            predicate = ?predicate.as_ref().map(|p| p.clause()),
            in_memory = residual.is_some(),
        );

        self.with_session("search", |session| {
            session.materialize_all()?;
            session.query(predicate.as_ref(), |row| {
                if self.is_deleted(&row) {
                    return Ok(true);
                }
                if let Some(filter) = residual {
                    if !filter.accepts(&mapper.to_stored_record(&row)) {
                        return Ok(true);
                    }
                }
                Ok(handler(mapper.to_record(&row, &columns)))
            })
        })
    }

    pub fn get(&self, uid: &Uid, options: &SearchOptions) -> Result<Option<Record>> {
        let filter = Filter::Equals(Attribute::new(UID, uid.as_str()));
        let mut found = None;
        self.search(Some(&filter), options, |record| {
            found = Some(record);
            false
        })?;
        Ok(found)
    }

    /// Inserts a new record and returns its identifier.
    pub fn create(&self, attributes: &[Attribute]) -> Result<Uid> {
        let mapper = RowMapper::new(&self.config);
        let columns = mapper.to_attribute_map(attributes)?;
        let uid = mapper.uid_from_columns(&columns)?;

        self.with_session("create", |session| {
            session.materialize_all()?;
            if self.exists(session, &uid)? {
                return Err(DatabaseError::AlreadyExists(uid.0.clone()));
            }

            let table = session.materialize_for_insert()?;
            session.execute(&table, &insert_statement(&columns, &table))?;
            log_info!(component = "connector", event = "created", uid = %uid);
            Ok(uid.clone())
        })
    }

    /// Sets the non-key attributes of the record in every source file holding it.
    pub fn update(&self, uid: &Uid, attributes: &[Attribute]) -> Result<Uid> {
        let mapper = RowMapper::new(&self.config);
        mapper.check_uid(uid)?;
        let columns = mapper.to_attribute_map(attributes)?;

        self.with_session("update", |session| {
            session.materialize_all()?;
            if !self.exists(session, uid)? {
                return Err(DatabaseError::NotFound(uid.0.clone()));
            }

            let mut affected = 0;
            for file in session.storage().all_files()? {
                let table = session.materialize_for_mutation(&file.path)?;
                let Some(statement) = update_statement(
                    &columns,
                    uid.as_str(),
                    &self.config.key_separator,
                    &self.config.key_column_names,
                    &table,
                ) else {
                    log_debug!(component = "connector", event = "nothing_to_update", uid = %uid);
                    break;
                };
                affected += session.execute(&table, &statement)?;
            }

            log_info!(component = "connector", event = "updated", uid = %uid, rows = affected);
            Ok(uid.clone())
        })
    }

    pub fn delete(&self, uid: &Uid) -> Result<()> {
        let mapper = RowMapper::new(&self.config);
        mapper.check_uid(uid)?;

        self.with_session("delete", |session| {
            session.materialize_all()?;
            if !self.exists(session, uid)? {
                return Err(DatabaseError::NotFound(uid.0.clone()));
            }

            let mut affected = 0;
            for file in session.storage().all_files()? {
                let table = session.materialize_for_mutation(&file.path)?;
                let statement = delete_statement(
                    uid.as_str(),
                    &self.config.key_separator,
                    &self.config.key_column_names,
                    &table,
                );
                affected += session.execute(&table, &statement)?;
            }

            log_info!(component = "connector", event = "deleted", uid = %uid, rows = affected);
            Ok(())
        })
    }

    /// Delivers every row of the files modified after `token` as a delta and returns the
    /// token to resume from.
    pub fn sync<F>(&self, token: SyncToken, mut handler: F) -> Result<SyncToken>
    where
        F: FnMut(SyncDelta) -> bool,
    {
        let mapper = RowMapper::new(&self.config);
        let columns = self.projection(&SearchOptions::default());

        self.with_session("sync", |session| {
            let latest = session.storage().latest_token()?.max(token);
            let tables = session.materialize_for_sync(token)?;
            log_debug!(component = "connector", event = "sync", tables = tables.len(), token = latest.0);

            session.query(None, |row| {
                let kind = if self.is_deleted(&row) {
                    SyncDeltaKind::Delete
                } else {
                    SyncDeltaKind::CreateOrUpdate
                };
                Ok(handler(SyncDelta {
                    token: latest,
                    kind,
                    record: mapper.to_record(&row, &columns),
                }))
            })?;
            Ok(latest)
        })
    }

    pub fn latest_sync_token(&self) -> Result<SyncToken> {
        self.with_session("latest_sync_token", |session| session.storage().latest_token())
    }

    /// Case-sensitive lookup of `uid` over the loaded tables, marked rows included.
    fn exists(&self, session: &Session, uid: &Uid) -> Result<bool> {
        let filter = Filter::Equals(Attribute::new(UID, uid.as_str()));
        let predicate = FilterCompiler::new(&self.config).compile(&filter, false);

        let mut found = false;
        session.query(predicate.as_ref(), |_| {
            found = true;
            Ok(false)
        })?;
        Ok(found)
    }
}

#[cfg(test)]
mod private_tests_connector;
