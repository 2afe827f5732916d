use crate::connector::{CsvDirConnector, SearchOptions, SyncDeltaKind};
use crate::mapping::{ENABLE, NAME, PASSWORD, UID};
use crate::storage::SyncToken;
use crate::{Attribute, CsvDirConfig, DatabaseError, Filter, GuardedString, Record, Result, Uid, Value};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn accounts_config(dir: &Path) -> CsvDirConfig {
    let mut config = CsvDirConfig::new(dir, r".*\.csv", vec!["accountid".into()]);
    config.fields = vec!["accountid".into(), "mail".into()];
    config
}

fn search_all(connector: &CsvDirConnector, filter: Option<&Filter>) -> Result<Vec<Record>> {
    let mut records = vec![];
    connector.search(filter, &SearchOptions::default(), |record| {
        records.push(record);
        true
    })?;
    Ok(records)
}

fn mail_of(record: &Record) -> Vec<String> {
    record.get("mail").map(Value::values).unwrap_or_default()
}

fn leftovers(db: &Path) -> Vec<String> {
    let conn = Connection::open(db).unwrap();
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type IN ('table', 'view')")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<Vec<String>>>()
        .unwrap()
}

#[test]
fn test_new_validates() {
    let dir = TempDir::new().unwrap();
    let config = CsvDirConfig::new(dir.path(), r".*\.csv", vec![]);
    assert!(matches!(
        CsvDirConnector::new(config),
        Err(DatabaseError::Configuration(_))
    ));
}

#[test]
fn test_create_then_search() -> Result<()> {
    let dir = TempDir::new()?;
    let connector = CsvDirConnector::new(accounts_config(dir.path()))?;

    let uid = connector.create(&[
        Attribute::new("accountid", "jdoe"),
        Attribute::new("mail", "jdoe@x.com"),
    ])?;
    assert_eq!(uid, Uid::from("jdoe"));
    assert_eq!(
        fs::read_to_string(dir.path().join("accounts.csv"))?,
        "accountid,mail\njdoe,jdoe@x.com\n"
    );

    connector.create(&[Attribute::new(NAME, "mrossi"), Attribute::new("mail", "mr@y.org")])?;

    let records = search_all(&connector, Some(&Filter::Equals(Attribute::new("accountid", "jdoe"))))?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].uid, uid);
    assert_eq!(records[0].get(NAME), Some(&Value::Text("jdoe".into())));
    assert_eq!(mail_of(&records[0]), vec!["jdoe@x.com".to_string()]);

    assert!(matches!(
        connector.create(&[Attribute::new("accountid", "jdoe")]),
        Err(DatabaseError::AlreadyExists(uid)) if uid == "jdoe"
    ));
    assert_eq!(search_all(&connector, None)?.len(), 2);

    Ok(())
}

#[test]
fn test_update() -> Result<()> {
    let dir = TempDir::new()?;
    let connector = CsvDirConnector::new(accounts_config(dir.path()))?;
    connector.create(&[Attribute::new("accountid", "jdoe"), Attribute::new("mail", "jdoe@x.com")])?;

    let uid = connector.update(&Uid::from("jdoe"), &[Attribute::new("mail", "new@x.com")])?;
    assert_eq!(uid, Uid::from("jdoe"));

    let record = connector.get(&uid, &SearchOptions::default())?.unwrap();
    assert_eq!(mail_of(&record), vec!["new@x.com".to_string()]);
    assert_eq!(
        fs::read_to_string(dir.path().join("accounts.csv"))?,
        "accountid,mail\njdoe,new@x.com\n"
    );

    assert!(matches!(
        connector.update(&Uid::from("ghost"), &[Attribute::new("mail", "g@x.com")]),
        Err(DatabaseError::NotFound(_))
    ));
    // only key attributes: nothing to set
    connector.update(&uid, &[Attribute::new("accountid", "jdoe")])?;

    Ok(())
}

#[test]
fn test_update_reaches_every_file() -> Result<()> {
    let dir = TempDir::new()?;
    fs::write(dir.path().join("a.csv"), "accountid,mail\njdoe,old@x.com\n")?;
    fs::write(dir.path().join("b.csv"), "accountid,mail\nbwayne,bw@y.org\njdoe,old@x.com\n")?;
    let connector = CsvDirConnector::new(accounts_config(dir.path()))?;

    connector.update(&Uid::from("jdoe"), &[Attribute::new("mail", "new@x.com")])?;

    assert_eq!(
        fs::read_to_string(dir.path().join("a.csv"))?,
        "accountid,mail\njdoe,new@x.com\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("b.csv"))?,
        "accountid,mail\nbwayne,bw@y.org\njdoe,new@x.com\n"
    );

    connector.delete(&Uid::from("jdoe"))?;
    assert_eq!(fs::read_to_string(dir.path().join("a.csv"))?, "accountid,mail\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("b.csv"))?,
        "accountid,mail\nbwayne,bw@y.org\n"
    );

    Ok(())
}

#[test]
fn test_delete_missing_leaves_nothing_behind() -> Result<()> {
    let dir = TempDir::new()?;
    let db_dir = TempDir::new()?;
    let db = db_dir.path().join("engine.db");
    fs::write(dir.path().join("accounts.csv"), "accountid,mail\njdoe,jdoe@x.com\n")?;

    let mut config = accounts_config(dir.path());
    config.database_path = Some(db.clone());
    let connector = CsvDirConnector::new(config)?;

    assert!(matches!(
        connector.delete(&Uid::from("ghost")),
        Err(DatabaseError::NotFound(uid)) if uid == "ghost"
    ));
    assert!(leftovers(&db).is_empty());
    assert_eq!(
        fs::read_to_string(dir.path().join("accounts.csv"))?,
        "accountid,mail\njdoe,jdoe@x.com\n"
    );

    connector.delete(&Uid::from("jdoe"))?;
    assert!(leftovers(&db).is_empty());
    assert!(search_all(&connector, None)?.is_empty());

    Ok(())
}

#[test]
fn test_search_stops_early() -> Result<()> {
    let dir = TempDir::new()?;
    fs::write(
        dir.path().join("accounts.csv"),
        "accountid,mail\na,a@x.com\nb,b@x.com\nc,c@x.com\n",
    )?;
    let connector = CsvDirConnector::new(accounts_config(dir.path()))?;

    let mut seen = vec![];
    connector.search(None, &SearchOptions::default(), |record| {
        seen.push(record.uid);
        false
    })?;
    assert_eq!(seen, vec![Uid::from("a")]);

    Ok(())
}

#[test]
fn test_search_projection() -> Result<()> {
    let dir = TempDir::new()?;
    fs::write(
        dir.path().join("accounts.csv"),
        "accountid,mail,phone\njdoe,jdoe@x.com,555\n",
    )?;
    let mut config = accounts_config(dir.path());
    config.fields.clear();
    let connector = CsvDirConnector::new(config)?;

    let options = SearchOptions {
        attributes_to_get: Some(vec!["phone".into()]),
    };
    let record = connector.get(&Uid::from("jdoe"), &options)?.unwrap();
    let names: Vec<_> = record.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec![NAME, "phone"]);

    let record = connector.get(&Uid::from("jdoe"), &SearchOptions::default())?.unwrap();
    assert_eq!(record.len(), 4);

    Ok(())
}

#[test]
fn test_uncompilable_filter_falls_back_to_memory() -> Result<()> {
    let dir = TempDir::new()?;
    fs::write(
        dir.path().join("accounts.csv"),
        "accountid,mail\njdoe,jdoe@x.com\nbwayne,bw@y.org\n",
    )?;
    let connector = CsvDirConnector::new(accounts_config(dir.path()))?;
    let photo = Filter::Equals(Attribute::new("photo", Value::Binary(vec![0xca, 0xfe])));

    let filter = Filter::or(Filter::Contains(Attribute::new("mail", "@x.")), photo.clone());
    let records = search_all(&connector, Some(&filter))?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].uid, Uid::from("jdoe"));

    let filter = Filter::and(Filter::Equals(Attribute::new(UID, "bwayne")), photo);
    assert!(search_all(&connector, Some(&filter))?.is_empty());

    Ok(())
}

#[test]
fn test_multivalue_attributes() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = accounts_config(dir.path());
    config.multivalue_separator = Some("|".into());
    let connector = CsvDirConnector::new(config)?;

    let uid = connector.create(&[
        Attribute::new("accountid", "jdoe"),
        Attribute::new("mail", vec!["a@x.com".to_string(), "b@x.com".to_string()]),
    ])?;
    assert_eq!(
        fs::read_to_string(dir.path().join("accounts.csv"))?,
        "accountid,mail\njdoe,a@x.com|b@x.com\n"
    );
    let record = connector.get(&uid, &SearchOptions::default())?.unwrap();
    assert_eq!(mail_of(&record), vec!["a@x.com".to_string(), "b@x.com".to_string()]);

    connector.update(&uid, &[Attribute::new("mail", vec!["c@x.com".to_string()])])?;
    let record = connector.get(&uid, &SearchOptions::default())?.unwrap();
    assert_eq!(mail_of(&record), vec!["c@x.com".to_string()]);

    connector.update(&uid, &[Attribute::null("mail")])?;
    let record = connector.get(&uid, &SearchOptions::default())?.unwrap();
    assert!(mail_of(&record).is_empty());

    Ok(())
}

#[test]
fn test_composite_key() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = CsvDirConfig::new(dir.path(), r".*\.csv", vec!["code".into(), "accountid".into()]);
    config.fields = vec!["code".into(), "accountid".into(), "mail".into()];
    config.key_separator = String::from(";");
    let connector = CsvDirConnector::new(config)?;

    let uid = connector.create(&[
        Attribute::new("code", "____jpc4323435"),
        Attribute::new("accountid", "jPenelope"),
        Attribute::new("mail", "jp@x.com"),
    ])?;
    assert_eq!(uid, Uid::from("____jpc4323435;jPenelope"));
    assert!(connector.get(&uid, &SearchOptions::default())?.is_some());

    assert!(matches!(
        connector.update(&Uid::from("____jpc4323435,jPenelo"), &[Attribute::new("mail", "m")]),
        Err(DatabaseError::InvalidIdentifier { .. })
    ));
    assert!(matches!(
        connector.create(&[Attribute::new("code", "a;b"), Attribute::new("accountid", "x")]),
        Err(DatabaseError::InvalidIdentifier { .. })
    ));

    Ok(())
}

#[test]
fn test_password_and_status() -> Result<()> {
    let dir = TempDir::new()?;
    let mut config = accounts_config(dir.path());
    config.fields = vec!["accountid".into(), "password".into(), "status".into()];
    config.password_column_name = Some("password".into());
    config.status_column = Some("status".into());
    config.enabled_status_value = "active".into();
    config.disabled_status_value = "inactive".into();
    config.default_status_value = "active".into();
    let connector = CsvDirConnector::new(config)?;

    let uid = connector.create(&[
        Attribute::new("accountid", "jdoe"),
        Attribute::new(PASSWORD, Value::Secret(GuardedString::new("s3cret"))),
    ])?;
    assert_eq!(
        fs::read_to_string(dir.path().join("accounts.csv"))?,
        "accountid,password,status\njdoe,s3cret,active\n"
    );

    let record = connector.get(&uid, &SearchOptions::default())?.unwrap();
    assert_eq!(record.get(ENABLE), Some(&Value::Bool(true)));
    match record.get(PASSWORD) {
        Some(Value::Secret(secret)) => assert_eq!(&*secret.reveal(), "s3cret"),
        other => panic!("expected a secret, got {other:?}"),
    }

    connector.update(&uid, &[Attribute::new(ENABLE, false)])?;
    let disabled = search_all(&connector, Some(&Filter::Equals(Attribute::new(ENABLE, false))))?;
    assert_eq!(disabled.len(), 1);
    assert_eq!(disabled[0].get(ENABLE), Some(&Value::Bool(false)));

    Ok(())
}

#[test]
fn test_delete_marker_and_sync() -> Result<()> {
    let dir = TempDir::new()?;
    fs::write(
        dir.path().join("accounts.csv"),
        "accountid,mail,deleted\njdoe,j@x.com,\nold,o@x.com,TRUE\n",
    )?;
    let mut config = CsvDirConfig::new(dir.path(), r".*\.csv", vec!["accountid".into()]);
    config.delete_column_name = Some("deleted".into());
    let connector = CsvDirConnector::new(config)?;

    let live = search_all(&connector, None)?;
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].uid, Uid::from("jdoe"));

    let mut deltas = vec![];
    let token = connector.sync(SyncToken::default(), |delta| {
        deltas.push((delta.record.uid, delta.kind));
        true
    })?;
    assert_eq!(
        deltas,
        vec![
            (Uid::from("jdoe"), SyncDeltaKind::CreateOrUpdate),
            (Uid::from("old"), SyncDeltaKind::Delete),
        ]
    );
    assert_eq!(token, connector.latest_sync_token()?);

    let mut again = 0;
    let unchanged = connector.sync(token, |_| {
        again += 1;
        true
    })?;
    assert_eq!(again, 0);
    assert_eq!(unchanged, token);

    Ok(())
}

#[test]
fn test_unknown_attribute_is_query_error() -> Result<()> {
    let dir = TempDir::new()?;
    fs::write(
        dir.path().join("accounts.csv"),
        "accountid,mail\njdoe,jdoe@x.com\nbwayne,bw@y.org\n",
    )?;
    let connector = CsvDirConnector::new(accounts_config(dir.path()))?;

    let filter = Filter::Equals(Attribute::new("nosuch", "nosuch"));
    assert!(matches!(
        search_all(&connector, Some(&filter)),
        Err(DatabaseError::Query { .. })
    ));

    Ok(())
}

#[test]
fn test_update_ignores_key_in_any_case() -> Result<()> {
    let dir = TempDir::new()?;
    fs::write(dir.path().join("accounts.csv"), "accountid,mail\njdoe,jdoe@x.com\n")?;
    let connector = CsvDirConnector::new(accounts_config(dir.path()))?;

    connector.update(
        &Uid::from("jdoe"),
        &[Attribute::new("AccountId", "evil"), Attribute::new("mail", "new@x.com")],
    )?;
    assert_eq!(
        fs::read_to_string(dir.path().join("accounts.csv"))?,
        "accountid,mail\njdoe,new@x.com\n"
    );

    connector.update(&Uid::from("jdoe"), &[Attribute::new("ACCOUNTID", "evil")])?;
    assert!(connector.get(&Uid::from("jdoe"), &SearchOptions::default())?.is_some());
    assert!(connector.get(&Uid::from("evil"), &SearchOptions::default())?.is_none());

    Ok(())
}

#[test]
fn test_blank_status_filters_as_default() -> Result<()> {
    let dir = TempDir::new()?;
    fs::write(
        dir.path().join("accounts.csv"),
        "accountid,mail,status\njdoe,j@x.com,\nbwayne,b@x.com,inactive\n",
    )?;
    let mut config = accounts_config(dir.path());
    config.fields = vec!["accountid".into(), "mail".into(), "status".into()];
    config.status_column = Some("status".into());
    config.enabled_status_value = "active".into();
    config.disabled_status_value = "inactive".into();
    config.default_status_value = "active".into();
    let connector = CsvDirConnector::new(config)?;
    let photo = Filter::Equals(Attribute::new("photo", Value::Binary(vec![0])));

    for wanted in [Value::Bool(true), Value::Text("true".into()), Value::Text("TRUE".into())] {
        let filter = Filter::Equals(Attribute::new(ENABLE, wanted));
        let records = search_all(&connector, Some(&filter))?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uid, Uid::from("jdoe"));

        let in_memory = search_all(&connector, Some(&Filter::or(filter, photo.clone())))?;
        assert_eq!(in_memory.len(), 1);
        assert_eq!(in_memory[0].uid, Uid::from("jdoe"));
    }

    let records = search_all(&connector, Some(&Filter::not(Filter::Equals(Attribute::new(ENABLE, true)))))?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].uid, Uid::from("bwayne"));

    assert!(search_all(&connector, Some(&Filter::Equals(Attribute::null(ENABLE))))?.is_empty());

    Ok(())
}

#[test]
fn test_in_memory_filter_matches_engine() -> Result<()> {
    let dir = TempDir::new()?;
    fs::write(
        dir.path().join("accounts.csv"),
        "accountid,mail,phone\njdoe,a@x.com|b@x.com,\nbwayne,bw@y.org,555\n",
    )?;
    let mut config = accounts_config(dir.path());
    config.fields = vec!["accountid".into(), "mail".into(), "phone".into()];
    config.multivalue_separator = Some("|".into());
    let connector = CsvDirConnector::new(config)?;
    let photo = Filter::Equals(Attribute::new("photo", Value::Binary(vec![0])));

    let uids = |filter: Filter| -> Result<Vec<Uid>> {
        let engine = search_all(&connector, Some(&filter))?;
        let in_memory = search_all(&connector, Some(&Filter::or(filter, photo.clone())))?;
        let engine: Vec<Uid> = engine.into_iter().map(|record| record.uid).collect();
        let in_memory: Vec<Uid> = in_memory.into_iter().map(|record| record.uid).collect();
        assert_eq!(engine, in_memory);
        Ok(engine)
    };

    assert!(uids(Filter::Equals(Attribute::new("mail", "b@x.com")))?.is_empty());
    assert_eq!(
        uids(Filter::Equals(Attribute::new("mail", "a@x.com|b@x.com")))?,
        vec![Uid::from("jdoe")]
    );
    assert_eq!(
        uids(Filter::not(Filter::Equals(Attribute::new("phone", "555"))))?,
        Vec::<Uid>::new()
    );
    assert_eq!(
        uids(Filter::Equals(Attribute::null("phone")))?,
        vec![Uid::from("jdoe")]
    );

    Ok(())
}
