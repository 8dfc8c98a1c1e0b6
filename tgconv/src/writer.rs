//! SQLite session writers.
//!
//! A destination is never appended to: the full schema goes into a fresh
//! temporary file next to the destination, exactly one `sessions` row is
//! inserted, and the temporary file is renamed over the destination. If any
//! step fails the temporary file is dropped and the destination is untouched.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Transaction, params};

use crate::config::WriterConfig;
use crate::errors::ConvertError;
use crate::format::SessionFormat;
use crate::session::AuthSession;

/// Telethon `SQLiteSession` schema, version 7.
pub const TELETHON_SCHEMA: &str = "
    create table version (version integer primary key);
    create table sessions (
        dc_id integer primary key,
        server_address text,
        port integer,
        auth_key blob,
        takeout_id integer
    );
    create table entities (
        id integer primary key,
        hash integer not null,
        username text,
        phone integer,
        name text,
        date integer
    );
    create table sent_files (
        md5_digest blob,
        file_size integer,
        type integer,
        id integer,
        hash integer,
        primary key(md5_digest, file_size, type)
    );
    create table update_state (
        id integer primary key,
        pts integer,
        qts integer,
        date integer,
        seq integer
    );
";

/// Pyrogram `FileStorage` schema, version 3.
pub const PYROGRAM_SCHEMA: &str = "
    CREATE TABLE sessions
    (
        dc_id     INTEGER PRIMARY KEY,
        api_id    INTEGER,
        test_mode INTEGER,
        auth_key  BLOB,
        date      INTEGER NOT NULL,
        user_id   INTEGER,
        is_bot    INTEGER
    );

    CREATE TABLE peers
    (
        id             INTEGER PRIMARY KEY,
        access_hash    INTEGER,
        type           INTEGER NOT NULL,
        username       TEXT,
        phone_number   TEXT,
        last_update_on INTEGER NOT NULL DEFAULT (CAST(STRFTIME('%s', 'now') AS INTEGER))
    );

    CREATE TABLE version
    (
        number INTEGER PRIMARY KEY
    );

    CREATE INDEX idx_peers_id ON peers (id);
    CREATE INDEX idx_peers_username ON peers (username);
    CREATE INDEX idx_peers_phone_number ON peers (phone_number);

    CREATE TRIGGER trg_peers_last_update_on
        AFTER UPDATE
        ON peers
    BEGIN
        UPDATE peers
        SET last_update_on = CAST(STRFTIME('%s', 'now') AS INTEGER)
        WHERE id = NEW.id;
    END;
";

/// Write `session` to `path` as a fresh SQLite file of the given format.
///
/// The caller must have validated the session. Pyrogram rows take the user id
/// the record carries; the engine fills it in beforehand.
pub fn write_session_file(
    path: &Path,
    format: SessionFormat,
    session: &AuthSession,
    config: &WriterConfig,
) -> Result<(), ConvertError> {
    let fill: fn(&Transaction<'_>, &AuthSession, &WriterConfig) -> rusqlite::Result<()> = match format {
        SessionFormat::Telethon => fill_telethon,
        SessionFormat::Pyrogram => fill_pyrogram,
        other => {
            return Err(ConvertError::invalid(format!("{other} is not a file format")));
        }
    };

    let dir = parent_dir(path);
    let tmp = tempfile::Builder::new()
        .prefix(".tgconv-")
        .suffix(".session.tmp")
        .tempfile_in(&dir)
        .map_err(|e| ConvertError::write_failed(path, e))?;
    tracing::debug!("[writer] staging {format} session in {}", tmp.path().display());

    {
        let mut conn = Connection::open(tmp.path()).map_err(|e| ConvertError::write_failed(path, e))?;
        let tx = conn.transaction().map_err(|e| ConvertError::write_failed(path, e))?;
        fill(&tx, session, config).map_err(|e| ConvertError::write_failed(path, e))?;
        tx.commit().map_err(|e| ConvertError::write_failed(path, e))?;
        conn.close().map_err(|(_, e)| ConvertError::write_failed(path, e))?;
    }

    tmp.persist(path).map_err(|e| ConvertError::write_failed(path, e.error))?;
    tracing::info!("[writer] wrote {format} session (DC {}) to {}", session.dc_id(), path.display());
    Ok(())
}

fn fill_telethon(tx: &Transaction<'_>, s: &AuthSession, config: &WriterConfig) -> rusqlite::Result<()> {
    tx.execute_batch(TELETHON_SCHEMA)?;
    tx.execute("insert into version values (?1)", params![config.telethon_version])?;
    tx.execute(
        "insert or replace into sessions values (?1, ?2, ?3, ?4, ?5)",
        params![
            s.dc_id(),
            s.server_address(),
            s.port(),
            s.auth_key().as_bytes(),
            Option::<i64>::None,
        ],
    )?;
    Ok(())
}

fn fill_pyrogram(tx: &Transaction<'_>, s: &AuthSession, config: &WriterConfig) -> rusqlite::Result<()> {
    tx.execute_batch(PYROGRAM_SCHEMA)?;
    tx.execute("INSERT INTO version VALUES (?1)", params![config.pyrogram_version])?;
    tx.execute(
        "INSERT INTO sessions VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            s.dc_id(),
            s.api_id(),
            s.test_mode(),
            s.auth_key().as_bytes(),
            config.pyrogram_date,
            s.user_id(),
            s.is_bot(),
        ],
    )?;
    Ok(())
}

/// Directory the temp file goes in; it must share a filesystem with `path`
/// for the final rename to be atomic.
fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> AuthSession {
        AuthSession::builder(2, vec![0x11; 256])
            .api_id(Some(777))
            .user_id(Some(5))
            .build()
            .unwrap()
    }

    #[test]
    fn telethon_file_has_single_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.session");
        write_session_file(&path, SessionFormat::Telethon, &session(), &WriterConfig::default()).unwrap();

        let conn = Connection::open(&path).unwrap();
        let (dc, addr, port, key, takeout): (i64, String, i64, Vec<u8>, Option<i64>) = conn
            .query_row("select * from sessions", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?))
            })
            .unwrap();
        assert_eq!((dc, addr.as_str(), port), (2, "149.154.167.51", 443));
        assert_eq!(key, vec![0x11; 256]);
        assert_eq!(takeout, None);
        let version: i64 = conn.query_row("select version from version", [], |r| r.get(0)).unwrap();
        assert_eq!(version, 7);
        for table in ["entities", "sent_files", "update_state"] {
            let n: i64 = conn
                .query_row(&format!("select count(*) from {table}"), [], |r| r.get(0))
                .unwrap();
            assert_eq!(n, 0, "{table}");
        }
    }

    #[test]
    fn pyrogram_file_has_schema_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.session");
        write_session_file(&path, SessionFormat::Pyrogram, &session(), &WriterConfig::default()).unwrap();

        let conn = Connection::open(&path).unwrap();
        let row: (i64, Option<i64>, i64, i64, Option<i64>, i64) = conn
            .query_row("SELECT dc_id, api_id, test_mode, date, user_id, is_bot FROM sessions", [], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?))
            })
            .unwrap();
        assert_eq!(row, (2, Some(777), 0, 0, Some(5), 0));

        let mut names: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type IN ('index', 'trigger') ORDER BY name")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .map(Result::unwrap)
            .collect();
        names.sort();
        assert_eq!(
            names,
            ["idx_peers_id", "idx_peers_phone_number", "idx_peers_username", "trg_peers_last_update_on"]
        );
        let version: i64 = conn.query_row("SELECT number FROM version", [], |r| r.get(0)).unwrap();
        assert_eq!(version, 3);
    }

    #[test]
    fn overwrites_instead_of_appending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("o.session");
        std::fs::write(&path, b"garbage that is not sqlite").unwrap();
        write_session_file(&path, SessionFormat::Telethon, &session(), &WriterConfig::default()).unwrap();
        write_session_file(&path, SessionFormat::Telethon, &session(), &WriterConfig::default()).unwrap();

        let conn = Connection::open(&path).unwrap();
        let n: i64 = conn.query_row("select count(*) from sessions", [], |r| r.get(0)).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn failed_write_leaves_no_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("x.session");
        let err = write_session_file(&path, SessionFormat::Pyrogram, &session(), &WriterConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::DestinationWriteFailed { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn string_format_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.session");
        let err = write_session_file(&path, SessionFormat::PyrogramString, &session(), &WriterConfig::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidSession { .. }));
        assert!(!path.exists());
    }
}
