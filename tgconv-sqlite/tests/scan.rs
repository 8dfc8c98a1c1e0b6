use rusqlite::{params, Connection};
use tgconv_sqlite::{Database, ScanError, Value};

/// Build a database with rusqlite and return the raw file bytes.
fn build(setup: impl FnOnce(&Connection)) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.db");
    {
        let conn = Connection::open(&path).unwrap();
        setup(&conn);
    }
    std::fs::read(&path).unwrap()
}

fn telethon_like(conn: &Connection) {
    conn.execute_batch(
        "create table version (version integer primary key);
         create table sessions (dc_id integer primary key, server_address text,
                                port integer, auth_key blob, takeout_id integer);
         insert into version values (7);",
    )
    .unwrap();
    conn.execute(
        "insert into sessions values (?1, ?2, ?3, ?4, NULL)",
        params![2, "149.154.167.51", 443, vec![0u8; 256]],
    )
    .unwrap();
}

#[test]
fn reads_single_session_row() {
    let bytes = build(telethon_like);
    let db = Database::open(&bytes).unwrap();
    let rows: Vec<_> = db.scan("sessions").unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(rows.len(), 1);

    let row = &rows[0];
    // dc_id is an INTEGER PRIMARY KEY, stored as the rowid
    assert_eq!(row.get("dc_id"), Some(&Value::Integer(2)));
    assert_eq!(row.rowid(), 2);
    assert_eq!(row.get("server_address"), Some(&Value::Text("149.154.167.51".into())));
    assert_eq!(row.get("port"), Some(&Value::Integer(443)));
    assert_eq!(row.get("auth_key").and_then(Value::as_blob).map(<[u8]>::len), Some(256));
    assert_eq!(row.get("takeout_id"), Some(&Value::Null));
}

#[test]
fn lists_tables_with_columns() {
    let bytes = build(telethon_like);
    let db = Database::open(&bytes).unwrap();
    let tables = db.tables().unwrap();
    let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["version", "sessions"]);
    let sessions = db.table("SESSIONS").unwrap().unwrap();
    assert!(sessions.has_column("server_address"));
}

#[test]
fn missing_table_is_empty_not_error() {
    let bytes = build(telethon_like);
    let db = Database::open(&bytes).unwrap();
    assert_eq!(db.scan("peers").unwrap().count(), 0);
}

#[test]
fn not_a_database() {
    assert!(matches!(Database::open(b""), Err(ScanError::NotSqlite { .. })));
    let text = "hello, this is just a text file and not a session at all\n".repeat(4);
    assert!(matches!(Database::open(text.as_bytes()), Err(ScanError::NotSqlite { .. })));
}

#[test]
fn walks_multi_level_btree_in_rowid_order() {
    let bytes = build(|conn| {
        conn.execute_batch("PRAGMA page_size = 512; CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT);")
            .unwrap();
        let tx = conn.unchecked_transaction().unwrap();
        for i in 1..=2000i64 {
            tx.execute("INSERT INTO t (id, v) VALUES (?1, ?2)", params![i, format!("value-{i}")])
                .unwrap();
        }
        tx.commit().unwrap();
    });
    let db = Database::open(&bytes).unwrap();
    assert_eq!(db.header().page_size, 512);

    let ids: Vec<i64> = db
        .scan("t")
        .unwrap()
        .map(|r| r.unwrap().get("id").and_then(Value::as_integer).unwrap())
        .collect();
    assert_eq!(ids, (1..=2000).collect::<Vec<_>>());
}

#[test]
fn stops_early_without_touching_the_rest() {
    let bytes = build(|conn| {
        conn.execute_batch("CREATE TABLE t (v INTEGER);").unwrap();
        for i in 0..50 {
            conn.execute("INSERT INTO t VALUES (?1)", params![i]).unwrap();
        }
    });
    let db = Database::open(&bytes).unwrap();
    let first = db.scan("t").unwrap().next().unwrap().unwrap();
    assert_eq!(first.get("v"), Some(&Value::Integer(0)));
}

#[test]
fn follows_overflow_pages() {
    let big: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let expected = big.clone();
    let bytes = build(move |conn| {
        conn.execute_batch("PRAGMA page_size = 1024; CREATE TABLE blobs (id INTEGER PRIMARY KEY, data BLOB);")
            .unwrap();
        conn.execute("INSERT INTO blobs (data) VALUES (?1)", params![big]).unwrap();
    });
    let db = Database::open(&bytes).unwrap();
    let row = db.scan("blobs").unwrap().next().unwrap().unwrap();
    assert_eq!(row.get("data").and_then(Value::as_blob), Some(expected.as_slice()));
}

#[test]
fn pads_rows_written_before_alter_table() {
    let bytes = build(|conn| {
        conn.execute_batch(
            "CREATE TABLE sessions (dc_id INTEGER PRIMARY KEY, auth_key BLOB);
             INSERT INTO sessions VALUES (4, x'00');
             ALTER TABLE sessions ADD COLUMN takeout_id INTEGER;",
        )
        .unwrap();
    });
    let db = Database::open(&bytes).unwrap();
    let row = db.scan("sessions").unwrap().next().unwrap().unwrap();
    assert_eq!(row.columns(), ["dc_id", "auth_key", "takeout_id"]);
    assert_eq!(row.get("takeout_id"), Some(&Value::Null));
    assert_eq!(row.get("dc_id"), Some(&Value::Integer(4)));
}

#[test]
fn all_storage_classes() {
    let bytes = build(|conn| {
        conn.execute_batch("CREATE TABLE t (a, b, c, d, e, f, g);").unwrap();
        conn.execute(
            "INSERT INTO t VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![-1i64, 1i64 << 40, i64::MIN, 2.5f64, "txt", vec![9u8, 8, 7], Option::<i64>::None],
        )
        .unwrap();
    });
    let db = Database::open(&bytes).unwrap();
    let row = db.scan("t").unwrap().next().unwrap().unwrap();
    assert_eq!(row.values(), &[
        Value::Integer(-1),
        Value::Integer(1 << 40),
        Value::Integer(i64::MIN),
        Value::Real(2.5),
        Value::Text("txt".into()),
        Value::Blob(vec![9, 8, 7]),
        Value::Null,
    ]);
}

#[test]
fn utf16_database() {
    let bytes = build(|conn| {
        conn.execute_batch(
            "PRAGMA encoding = 'UTF-16le';
             CREATE TABLE sessions (dc_id INTEGER PRIMARY KEY, server_address TEXT);
             INSERT INTO sessions VALUES (5, '91.108.56.130');",
        )
        .unwrap();
    });
    let db = Database::open(&bytes).unwrap();
    let row = db.scan("sessions").unwrap().next().unwrap().unwrap();
    assert_eq!(row.get("server_address").and_then(Value::as_text), Some("91.108.56.130"));
}

#[test]
fn reads_while_another_connection_holds_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("busy.session");
    let conn = Connection::open(&path).unwrap();
    telethon_like(&conn);
    // Keep a write transaction open on the file while scanning it.
    conn.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let db = Database::open(&bytes).unwrap();
    assert_eq!(db.scan("sessions").unwrap().count(), 1);

    conn.execute_batch("ROLLBACK;").unwrap();
}

#[test]
fn truncated_file_reports_corruption() {
    let bytes = build(|conn| {
        conn.execute_batch("PRAGMA page_size = 512; CREATE TABLE t (v TEXT);").unwrap();
        for i in 0..200 {
            conn.execute("INSERT INTO t VALUES (?1)", params![format!("row {i} padding padding")]).unwrap();
        }
    });
    let cut = &bytes[..512 * 2];
    let db = Database::open(cut).unwrap();
    let result: Result<Vec<_>, _> = db.scan("t").and_then(|rows| rows.collect());
    assert!(result.is_err());
}

#[test]
fn unreadable_schema_of_another_table_does_not_hide_sessions() {
    let mut bytes = build(|conn| {
        telethon_like(conn);
        conn.execute_batch("CREATE TABLE notes (a);").unwrap();
    });
    // Drop the parentheses so the statement has no column list left.
    let sql = b"CREATE TABLE notes (a)";
    let at = bytes.windows(sql.len()).position(|w| w == sql).unwrap();
    bytes[at + 19] = b' ';
    bytes[at + 21] = b' ';

    let db = Database::open(&bytes).unwrap();
    assert_eq!(db.scan("sessions").unwrap().count(), 1);
    let names: Vec<_> = db.tables().unwrap().into_iter().map(|t| t.name).collect();
    assert_eq!(names, ["version", "sessions"]);
    assert!(matches!(db.table("notes"), Err(ScanError::Corrupt { .. })));
}
