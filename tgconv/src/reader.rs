//! Session readers for the Telethon and Pyrogram `sessions` tables.
//!
//! Each schema has a typed row decoder that names the columns it needs and the
//! storage class it expects for each. A cell of the wrong type fails the read
//! instead of being coerced.
//!
//! Auto-detection walks [`CANDIDATES`] in order: a candidate is tried only if
//! its schema matcher accepts the table, and a reader that finds no usable row
//! hands over to the next candidate.

use tgconv_sqlite::{Database, Row, Rows, TableSchema, Value};

use crate::errors::ConvertError;
use crate::format::SessionFormat;
use crate::session::{ApiCredentials, AuthSession};

/// Table both libraries keep their session in.
pub const SESSIONS_TABLE: &str = "sessions";

struct Candidate {
    format:  SessionFormat,
    matches: fn(&TableSchema) -> bool,
    read:    fn(Rows<'_>) -> Result<AuthSession, ConvertError>,
}

/// Detection order. Telethon goes first: its matcher also requires
/// `server_address`, so a Pyrogram table can never be mistaken for it.
const CANDIDATES: [Candidate; 2] = [
    Candidate { format: SessionFormat::Telethon, matches: telethon_matches, read: read_telethon },
    Candidate { format: SessionFormat::Pyrogram, matches: pyrogram_matches, read: read_pyrogram },
];

const TELETHON_COLUMNS: [&str; 4] = ["dc_id", "server_address", "port", "auth_key"];
const PYROGRAM_COLUMNS: [&str; 2] = ["dc_id", "auth_key"];

fn telethon_matches(table: &TableSchema) -> bool {
    TELETHON_COLUMNS.iter().all(|c| table.has_column(c))
}

fn pyrogram_matches(table: &TableSchema) -> bool {
    PYROGRAM_COLUMNS.iter().all(|c| table.has_column(c))
}

/// Read the session out of a scanned database.
///
/// With `format` set only that schema is tried; with `None` the schemas are
/// auto-detected. Returns the format that produced the session.
pub fn read_session(
    db: &Database<'_>,
    format: Option<SessionFormat>,
    credentials: Option<&ApiCredentials>,
) -> Result<(SessionFormat, AuthSession), ConvertError> {
    let Some(table) = db.table(SESSIONS_TABLE)? else {
        return Err(ConvertError::no_usable(format!("no `{SESSIONS_TABLE}` table")));
    };

    let mut tried = Vec::new();
    for candidate in CANDIDATES.iter().filter(|c| format.is_none_or(|f| f == c.format)) {
        if !(candidate.matches)(&table) {
            tracing::debug!("[reader] `{SESSIONS_TABLE}` does not look like {}", candidate.format);
            tried.push(candidate.format);
            continue;
        }
        match (candidate.read)(db.rows(&table)?) {
            Ok(session) => {
                tracing::debug!("[reader] read {} session on DC {}", candidate.format, session.dc_id());
                let session = match credentials {
                    Some(c) => session.with_credentials(c),
                    None => session,
                };
                return Ok((candidate.format, session));
            }
            Err(e) if e.is_no_usable_session() => {
                tracing::debug!("[reader] {} reader: {e}", candidate.format);
                tried.push(candidate.format);
            }
            Err(e) => return Err(e),
        }
    }

    if let Some(f) = format.filter(|f| !f.is_file()) {
        return Err(ConvertError::no_usable(format!("{f} is not a file format")));
    }
    let tried: Vec<_> = tried.iter().map(|f| f.name()).collect();
    Err(ConvertError::no_usable(format!(
        "no row with an auth key in a {} `{SESSIONS_TABLE}` table (columns: {})",
        tried.join(" or "),
        table.column_names().collect::<Vec<_>>().join(", "),
    )))
}

// ─── Telethon ─────────────────────────────────────────────────────────────────

/// `sessions (dc_id integer primary key, server_address text, port integer,
/// auth_key blob, takeout_id integer)`
struct TelethonRow {
    dc_id:          i64,
    server_address: Option<String>,
    port:           Option<i64>,
    auth_key:       Vec<u8>,
}

impl TelethonRow {
    fn decode(row: &Row, auth_key: Vec<u8>) -> Result<Self, ConvertError> {
        Ok(Self {
            dc_id:          dc_id(row)?,
            server_address: opt_text(row, "server_address")?,
            port:           opt_integer(row, "port")?,
            auth_key,
        })
    }

    fn into_session(self) -> Result<AuthSession, ConvertError> {
        let mut b = AuthSession::builder(self.dc_id, self.auth_key);
        if let Some(addr) = self.server_address.filter(|a| !a.is_empty()) {
            b = b.server_address(addr);
        }
        if let Some(port) = self.port {
            let port = u16::try_from(port)
                .map_err(|_| ConvertError::invalid(format!("port {port} out of range")))?;
            b = b.port(port);
        }
        b.build()
    }
}

fn read_telethon(rows: Rows<'_>) -> Result<AuthSession, ConvertError> {
    first_keyed_row(rows, |row, key| TelethonRow::decode(row, key)?.into_session())
}

// ─── Pyrogram ─────────────────────────────────────────────────────────────────

/// `sessions (dc_id INTEGER PRIMARY KEY, api_id INTEGER, test_mode INTEGER,
/// auth_key BLOB, date INTEGER NOT NULL, user_id INTEGER, is_bot INTEGER)`
struct PyrogramRow {
    dc_id:     i64,
    api_id:    Option<i64>,
    test_mode: Option<bool>,
    auth_key:  Vec<u8>,
    user_id:   Option<i64>,
    is_bot:    Option<bool>,
}

impl PyrogramRow {
    fn decode(row: &Row, auth_key: Vec<u8>) -> Result<Self, ConvertError> {
        Ok(Self {
            dc_id:     dc_id(row)?,
            api_id:    opt_integer(row, "api_id")?,
            test_mode: opt_bool(row, "test_mode")?,
            auth_key,
            user_id:   opt_integer(row, "user_id")?,
            is_bot:    opt_bool(row, "is_bot")?,
        })
    }

    fn into_session(self) -> Result<AuthSession, ConvertError> {
        // Pyrogram stores no endpoint, so the DC must be one we can map.
        crate::dc::endpoint_for(self.dc_id)?;
        let api_id = self
            .api_id
            .map(|id| {
                i32::try_from(id).map_err(|_| ConvertError::invalid(format!("api_id {id} out of range")))
            })
            .transpose()?;
        AuthSession::builder(self.dc_id, self.auth_key)
            .api_id(api_id)
            .user_id(self.user_id)
            .test_mode(self.test_mode.unwrap_or(false))
            .is_bot(self.is_bot.unwrap_or(false))
            .build()
    }
}

fn read_pyrogram(rows: Rows<'_>) -> Result<AuthSession, ConvertError> {
    first_keyed_row(rows, |row, key| PyrogramRow::decode(row, key)?.into_session())
}

// ─── Row helpers ──────────────────────────────────────────────────────────────

/// Apply `decode` to the first row whose `auth_key` is non-empty. Rows with a
/// NULL or empty key are placeholders written before login and are skipped.
fn first_keyed_row(
    rows: Rows<'_>,
    decode: impl Fn(&Row, Vec<u8>) -> Result<AuthSession, ConvertError>,
) -> Result<AuthSession, ConvertError> {
    let mut skipped = 0usize;
    for row in rows {
        let row = row?;
        match opt_blob(&row, "auth_key")? {
            Some(key) if !key.is_empty() => return decode(&row, key),
            _ => {
                tracing::debug!("[reader] skipping row {} without auth key", row.rowid());
                skipped += 1;
            }
        }
    }
    Err(ConvertError::no_usable(if skipped == 0 {
        "the sessions table is empty".to_string()
    } else {
        format!("all {skipped} rows lack an auth key")
    }))
}

fn mismatch(column: &str, expected: &str, found: &Value) -> ConvertError {
    ConvertError::invalid(format!(
        "column `{column}`: expected {expected}, found {}",
        found.type_name()
    ))
}

fn dc_id(row: &Row) -> Result<i64, ConvertError> {
    match row.get("dc_id") {
        Some(Value::Integer(v)) => Ok(*v),
        Some(other) => Err(ConvertError::InvalidDatacenter { value: other.to_string() }),
        None => Err(ConvertError::InvalidDatacenter { value: "missing".into() }),
    }
}

fn opt_integer(row: &Row, column: &str) -> Result<Option<i64>, ConvertError> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Integer(v)) => Ok(Some(*v)),
        Some(other) => Err(mismatch(column, "integer", other)),
    }
}

fn opt_bool(row: &Row, column: &str) -> Result<Option<bool>, ConvertError> {
    match opt_integer(row, column)? {
        None => Ok(None),
        Some(0) => Ok(Some(false)),
        Some(1) => Ok(Some(true)),
        Some(v) => Err(ConvertError::invalid(format!("column `{column}`: expected 0 or 1, found {v}"))),
    }
}

fn opt_text(row: &Row, column: &str) -> Result<Option<String>, ConvertError> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Text(s)) => Ok(Some(s.clone())),
        Some(other) => Err(mismatch(column, "text", other)),
    }
}

fn opt_blob(row: &Row, column: &str) -> Result<Option<Vec<u8>>, ConvertError> {
    match row.get(column) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Blob(b)) => Ok(Some(b.clone())),
        Some(other) => Err(mismatch(column, "blob", other)),
    }
}
