//! Read-only scanner for SQLite database files.
//!
//! This crate reads the rows of a single table straight out of the bytes of a
//! SQLite file. It is not a database engine: there is no SQL, no locking and
//! no write path. That makes it safe to point at a file another process is
//! still holding open, and it never touches the file beyond one read.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use tgconv_sqlite::Database;
//!
//! let bytes = std::fs::read("telethon.session")?;
//! let db = Database::open(&bytes)?;
//! for row in db.scan("sessions")? {
//!     let row = row?;
//!     println!("dc_id = {:?}", row.get("dc_id"));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_code)]

mod btree;
mod errors;
mod header;
mod record;
mod schema;
mod value;

use std::sync::Arc;

pub use btree::Rows;
pub use errors::ScanError;
pub use header::{Header, TextEncoding, MAGIC};
pub use schema::{ColumnDef, TableSchema};
pub use value::{Row, Value};

use btree::Pager;

/// Name of the table every database stores its schema in.
pub const SCHEMA_TABLE: &str = "sqlite_schema";

/// A parsed view over the bytes of a SQLite file.
///
/// Cheap to construct: only the 100-byte header is checked up front; pages
/// are decoded on demand as rows are pulled.
pub struct Database<'a> {
    bytes:  &'a [u8],
    header: Header,
}

impl<'a> Database<'a> {
    /// Validate the header and wrap `bytes`.
    pub fn open(bytes: &'a [u8]) -> Result<Self, ScanError> {
        let header = Header::parse(bytes)?;
        tracing::debug!(
            "[sqlite] {} bytes, page size {}, {}",
            bytes.len(),
            header.page_size,
            if header.is_wal() { "WAL mode" } else { "rollback journal" },
        );
        Ok(Self { bytes, header })
    }

    /// The database header.
    pub fn header(&self) -> &Header { &self.header }

    fn pager(&self) -> Pager<'a> {
        Pager::new(self.bytes, &self.header)
    }

    fn schema_rows(&self) -> Rows<'a> {
        let columns: Arc<[String]> = ["type", "name", "tbl_name", "rootpage", "sql"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Rows::new(self.pager(), SCHEMA_TABLE.to_string(), columns, None, self.header.text_encoding, 1)
    }

    /// Every ordinary table declared in `sqlite_schema`, in storage order.
    ///
    /// A table whose `CREATE TABLE` statement cannot be parsed is left out.
    pub fn tables(&self) -> Result<Vec<TableSchema>, ScanError> {
        let mut tables = Vec::new();
        for row in self.schema_rows() {
            let Some(entry) = SchemaEntry::from_row(&row?) else { continue };
            match entry.parse() {
                Ok(table) => tables.push(table),
                Err(e) => tracing::debug!("[sqlite] skipping table `{}`: {e}", entry.name),
            }
        }
        Ok(tables)
    }

    /// Look up one table by name (case-insensitive).
    ///
    /// Only the statement of the requested table is parsed, so a table this
    /// crate cannot read does not hide the others.
    pub fn table(&self, name: &str) -> Result<Option<TableSchema>, ScanError> {
        for row in self.schema_rows() {
            let Some(entry) = SchemaEntry::from_row(&row?) else { continue };
            if entry.name.eq_ignore_ascii_case(name) {
                return entry.parse().map(Some);
            }
        }
        Ok(None)
    }

    /// Iterate the rows of an already looked-up table.
    pub fn rows(&self, table: &TableSchema) -> Result<Rows<'a>, ScanError> {
        if table.without_rowid {
            return Err(ScanError::Unsupported {
                table: table.name.clone(),
                reason: "WITHOUT ROWID tables are stored as index b-trees",
            });
        }
        let columns: Arc<[String]> = table.column_names().map(str::to_string).collect();
        Ok(Rows::new(
            self.pager(),
            table.name.clone(),
            columns,
            table.rowid_alias(),
            self.header.text_encoding,
            table.root_page,
        ))
    }

    /// Iterate the rows of table `name`.
    ///
    /// A missing table yields an empty sequence rather than an error, so a
    /// well-formed file without the table can be told apart from a broken one.
    pub fn scan(&self, name: &str) -> Result<Rows<'a>, ScanError> {
        match self.table(name)? {
            Some(table) => self.rows(&table),
            None => {
                tracing::debug!("[sqlite] no table `{name}`");
                Ok(Rows::empty(name.to_string()))
            }
        }
    }
}

/// One `type = 'table'` row of `sqlite_schema` with a b-tree of its own.
struct SchemaEntry {
    name:      String,
    root_page: u32,
    sql:       String,
}

impl SchemaEntry {
    fn from_row(row: &Row) -> Option<Self> {
        if row.get("type").and_then(Value::as_text) != Some("table") {
            return None;
        }
        // Virtual tables have no b-tree of their own.
        let root_page = row.get("rootpage").and_then(Value::as_integer)?;
        let root_page = u32::try_from(root_page).ok().filter(|&p| p != 0)?;
        Some(Self {
            name: row.get("name").and_then(Value::as_text).unwrap_or_default().to_string(),
            root_page,
            sql: row.get("sql").and_then(Value::as_text).unwrap_or_default().to_string(),
        })
    }

    fn parse(&self) -> Result<TableSchema, ScanError> {
        let (columns, without_rowid) = schema::parse_create_table(&self.sql)
            .map_err(|reason| ScanError::corrupt(1, format!("schema of `{}`: {reason}", self.name)))?;
        Ok(TableSchema {
            name: self.name.clone(),
            root_page: self.root_page,
            sql: self.sql.clone(),
            columns,
            without_rowid,
        })
    }
}
