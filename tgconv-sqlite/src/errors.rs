//! Error types for the table scanner.

/// Errors produced while scanning a SQLite file.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The bytes do not start with a usable SQLite database header.
    #[error("not a SQLite database: {reason}")]
    NotSqlite {
        /// Which header check failed.
        reason: &'static str,
    },

    /// A page number pointed past the end of the file.
    #[error("page {page} lies outside the file ({page_count} pages)")]
    PageOutOfRange {
        /// The offending page number.
        page: u32,
        /// Number of complete pages present in the file.
        page_count: u32,
    },

    /// A page was present but its contents made no sense.
    #[error("corrupt page {page}: {reason}")]
    Corrupt {
        /// Page on which the problem was found.
        page: u32,
        /// Human-readable description.
        reason: String,
    },

    /// The table uses a storage layout the scanner does not walk.
    #[error("table `{table}` is not supported: {reason}")]
    Unsupported {
        /// Table name from `sqlite_schema`.
        table: String,
        /// Why the table cannot be scanned.
        reason: &'static str,
    },
}

impl ScanError {
    pub(crate) fn corrupt(page: u32, reason: impl Into<String>) -> Self {
        Self::Corrupt { page, reason: reason.into() }
    }

    /// `true` when the input was rejected at the header, before any page was read.
    pub fn is_not_sqlite(&self) -> bool {
        matches!(self, Self::NotSqlite { .. })
    }
}
