//! The 100-byte database header at the start of page 1.

use crate::errors::ScanError;

/// Every SQLite 3 database starts with these 16 bytes.
pub const MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// Size of the database header in bytes.
pub const HEADER_SIZE: usize = 100;

/// Encoding used for every TEXT value in the file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
}

/// The parts of the database header the scanner relies on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    /// Page size in bytes (512..=65536, power of two).
    pub page_size:     u32,
    /// Bytes reserved at the end of every page (encryption nonces and the like).
    pub reserved:      u8,
    /// `1` = legacy rollback journal, `2` = WAL.
    pub write_version: u8,
    /// `1` = legacy rollback journal, `2` = WAL.
    pub read_version:  u8,
    /// File change counter at offset 24.
    pub change_counter: u32,
    /// Schema format number (1..=4).
    pub schema_format: u32,
    pub text_encoding: TextEncoding,
}

impl Header {
    /// Parse and sanity-check the header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> Result<Self, ScanError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ScanError::NotSqlite { reason: "file is shorter than the database header" });
        }
        if bytes[..16] != MAGIC[..] {
            return Err(ScanError::NotSqlite { reason: "missing `SQLite format 3` magic" });
        }

        let raw_page_size = u16::from_be_bytes([bytes[16], bytes[17]]);
        let page_size = match raw_page_size {
            1 => 65_536,
            n if n >= 512 && n.is_power_of_two() => u32::from(n),
            _ => return Err(ScanError::NotSqlite { reason: "invalid page size" }),
        };

        let write_version = bytes[18];
        let read_version  = bytes[19];
        if !(1..=2).contains(&write_version) || !(1..=2).contains(&read_version) {
            return Err(ScanError::NotSqlite { reason: "unknown file format version" });
        }

        let reserved = bytes[20];
        if page_size - u32::from(reserved) < 480 {
            return Err(ScanError::NotSqlite { reason: "usable page size below 480 bytes" });
        }

        // Payload fractions are fixed by the file format.
        if bytes[21] != 64 || bytes[22] != 32 || bytes[23] != 32 {
            return Err(ScanError::NotSqlite { reason: "invalid payload fractions" });
        }

        let change_counter = be_u32(&bytes[24..28]);
        let schema_format  = be_u32(&bytes[44..48]);

        let text_encoding = match be_u32(&bytes[56..60]) {
            // A database without any schema yet leaves the field at 0.
            0 | 1 => TextEncoding::Utf8,
            2 => TextEncoding::Utf16Le,
            3 => TextEncoding::Utf16Be,
            _ => return Err(ScanError::NotSqlite { reason: "unknown text encoding" }),
        };

        Ok(Self {
            page_size,
            reserved,
            write_version,
            read_version,
            change_counter,
            schema_format,
            text_encoding,
        })
    }

    /// Bytes of each page available to b-tree content.
    pub fn usable_size(&self) -> usize {
        self.page_size as usize - usize::from(self.reserved)
    }

    /// `true` if the file was last opened in WAL journal mode.
    pub fn is_wal(&self) -> bool {
        self.write_version == 2 || self.read_version == 2
    }
}

pub(crate) fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

pub(crate) fn be_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_header() -> Vec<u8> {
        let mut h = vec![0u8; HEADER_SIZE];
        h[..16].copy_from_slice(MAGIC);
        h[16..18].copy_from_slice(&4096u16.to_be_bytes());
        h[18] = 1;
        h[19] = 1;
        h[21] = 64;
        h[22] = 32;
        h[23] = 32;
        h[56..60].copy_from_slice(&1u32.to_be_bytes());
        h
    }

    #[test]
    fn parses_minimal_header() {
        let h = Header::parse(&blank_header()).unwrap();
        assert_eq!(h.page_size, 4096);
        assert_eq!(h.usable_size(), 4096);
        assert_eq!(h.text_encoding, TextEncoding::Utf8);
        assert!(!h.is_wal());
    }

    #[test]
    fn page_size_one_means_64k() {
        let mut raw = blank_header();
        raw[16..18].copy_from_slice(&1u16.to_be_bytes());
        assert_eq!(Header::parse(&raw).unwrap().page_size, 65_536);
    }

    #[test]
    fn rejects_text_and_empty_input() {
        assert!(Header::parse(b"").unwrap_err().is_not_sqlite());
        let text = "this is definitely not a database, just some text padding it out".repeat(2);
        assert!(Header::parse(text.as_bytes()).unwrap_err().is_not_sqlite());
    }

    #[test]
    fn rejects_odd_page_size() {
        let mut raw = blank_header();
        raw[16..18].copy_from_slice(&1000u16.to_be_bytes());
        assert!(Header::parse(&raw).unwrap_err().is_not_sqlite());
    }
}
