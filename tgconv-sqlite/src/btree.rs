//! Table b-tree walking.
//!
//! [`Rows`] walks a table's b-tree depth-first with an explicit page stack,
//! decoding one leaf cell per `next()` call. Nothing beyond the current path
//! from the root is kept in memory.

use std::borrow::Cow;
use std::sync::Arc;

use crate::errors::ScanError;
use crate::header::{be_u16, be_u32, Header, TextEncoding, HEADER_SIZE};
use crate::record::{decode_record, read_varint};
use crate::value::{Row, Value};

const PAGE_INTERIOR_TABLE: u8 = 0x05;
const PAGE_LEAF_TABLE:     u8 = 0x0d;
const PAGE_INTERIOR_INDEX: u8 = 0x02;
const PAGE_LEAF_INDEX:     u8 = 0x0a;

/// Deepest b-tree the walker will follow. Real trees are a handful of levels;
/// anything deeper is a page cycle in a corrupt file.
const MAX_DEPTH: usize = 64;

// ─── Pager ────────────────────────────────────────────────────────────────────

/// Page addressing over the raw file bytes.
#[derive(Clone, Copy)]
pub(crate) struct Pager<'a> {
    bytes:      &'a [u8],
    page_size:  usize,
    usable:     usize,
    page_count: u32,
}

impl<'a> Pager<'a> {
    pub(crate) fn new(bytes: &'a [u8], header: &Header) -> Self {
        let page_size = header.page_size as usize;
        // A torn trailing page is ignored: only complete pages are addressable.
        let page_count = u32::try_from(bytes.len() / page_size).unwrap_or(u32::MAX);
        Self { bytes, page_size, usable: header.usable_size(), page_count }
    }

    pub(crate) fn page_count(&self) -> u32 { self.page_count }

    /// The full bytes of page `n` (1-based).
    fn page(&self, n: u32) -> Result<&'a [u8], ScanError> {
        if n == 0 || n > self.page_count {
            return Err(ScanError::PageOutOfRange { page: n, page_count: self.page_count });
        }
        let start = (n as usize - 1) * self.page_size;
        Ok(&self.bytes[start..start + self.page_size])
    }

    /// How many payload bytes are stored in the cell itself before spilling
    /// to overflow pages.
    fn local_payload_len(&self, total: usize) -> usize {
        let u = self.usable;
        let max_local = u - 35;
        if total <= max_local {
            return total;
        }
        let min_local = (u - 12) * 32 / 255 - 23;
        let k = min_local + (total - min_local) % (u - 4);
        if k <= max_local { k } else { min_local }
    }

    /// Collect a cell's payload, following the overflow chain when needed.
    fn payload(&self, page_no: u32, cell: &'a [u8], total: usize) -> Result<Cow<'a, [u8]>, ScanError> {
        let local = self.local_payload_len(total);
        if local == total {
            return cell
                .get(..total)
                .map(Cow::Borrowed)
                .ok_or_else(|| ScanError::corrupt(page_no, "cell payload runs past the page"));
        }

        let head = cell
            .get(..local + 4)
            .ok_or_else(|| ScanError::corrupt(page_no, "overflow pointer runs past the page"))?;
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(&head[..local]);

        let mut next = be_u32(&head[local..]);
        let mut hops = 0u32;
        while out.len() < total {
            if next == 0 {
                return Err(ScanError::corrupt(page_no, "overflow chain ends early"));
            }
            hops += 1;
            if hops > self.page_count {
                return Err(ScanError::corrupt(page_no, "overflow chain loops"));
            }
            let page = self.page(next)?;
            let take = (total - out.len()).min(self.usable - 4);
            out.extend_from_slice(&page[4..4 + take]);
            next = be_u32(&page[..4]);
        }
        Ok(Cow::Owned(out))
    }
}

// ─── Page headers ─────────────────────────────────────────────────────────────

struct BtreePage<'a> {
    number:     u32,
    data:       &'a [u8],
    leaf:       bool,
    cell_count: usize,
    /// Offset of the cell pointer array within `data`.
    cell_ptrs:  usize,
    right_most: u32,
}

impl<'a> BtreePage<'a> {
    fn load(pager: &Pager<'a>, number: u32, table: &str) -> Result<Self, ScanError> {
        let data = pager.page(number)?;
        let h = if number == 1 { HEADER_SIZE } else { 0 };
        let kind = data[h];
        let leaf = match kind {
            PAGE_LEAF_TABLE => true,
            PAGE_INTERIOR_TABLE => false,
            PAGE_LEAF_INDEX | PAGE_INTERIOR_INDEX => {
                return Err(ScanError::Unsupported {
                    table: table.to_string(),
                    reason: "index b-tree (WITHOUT ROWID table)",
                });
            }
            other => {
                return Err(ScanError::corrupt(number, format!("unexpected page type {other:#04x}")));
            }
        };
        let cell_count = usize::from(be_u16(&data[h + 3..]));
        let (cell_ptrs, right_most) = if leaf {
            (h + 8, 0)
        } else {
            (h + 12, be_u32(&data[h + 8..]))
        };
        if cell_ptrs + cell_count * 2 > data.len() {
            return Err(ScanError::corrupt(number, "cell pointer array runs past the page"));
        }
        Ok(Self { number, data, leaf, cell_count, cell_ptrs, right_most })
    }

    fn cell(&self, index: usize) -> Result<&'a [u8], ScanError> {
        let off = usize::from(be_u16(&self.data[self.cell_ptrs + index * 2..]));
        if off < self.cell_ptrs || off >= self.data.len() {
            return Err(ScanError::corrupt(self.number, format!("cell {index} offset {off} out of bounds")));
        }
        Ok(&self.data[off..])
    }
}

// ─── Rows ─────────────────────────────────────────────────────────────────────

struct Frame<'a> {
    page: BtreePage<'a>,
    next: usize,
    right_done: bool,
}

/// Lazy iterator over the rows of one table.
///
/// Yields `Err` at most once; iteration stops after the first error.
pub struct Rows<'a> {
    pager:    Option<Pager<'a>>,
    table:    String,
    columns:  Arc<[String]>,
    alias:    Option<usize>,
    encoding: TextEncoding,
    root:     Option<u32>,
    stack:    Vec<Frame<'a>>,
    visited:  u32,
    failed:   bool,
}

impl<'a> Rows<'a> {
    pub(crate) fn new(
        pager: Pager<'a>,
        table: String,
        columns: Arc<[String]>,
        alias: Option<usize>,
        encoding: TextEncoding,
        root: u32,
    ) -> Self {
        Self {
            pager: Some(pager),
            table,
            columns,
            alias,
            encoding,
            root: Some(root),
            stack: Vec::new(),
            visited: 0,
            failed: false,
        }
    }

    /// A sequence with no rows, for tables that do not exist.
    pub(crate) fn empty(table: String) -> Self {
        Self {
            pager: None,
            table,
            columns: Arc::from(Vec::<String>::new()),
            alias: None,
            encoding: TextEncoding::Utf8,
            root: None,
            stack: Vec::new(),
            visited: 0,
            failed: false,
        }
    }

    /// Column names shared by every row of this table.
    pub fn columns(&self) -> &[String] { &self.columns }

    fn push(&mut self, pager: &Pager<'a>, page: u32) -> Result<(), ScanError> {
        self.visited += 1;
        if self.visited > pager.page_count() || self.stack.len() >= MAX_DEPTH {
            return Err(ScanError::corrupt(page, "b-tree page cycle"));
        }
        let page = BtreePage::load(pager, page, &self.table)?;
        tracing::trace!(
            "[sqlite] table `{}`: page {} ({}, {} cells)",
            self.table,
            page.number,
            if page.leaf { "leaf" } else { "interior" },
            page.cell_count,
        );
        self.stack.push(Frame { page, next: 0, right_done: false });
        Ok(())
    }

    fn leaf_row(&self, pager: &Pager<'a>, page: &BtreePage<'a>, index: usize) -> Result<Row, ScanError> {
        let cell = page.cell(index)?;
        let bad = || ScanError::corrupt(page.number, format!("truncated cell {index}"));
        let (total, n1) = read_varint(cell).ok_or_else(bad)?;
        let (rowid, n2) = read_varint(&cell[n1..]).ok_or_else(bad)?;
        let total = usize::try_from(total).map_err(|_| bad())?;
        let payload = pager.payload(page.number, &cell[n1 + n2..], total)?;

        let mut values = decode_record(&payload, self.encoding)
            .map_err(|reason| ScanError::corrupt(page.number, reason))?;
        // Columns added later with ALTER TABLE are absent from older records.
        values.resize(self.columns.len(), Value::Null);
        let rowid = rowid as i64;
        if let Some(i) = self.alias {
            if values[i].is_null() {
                values[i] = Value::Integer(rowid);
            }
        }
        Ok(Row::new(rowid, Arc::clone(&self.columns), values))
    }

    fn advance(&mut self) -> Option<Result<Row, ScanError>> {
        let pager = self.pager?;
        if let Some(root) = self.root.take() {
            if let Err(e) = self.push(&pager, root) {
                return Some(Err(e));
            }
        }

        loop {
            let frame = self.stack.last_mut()?;
            if frame.page.leaf {
                if frame.next < frame.page.cell_count {
                    let index = frame.next;
                    frame.next += 1;
                    let frame = self.stack.last()?;
                    return Some(self.leaf_row(&pager, &frame.page, index));
                }
                self.stack.pop();
                continue;
            }

            let child = if frame.next < frame.page.cell_count {
                let index = frame.next;
                frame.next += 1;
                match frame.page.cell(index) {
                    Ok(cell) if cell.len() >= 4 => be_u32(cell),
                    Ok(_) => return Some(Err(ScanError::corrupt(frame.page.number, "truncated interior cell"))),
                    Err(e) => return Some(Err(e)),
                }
            } else if !frame.right_done {
                frame.right_done = true;
                frame.page.right_most
            } else {
                self.stack.pop();
                continue;
            };

            if let Err(e) = self.push(&pager, child) {
                return Some(Err(e));
            }
        }
    }
}

impl Iterator for Rows<'_> {
    type Item = Result<Row, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.advance();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
            self.stack.clear();
        }
        item
    }
}
