//! Table definitions recovered from `sqlite_schema`.
//!
//! Only the column list of a `CREATE TABLE` statement matters here: names in
//! declaration order, the declared type, and whether a column aliases the rowid.

/// A column as declared in `CREATE TABLE`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnDef {
    pub name:      String,
    /// Declared type as written (may be empty).
    pub decl_type: String,
    /// `INTEGER PRIMARY KEY` column: the record stores NULL and the value is the rowid.
    pub rowid_alias: bool,
}

/// A table entry from `sqlite_schema`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSchema {
    pub name:          String,
    pub root_page:     u32,
    pub sql:           String,
    pub columns:       Vec<ColumnDef>,
    pub without_rowid: bool,
}

impl TableSchema {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn rowid_alias(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.rowid_alias)
    }
}

/// Words that start a column constraint and therefore end the declared type.
const CONSTRAINT_WORDS: &[&str] = &[
    "CONSTRAINT", "PRIMARY", "NOT", "NULL", "UNIQUE", "CHECK",
    "DEFAULT", "COLLATE", "REFERENCES", "GENERATED", "AS",
];

/// Words that start a table constraint instead of a column definition.
const TABLE_CONSTRAINT_WORDS: &[&str] = &["CONSTRAINT", "PRIMARY", "UNIQUE", "CHECK", "FOREIGN"];

/// Parse the column list out of a `CREATE TABLE` statement.
///
/// Returns the columns and whether the table is `WITHOUT ROWID`.
pub(crate) fn parse_create_table(sql: &str) -> Result<(Vec<ColumnDef>, bool), String> {
    let open = find_unquoted(sql, '(').ok_or("no column list in CREATE TABLE")?;
    let close = matching_paren(sql, open).ok_or("unbalanced parentheses in CREATE TABLE")?;
    let body = &sql[open + 1..close];
    let without_rowid = sql[close + 1..]
        .split_whitespace()
        .map(str::to_ascii_uppercase)
        .collect::<Vec<_>>()
        .windows(2)
        .any(|w| w[0] == "WITHOUT" && w[1] == "ROWID");

    let mut columns = Vec::new();
    let mut table_pk: Vec<String> = Vec::new();

    for part in split_top_level(body) {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let Some((first, rest)) = take_identifier(part) else {
            continue;
        };

        let is_quoted = part.starts_with(['"', '`', '[', '\'']);
        if !is_quoted && TABLE_CONSTRAINT_WORDS.iter().any(|w| first.eq_ignore_ascii_case(w)) {
            if let Some(cols) = primary_key_columns(part) {
                table_pk = cols;
            }
            continue;
        }

        let decl_type = declared_type(rest);
        let upper = rest.to_ascii_uppercase();
        let pk = contains_words(&upper, &["PRIMARY", "KEY"]) && !contains_words(&upper, &["KEY", "DESC"]);
        columns.push(ColumnDef {
            name: first,
            rowid_alias: pk && decl_type.eq_ignore_ascii_case("INTEGER"),
            decl_type,
        });
    }

    if table_pk.len() == 1 {
        if let Some(col) = columns.iter_mut().find(|c| c.name.eq_ignore_ascii_case(&table_pk[0])) {
            if col.decl_type.eq_ignore_ascii_case("INTEGER") {
                col.rowid_alias = true;
            }
        }
    }

    if without_rowid {
        for col in &mut columns {
            col.rowid_alias = false;
        }
    }

    if columns.is_empty() {
        return Err("CREATE TABLE declares no columns".into());
    }
    Ok((columns, without_rowid))
}

fn declared_type(rest: &str) -> String {
    let mut words = Vec::new();
    let mut depth = 0usize;
    for word in rest.split_whitespace() {
        if depth == 0 && CONSTRAINT_WORDS.iter().any(|w| word.eq_ignore_ascii_case(w)) {
            break;
        }
        depth += word.matches('(').count();
        depth = depth.saturating_sub(word.matches(')').count());
        words.push(word);
    }
    words.join(" ")
}

fn contains_words(upper: &str, seq: &[&str]) -> bool {
    let words: Vec<&str> = upper.split_whitespace().collect();
    words.windows(seq.len()).any(|w| w == seq)
}

/// `PRIMARY KEY (a, b)` → `["a", "b"]`.
fn primary_key_columns(part: &str) -> Option<Vec<String>> {
    let upper = part.to_ascii_uppercase();
    let idx = upper.find("PRIMARY")?;
    let open = part[idx..].find('(')? + idx;
    let close = matching_paren(part, open)?;
    Some(
        split_top_level(&part[open + 1..close])
            .filter_map(|c| take_identifier(c.trim()).map(|(name, _)| name))
            .collect(),
    )
}

/// Read one (possibly quoted) identifier off the front of `s`.
fn take_identifier(s: &str) -> Option<(String, &str)> {
    let s = s.trim_start();
    let first = s.chars().next()?;
    let close = match first {
        '"' => Some('"'),
        '`' => Some('`'),
        '[' => Some(']'),
        '\'' => Some('\''),
        _ => None,
    };
    if let Some(close) = close {
        let inner = &s[1..];
        let end = inner.find(close)?;
        return Some((inner[..end].to_string(), &inner[end + 1..]));
    }
    let end = s
        .find(|c: char| c.is_whitespace() || c == '(' || c == ',')
        .unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    Some((s[..end].to_string(), &s[end..]))
}

/// Index of the first `needle` outside quotes.
fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in s.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == needle => return Some(i),
            None => quote = closing_quote(c),
        }
    }
    None
}

fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, c) in s[open..].char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(open + i);
                    }
                }
                _ => quote = closing_quote(c),
            },
        }
    }
    None
}

/// Split on commas that are not nested in parentheses or quotes.
fn split_top_level(s: &str) -> impl Iterator<Item = &str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    parts.push(&s[start..i]);
                    start = i + 1;
                }
                _ => quote = closing_quote(c),
            },
        }
    }
    parts.push(&s[start..]);
    parts.into_iter()
}

fn closing_quote(c: char) -> Option<char> {
    match c {
        '"' => Some('"'),
        '\'' => Some('\''),
        '`' => Some('`'),
        '[' => Some(']'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(cols: &[ColumnDef]) -> Vec<&str> {
        cols.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn telethon_sessions_table() {
        let sql = "CREATE TABLE sessions (dc_id integer primary key, server_address text, \
                   port integer, auth_key blob, takeout_id integer)";
        let (cols, without_rowid) = parse_create_table(sql).unwrap();
        assert_eq!(names(&cols), ["dc_id", "server_address", "port", "auth_key", "takeout_id"]);
        assert!(cols[0].rowid_alias);
        assert!(!cols[2].rowid_alias);
        assert!(!without_rowid);
    }

    #[test]
    fn pyrogram_sessions_table_multiline() {
        let sql = "CREATE TABLE sessions\n(\n    dc_id     INTEGER PRIMARY KEY,\n    api_id    INTEGER,\n    \
                   test_mode INTEGER,\n    auth_key  BLOB,\n    date      INTEGER NOT NULL,\n    \
                   user_id   INTEGER,\n    is_bot    INTEGER\n)";
        let (cols, _) = parse_create_table(sql).unwrap();
        assert_eq!(names(&cols), ["dc_id", "api_id", "test_mode", "auth_key", "date", "user_id", "is_bot"]);
        assert!(cols[0].rowid_alias);
        assert_eq!(cols[4].decl_type, "INTEGER");
    }

    #[test]
    fn table_constraints_are_not_columns() {
        let sql = "create table sent_files (md5_digest blob, file_size integer, type integer, \
                   id integer, hash integer, primary key(md5_digest, file_size, type))";
        let (cols, _) = parse_create_table(sql).unwrap();
        assert_eq!(names(&cols), ["md5_digest", "file_size", "type", "id", "hash"]);
        assert!(cols.iter().all(|c| !c.rowid_alias));
    }

    #[test]
    fn table_level_single_integer_pk_aliases_rowid() {
        let (cols, _) = parse_create_table("CREATE TABLE t (id INTEGER, v TEXT, PRIMARY KEY (id))").unwrap();
        assert!(cols[0].rowid_alias);
    }

    #[test]
    fn quoted_identifiers_and_defaults() {
        let sql = r#"CREATE TABLE "odd" ("dc id" INTEGER, [key] BLOB DEFAULT (x'00'), `p,q` VARCHAR(10, 2))"#;
        let (cols, _) = parse_create_table(sql).unwrap();
        assert_eq!(names(&cols), ["dc id", "key", "p,q"]);
        assert_eq!(cols[2].decl_type, "VARCHAR(10, 2)");
    }

    #[test]
    fn detects_without_rowid() {
        let (cols, without_rowid) =
            parse_create_table("CREATE TABLE t (id INTEGER PRIMARY KEY, v) WITHOUT ROWID").unwrap();
        assert!(without_rowid);
        assert!(!cols[0].rowid_alias);
    }

    #[test]
    fn bigint_primary_key_is_not_an_alias() {
        let (cols, _) = parse_create_table("CREATE TABLE t (id BIGINT PRIMARY KEY)").unwrap();
        assert!(!cols[0].rowid_alias);
    }
}
