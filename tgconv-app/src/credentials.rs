//! API credential loading.
//!
//! Sources, first match wins:
//! 1. `--api-id` / `--api-hash` (clap also fills these from `TG_API_ID` /
//!    `TG_API_HASH`, after `.env` has been loaded)
//! 2. a credentials file: `telegram_api.txt` or `api_credentials.txt`, in the
//!    working directory or next to the executable

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use tgconv::ApiCredentials;

pub const DEFAULT_FILE: &str = "telegram_api.txt";
const FALLBACK_FILE: &str = "api_credentials.txt";

/// Resolve credentials from flags, then files. `Ok(None)` if nothing is configured.
pub fn load(api_id: Option<i32>, api_hash: Option<&str>) -> anyhow::Result<Option<ApiCredentials>> {
    match (api_id, api_hash) {
        (Some(id), Some(hash)) => return Ok(Some(ApiCredentials::new(id, hash))),
        (Some(_), None) => log::warn!("--api-id given without --api-hash; looking for a credentials file"),
        (None, Some(_)) => log::warn!("--api-hash given without --api-id; looking for a credentials file"),
        (None, None) => {}
    }

    for path in candidate_files() {
        if !path.is_file() {
            continue;
        }
        match read_file(&path) {
            Ok(creds) => {
                log::info!("using API credentials from {}", path.display());
                return Ok(Some(creds));
            }
            Err(e) => log::warn!("{e:#}"),
        }
    }
    Ok(None)
}

fn candidate_files() -> Vec<PathBuf> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf));
    let mut out = Vec::with_capacity(4);
    for name in [DEFAULT_FILE, FALLBACK_FILE] {
        out.push(PathBuf::from(name));
        if let Some(dir) = &exe_dir {
            out.push(dir.join(name));
        }
    }
    out
}

/// Read a credentials file: the first two lines that are neither blank nor
/// `#` comments hold the api_id and the api_hash.
pub fn read_file(path: &Path) -> anyhow::Result<ApiCredentials> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    parse(&text).with_context(|| format!("invalid credentials file {}", path.display()))
}

pub fn parse(text: &str) -> anyhow::Result<ApiCredentials> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));
    let (Some(id), Some(hash)) = (lines.next(), lines.next()) else {
        bail!("expected the api_id and api_hash on two lines");
    };
    let api_id = id.parse::<i32>().with_context(|| format!("api_id `{id}` is not a number"))?;
    Ok(ApiCredentials::new(api_id, hash))
}

/// Write a credentials file in the layout [`read_file`] expects.
pub fn write_file(path: &Path, creds: &ApiCredentials) -> anyhow::Result<()> {
    let body = format!(
        "{}\n{}\n\
         # This file contains your Telegram API credentials\n\
         # First line: API ID (integer)\n\
         # Second line: API Hash (string)\n",
        creds.api_id, creds.api_hash,
    );
    fs::write(path, body).with_context(|| format!("cannot write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blank_lines() {
        let creds = parse("# my app\n\n  12345  \n# hash follows\nabcdef\nextra\n").unwrap();
        assert_eq!(creds, ApiCredentials::new(12345, "abcdef"));
    }

    #[test]
    fn rejects_short_or_non_numeric() {
        assert!(parse("12345\n").is_err());
        assert!(parse("twelve\nabcdef\n").is_err());
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE);
        let creds = ApiCredentials::new(42, "0123456789abcdef");
        write_file(&path, &creds).unwrap();
        assert_eq!(read_file(&path).unwrap(), creds);
    }

    #[test]
    fn flags_win() {
        let creds = load(Some(7), Some("h")).unwrap();
        assert_eq!(creds, Some(ApiCredentials::new(7, "h")));
    }
}
