//! Error types for tgconv.
//!
//! Every failure of a conversion surfaces as one [`ConvertError`] variant; the
//! variant is the reason, nothing is folded into a generic "failed".

use std::error::Error as StdError;
use std::path::PathBuf;

use tgconv_sqlite::ScanError;

use crate::dc::UnknownDatacenter;
use crate::format::SessionFormat;

/// Why a conversion (or a read) did not complete.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The input does not start with a SQLite header.
    #[error("not a session file: {0}")]
    NotASessionFile(#[source] ScanError),

    /// The header is fine but the pages are not.
    #[error("session file is corrupt: {0}")]
    CorruptSessionFile(#[source] ScanError),

    /// The input file could not be opened or read.
    #[error("cannot read {}: {source}", .path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No `sessions` row carries an auth key.
    #[error("no usable session: {reason}")]
    NoUsableSession { reason: String },

    /// The DC id is missing, not an integer, or not in 1..=5.
    #[error("invalid datacenter: {value}")]
    InvalidDatacenter { value: String },

    /// A string session failed to decode.
    #[error("malformed string session: {reason}")]
    MalformedStringSession { reason: String },

    /// The session was read but breaks an invariant (wrong key length, bad column type, …).
    #[error("invalid session: {reason}")]
    InvalidSession { reason: String },

    /// The target format needs API credentials that were not supplied.
    #[error("missing credentials: {reason}")]
    MissingCredentials { reason: &'static str },

    /// Writing the destination failed; the destination is unchanged.
    #[error("failed to write {}: {source}", .path.display())]
    DestinationWriteFailed {
        path: PathBuf,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// No mapping exists between the two formats.
    #[error("unsupported conversion: {from} -> {to}")]
    UnsupportedConversion { from: SessionFormat, to: SessionFormat },
}

impl ConvertError {
    pub(crate) fn no_usable(reason: impl Into<String>) -> Self {
        Self::NoUsableSession { reason: reason.into() }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidSession { reason: reason.into() }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedStringSession { reason: reason.into() }
    }

    pub(crate) fn write_failed(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::DestinationWriteFailed { path: path.into(), source: source.into() }
    }

    /// `true` when trying another reader might still succeed.
    pub fn is_no_usable_session(&self) -> bool {
        matches!(self, Self::NoUsableSession { .. })
    }
}

impl From<ScanError> for ConvertError {
    fn from(e: ScanError) -> Self {
        if e.is_not_sqlite() {
            Self::NotASessionFile(e)
        } else {
            Self::CorruptSessionFile(e)
        }
    }
}

impl From<UnknownDatacenter> for ConvertError {
    fn from(e: UnknownDatacenter) -> Self {
        Self::InvalidDatacenter { value: e.0.to_string() }
    }
}
