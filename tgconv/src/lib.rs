//! # tgconv
//!
//! Convert Telegram sessions between Telethon session files, Pyrogram session
//! files, Pyrogram string sessions and Telethon string sessions.
//!
//! Every source is read into one canonical [`AuthSession`], validated, then
//! written out by the writer or codec of the target format.
//!
//! ```rust,no_run
//! use std::path::Path;
//! use tgconv::{ApiCredentials, Converter, Output, SessionFormat, Source, Target};
//!
//! # fn main() -> Result<(), tgconv::ConvertError> {
//! let converter = Converter::default().with_credentials(ApiCredentials::new(12345, "0123456789abcdef"));
//!
//! let out = converter.convert(
//!     Source::File { path: Path::new("account.session"), format: None },
//!     Target::String { format: SessionFormat::PyrogramString },
//! )?;
//! if let Output::String { value, .. } = out {
//!     println!("{value}");
//! }
//! # Ok(()) }
//! ```
//!
//! Session files are read by the bundled page scanner ([`tgconv_sqlite`]), so a
//! source locked by a running client can still be converted. Outputs are
//! written through SQLite into a temporary file that atomically replaces the
//! destination.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]

pub mod config;
pub mod dc;
mod engine;
mod errors;
mod format;
pub mod reader;
pub mod resolver;
mod session;
pub mod string_session;
pub mod writer;

pub use config::{ConvertConfig, DeviceInfo, WriterConfig, PLACEHOLDER_USER_ID};
pub use engine::{
    input_path, output_path, Converter, Inspection, Output, Source, Stage, TableSummary, Target,
    SESSION_EXTENSION,
};
pub use errors::ConvertError;
pub use format::{SessionFormat, UnknownFormat};
pub use resolver::{ResolveError, ResolveRequest, UserIdResolver};
pub use session::{ApiCredentials, AuthKey, AuthSession, AuthSessionBuilder};

/// Length of a Telegram MTProto authorization key in bytes.
pub const AUTH_KEY_SIZE: usize = 256;
