//! The conversion engine.
//!
//! A conversion is a small state machine:
//!
//! ```text
//! Reading ──▶ Validating ──▶ Writing ──▶ Done
//!    │             │            │
//!    └─────────────┴────────────┴──▶ Failed(stage, error)
//! ```
//!
//! Only `Writing` touches the filesystem or calls a resolver, so a failure in
//! an earlier stage never leaves anything behind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tgconv_sqlite::{Database, Header};

use crate::config::ConvertConfig;
use crate::errors::ConvertError;
use crate::format::SessionFormat;
use crate::reader::{self, SESSIONS_TABLE};
use crate::resolver::{self, Resolution, ResolveRequest, UserIdResolver};
use crate::session::{ApiCredentials, AuthSession};
use crate::string_session;
use crate::writer;

/// Extension session files carry.
pub const SESSION_EXTENSION: &str = "session";

// ─── Endpoints ────────────────────────────────────────────────────────────────

/// Where a session comes from.
#[derive(Clone, Copy, Debug)]
pub enum Source<'a> {
    /// A session file; `format: None` auto-detects Telethon or Pyrogram.
    File { path: &'a Path, format: Option<SessionFormat> },
    /// A session file already in memory.
    Bytes { bytes: &'a [u8], format: Option<SessionFormat> },
    /// A string session.
    String { value: &'a str, format: SessionFormat },
}

/// Where a session goes.
#[derive(Clone, Copy, Debug)]
pub enum Target<'a> {
    File { path: &'a Path, format: SessionFormat },
    String { format: SessionFormat },
}

impl Target<'_> {
    pub fn format(&self) -> SessionFormat {
        match *self {
            Self::File { format, .. } | Self::String { format } => format,
        }
    }
}

/// What a finished conversion produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Output {
    File { path: PathBuf, format: SessionFormat },
    String { format: SessionFormat, value: String },
}

/// Stage a conversion failed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Reading,
    Validating,
    Writing,
}

enum State {
    Reading,
    Validating(SessionFormat, AuthSession),
    Writing(SessionFormat, AuthSession),
    Done(Output),
    Failed(Stage, ConvertError),
}

// ─── Paths ────────────────────────────────────────────────────────────────────

/// An input path gets `.session` appended when that file exists; otherwise
/// the path is used as given.
pub fn input_path(path: &Path) -> PathBuf {
    let session = with_session_extension(path);
    if session.is_file() {
        return session;
    }
    path.to_path_buf()
}

/// Output paths always end in `.session`.
pub fn output_path(path: &Path) -> PathBuf {
    with_session_extension(path)
}

fn with_session_extension(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|e| e == SESSION_EXTENSION) {
        return path.to_path_buf();
    }
    let mut s = path.as_os_str().to_owned();
    s.push(".");
    s.push(SESSION_EXTENSION);
    PathBuf::from(s)
}

// ─── Converter ────────────────────────────────────────────────────────────────

/// Converts sessions between formats.
///
/// ```rust,no_run
/// use std::path::Path;
/// use tgconv::{Converter, SessionFormat, Source, Target};
///
/// # fn main() -> Result<(), tgconv::ConvertError> {
/// let out = Converter::default().convert(
///     Source::File { path: Path::new("telethon.session"), format: None },
///     Target::File { path: Path::new("pyrogram.session"), format: SessionFormat::Pyrogram },
/// )?;
/// println!("{out:?}");
/// # Ok(()) }
/// ```
#[derive(Clone, Default)]
pub struct Converter {
    config:      ConvertConfig,
    credentials: Option<ApiCredentials>,
    resolver:    Option<Arc<dyn UserIdResolver>>,
}

impl Converter {
    pub fn new(config: ConvertConfig) -> Self {
        Self { config, credentials: None, resolver: None }
    }

    /// Attach API credentials to every session this converter reads.
    pub fn with_credentials(mut self, credentials: ApiCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Use `resolver` to look up missing user ids. It is only called when
    /// credentials are set.
    pub fn with_resolver(mut self, resolver: impl UserIdResolver) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn config(&self) -> &ConvertConfig { &self.config }

    pub fn credentials(&self) -> Option<&ApiCredentials> { self.credentials.as_ref() }

    /// Run a conversion to completion.
    pub fn convert(&self, source: Source<'_>, target: Target<'_>) -> Result<Output, ConvertError> {
        let mut state = State::Reading;
        loop {
            state = match state {
                State::Reading => match self.read(source) {
                    Ok((format, session)) => {
                        tracing::info!("[engine] read {format} session (DC {})", session.dc_id());
                        State::Validating(format, session)
                    }
                    Err(e) => State::Failed(Stage::Reading, e),
                },
                State::Validating(format, session) => {
                    match check_route(format, target).and_then(|()| session.validate()) {
                        Ok(()) => State::Writing(format, session),
                        Err(e) => State::Failed(Stage::Validating, e),
                    }
                }
                State::Writing(format, session) => {
                    tracing::info!("[engine] writing {format} -> {}", target.format());
                    match self.write(session, target) {
                        Ok(out) => State::Done(out),
                        Err(e) => State::Failed(Stage::Writing, e),
                    }
                }
                State::Done(out) => return Ok(out),
                State::Failed(stage, e) => {
                    tracing::warn!("[engine] conversion failed while {stage:?}: {e}");
                    return Err(e);
                }
            };
        }
    }

    /// Read a session without converting it.
    pub fn read(&self, source: Source<'_>) -> Result<(SessionFormat, AuthSession), ConvertError> {
        let credentials = self.credentials.as_ref();
        match source {
            Source::File { path, format } => {
                let path = input_path(path);
                let bytes = std::fs::read(&path)
                    .map_err(|source| ConvertError::SourceUnreadable { path: path.clone(), source })?;
                tracing::debug!("[engine] {} is {} bytes", path.display(), bytes.len());
                reader::read_session(&Database::open(&bytes)?, format, credentials)
            }
            Source::Bytes { bytes, format } => {
                reader::read_session(&Database::open(bytes)?, format, credentials)
            }
            Source::String { value, format } => {
                let session = string_session::decode(format, value)?;
                let session = match credentials {
                    Some(c) => session.with_credentials(c),
                    None => session,
                };
                Ok((format, session))
            }
        }
    }

    /// Describe a session file without converting it.
    pub fn inspect(&self, path: &Path) -> Result<Inspection, ConvertError> {
        let path = input_path(path);
        let bytes = std::fs::read(&path)
            .map_err(|source| ConvertError::SourceUnreadable { path: path.clone(), source })?;
        let db = Database::open(&bytes)?;

        let mut tables = Vec::new();
        for table in db.tables()? {
            let rows = db.rows(&table).ok().map(|rows| rows.take_while(Result::is_ok).count());
            tables.push(TableSummary {
                name: table.name.clone(),
                columns: table.column_names().map(str::to_string).collect(),
                rows,
            });
        }

        let (format, session, problem) = match reader::read_session(&db, None, self.credentials.as_ref()) {
            Ok((format, session)) => {
                let problem = session.validate().err();
                (Some(format), Some(session), problem)
            }
            Err(e) => (None, None, Some(e)),
        };

        Ok(Inspection {
            path,
            size: bytes.len(),
            header: db.header().clone(),
            tables,
            format,
            session,
            problem,
        })
    }

    fn write(&self, session: AuthSession, target: Target<'_>) -> Result<Output, ConvertError> {
        let format = target.format();
        if format == SessionFormat::PyrogramString && session.api_id().is_none() {
            return Err(ConvertError::MissingCredentials {
                reason: "a Pyrogram string session embeds the api_id",
            });
        }
        let session = if format.needs_user_id() && session.user_id().is_none() {
            let user_id = self.resolve_user_id(&session);
            session.with_user_id(user_id)
        } else {
            session
        };

        match target {
            Target::File { path, format } => {
                let path = output_path(path);
                writer::write_session_file(&path, format, &session, &self.config.writer)?;
                Ok(Output::File { path, format })
            }
            Target::String { format } => {
                let value = string_session::encode(format, &session)?;
                Ok(Output::String { format, value })
            }
        }
    }

    fn resolve_user_id(&self, session: &AuthSession) -> i64 {
        let placeholder = self.config.placeholder_user_id;
        let (Some(resolver), Some(credentials)) = (&self.resolver, &self.credentials) else {
            tracing::info!("[engine] user id unknown, writing placeholder {placeholder}");
            return placeholder;
        };
        let request = ResolveRequest {
            session:     session.clone(),
            credentials: credentials.clone(),
            device:      self.config.device.clone(),
        };
        match resolver::resolve_with_timeout(resolver.clone(), request, self.config.resolve_timeout) {
            Resolution::Resolved(id) => {
                tracing::info!("[engine] resolved user id {id}");
                id
            }
            Resolution::Failed(e) => {
                tracing::warn!("[engine] user id lookup failed ({e}), writing placeholder {placeholder}");
                placeholder
            }
            Resolution::TimedOut => {
                tracing::warn!(
                    "[engine] user id lookup timed out after {:?}, writing placeholder {placeholder}",
                    self.config.resolve_timeout
                );
                placeholder
            }
        }
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

/// Reject format pairs with no mapping before anything is written.
fn check_route(from: SessionFormat, target: Target<'_>) -> Result<(), ConvertError> {
    let to = target.format();
    let fits = match target {
        Target::File { .. } => to.is_file(),
        Target::String { .. } => to.is_string() && from.is_file(),
    };
    if fits { Ok(()) } else { Err(ConvertError::UnsupportedConversion { from, to }) }
}

// ─── Inspection ───────────────────────────────────────────────────────────────

/// One table of an inspected file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSummary {
    pub name:    String,
    pub columns: Vec<String>,
    /// `None` when the table cannot be scanned (`WITHOUT ROWID`).
    pub rows:    Option<usize>,
}

/// Result of [`Converter::inspect`].
#[derive(Debug)]
pub struct Inspection {
    pub path:    PathBuf,
    pub size:    usize,
    pub header:  Header,
    pub tables:  Vec<TableSummary>,
    /// Detected format, if a session could be read.
    pub format:  Option<SessionFormat>,
    pub session: Option<AuthSession>,
    /// Why the file cannot be converted as it stands.
    pub problem: Option<ConvertError>,
}

impl Inspection {
    pub fn is_convertible(&self) -> bool {
        self.session.is_some() && self.problem.is_none()
    }

    pub fn sessions_table(&self) -> Option<&TableSummary> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(SESSIONS_TABLE))
    }
}
