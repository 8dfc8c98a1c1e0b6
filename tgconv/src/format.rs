//! The session representations tgconv can read and write.

use std::fmt;
use std::str::FromStr;

/// A session representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionFormat {
    /// Telethon `SQLiteSession` file.
    Telethon,
    /// Pyrogram `FileStorage` file.
    Pyrogram,
    /// Pyrogram string session (`Client.export_session_string`).
    PyrogramString,
    /// Telethon `StringSession`.
    TelethonString,
}

impl SessionFormat {
    /// Formats stored as a SQLite file on disk.
    pub const FILES: [Self; 2] = [Self::Telethon, Self::Pyrogram];

    /// `true` for the two SQLite file formats.
    pub fn is_file(self) -> bool {
        matches!(self, Self::Telethon | Self::Pyrogram)
    }

    /// `true` for the single-line text encodings.
    pub fn is_string(self) -> bool {
        !self.is_file()
    }

    /// Pyrogram-shaped outputs carry the account's user id.
    pub fn needs_user_id(self) -> bool {
        matches!(self, Self::Pyrogram | Self::PyrogramString)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Telethon       => "telethon",
            Self::Pyrogram       => "pyrogram",
            Self::PyrogramString => "string",
            Self::TelethonString => "telethon-string",
        }
    }
}

impl fmt::Display for SessionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The name did not match any known format.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown session format `{0}` (expected telethon, pyrogram, string or telethon-string)")]
pub struct UnknownFormat(pub String);

impl FromStr for SessionFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telethon"                              => Ok(Self::Telethon),
            "pyrogram"                              => Ok(Self::Pyrogram),
            "string" | "pyrogram-string"            => Ok(Self::PyrogramString),
            "telethon-string" | "telethon_string"   => Ok(Self::TelethonString),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}
