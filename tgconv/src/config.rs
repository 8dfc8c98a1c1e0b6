//! Conversion settings.
//!
//! Device descriptors, storage schema versions and the user-id placeholder are
//! passed in through these structs; nothing is process-global.

use std::time::Duration;

/// User id written when the real one is unknown.
///
/// Only a live `users.getFullUser(self)` call could produce the real id; when
/// no resolver is configured, or it fails or times out, this stands in.
pub const PLACEHOLDER_USER_ID: i64 = 999_999_999;

/// Schema version Telethon's `SQLiteSession` stamps into its `version` table.
pub const TELETHON_SCHEMA_VERSION: i64 = 7;

/// Schema version Pyrogram's `FileStorage` stamps into its `version` table.
pub const PYROGRAM_SCHEMA_VERSION: i64 = 3;

/// Settings for the SQLite writers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriterConfig {
    pub telethon_version: i64,
    pub pyrogram_version: i64,
    /// Value of Pyrogram's `sessions.date` column.
    pub pyrogram_date:    i64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            telethon_version: TELETHON_SCHEMA_VERSION,
            pyrogram_version: PYROGRAM_SCHEMA_VERSION,
            pyrogram_date:    0,
        }
    }
}

/// How the client identifies itself if a resolver has to log in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_model:   String,
    pub system_version: String,
    pub app_version:    String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device_model:   format!("TGS {}", std::env::consts::ARCH),
            system_version: std::env::consts::OS.to_string(),
            app_version:    env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Top-level settings for a [`crate::Converter`].
#[derive(Clone, Debug)]
pub struct ConvertConfig {
    /// Substituted for the user id when it cannot be resolved.
    pub placeholder_user_id: i64,
    /// Upper bound on a user-id resolver call.
    pub resolve_timeout:     Duration,
    pub writer:              WriterConfig,
    pub device:              DeviceInfo,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            placeholder_user_id: PLACEHOLDER_USER_ID,
            resolve_timeout:     Duration::from_secs(15),
            writer:              WriterConfig::default(),
            device:              DeviceInfo::default(),
        }
    }
}
