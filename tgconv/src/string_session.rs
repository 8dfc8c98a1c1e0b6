//! Single-line string sessions.
//!
//! # Pyrogram
//!
//! Big-endian pack, 271 bytes, URL-safe base64 with the `=` padding stripped:
//!
//! | field     | width | type           |
//! |-----------|-------|----------------|
//! | dc_id     | 1     | u8             |
//! | api_id    | 4     | i32            |
//! | test_mode | 1     | bool           |
//! | auth_key  | 256   | bytes          |
//! | user_id   | 8     | i64            |
//! | is_bot    | 1     | bool           |
//!
//! There is no version tag: the field order and widths are the format.
//!
//! # Telethon
//!
//! The character `1` followed by padded URL-safe base64 of the big-endian pack
//! `dc_id: u8, ip: 4 or 16 bytes, port: u16, auth_key: 256 bytes`.

use std::net::IpAddr;

use base64::Engine as _;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};

use crate::config::PLACEHOLDER_USER_ID;
use crate::errors::ConvertError;
use crate::format::SessionFormat;
use crate::session::AuthSession;
use crate::AUTH_KEY_SIZE;

/// Decoded size of a Pyrogram string session.
pub const PYROGRAM_PACKED_LEN: usize = 1 + 4 + 1 + AUTH_KEY_SIZE + 8 + 1;

/// Version prefix of Telethon string sessions.
pub const TELETHON_VERSION: char = '1';

const TELETHON_V4_LEN: usize = 1 + 4 + 2 + AUTH_KEY_SIZE;
const TELETHON_V6_LEN: usize = 1 + 16 + 2 + AUTH_KEY_SIZE;

/// Encode `session` as a string of the given format.
pub fn encode(format: SessionFormat, session: &AuthSession) -> Result<String, ConvertError> {
    match format {
        SessionFormat::PyrogramString => encode_pyrogram(session),
        SessionFormat::TelethonString => encode_telethon(session),
        file => Err(ConvertError::invalid(format!("{file} is not a string format"))),
    }
}

/// Decode a string of the given format.
pub fn decode(format: SessionFormat, s: &str) -> Result<AuthSession, ConvertError> {
    match format {
        SessionFormat::PyrogramString => decode_pyrogram(s),
        SessionFormat::TelethonString => decode_telethon(s),
        file => Err(ConvertError::invalid(format!("{file} is not a string format"))),
    }
}

// ─── Pyrogram ─────────────────────────────────────────────────────────────────

/// Pack a session into Pyrogram's string format.
///
/// Requires an `api_id`. A missing user id is written as
/// [`PLACEHOLDER_USER_ID`]; the conversion engine substitutes its configured
/// placeholder before it gets here.
pub fn encode_pyrogram(session: &AuthSession) -> Result<String, ConvertError> {
    let api_id = session.api_id().ok_or(ConvertError::MissingCredentials {
        reason: "a Pyrogram string session embeds the api_id",
    })?;

    let mut b = Vec::with_capacity(PYROGRAM_PACKED_LEN);
    b.push(session.dc_byte()?);
    b.extend_from_slice(&api_id.to_be_bytes());
    b.push(u8::from(session.test_mode()));
    b.extend_from_slice(&session.key_array()?);
    b.extend_from_slice(&session.user_id().unwrap_or(PLACEHOLDER_USER_ID).to_be_bytes());
    b.push(u8::from(session.is_bot()));
    debug_assert_eq!(b.len(), PYROGRAM_PACKED_LEN);

    Ok(URL_SAFE_NO_PAD.encode(b))
}

/// Unpack a Pyrogram string session.
pub fn decode_pyrogram(s: &str) -> Result<AuthSession, ConvertError> {
    let b = decode_padded(s.trim())?;
    if b.len() != PYROGRAM_PACKED_LEN {
        return Err(ConvertError::malformed(format!(
            "decoded to {} bytes, expected {PYROGRAM_PACKED_LEN}",
            b.len()
        )));
    }

    let dc_id = i64::from(b[0]);
    if !crate::dc::is_known(dc_id) {
        return Err(ConvertError::malformed(format!("dc_id {dc_id} outside 1-5")));
    }
    let api_id  = i32::from_be_bytes([b[1], b[2], b[3], b[4]]);
    let test    = b[5] != 0;
    let key     = &b[6..6 + AUTH_KEY_SIZE];
    let mut uid = [0u8; 8];
    uid.copy_from_slice(&b[262..270]);
    let user_id = i64::from_be_bytes(uid);
    let is_bot  = b[270] != 0;

    AuthSession::builder(dc_id, key)
        .api_id(Some(api_id))
        .test_mode(test)
        .user_id(Some(user_id))
        .is_bot(is_bot)
        .build()
}

// ─── Telethon ─────────────────────────────────────────────────────────────────

/// Pack a session into Telethon's `StringSession` format.
///
/// The server address must be an IP literal; hostnames have no encoding.
pub fn encode_telethon(session: &AuthSession) -> Result<String, ConvertError> {
    let ip: IpAddr = session.server_address().parse().map_err(|_| {
        ConvertError::invalid(format!(
            "server address `{}` is not an IP address",
            session.server_address()
        ))
    })?;

    let mut b = Vec::with_capacity(TELETHON_V6_LEN);
    b.push(session.dc_byte()?);
    match ip {
        IpAddr::V4(v4) => b.extend_from_slice(&v4.octets()),
        IpAddr::V6(v6) => b.extend_from_slice(&v6.octets()),
    }
    b.extend_from_slice(&session.port().to_be_bytes());
    b.extend_from_slice(&session.key_array()?);

    let mut out = String::with_capacity(1 + b.len() * 4 / 3 + 4);
    out.push(TELETHON_VERSION);
    URL_SAFE.encode_string(b, &mut out);
    Ok(out)
}

/// Unpack a Telethon `StringSession`.
pub fn decode_telethon(s: &str) -> Result<AuthSession, ConvertError> {
    let s = s.trim();
    let Some(body) = s.strip_prefix(TELETHON_VERSION) else {
        return Err(ConvertError::malformed(match s.chars().next() {
            Some(c) => format!("unsupported version `{c}`"),
            None => "empty string".to_string(),
        }));
    };
    let b = decode_padded(body)?;

    let ip_len = match b.len() {
        TELETHON_V4_LEN => 4,
        TELETHON_V6_LEN => 16,
        n => return Err(ConvertError::malformed(format!("decoded to {n} bytes"))),
    };
    let dc_id = i64::from(b[0]);
    if !crate::dc::is_known(dc_id) {
        return Err(ConvertError::malformed(format!("dc_id {dc_id} outside 1-5")));
    }
    let ip: IpAddr = if ip_len == 4 {
        IpAddr::from([b[1], b[2], b[3], b[4]])
    } else {
        let mut v6 = [0u8; 16];
        v6.copy_from_slice(&b[1..17]);
        IpAddr::from(v6)
    };
    let port = u16::from_be_bytes([b[1 + ip_len], b[2 + ip_len]]);
    let key = &b[3 + ip_len..];

    AuthSession::builder(dc_id, key)
        .server_address(ip.to_string())
        .port(port)
        .build()
}

/// Re-pad to a multiple of four characters and decode URL-safe base64.
fn decode_padded(s: &str) -> Result<Vec<u8>, ConvertError> {
    let trimmed = s.trim_end_matches('=');
    if trimmed.is_empty() {
        return Err(ConvertError::malformed("empty string"));
    }
    let mut padded = String::with_capacity(trimmed.len() + 3);
    padded.push_str(trimmed);
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    URL_SAFE
        .decode(padded)
        .map_err(|e| ConvertError::malformed(format!("invalid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthSession {
        AuthSession::builder(1, vec![0xAB; 256])
            .api_id(Some(12345))
            .user_id(Some(42))
            .build()
            .unwrap()
    }

    #[test]
    fn pyrogram_string_has_fixed_length() {
        let s = encode_pyrogram(&sample()).unwrap();
        // 271 bytes → 90 full groups + 1 trailing byte → 362 characters, no '='
        assert_eq!(s.len(), 362);
        assert!(!s.contains('='));
        assert!(!s.contains('+') && !s.contains('/'));
    }

    #[test]
    fn pyrogram_string_known_prefix() {
        let s = encode_pyrogram(&sample()).unwrap();
        // 0x01 0x00 0x00 0x30 0x39 0x00 → "AQAAMDkA"
        assert!(s.starts_with("AQAAMDkA"), "{s}");
    }

    #[test]
    fn pyrogram_round_trip() {
        let original = sample();
        let decoded = decode_pyrogram(&encode_pyrogram(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn pyrogram_round_trip_every_dc_and_flag() {
        for dc in 1..=5i64 {
            for (test_mode, is_bot) in [(false, false), (false, true), (true, false), (true, true)] {
                let original = AuthSession::builder(dc, (0..=255u8).collect::<Vec<_>>())
                    .api_id(Some(i32::MAX))
                    .user_id(Some(-5_000_000_000))
                    .test_mode(test_mode)
                    .is_bot(is_bot)
                    .build()
                    .unwrap();
                let decoded = decode_pyrogram(&encode_pyrogram(&original).unwrap()).unwrap();
                assert_eq!(decoded, original, "dc {dc}");
            }
        }
    }

    #[test]
    fn pyrogram_accepts_already_padded_input() {
        let s = encode_pyrogram(&sample()).unwrap();
        assert_eq!(decode_pyrogram(&format!("{s}==")).unwrap(), sample());
    }

    #[test]
    fn pyrogram_requires_api_id() {
        let s = AuthSession::builder(1, vec![0; 256]).build().unwrap();
        assert!(matches!(encode_pyrogram(&s), Err(ConvertError::MissingCredentials { .. })));
    }

    #[test]
    fn pyrogram_rejects_wrong_length_and_dc() {
        assert!(matches!(decode_pyrogram("AAAA"), Err(ConvertError::MalformedStringSession { .. })));

        let mut raw = vec![0u8; PYROGRAM_PACKED_LEN];
        raw[0] = 6;
        let s = URL_SAFE_NO_PAD.encode(&raw);
        assert!(matches!(decode_pyrogram(&s), Err(ConvertError::MalformedStringSession { .. })));
    }

    #[test]
    fn pyrogram_rejects_garbage() {
        assert!(matches!(decode_pyrogram("!!not base64!!"), Err(ConvertError::MalformedStringSession { .. })));
        assert!(matches!(decode_pyrogram(""), Err(ConvertError::MalformedStringSession { .. })));
    }

    #[test]
    fn telethon_round_trip_v4() {
        let original = AuthSession::builder(2, vec![7u8; 256]).build().unwrap();
        let s = encode_telethon(&original).unwrap();
        assert!(s.starts_with('1'));
        assert_eq!(s.len(), 1 + 352);
        assert_eq!(decode_telethon(&s).unwrap(), original);
    }

    #[test]
    fn telethon_round_trip_v6() {
        let original = AuthSession::builder(4, vec![9u8; 256])
            .server_address("2001:67c:4e8:f004::a")
            .port(443)
            .build()
            .unwrap();
        let decoded = decode_telethon(&encode_telethon(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn telethon_rejects_hostname_and_bad_version() {
        let s = AuthSession::builder(2, vec![7u8; 256]).server_address("example.org").build().unwrap();
        assert!(matches!(encode_telethon(&s), Err(ConvertError::InvalidSession { .. })));
        assert!(matches!(decode_telethon("2AAAA"), Err(ConvertError::MalformedStringSession { .. })));
    }
}
