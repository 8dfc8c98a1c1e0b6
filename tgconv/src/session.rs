//! The canonical session record every reader produces and every writer consumes.

use std::fmt;

use crate::dc::{self, DEFAULT_PORT};
use crate::errors::ConvertError;
use crate::AUTH_KEY_SIZE;

// ─── AuthKey ──────────────────────────────────────────────────────────────────

/// Raw authorization key bytes.
///
/// Holds whatever a source stored; only [`AuthSession::validate`] enforces the
/// 256-byte length. `Debug` never prints the key itself.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthKey(Vec<u8>);

impl AuthKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] { &self.0 }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    /// Telegram's 64-bit key identifier: the low 8 bytes of SHA-1(key), little endian.
    pub fn key_id(&self) -> u64 {
        use sha1::{Digest, Sha1};
        let sha = Sha1::digest(&self.0);
        let mut id = [0u8; 8];
        id.copy_from_slice(&sha[12..20]);
        u64::from_le_bytes(id)
    }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthKey(len={}, id={:016x})", self.0.len(), self.key_id())
    }
}

// ─── ApiCredentials ───────────────────────────────────────────────────────────

/// API credentials from <https://my.telegram.org>.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_id:   i32,
    pub api_hash: String,
}

impl ApiCredentials {
    pub fn new(api_id: i32, api_hash: impl Into<String>) -> Self {
        Self { api_id, api_hash: api_hash.into() }
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .finish()
    }
}

// ─── AuthSession ──────────────────────────────────────────────────────────────

/// A Telegram session normalized from any supported representation.
///
/// Immutable once built: the only "mutations" ([`AuthSession::with_user_id`],
/// [`AuthSession::with_credentials`]) consume the record and return a new one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSession {
    auth_key:       AuthKey,
    dc_id:          i64,
    server_address: String,
    port:           u16,
    api_id:         Option<i32>,
    api_hash:       Option<String>,
    user_id:        Option<i64>,
    is_bot:         bool,
    test_mode:      bool,
}

impl AuthSession {
    /// Start a record for `dc_id`. The endpoint defaults to the DC's
    /// production address when the DC is known.
    pub fn builder(dc_id: i64, auth_key: impl Into<Vec<u8>>) -> AuthSessionBuilder {
        AuthSessionBuilder {
            auth_key:       AuthKey::new(auth_key),
            dc_id,
            server_address: None,
            port:           None,
            api_id:         None,
            api_hash:       None,
            user_id:        None,
            is_bot:         false,
            test_mode:      false,
        }
    }

    pub fn auth_key(&self) -> &AuthKey { &self.auth_key }
    pub fn dc_id(&self) -> i64 { self.dc_id }
    pub fn server_address(&self) -> &str { &self.server_address }
    pub fn port(&self) -> u16 { self.port }
    pub fn api_id(&self) -> Option<i32> { self.api_id }
    pub fn api_hash(&self) -> Option<&str> { self.api_hash.as_deref() }
    pub fn user_id(&self) -> Option<i64> { self.user_id }
    pub fn is_bot(&self) -> bool { self.is_bot }
    pub fn test_mode(&self) -> bool { self.test_mode }

    /// The same session with a known user id.
    pub fn with_user_id(self, user_id: i64) -> Self {
        Self { user_id: Some(user_id), ..self }
    }

    /// The same session carrying caller-supplied credentials. The caller's
    /// `api_id` replaces any id the source stored.
    pub fn with_credentials(self, credentials: &ApiCredentials) -> Self {
        Self {
            api_id:   Some(credentials.api_id),
            api_hash: Some(credentials.api_hash.clone()),
            ..self
        }
    }

    /// Structural checks applied before any writer sees the record.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if !dc::is_known(self.dc_id) {
            return Err(ConvertError::InvalidDatacenter { value: self.dc_id.to_string() });
        }
        match self.auth_key.len() {
            AUTH_KEY_SIZE => {}
            0 => return Err(ConvertError::invalid("auth key is empty")),
            n => {
                return Err(ConvertError::invalid(format!(
                    "auth key is {n} bytes, expected {AUTH_KEY_SIZE}"
                )));
            }
        }
        if self.server_address.is_empty() {
            return Err(ConvertError::invalid("server address is empty"));
        }
        Ok(())
    }

    /// The key as a fixed-size array. Only valid after [`AuthSession::validate`].
    pub(crate) fn key_array(&self) -> Result<[u8; AUTH_KEY_SIZE], ConvertError> {
        self.auth_key
            .as_bytes()
            .try_into()
            .map_err(|_| ConvertError::invalid(format!("auth key is {} bytes", self.auth_key.len())))
    }

    /// DC id as the single byte the string formats store.
    pub(crate) fn dc_byte(&self) -> Result<u8, ConvertError> {
        u8::try_from(self.dc_id)
            .ok()
            .filter(|&b| dc::is_known(i64::from(b)))
            .ok_or_else(|| ConvertError::InvalidDatacenter { value: self.dc_id.to_string() })
    }
}

/// Builder for [`AuthSession`]; see [`AuthSession::builder`].
#[derive(Clone, Debug)]
pub struct AuthSessionBuilder {
    auth_key:       AuthKey,
    dc_id:          i64,
    server_address: Option<String>,
    port:           Option<u16>,
    api_id:         Option<i32>,
    api_hash:       Option<String>,
    user_id:        Option<i64>,
    is_bot:         bool,
    test_mode:      bool,
}

impl AuthSessionBuilder {
    pub fn server_address(mut self, addr: impl Into<String>) -> Self {
        self.server_address = Some(addr.into()); self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port); self
    }

    pub fn api_id(mut self, api_id: Option<i32>) -> Self {
        self.api_id = api_id; self
    }

    pub fn api_hash(mut self, api_hash: Option<String>) -> Self {
        self.api_hash = api_hash; self
    }

    pub fn user_id(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id; self
    }

    pub fn is_bot(mut self, v: bool) -> Self {
        self.is_bot = v; self
    }

    pub fn test_mode(mut self, v: bool) -> Self {
        self.test_mode = v; self
    }

    /// Finish the record, deriving the endpoint from the DC table if the
    /// source did not store one.
    pub fn build(self) -> Result<AuthSession, ConvertError> {
        let (server_address, port) = match self.server_address {
            Some(addr) => (addr, self.port.unwrap_or(DEFAULT_PORT)),
            None => {
                let ep = dc::endpoint_for(self.dc_id)?;
                (ep.host.to_string(), self.port.unwrap_or(ep.port))
            }
        };
        Ok(AuthSession {
            auth_key: self.auth_key,
            dc_id: self.dc_id,
            server_address,
            port,
            api_id: self.api_id,
            api_hash: self.api_hash,
            user_id: self.user_id,
            is_bot: self.is_bot,
            test_mode: self.test_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_endpoint_from_dc() {
        let s = AuthSession::builder(4, vec![1u8; 256]).build().unwrap();
        assert_eq!(s.server_address(), "149.154.167.91");
        assert_eq!(s.port(), 443);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn explicit_endpoint_wins() {
        let s = AuthSession::builder(2, vec![1u8; 256])
            .server_address("10.0.0.1")
            .port(8443)
            .build()
            .unwrap();
        assert_eq!((s.server_address(), s.port()), ("10.0.0.1", 8443));
    }

    #[test]
    fn unknown_dc_without_address_fails_to_build() {
        let err = AuthSession::builder(9, vec![1u8; 256]).build().unwrap_err();
        assert!(matches!(err, ConvertError::InvalidDatacenter { .. }));
    }

    #[test]
    fn validate_rejects_bad_keys_and_dcs() {
        let short = AuthSession::builder(1, vec![1u8; 255]).build().unwrap();
        assert!(matches!(short.validate(), Err(ConvertError::InvalidSession { .. })));

        let empty = AuthSession::builder(1, Vec::new()).build().unwrap();
        assert!(matches!(empty.validate(), Err(ConvertError::InvalidSession { .. })));

        for dc in [0, 6, -1] {
            let s = AuthSession::builder(dc, vec![1u8; 256]).server_address("1.2.3.4").build().unwrap();
            assert!(matches!(s.validate(), Err(ConvertError::InvalidDatacenter { .. })));
        }
    }

    #[test]
    fn debug_never_prints_key_bytes() {
        let s = AuthSession::builder(1, vec![0xAB; 256]).build().unwrap();
        let dbg = format!("{s:?}");
        assert!(dbg.contains("AuthKey(len=256"));
        assert!(!dbg.contains("171, 171"));
    }

    #[test]
    fn credentials_override_stored_api_id() {
        let s = AuthSession::builder(1, vec![0; 256]).api_id(Some(1)).build().unwrap();
        let s = s.with_credentials(&ApiCredentials::new(2, "hash"));
        assert_eq!(s.api_id(), Some(2));
        assert_eq!(s.api_hash(), Some("hash"));
    }
}
