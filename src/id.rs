use crate::error::{internal, invalid_argument, SessionResult};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// Number of random bytes mixed into every identifier.
const NONCE_LEN: usize = 32;

/// Opaque session identifier carried in the session cookie.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps an identifier received from a client or read back from a store.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Borrows the underlying identifier as `&str`.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Server-held key that every generated identifier is bound to.
#[derive(Clone)]
pub struct SessionSecret(Vec<u8>);

impl SessionSecret {
    /// Uses caller-supplied key material. An empty key is rejected.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> SessionResult<Self> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(invalid_argument("session secret must not be empty"));
        }
        Ok(Self(bytes))
    }

    /// Draws a fresh random key from the operating system RNG.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SessionSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionSecret(<redacted>)")
    }
}

/// Produces a new identifier: HMAC-SHA256 over 32 OS-random bytes, keyed by `secret`, hex encoded.
///
/// No uniqueness check is made against existing sessions; with 256 bits of input entropy a
/// collision is not expected in practice.
pub fn generate(secret: &SessionSecret) -> SessionResult<SessionId> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| internal(format!("hmac key rejected: {err}")))?;
    mac.update(&nonce);
    Ok(SessionId(hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_ids_are_hex_sha256_width() {
        let secret = SessionSecret::generate();
        let id = generate(&secret).expect("generate");
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_do_not_repeat() {
        let secret = SessionSecret::from_bytes(b"fixed-secret".to_vec()).expect("secret");
        let ids: HashSet<_> = (0..512)
            .map(|_| generate(&secret).expect("generate"))
            .collect();
        assert_eq!(ids.len(), 512);
    }

    #[test]
    fn empty_secret_is_rejected() {
        let err = SessionSecret::from_bytes(Vec::new()).expect_err("empty secret");
        assert_eq!(err.code, crate::error::ErrorCode::InvalidInput);
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = SessionSecret::from_bytes(b"hunter2".to_vec()).expect("secret");
        assert!(!format!("{secret:?}").contains("hunter2"));
    }
}
