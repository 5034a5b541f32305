//! X25519 key material for relays.

use crate::{Result, RoutingError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use x25519_dalek::{PublicKey, StaticSecret};

/// Raw length of an X25519 key.
pub const KEY_LEN: usize = 32;

/// A relay's public key, carried as base64 text by the directory.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelayPublicKey(PublicKey);

impl RelayPublicKey {
    pub fn from_base64(encoded: &str) -> Result<Self> {
        decode_key(encoded, "public").map(|bytes| Self(PublicKey::from(bytes)))
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0.as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        self.0.as_bytes()
    }

    pub(crate) fn inner(&self) -> &PublicKey {
        &self.0
    }
}

impl From<PublicKey> for RelayPublicKey {
    fn from(key: PublicKey) -> Self {
        Self(key)
    }
}

impl TryFrom<String> for RelayPublicKey {
    type Error = RoutingError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_base64(&value)
    }
}

impl From<RelayPublicKey> for String {
    fn from(key: RelayPublicKey) -> Self {
        key.to_base64()
    }
}

impl fmt::Debug for RelayPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RelayPublicKey").field(&self.to_base64()).finish()
    }
}

/// A relay's long-term key pair. The secret half is zeroized on drop.
#[derive(Clone)]
pub struct RelayKeyPair {
    secret: StaticSecret,
    public: RelayPublicKey,
}

impl RelayKeyPair {
    /// Fresh key pair from the OS CSPRNG.
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(OsRng))
    }

    /// Restores a key pair from an exported private key.
    pub fn from_private_base64(encoded: &str) -> Result<Self> {
        decode_key(encoded, "private").map(|bytes| Self::from_secret(StaticSecret::from(bytes)))
    }

    pub fn public_key(&self) -> RelayPublicKey {
        self.public
    }

    /// Base64 export of the private key.
    pub fn export_private_base64(&self) -> String {
        STANDARD.encode(self.secret.as_bytes())
    }

    pub(crate) fn secret(&self) -> &StaticSecret {
        &self.secret
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = RelayPublicKey(PublicKey::from(&secret));
        Self { secret, public }
    }
}

impl fmt::Debug for RelayKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

fn decode_key(encoded: &str, kind: &str) -> Result<[u8; KEY_LEN]> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| RoutingError::InvalidKey(format!("{kind} key is not base64: {e}")))?;

    <[u8; KEY_LEN]>::try_from(bytes.as_slice()).map_err(|_| {
        RoutingError::InvalidKey(format!(
            "{kind} key must be {KEY_LEN} bytes, got {}",
            bytes.len()
        ))
    })
}
