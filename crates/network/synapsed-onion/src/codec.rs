//! Layer codec: the framing and primitives of one onion layer.
//!
//! ```text
//! Layer      := WrappedKey || SymCipher
//! WrappedKey := base64(ephemeral_x25519_pub || AES-256-GCM(kek, sym_key))   (exactly L chars)
//! SymCipher  := base64(nonce || AES-GCM(sym_key, address10 || inner_payload))
//! ```
//!
//! The wrapped key has no length prefix or delimiter. A relay splits it off at
//! the fixed offset `L`, which depends only on the configured symmetric key
//! size, so every node of a deployment must share one [`CodecConfig`].

use crate::address::{Address, ADDRESS_WIDTH};
use crate::config::CodecConfig;
use crate::keys::{RelayKeyPair, RelayPublicKey, KEY_LEN};
use crate::{Result, RoutingError};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use std::fmt;
use x25519_dalek::{EphemeralSecret, PublicKey};
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_WRAP_INFO: &[u8] = b"synapsed-onion/v1/key-wrap";

/// Symmetric cipher used for layer payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymmetricCipher {
    Aes128Gcm,
    Aes256Gcm,
}

impl SymmetricCipher {
    pub fn from_key_bits(bits: u16) -> Result<Self> {
        match bits {
            128 => Ok(Self::Aes128Gcm),
            256 => Ok(Self::Aes256Gcm),
            other => Err(RoutingError::InvalidConfig(format!(
                "unsupported symmetric key size {other} bits (expected 128 or 256)"
            ))),
        }
    }

    pub fn key_len(&self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::Aes256Gcm => 32,
        }
    }

    fn seal(&self, key: &[u8], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        let sealed = match self {
            Self::Aes128Gcm => Aes128Gcm::new_from_slice(key)
                .map_err(|e| RoutingError::EncryptionError(e.to_string()))?
                .encrypt(nonce, plaintext),
            Self::Aes256Gcm => Aes256Gcm::new_from_slice(key)
                .map_err(|e| RoutingError::EncryptionError(e.to_string()))?
                .encrypt(nonce, plaintext),
        };
        sealed.map_err(|_| RoutingError::EncryptionError("AES-GCM encryption failed".to_string()))
    }

    fn open(&self, key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let nonce = Nonce::from_slice(nonce);
        let opened = match self {
            Self::Aes128Gcm => Aes128Gcm::new_from_slice(key)
                .map_err(|e| RoutingError::DecryptionFailure(e.to_string()))?
                .decrypt(nonce, ciphertext),
            Self::Aes256Gcm => Aes256Gcm::new_from_slice(key)
                .map_err(|e| RoutingError::DecryptionFailure(e.to_string()))?
                .decrypt(nonce, ciphertext),
        };
        opened.map_err(|_| {
            RoutingError::DecryptionFailure("payload authentication failed".to_string())
        })
    }
}

/// An envelope of one or more nested layers, as carried between hops.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope(String);

impl Envelope {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Envelope {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Envelope({} chars)", self.0.len())
    }
}

/// Result of peeling one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnwrappedLayer {
    pub next_hop: Address,
    pub payload: Vec<u8>,
}

impl UnwrappedLayer {
    /// The inner payload as text. Nested layers are always ASCII; plaintext
    /// at the last hop must be UTF-8 to be delivered.
    pub fn payload_text(&self) -> Result<String> {
        String::from_utf8(self.payload.clone())
            .map_err(|_| RoutingError::MalformedLayer("inner payload is not UTF-8".to_string()))
    }
}

/// Produces and consumes single onion layers.
#[derive(Debug, Clone)]
pub struct LayerCodec {
    cipher: SymmetricCipher,
    wrapped_key_len: usize,
}

impl LayerCodec {
    /// Builds a codec and derives the wrapped-key length `L` from the
    /// configured key size. Fails on unsupported sizes.
    pub fn new(config: &CodecConfig) -> Result<Self> {
        let cipher = SymmetricCipher::from_key_bits(config.symmetric_key_bits)?;
        let raw_len = KEY_LEN + cipher.key_len() + TAG_LEN;
        let wrapped_key_len = base64::encoded_len(raw_len, true).ok_or_else(|| {
            RoutingError::InvalidConfig("wrapped key length overflows usize".to_string())
        })?;

        Ok(Self { cipher, wrapped_key_len })
    }

    /// Length `L` of the wrapped-key prefix of every layer.
    pub fn wrapped_key_len(&self) -> usize {
        self.wrapped_key_len
    }

    pub fn cipher(&self) -> SymmetricCipher {
        self.cipher
    }

    /// Encrypts `inner_payload` for one relay, prefixed by the address the
    /// relay must hand it to.
    pub fn wrap_layer(
        &self,
        next_hop: Address,
        inner_payload: &[u8],
        relay_key: &RelayPublicKey,
    ) -> Result<Envelope> {
        let mut sym_key = Zeroizing::new(vec![0u8; self.cipher.key_len()]);
        OsRng.fill_bytes(&mut sym_key);

        let mut plaintext = Zeroizing::new(Vec::with_capacity(ADDRESS_WIDTH + inner_payload.len()));
        plaintext.extend_from_slice(next_hop.encode().as_bytes());
        plaintext.extend_from_slice(inner_payload);

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let mut sym_cipher = nonce.to_vec();
        sym_cipher.extend(self.cipher.seal(&sym_key, &nonce, &plaintext)?);

        let wrapped_key = self.wrap_key(&sym_key, relay_key)?;
        if wrapped_key.len() != self.wrapped_key_len {
            return Err(RoutingError::EncryptionError(format!(
                "wrapped key is {} chars, expected {}",
                wrapped_key.len(),
                self.wrapped_key_len
            )));
        }

        let mut layer = wrapped_key;
        STANDARD.encode_string(&sym_cipher, &mut layer);
        Ok(Envelope(layer))
    }

    /// Peels one layer with the relay's own key pair.
    pub fn unwrap_layer(&self, layer: &str, own_keys: &RelayKeyPair) -> Result<UnwrappedLayer> {
        if !layer.is_ascii() {
            return Err(RoutingError::MalformedLayer("layer contains non-ASCII data".to_string()));
        }
        if layer.len() < self.wrapped_key_len {
            return Err(RoutingError::MalformedLayer(format!(
                "layer is {} chars, shorter than the {}-char wrapped key",
                layer.len(),
                self.wrapped_key_len
            )));
        }

        let (wrapped_key, sym_cipher) = layer.split_at(self.wrapped_key_len);
        if sym_cipher.len() % 4 != 0 {
            return Err(RoutingError::MalformedLayer(format!(
                "layer length {} is inconsistent with a {}-char wrapped key",
                layer.len(),
                self.wrapped_key_len
            )));
        }

        let sym_key = self.unwrap_key(wrapped_key, own_keys)?;

        let sym_cipher = STANDARD
            .decode(sym_cipher)
            .map_err(|e| RoutingError::DecryptionFailure(format!("payload is not base64: {e}")))?;
        if sym_cipher.len() < NONCE_LEN + TAG_LEN {
            return Err(RoutingError::DecryptionFailure(
                "payload ciphertext is truncated".to_string(),
            ));
        }
        let (nonce, ciphertext) = sym_cipher.split_at(NONCE_LEN);
        let plaintext = Zeroizing::new(self.cipher.open(&sym_key, nonce, ciphertext)?);

        if plaintext.len() < ADDRESS_WIDTH {
            return Err(RoutingError::MalformedLayer(format!(
                "decrypted layer is {} bytes, shorter than the address field",
                plaintext.len()
            )));
        }
        let next_hop = Address::decode(&plaintext[..ADDRESS_WIDTH])?;

        Ok(UnwrappedLayer {
            next_hop,
            payload: plaintext[ADDRESS_WIDTH..].to_vec(),
        })
    }

    fn wrap_key(&self, sym_key: &[u8], relay_key: &RelayPublicKey) -> Result<String> {
        let ephemeral = EphemeralSecret::random_from_rng(OsRng);
        let ephemeral_public = PublicKey::from(&ephemeral);
        let shared = ephemeral.diffie_hellman(relay_key.inner());
        if !shared.was_contributory() {
            return Err(RoutingError::InvalidKey(
                "relay public key is a low-order point".to_string(),
            ));
        }

        let (kek, nonce) = derive_kek(shared.as_bytes(), &ephemeral_public, relay_key.inner())?;
        let sealed = SymmetricCipher::Aes256Gcm.seal(kek.as_slice(), &nonce, sym_key)?;

        let mut wrapped = ephemeral_public.as_bytes().to_vec();
        wrapped.extend(sealed);
        Ok(STANDARD.encode(wrapped))
    }

    fn unwrap_key(&self, wrapped_key: &str, own_keys: &RelayKeyPair) -> Result<Zeroizing<Vec<u8>>> {
        let wrapped = STANDARD.decode(wrapped_key).map_err(|e| {
            RoutingError::DecryptionFailure(format!("wrapped key is not base64: {e}"))
        })?;
        if wrapped.len() != KEY_LEN + self.cipher.key_len() + TAG_LEN {
            return Err(RoutingError::DecryptionFailure(format!(
                "wrapped key decodes to {} bytes",
                wrapped.len()
            )));
        }

        let (ephemeral_bytes, sealed) = wrapped.split_at(KEY_LEN);
        let mut ephemeral = [0u8; KEY_LEN];
        ephemeral.copy_from_slice(ephemeral_bytes);
        let ephemeral_public = PublicKey::from(ephemeral);

        let shared = own_keys.secret().diffie_hellman(&ephemeral_public);
        if !shared.was_contributory() {
            return Err(RoutingError::DecryptionFailure(
                "ephemeral key is a low-order point".to_string(),
            ));
        }

        let own_public = own_keys.public_key();
        let (kek, nonce) = derive_kek(shared.as_bytes(), &ephemeral_public, own_public.inner())?;
        SymmetricCipher::Aes256Gcm
            .open(kek.as_slice(), &nonce, sealed)
            .map(Zeroizing::new)
            .map_err(|_| RoutingError::DecryptionFailure("symmetric key unwrap failed".to_string()))
    }
}

fn derive_kek(
    shared_secret: &[u8; KEY_LEN],
    ephemeral_public: &PublicKey,
    relay_public: &PublicKey,
) -> Result<(Zeroizing<[u8; 32]>, [u8; NONCE_LEN])> {
    let mut salt = [0u8; 2 * KEY_LEN];
    salt[..KEY_LEN].copy_from_slice(ephemeral_public.as_bytes());
    salt[KEY_LEN..].copy_from_slice(relay_public.as_bytes());

    let hk = Hkdf::<Sha256>::new(Some(&salt), shared_secret);
    let mut okm = Zeroizing::new([0u8; 32 + NONCE_LEN]);
    hk.expand(KEY_WRAP_INFO, okm.as_mut_slice())
        .map_err(|_| RoutingError::EncryptionError("HKDF-SHA256 expansion failed".to_string()))?;

    let mut kek = Zeroizing::new([0u8; 32]);
    kek.copy_from_slice(&okm[..32]);
    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&okm[32..]);
    Ok((kek, nonce))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(bits: u16) -> LayerCodec {
        LayerCodec::new(&CodecConfig { symmetric_key_bits: bits }).unwrap()
    }

    #[test]
    fn test_wrapped_key_len_follows_key_size() {
        assert_eq!(codec(256).wrapped_key_len(), 108);
        assert_eq!(codec(128).wrapped_key_len(), 88);
        assert!(LayerCodec::new(&CodecConfig { symmetric_key_bits: 192 }).is_err());
    }

    #[test]
    fn test_single_layer_round_trip() {
        let codec = codec(256);
        let relay = RelayKeyPair::generate();

        let layer = codec
            .wrap_layer(Address(3001), b"hello", &relay.public_key())
            .unwrap();
        let unwrapped = codec.unwrap_layer(layer.as_str(), &relay).unwrap();

        assert_eq!(unwrapped.next_hop, Address(3001));
        assert_eq!(unwrapped.payload, b"hello");
    }

    #[test]
    fn test_empty_payload_round_trip() {
        let codec = codec(128);
        let relay = RelayKeyPair::generate();

        let layer = codec.wrap_layer(Address(4002), b"", &relay.public_key()).unwrap();
        let unwrapped = codec.unwrap_layer(layer.as_str(), &relay).unwrap();

        assert_eq!(unwrapped.next_hop, Address(4002));
        assert!(unwrapped.payload.is_empty());
    }

    #[test]
    fn test_fresh_key_per_layer() {
        let codec = codec(256);
        let relay = RelayKeyPair::generate();
        let a = codec.wrap_layer(Address(3000), b"same", &relay.public_key()).unwrap();
        let b = codec.wrap_layer(Address(3000), b"same", &relay.public_key()).unwrap();

        let l = codec.wrapped_key_len();
        assert_ne!(&a.as_str()[..l], &b.as_str()[..l]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_is_decryption_failure() {
        let codec = codec(256);
        let relay = RelayKeyPair::generate();
        let other = RelayKeyPair::generate();

        let layer = codec.wrap_layer(Address(3000), b"secret", &relay.public_key()).unwrap();
        assert!(matches!(
            codec.unwrap_layer(layer.as_str(), &other),
            Err(RoutingError::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_short_layer_is_malformed() {
        let codec = codec(256);
        let relay = RelayKeyPair::generate();
        assert!(matches!(
            codec.unwrap_layer("AAAA", &relay),
            Err(RoutingError::MalformedLayer(_))
        ));
        assert!(matches!(
            codec.unwrap_layer("é", &relay),
            Err(RoutingError::MalformedLayer(_))
        ));
    }

    #[test]
    fn test_mismatched_key_size_is_rejected() {
        let sender = codec(128);
        let receiver = codec(256);
        let relay = RelayKeyPair::generate();

        let layer = sender.wrap_layer(Address(3000), b"payload", &relay.public_key()).unwrap();
        let err = receiver.unwrap_layer(layer.as_str(), &relay).unwrap_err();
        assert!(matches!(
            err,
            RoutingError::DecryptionFailure(_) | RoutingError::MalformedLayer(_)
        ));
    }

    #[test]
    fn test_every_tampered_payload_char_fails_decryption() {
        let codec = codec(256);
        let relay = RelayKeyPair::generate();
        let layer = codec
            .wrap_layer(Address(3000), b"tamper me please", &relay.public_key())
            .unwrap()
            .into_string();

        for index in codec.wrapped_key_len()..layer.len() {
            let mut bytes = layer.clone().into_bytes();
            bytes[index] = if bytes[index] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(bytes).unwrap();

            assert!(
                matches!(
                    codec.unwrap_layer(&tampered, &relay),
                    Err(RoutingError::DecryptionFailure(_))
                ),
                "tampering at {index} was not detected"
            );
        }
    }

    /// Seals an arbitrary next-hop field that `wrap_layer` cannot produce.
    fn raw_layer(codec: &LayerCodec, next_hop_field: &[u8], relay: &RelayPublicKey) -> String {
        let sym_key = vec![7u8; codec.cipher.key_len()];
        let nonce = [1u8; NONCE_LEN];
        let mut plaintext = next_hop_field.to_vec();
        plaintext.extend_from_slice(b"payload");

        let mut sym_cipher = nonce.to_vec();
        sym_cipher.extend(codec.cipher.seal(&sym_key, &nonce, &plaintext).unwrap());

        let mut layer = codec.wrap_key(&sym_key, relay).unwrap();
        STANDARD.encode_string(&sym_cipher, &mut layer);
        layer
    }

    #[test]
    fn test_next_hop_beyond_u32_is_invalid_destination() {
        let codec = codec(256);
        let relay = RelayKeyPair::generate();

        let layer = raw_layer(&codec, b"9999999999", &relay.public_key());
        assert!(matches!(
            codec.unwrap_layer(&layer, &relay),
            Err(RoutingError::InvalidDestination(9_999_999_999))
        ));

        let layer = raw_layer(&codec, b"99999x9999", &relay.public_key());
        assert!(matches!(
            codec.unwrap_layer(&layer, &relay),
            Err(RoutingError::MalformedLayer(_))
        ));
    }
}
