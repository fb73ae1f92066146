/// Ed25519 key handling for delegated keys
///
/// Keys travel as text in the `ed25519:<base58>` form understood by the wallet:
/// the public key is the 32-byte verifying key and the secret key is the
/// 64-byte `seed || public` concatenation.
use crate::errors::{WalletError, WalletResult};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

const ED25519_PREFIX: &str = "ed25519:";
const SEED_LEN: usize = 32;
const PUBLIC_KEY_LEN: usize = 32;
const SECRET_KEY_LEN: usize = SEED_LEN + PUBLIC_KEY_LEN;

/// Public half of a delegated key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        self.0.as_bytes()
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        self.0.verify(message, signature).is_ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}{}",
            ED25519_PREFIX,
            bs58::encode(self.0.as_bytes()).into_string()
        )
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl FromStr for PublicKey {
    type Err = WalletError;

    fn from_str(value: &str) -> WalletResult<Self> {
        let bytes = decode_prefixed(value)?;
        let array: [u8; PUBLIC_KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            WalletError::InvalidKey(format!(
                "public key must be {} bytes, got {}",
                PUBLIC_KEY_LEN,
                bytes.len()
            ))
        })?;
        let key = VerifyingKey::from_bytes(&array)
            .map_err(|e| WalletError::InvalidKey(format!("invalid ed25519 point: {}", e)))?;
        Ok(PublicKey(key))
    }
}

/// Transient key-holder for one delegated key. The signing key is zeroized on drop.
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh key from the operating system RNG.
    pub fn generate() -> Self {
        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        OsRng.fill_bytes(&mut seed[..]);
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Reconstruct a key from its `ed25519:<base58>` secret key text.
    pub fn from_secret_key(secret: &str) -> WalletResult<Self> {
        let bytes = Zeroizing::new(decode_prefixed(secret)?);
        if bytes.len() != SECRET_KEY_LEN && bytes.len() != SEED_LEN {
            return Err(WalletError::InvalidKey(format!(
                "secret key must be {} or {} bytes, got {}",
                SECRET_KEY_LEN,
                SEED_LEN,
                bytes.len()
            )));
        }

        let mut seed = Zeroizing::new([0u8; SEED_LEN]);
        seed.copy_from_slice(&bytes[..SEED_LEN]);
        let signing_key = SigningKey::from_bytes(&seed);

        if bytes.len() == SECRET_KEY_LEN
            && signing_key.verifying_key().as_bytes()[..] != bytes[SEED_LEN..]
        {
            return Err(WalletError::InvalidKey(
                "secret key does not match its embedded public key".to_string(),
            ));
        }

        Ok(Self { signing_key })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key())
    }

    /// Secret key text suitable for persistence.
    pub fn secret_key(&self) -> Zeroizing<String> {
        let mut bytes = Zeroizing::new([0u8; SECRET_KEY_LEN]);
        bytes[..SEED_LEN].copy_from_slice(self.signing_key.as_bytes());
        bytes[SEED_LEN..].copy_from_slice(self.signing_key.verifying_key().as_bytes());
        Zeroizing::new(format!(
            "{}{}",
            ED25519_PREFIX,
            bs58::encode(&bytes[..]).into_string()
        ))
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Text form of a signature, matching the key encoding.
pub fn encode_signature(signature: &Signature) -> String {
    format!(
        "{}{}",
        ED25519_PREFIX,
        bs58::encode(signature.to_bytes()).into_string()
    )
}

fn decode_prefixed(value: &str) -> WalletResult<Vec<u8>> {
    let body = value.strip_prefix(ED25519_PREFIX).ok_or_else(|| {
        WalletError::InvalidKey(format!("key must start with '{}'", ED25519_PREFIX))
    })?;
    bs58::decode(body)
        .into_vec()
        .map_err(|e| WalletError::InvalidKey(format!("invalid base58: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_key_text_reconstructs_same_key() {
        let original = KeyPair::generate();
        let secret = original.secret_key();
        assert!(secret.starts_with(ED25519_PREFIX));

        let restored = KeyPair::from_secret_key(&secret).unwrap();
        assert_eq!(restored.public_key(), original.public_key());
    }

    #[test]
    fn public_key_text_parses() {
        let pair = KeyPair::generate();
        let text = pair.public_key().to_string();
        let parsed: PublicKey = text.parse().unwrap();
        assert_eq!(parsed, pair.public_key());
    }

    #[test]
    fn signatures_verify_against_public_key() {
        let pair = KeyPair::generate();
        let signature = pair.sign(b"payload");
        assert!(pair.public_key().verify(b"payload", &signature));
        assert!(!pair.public_key().verify(b"other", &signature));
        assert!(encode_signature(&signature).starts_with(ED25519_PREFIX));
    }

    #[test]
    fn malformed_secret_keys_rejected() {
        assert!(matches!(
            KeyPair::from_secret_key("secp256k1:abc"),
            Err(WalletError::InvalidKey(_))
        ));
        assert!(matches!(
            KeyPair::from_secret_key("ed25519:0OIl"),
            Err(WalletError::InvalidKey(_))
        ));
        assert!(matches!(
            KeyPair::from_secret_key("ed25519:3yZe7d"),
            Err(WalletError::InvalidKey(_))
        ));
    }

    #[test]
    fn mismatched_embedded_public_key_rejected() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let mut bytes = [0u8; SECRET_KEY_LEN];
        bytes[..SEED_LEN].copy_from_slice(a.signing_key.as_bytes());
        bytes[SEED_LEN..].copy_from_slice(b.public_key().as_bytes());
        let forged = format!("{}{}", ED25519_PREFIX, bs58::encode(bytes).into_string());
        assert!(KeyPair::from_secret_key(&forged).is_err());
    }
}
