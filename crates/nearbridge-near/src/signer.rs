//! Full-access key signer for a single NEAR account.

use ed25519_dalek::{Signer as _, SigningKey};
use nearbridge_types::{BridgeError, Result};
use std::fmt;

const ED25519_PREFIX: &str = "ed25519:";

/// An account id paired with its ed25519 secret key, held in memory only.
#[derive(Clone)]
pub struct InMemorySigner {
    pub account_id: String,
    signing_key: SigningKey,
}

impl InMemorySigner {
    /// Parse a NEAR secret key string (`ed25519:<base58>`).
    ///
    /// Accepts both the 64-byte keypair form written by NEAR tooling and a bare 32-byte seed.
    pub fn from_secret_key(account_id: &str, secret_key: &str) -> Result<Self> {
        let encoded = secret_key
            .trim()
            .strip_prefix(ED25519_PREFIX)
            .ok_or_else(|| BridgeError::InvalidKey("only ed25519 keys are supported".into()))?;
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| BridgeError::InvalidKey(format!("invalid base58: {}", e)))?;

        let signing_key = match bytes.len() {
            64 => {
                let mut keypair = [0u8; 64];
                keypair.copy_from_slice(&bytes);
                SigningKey::from_keypair_bytes(&keypair)
                    .map_err(|e| BridgeError::InvalidKey(e.to_string()))?
            }
            32 => {
                let mut seed = [0u8; 32];
                seed.copy_from_slice(&bytes);
                SigningKey::from_bytes(&seed)
            }
            n => {
                return Err(BridgeError::InvalidKey(format!(
                    "expected 32 or 64 key bytes, got {}",
                    n
                )))
            }
        };

        Ok(Self {
            account_id: account_id.to_string(),
            signing_key,
        })
    }

    pub fn from_signing_key(account_id: &str, signing_key: SigningKey) -> Self {
        Self {
            account_id: account_id.to_string(),
            signing_key,
        }
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Public key in NEAR's textual form, as used by `view_access_key`.
    pub fn public_key(&self) -> String {
        format!("{}{}", ED25519_PREFIX, bs58::encode(self.public_key_bytes()).into_string())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for InMemorySigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemorySigner")
            .field("account_id", &self.account_id)
            .field("public_key", &self.public_key())
            .finish()
    }
}
