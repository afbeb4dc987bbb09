//! Sealing of stored Apigee secrets (Edge password, X service account key).
//!
//! Ciphertexts are `base64(nonce || ChaCha20-Poly1305(plaintext))`.

use crate::error::{MigrateError, Result};
use base64::{engine::general_purpose, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::rngs::OsRng;
use rand::TryRngCore;

const NONCE_LEN: usize = 12;

fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    let mut rng = OsRng;
    rng.try_fill_bytes(&mut buf)
        .map_err(|e| MigrateError::Crypto(format!("OS random source unavailable: {}", e)))?;
    Ok(buf)
}

/// Generates a fresh base64-encoded 32-byte key.
pub fn generate_key() -> Result<String> {
    Ok(general_purpose::STANDARD.encode(random_bytes::<32>()?))
}

#[derive(Clone)]
pub struct CredentialSealer {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for CredentialSealer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSealer").finish_non_exhaustive()
    }
}

impl CredentialSealer {
    pub fn from_base64_key(key_b64: &str) -> Result<Self> {
        let key = general_purpose::STANDARD
            .decode(key_b64.trim())
            .map_err(|e| MigrateError::Crypto(format!("credential key is not base64: {}", e)))?;
        if key.len() != 32 {
            return Err(MigrateError::Crypto(
                "credential key must decode to 32 bytes".to_string(),
            ));
        }
        Ok(Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        })
    }

    /// Key lives only for this process; sealed values become unreadable after restart.
    pub fn ephemeral() -> Result<Self> {
        Self::from_base64_key(&generate_key()?)
    }

    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let nonce = random_bytes::<NONCE_LEN>()?;
        let ct = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| MigrateError::Crypto("encryption failed".to_string()))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ct.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ct);
        Ok(general_purpose::STANDARD.encode(out))
    }

    pub fn open(&self, sealed: &str) -> Result<String> {
        let decoded = general_purpose::STANDARD
            .decode(sealed.trim())
            .map_err(|e| MigrateError::Crypto(format!("sealed value is not base64: {}", e)))?;
        if decoded.len() <= NONCE_LEN {
            return Err(MigrateError::Crypto("sealed value too short".to_string()));
        }
        let (nonce, ct) = decoded.split_at(NONCE_LEN);
        let pt = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ct)
            .map_err(|_| MigrateError::Crypto("decryption failed".to_string()))?;
        String::from_utf8(pt).map_err(|e| MigrateError::Crypto(e.to_string()))
    }
}
