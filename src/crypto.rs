//! Encryption envelopes for embedded payloads
//!
//! Two modes are supported:
//!
//! - **Password**: PBKDF2-HMAC-SHA256 (100 000 rounds, 16-byte salt) derives an
//!   AES-256-GCM key. Layout: `salt (16) || nonce (12) || ciphertext || tag (16)`.
//! - **Hybrid**: a fresh [`TokenKey`] encrypts the data as a legacy token and the
//!   key itself is wrapped with RSA-OAEP-SHA256. Layout: `wrapped key (256) || token`.
//!
//! Password decryption also accepts `salt (16) || token`, where the derived key
//! is used as the token key.

use crate::token::TokenKey;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::path::Path;
use thiserror::Error;

pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const RSA_KEY_BITS: usize = 2048;
/// Size of an RSA-2048 OAEP ciphertext
pub const WRAPPED_KEY_LEN: usize = RSA_KEY_BITS / 8;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Decryption failed: wrong credential or corrupted data")]
    DecryptionFailed,
    #[error("Encryption failed: {0}")]
    AeadError(aes_gcm::Error),
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("RSA operation failed: {0}")]
    Rsa(String),
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),
    #[error("Invalid token: {0}")]
    InvalidToken(&'static str),
}

/// Derive a 256-bit key from a password and salt
pub fn derive_key(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

/// Encrypt `data` under a password-derived AES-256-GCM key
pub fn encrypt_with_password(data: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut salt);
    OsRng.fill_bytes(&mut iv);

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&iv), data)
        .map_err(CryptoError::AeadError)?;

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

type PasswordLayout = fn(&[u8], &[u8; 32]) -> Result<Vec<u8>, CryptoError>;

/// Layouts accepted after the salt, in the order they are tried
const PASSWORD_LAYOUTS: [(&str, PasswordLayout); 2] = [
    ("aes-256-gcm", open_gcm_layout),
    ("legacy-token", open_token_layout),
];

fn open_gcm_layout(body: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    if body.len() < NONCE_LEN + TAG_LEN {
        return Err(CryptoError::DecryptionFailed);
    }
    let (iv, ciphertext) = body.split_at(NONCE_LEN);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

fn open_token_layout(body: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, CryptoError> {
    TokenKey::from_bytes(key)?.decrypt(body)
}

/// Decrypt password-mode data
///
/// The key is derived once from the leading salt and then each accepted layout
/// is tried in turn. Fails with [`CryptoError::DecryptionFailed`] when none
/// authenticates.
pub fn decrypt_with_password(data: &[u8], password: &str) -> Result<Vec<u8>, CryptoError> {
    if data.len() < SALT_LEN {
        return Err(CryptoError::DecryptionFailed);
    }
    let (salt, body) = data.split_at(SALT_LEN);
    let key = derive_key(password, salt);

    for (name, open) in PASSWORD_LAYOUTS {
        match open(body, &key) {
            Ok(plaintext) => return Ok(plaintext),
            Err(err) => tracing::debug!(layout = name, error = %err, "password layout rejected"),
        }
    }
    Err(CryptoError::DecryptionFailed)
}

/// Encrypt `data` for the holder of the private key matching `public_key_pem`
pub fn encrypt_hybrid(data: &[u8], public_key_pem: &str) -> Result<Vec<u8>, CryptoError> {
    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let token_key = TokenKey::generate();
    let token = token_key.encrypt(data)?;

    let wrapped = public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), token_key.to_base64().as_bytes())
        .map_err(|e| CryptoError::Rsa(e.to_string()))?;
    if wrapped.len() != WRAPPED_KEY_LEN {
        return Err(CryptoError::InvalidKey(format!(
            "expected a {RSA_KEY_BITS}-bit RSA key, got {} bits",
            wrapped.len() * 8
        )));
    }

    let mut out = wrapped;
    out.extend_from_slice(&token);
    Ok(out)
}

/// Decrypt hybrid-mode data with a PKCS#8 PEM private key
pub fn decrypt_hybrid(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, CryptoError> {
    let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    if data.len() <= WRAPPED_KEY_LEN {
        return Err(CryptoError::DecryptionFailed);
    }

    let (wrapped, token) = data.split_at(WRAPPED_KEY_LEN);
    let encoded_key = private_key
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map_err(|_| CryptoError::DecryptionFailed)?;
    TokenKey::from_base64(&encoded_key)?.decrypt(token)
}

/// PEM-encoded RSA key pair for hybrid mode
#[derive(Clone)]
pub struct KeyPair {
    pub private_key_pem: String,
    pub public_key_pem: String,
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key_pem", &self.public_key_pem)
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generate a new RSA-2048 key pair (PKCS#8 private, SPKI public)
    pub fn generate() -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_key_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?
            .to_string();
        let public_key_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;

        Ok(Self {
            private_key_pem,
            public_key_pem,
        })
    }

    /// Write both keys as PEM files
    pub fn write_pem_files(
        &self,
        private_path: impl AsRef<Path>,
        public_path: impl AsRef<Path>,
    ) -> std::io::Result<()> {
        std::fs::write(private_path.as_ref(), &self.private_key_pem)?;
        std::fs::write(public_path.as_ref(), &self.public_key_pem)?;
        tracing::info!(
            private = %private_path.as_ref().display(),
            public = %public_path.as_ref().display(),
            "wrote RSA key pair"
        );
        Ok(())
    }
}
