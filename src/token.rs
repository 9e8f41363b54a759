//! Legacy authenticated token format
//!
//! Fernet-compatible tokens, still produced by hybrid mode and accepted as a
//! fallback by password mode so that older artifacts remain readable.
//!
//! ```text
//! base64url( 0x80 || timestamp (u64 BE) || iv (16) || AES-128-CBC(PKCS7) || HMAC-SHA256 (32) )
//! ```
//!
//! The 32-byte key is split into a 16-byte signing key followed by a 16-byte
//! encryption key, and travels as URL-safe base64.

use crate::crypto::CryptoError;
use aes::Aes128;
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

const VERSION: u8 = 0x80;
const IV_LEN: usize = 16;
const MAC_LEN: usize = 32;
const HEADER_LEN: usize = 1 + 8 + IV_LEN;
/// Tokens stamped further than this in the future are rejected.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Signing and encryption halves of a token key.
#[derive(Clone)]
pub struct TokenKey {
    signing: [u8; 16],
    encryption: [u8; 16],
}

impl std::fmt::Debug for TokenKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenKey(..)")
    }
}

impl TokenKey {
    /// Create a fresh random key
    pub fn generate() -> Self {
        let mut key = [0u8; 32];
        OsRng.fill_bytes(&mut key);
        Self::split(&key)
    }

    /// Build a key from 32 raw bytes
    pub fn from_bytes(key: &[u8]) -> Result<Self, CryptoError> {
        let key: &[u8; 32] = key
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(format!("token key must be 32 bytes, got {}", key.len())))?;
        Ok(Self::split(key))
    }

    /// Build a key from its URL-safe base64 form
    pub fn from_base64(encoded: &[u8]) -> Result<Self, CryptoError> {
        let raw = URL_SAFE
            .decode(encoded)
            .map_err(|_| CryptoError::InvalidKey("token key is not base64url".to_string()))?;
        Self::from_bytes(&raw)
    }

    /// URL-safe base64 form of the full 32-byte key
    pub fn to_base64(&self) -> String {
        URL_SAFE.encode([self.signing, self.encryption].concat())
    }

    fn split(key: &[u8; 32]) -> Self {
        let mut signing = [0u8; 16];
        let mut encryption = [0u8; 16];
        signing.copy_from_slice(&key[..16]);
        encryption.copy_from_slice(&key[16..]);
        Self {
            signing,
            encryption,
        }
    }

    fn mac(&self) -> Result<HmacSha256, CryptoError> {
        <HmacSha256 as Mac>::new_from_slice(&self.signing)
            .map_err(|_| CryptoError::InvalidKey("HMAC key rejected".to_string()))
    }

    /// Encrypt `data` into a token stamped with the current time
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);
        let timestamp = chrono::Utc::now().timestamp().max(0) as u64;
        self.encrypt_with(data, timestamp, iv)
    }

    fn encrypt_with(
        &self,
        data: &[u8],
        timestamp: u64,
        iv: [u8; IV_LEN],
    ) -> Result<Vec<u8>, CryptoError> {
        let ciphertext = Aes128CbcEnc::new(&self.encryption.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(data);

        let mut body = Vec::with_capacity(HEADER_LEN + ciphertext.len() + MAC_LEN);
        body.push(VERSION);
        body.extend_from_slice(&timestamp.to_be_bytes());
        body.extend_from_slice(&iv);
        body.extend_from_slice(&ciphertext);

        let mut mac = self.mac()?;
        mac.update(&body);
        body.extend_from_slice(&mac.finalize().into_bytes());

        Ok(URL_SAFE.encode(body).into_bytes())
    }

    /// Verify and decrypt a token
    pub fn decrypt(&self, token: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let body = URL_SAFE
            .decode(token)
            .map_err(|_| CryptoError::InvalidToken("not base64url"))?;

        if body.len() < HEADER_LEN + 16 + MAC_LEN || (body.len() - HEADER_LEN - MAC_LEN) % 16 != 0
        {
            return Err(CryptoError::InvalidToken("bad length"));
        }
        if body[0] != VERSION {
            return Err(CryptoError::InvalidToken("unknown version"));
        }

        let mut stamp = [0u8; 8];
        stamp.copy_from_slice(&body[1..9]);
        let timestamp = u64::from_be_bytes(stamp);
        let now = chrono::Utc::now().timestamp();
        if timestamp > (now + MAX_CLOCK_SKEW_SECS).max(0) as u64 {
            return Err(CryptoError::InvalidToken("timestamp in the future"));
        }

        let (signed, tag) = body.split_at(body.len() - MAC_LEN);
        let mut mac = self.mac()?;
        mac.update(signed);
        mac.verify_slice(tag)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(&signed[9..HEADER_LEN]);
        Aes128CbcDec::new(&self.encryption.into(), &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&signed[HEADER_LEN..])
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() -> Result<(), CryptoError> {
        let key = TokenKey::generate();
        let token = key.encrypt(b"legacy secret")?;
        assert!(token.iter().all(|b| b.is_ascii()));
        assert_eq!(key.decrypt(&token)?, b"legacy secret");
        Ok(())
    }

    #[test]
    fn test_token_layout() -> Result<(), CryptoError> {
        let key = TokenKey::from_bytes(&[7u8; 32])?;
        let token = key.encrypt_with(b"0123456789abcdef", 1_700_000_000, [1u8; 16])?;
        let body = URL_SAFE.decode(&token).unwrap();

        assert_eq!(body[0], VERSION);
        assert_eq!(&body[1..9], &1_700_000_000u64.to_be_bytes());
        assert_eq!(&body[9..25], &[1u8; 16]);
        // one full block of plaintext pads to two blocks
        assert_eq!(body.len(), HEADER_LEN + 32 + MAC_LEN);
        Ok(())
    }

    #[test]
    fn test_wrong_key_rejected() -> Result<(), CryptoError> {
        let token = TokenKey::generate().encrypt(b"data")?;
        let result = TokenKey::generate().decrypt(&token);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
        Ok(())
    }

    #[test]
    fn test_future_timestamp_rejected() -> Result<(), CryptoError> {
        let key = TokenKey::generate();
        let future = (chrono::Utc::now().timestamp() + 3600) as u64;
        let token = key.encrypt_with(b"data", future, [0u8; 16])?;
        assert!(matches!(
            key.decrypt(&token),
            Err(CryptoError::InvalidToken("timestamp in the future"))
        ));
        Ok(())
    }

    #[test]
    fn test_base64_key_round_trip() -> Result<(), CryptoError> {
        let key = TokenKey::generate();
        let encoded = key.to_base64();
        assert_eq!(encoded.len(), 44);
        let restored = TokenKey::from_base64(encoded.as_bytes())?;
        let token = key.encrypt(b"shared")?;
        assert_eq!(restored.decrypt(&token)?, b"shared");
        Ok(())
    }
}
