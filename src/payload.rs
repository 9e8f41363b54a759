//! Payload envelope: what gets hidden, and how it is turned into a frame
//!
//! ```text
//! Payload (JSON) -> zlib -> encrypt per SecurityLevel -> || DELIMITER  = frame
//! ```
//!
//! File-like payloads are zip-wrapped before serialization so the original
//! filename travels with the content. Every decode step is an ordered list of
//! candidate decoders, tried until one succeeds.

use crate::crypto::{self, CryptoError};
use crate::error::StegoError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, Read, Write};
use std::str::FromStr;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

/// End-of-frame marker
pub const DELIMITER: &[u8] = b"###END###";

/// Default limit on the decoded size of file payloads (10 MiB)
pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

/// Largest zlib output [`open`] accepts; room for a base64 zip of a
/// [`MAX_FILE_SIZE`] file plus its JSON envelope
pub const MAX_INFLATED_LEN: usize = 4 * MAX_FILE_SIZE;

/// Position of the first delimiter in `bytes`
pub fn find_delimiter(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(DELIMITER.len())
        .position(|window| window == DELIMITER)
}

/// Encryption applied to a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    /// Compression only
    #[default]
    Basic,
    /// Password-derived AES-256-GCM
    Advanced,
    /// RSA-wrapped token key
    Premium,
}

impl SecurityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
            Self::Premium => "premium",
        }
    }

    /// Base robustness score awarded for this level
    pub fn score(&self) -> u32 {
        match self {
            Self::Basic => 10,
            Self::Advanced => 20,
            Self::Premium => 30,
        }
    }
}

impl fmt::Display for SecurityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityLevel {
    type Err = StegoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "advanced" => Ok(Self::Advanced),
            "premium" => Ok(Self::Premium),
            other => Err(StegoError::InvalidPayload(format!(
                "level must be 'basic', 'advanced', or 'premium', got '{other}'"
            ))),
        }
    }
}

/// Password and key material for sealing and opening frames
///
/// # Example
///
/// ```
/// use steghider::Credentials;
///
/// let creds = Credentials::new().with_password("correct horse");
/// assert!(creds.can_decrypt());
/// ```
#[derive(Clone, Default)]
pub struct Credentials {
    password: Option<String>,
    public_key_pem: Option<String>,
    private_key_pem: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("public_key_pem", &self.public_key_pem.is_some())
            .field("private_key_pem", &self.private_key_pem.as_ref().map(|_| "***"))
            .finish()
    }
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_public_key(mut self, pem: impl Into<String>) -> Self {
        self.public_key_pem = Some(pem.into());
        self
    }

    #[must_use]
    pub fn with_private_key(mut self, pem: impl Into<String>) -> Self {
        self.private_key_pem = Some(pem.into());
        self
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn public_key_pem(&self) -> Option<&str> {
        self.public_key_pem.as_deref()
    }

    pub fn private_key_pem(&self) -> Option<&str> {
        self.private_key_pem.as_deref()
    }

    /// True when a password or private key is available for decryption
    pub fn can_decrypt(&self) -> bool {
        self.password.is_some() || self.private_key_pem.is_some()
    }

    /// Fail early if `level` needs a credential that is not present
    pub fn check_for(&self, level: SecurityLevel) -> Result<(), StegoError> {
        match level {
            SecurityLevel::Basic => Ok(()),
            SecurityLevel::Advanced if self.password.is_none() => Err(StegoError::MissingPassword),
            SecurityLevel::Premium if self.public_key_pem.is_none() => {
                Err(StegoError::MissingPublicKey)
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Text,
    File,
    /// A file with accompanying text in `text_content`
    Composite,
    NftSecret,
}

impl PayloadKind {
    /// File and composite payloads carry base64 file content in `data`
    pub fn is_file_like(&self) -> bool {
        matches!(self, Self::File | Self::Composite)
    }
}

/// The structured content hidden inside an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "type")]
    pub kind: PayloadKind,
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub zipped: bool,
}

impl Payload {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::Text,
            data: text.into(),
            name: None,
            text_content: None,
            zipped: false,
        }
    }

    pub fn file(name: impl Into<String>, contents: &[u8]) -> Self {
        Self {
            kind: PayloadKind::File,
            data: BASE64.encode(contents),
            name: Some(name.into()),
            text_content: None,
            zipped: false,
        }
    }

    pub fn composite(name: impl Into<String>, contents: &[u8], text: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::Composite,
            text_content: Some(text.into()),
            ..Self::file(name, contents)
        }
    }

    pub fn nft_secret(sealed_metadata: impl Into<String>) -> Self {
        Self {
            kind: PayloadKind::NftSecret,
            ..Self::text(sealed_metadata)
        }
    }

    /// Decoded file content of an unzipped file-like payload
    pub fn file_bytes(&self) -> Result<Vec<u8>, StegoError> {
        if !self.kind.is_file_like() {
            return Err(StegoError::InvalidPayload(format!(
                "{:?} payload has no file content",
                self.kind
            )));
        }
        if self.zipped {
            return Ok(unzip_single(&BASE64.decode(&self.data)?)?.1);
        }
        Ok(BASE64.decode(&self.data)?)
    }

    /// Fail with `PayloadTooLarge` if the decoded file content exceeds `max`
    ///
    /// Pre-zipped payloads are measured by their unzipped entry.
    pub fn check_size(&self, max: usize) -> Result<(), StegoError> {
        if !self.kind.is_file_like() {
            return Ok(());
        }
        let size = if self.zipped {
            unzip_single_limited(&BASE64.decode(&self.data)?, max)?.1.len()
        } else {
            BASE64.decode(&self.data)?.len()
        };
        if size > max {
            return Err(StegoError::PayloadTooLarge { size, max });
        }
        Ok(())
    }

    fn zip_wrapped(mut self) -> Result<Self, StegoError> {
        if self.kind.is_file_like() && !self.zipped {
            let entry_name = self.name.as_deref().unwrap_or(UNNAMED_ENTRY);
            let archive = zip_single(entry_name, &BASE64.decode(&self.data)?)?;
            self.data = BASE64.encode(archive);
            self.zipped = true;
        }
        Ok(self)
    }

    fn unzipped(mut self) -> Result<Self, StegoError> {
        if self.kind.is_file_like() && self.zipped {
            let (entry_name, contents) = unzip_single(&BASE64.decode(&self.data)?)?;
            self.data = BASE64.encode(contents);
            if self.name.is_none() && entry_name != UNNAMED_ENTRY {
                self.name = Some(entry_name);
            }
            self.zipped = false;
        }
        Ok(self)
    }
}

/// Zip entry name used for file payloads that carry no name
const UNNAMED_ENTRY: &str = ".unnamed";

/// Zip `contents` as a single deflated entry
pub fn zip_single(entry_name: &str, contents: &[u8]) -> Result<Vec<u8>, StegoError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file::<_, ()>(
        entry_name,
        FileOptions::default().compression_method(zip::CompressionMethod::Deflated),
    )?;
    writer.write_all(contents)?;
    Ok(writer.finish()?.into_inner())
}

/// Name and content of the first entry of a zip archive, up to [`MAX_FILE_SIZE`]
pub fn unzip_single(archive: &[u8]) -> Result<(String, Vec<u8>), StegoError> {
    unzip_single_limited(archive, MAX_FILE_SIZE)
}

/// Like [`unzip_single`], failing with `PayloadTooLarge` past `max` bytes
///
/// The size declared in the archive is not trusted; reading stops one byte
/// past `max`.
pub fn unzip_single_limited(archive: &[u8], max: usize) -> Result<(String, Vec<u8>), StegoError> {
    let mut archive = ZipArchive::new(Cursor::new(archive))?;
    if archive.is_empty() {
        return Err(StegoError::InvalidPayload("zip archive has no entries".to_string()));
    }
    let mut entry = archive.by_index(0)?;
    let name = entry.name().to_string();
    let declared = entry.size();
    let mut contents = Vec::new();
    entry
        .by_ref()
        .take((max as u64).saturating_add(1))
        .read_to_end(&mut contents)?;
    if contents.len() > max {
        let size = usize::try_from(declared).unwrap_or(usize::MAX).max(contents.len());
        return Err(StegoError::PayloadTooLarge { size, max });
    }
    Ok((name, contents))
}

pub fn compress(data: &[u8]) -> Result<Vec<u8>, StegoError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflate a complete zlib stream of at most `limit` output bytes
///
/// Truncated streams and streams that inflate past `limit` are rejected.
fn inflate_zlib(data: &[u8], limit: usize) -> Option<Vec<u8>> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(data.len().saturating_mul(4).clamp(64, limit.max(64)));
    loop {
        if out.len() == out.capacity() {
            out.reserve(out.capacity().max(64));
        }
        let (before_in, before_out) = (inflater.total_in(), inflater.total_out());
        let consumed = usize::try_from(before_in).ok()?;
        let status = inflater
            .decompress_vec(data.get(consumed..)?, &mut out, FlushDecompress::None)
            .ok()?;
        if out.len() > limit {
            tracing::debug!(limit, "zlib output exceeds limit");
            return None;
        }
        if status == Status::StreamEnd {
            return Some(out);
        }
        let stalled = inflater.total_in() == before_in && inflater.total_out() == before_out;
        if stalled && out.len() < out.capacity() {
            return None;
        }
    }
}

fn raw_utf8(data: &[u8], limit: usize) -> Option<Vec<u8>> {
    if data.len() > limit {
        return None;
    }
    std::str::from_utf8(data).ok().map(|_| data.to_vec())
}

type Decompressor = fn(&[u8], usize) -> Option<Vec<u8>>;

const DECOMPRESSORS: [(&str, Decompressor); 2] = [("zlib", inflate_zlib), ("raw-utf8", raw_utf8)];

fn decompress(data: &[u8], limit: usize) -> Result<Vec<u8>, StegoError> {
    for (name, candidate) in DECOMPRESSORS {
        if let Some(out) = candidate(data, limit) {
            return Ok(out);
        }
        tracing::debug!(decoder = name, "decompression candidate rejected");
    }
    Err(StegoError::Decompression)
}

/// Compress then encrypt `data` according to `level`
pub fn seal(data: &[u8], level: SecurityLevel, creds: &Credentials) -> Result<Vec<u8>, StegoError> {
    creds.check_for(level)?;
    let compressed = compress(data)?;
    let sealed = match level {
        SecurityLevel::Basic => compressed,
        SecurityLevel::Advanced => {
            let password = creds.password().ok_or(StegoError::MissingPassword)?;
            crypto::encrypt_with_password(&compressed, password)?
        }
        SecurityLevel::Premium => {
            let pem = creds.public_key_pem().ok_or(StegoError::MissingPublicKey)?;
            crypto::encrypt_hybrid(&compressed, pem)?
        }
    };
    tracing::debug!(
        level = %level,
        plain = data.len(),
        sealed = sealed.len(),
        "sealed payload"
    );
    Ok(sealed)
}

/// Decrypt then decompress bytes produced by [`seal`]
///
/// Decryption tries the password, then the private key. Data that was never
/// encrypted is accepted when no credential is supplied, or when every
/// credential fails but the bytes inflate as zlib on their own.
///
/// Output is capped at [`MAX_INFLATED_LEN`]; see [`open_with_limit`].
pub fn open(data: &[u8], creds: &Credentials) -> Result<Vec<u8>, StegoError> {
    open_with_limit(data, creds, MAX_INFLATED_LEN)
}

/// [`open`] with a custom cap on the decompressed size
pub fn open_with_limit(
    data: &[u8],
    creds: &Credentials,
    max_len: usize,
) -> Result<Vec<u8>, StegoError> {
    let decrypted = decrypt(data, creds)?;
    decompress(&decrypted, max_len)
}

fn decrypt(data: &[u8], creds: &Credentials) -> Result<Vec<u8>, StegoError> {
    if !creds.can_decrypt() {
        return Ok(data.to_vec());
    }

    let mut last_error = CryptoError::DecryptionFailed;
    if let Some(password) = creds.password() {
        match crypto::decrypt_with_password(data, password) {
            Ok(plain) => return Ok(plain),
            Err(err) => {
                tracing::debug!(candidate = "password", error = %err, "decryption candidate rejected");
                last_error = err;
            }
        }
    }
    if let Some(pem) = creds.private_key_pem() {
        match crypto::decrypt_hybrid(data, pem) {
            Ok(plain) => return Ok(plain),
            Err(err) => {
                tracing::debug!(candidate = "private-key", error = %err, "decryption candidate rejected");
                last_error = err;
            }
        }
    }
    if inflate_zlib(data, MAX_INFLATED_LEN).is_some() {
        tracing::debug!("credentials unused: frame was not encrypted");
        return Ok(data.to_vec());
    }
    Err(last_error.into())
}

/// Build the frame for `payload`, enforcing [`MAX_FILE_SIZE`]
pub fn build_frame(
    payload: &Payload,
    level: SecurityLevel,
    creds: &Credentials,
) -> Result<Vec<u8>, StegoError> {
    build_frame_with_limit(payload, level, creds, MAX_FILE_SIZE)
}

/// Build the frame for `payload` with a custom file-size limit
pub fn build_frame_with_limit(
    payload: &Payload,
    level: SecurityLevel,
    creds: &Credentials,
    max_file_size: usize,
) -> Result<Vec<u8>, StegoError> {
    creds.check_for(level)?;
    payload.check_size(max_file_size)?;

    let wrapped = payload.clone().zip_wrapped()?;
    let json = serde_json::to_vec(&wrapped)?;
    let mut frame = seal(&json, level, creds)?;
    frame.extend_from_slice(DELIMITER);
    Ok(frame)
}

fn parse_json(text: &str) -> Option<Payload> {
    serde_json::from_str(text).ok()
}

fn wrap_plain_text(text: &str) -> Option<Payload> {
    Some(Payload::text(text))
}

type PayloadParser = fn(&str) -> Option<Payload>;

const PAYLOAD_PARSERS: [(&str, PayloadParser); 2] = [
    ("json", parse_json),
    ("plain-text", wrap_plain_text),
];

/// Recover the payload from a frame
///
/// Anything after the first delimiter is ignored.
pub fn parse_frame(frame: &[u8], creds: &Credentials) -> Result<Payload, StegoError> {
    let body = match find_delimiter(frame) {
        Some(end) => &frame[..end],
        None => frame,
    };
    let plain = open(body, creds)?;
    let text = String::from_utf8(plain)
        .map_err(|_| StegoError::InvalidPayload("payload is not UTF-8".to_string()))?;

    for (name, parser) in PAYLOAD_PARSERS {
        if let Some(payload) = parser(&text) {
            return payload.unzipped();
        }
        tracing::debug!(parser = name, "payload parser rejected");
    }
    Err(StegoError::InvalidPayload("unrecognized payload".to_string()))
}

/// Owner-only game metadata carried by `nft_secret` payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftMetadata {
    pub faction: String,
    pub superpower: String,
    pub keys_clue: String,
    pub level: u32,
    pub owner: String,
}

impl NftMetadata {
    /// Encrypt the metadata with the owner wallet as password, base64 encoded
    pub fn seal(&self) -> Result<String, StegoError> {
        let json = serde_json::to_vec(self)?;
        let encrypted = crypto::encrypt_with_password(&json, &self.owner)?;
        Ok(BASE64.encode(encrypted))
    }

    /// Reverse of [`NftMetadata::seal`]
    pub fn open(sealed: &str, owner_wallet: &str) -> Result<Self, StegoError> {
        let encrypted = BASE64.decode(sealed)?;
        let json = crypto::decrypt_with_password(&encrypted, owner_wallet)?;
        Ok(serde_json::from_slice(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_frame_round_trip() -> Result<(), StegoError> {
        let creds = Credentials::new();
        let frame = build_frame(&Payload::text("hello"), SecurityLevel::Basic, &creds)?;
        assert!(frame.ends_with(DELIMITER));
        assert_eq!(parse_frame(&frame, &creds)?, Payload::text("hello"));
        Ok(())
    }

    #[test]
    fn test_file_payload_is_zipped_then_unzipped() -> Result<(), StegoError> {
        let creds = Credentials::new();
        let original = Payload::file("notes.txt", b"line one\nline two\n");
        let frame = build_frame(&original, SecurityLevel::Basic, &creds)?;

        let json = open(&frame[..frame.len() - DELIMITER.len()], &creds)?;
        let on_wire: Payload = serde_json::from_slice(&json)?;
        assert!(on_wire.zipped);

        let recovered = parse_frame(&frame, &creds)?;
        assert_eq!(recovered, original);
        assert_eq!(recovered.file_bytes()?, b"line one\nline two\n");
        Ok(())
    }

    #[test]
    fn test_compressible_payload_round_trip() -> Result<(), StegoError> {
        let creds = Credentials::new();
        for repeats in [1usize, 10, 100, 5000] {
            let text = "Hello StegHider!".repeat(repeats);
            let sealed = seal(text.as_bytes(), SecurityLevel::Basic, &creds)?;
            assert!(sealed.len() < text.len() || repeats == 1);
            assert_eq!(open(&sealed, &creds)?, text.as_bytes(), "repeats {repeats}");

            let frame = build_frame(&Payload::text(&text), SecurityLevel::Basic, &creds)?;
            assert_eq!(parse_frame(&frame, &creds)?.data, text);
        }
        Ok(())
    }

    #[test]
    fn test_truncated_zlib_stream_rejected() -> Result<(), StegoError> {
        let sealed = compress("Hello StegHider!".repeat(50).as_bytes())?;
        let truncated = &sealed[..sealed.len() - 6];
        assert!(inflate_zlib(truncated, MAX_INFLATED_LEN).is_none());
        Ok(())
    }

    #[test]
    fn test_inflate_stops_at_limit() -> Result<(), StegoError> {
        let bomb = compress(&vec![0u8; 1 << 20])?;
        assert!(bomb.len() < 4096);
        assert!(matches!(
            open_with_limit(&bomb, &Credentials::new(), 64 * 1024),
            Err(StegoError::Decompression)
        ));
        assert_eq!(open_with_limit(&bomb, &Credentials::new(), 1 << 20)?.len(), 1 << 20);
        Ok(())
    }

    #[test]
    fn test_unzip_ignores_declared_size() -> Result<(), StegoError> {
        let archive = zip_single("zeros.bin", &vec![0u8; 4096])?;
        assert!(matches!(
            unzip_single_limited(&archive, 1000),
            Err(StegoError::PayloadTooLarge { max: 1000, .. })
        ));
        assert_eq!(unzip_single_limited(&archive, 4096)?.1.len(), 4096);
        Ok(())
    }

    #[test]
    fn test_unnamed_file_stays_unnamed() -> Result<(), StegoError> {
        let creds = Credentials::new();
        let original = Payload {
            name: None,
            ..Payload::file("ignored", b"anonymous bytes")
        };
        let frame = build_frame(&original, SecurityLevel::Basic, &creds)?;
        let recovered = parse_frame(&frame, &creds)?;
        assert_eq!(recovered.name, None);
        assert_eq!(recovered, original);
        Ok(())
    }

    #[test]
    fn test_pre_zipped_payload_obeys_size_limit() -> Result<(), StegoError> {
        let archive = zip_single("big.bin", &[7u8; 2048])?;
        let payload = Payload {
            data: BASE64.encode(archive),
            zipped: true,
            ..Payload::file("big.bin", &[])
        };
        let result = build_frame_with_limit(&payload, SecurityLevel::Basic, &Credentials::new(), 1024);
        assert!(matches!(result, Err(StegoError::PayloadTooLarge { max: 1024, .. })));

        let frame = build_frame_with_limit(&payload, SecurityLevel::Basic, &Credentials::new(), 4096)?;
        assert_eq!(parse_frame(&frame, &Credentials::new())?.file_bytes()?, vec![7u8; 2048]);
        Ok(())
    }

    #[test]
    fn test_composite_keeps_text_content() -> Result<(), StegoError> {
        let creds = Credentials::new().with_password("pw");
        let original = Payload::composite("a.bin", &[0, 1, 2, 255], "see attached");
        let frame = build_frame(&original, SecurityLevel::Advanced, &creds)?;
        let recovered = parse_frame(&frame, &creds)?;
        assert_eq!(recovered.text_content.as_deref(), Some("see attached"));
        assert_eq!(recovered.file_bytes()?, vec![0, 1, 2, 255]);
        Ok(())
    }

    #[test]
    fn test_missing_credentials_fail_before_work() {
        let none = Credentials::new();
        assert!(matches!(
            build_frame(&Payload::text("x"), SecurityLevel::Advanced, &none),
            Err(StegoError::MissingPassword)
        ));
        assert!(matches!(
            build_frame(&Payload::text("x"), SecurityLevel::Premium, &none),
            Err(StegoError::MissingPublicKey)
        ));
    }

    #[test]
    fn test_file_size_limit() {
        let payload = Payload::file("big.bin", &[0u8; 2048]);
        let result = build_frame_with_limit(&payload, SecurityLevel::Basic, &Credentials::new(), 1024);
        assert!(matches!(
            result,
            Err(StegoError::PayloadTooLarge { size: 2048, max: 1024 })
        ));
    }

    #[test]
    fn test_wrong_password_is_decryption_failure() -> Result<(), StegoError> {
        let frame = build_frame(
            &Payload::text("secret"),
            SecurityLevel::Advanced,
            &Credentials::new().with_password("right"),
        )?;
        let err = parse_frame(&frame, &Credentials::new().with_password("wrong")).unwrap_err();
        assert!(err.is_decryption_failure());
        Ok(())
    }

    #[test]
    fn test_uncompressed_legacy_text() -> Result<(), StegoError> {
        let mut frame = b"just some old plain text".to_vec();
        frame.extend_from_slice(DELIMITER);
        let payload = parse_frame(&frame, &Credentials::new())?;
        assert_eq!(payload, Payload::text("just some old plain text"));
        Ok(())
    }

    #[test]
    fn test_compressed_non_json_becomes_text() -> Result<(), StegoError> {
        let mut frame = compress(b"not json at all")?;
        frame.extend_from_slice(DELIMITER);
        assert_eq!(
            parse_frame(&frame, &Credentials::new())?,
            Payload::text("not json at all")
        );
        Ok(())
    }

    #[test]
    fn test_binary_garbage_fails_decompression() {
        let result = open(&[0xff, 0xfe, 0x00, 0x81], &Credentials::new());
        assert!(matches!(result, Err(StegoError::Decompression)));
    }

    #[test]
    fn test_first_delimiter_wins() -> Result<(), StegoError> {
        let creds = Credentials::new();
        let mut frame = build_frame(&Payload::text("first"), SecurityLevel::Basic, &creds)?;
        frame.extend(build_frame(&Payload::text("second"), SecurityLevel::Basic, &creds)?);
        assert_eq!(parse_frame(&frame, &creds)?.data, "first");
        Ok(())
    }

    #[test]
    fn test_wire_json_shape() -> Result<(), StegoError> {
        let json = serde_json::to_value(Payload::nft_secret("abc"))?;
        assert_eq!(json, serde_json::json!({"type": "nft_secret", "data": "abc"}));
        Ok(())
    }

    #[test]
    fn test_security_level_parsing() {
        assert_eq!("Premium".parse::<SecurityLevel>().ok(), Some(SecurityLevel::Premium));
        assert!("ultra".parse::<SecurityLevel>().is_err());
        assert_eq!(SecurityLevel::Advanced.score(), 20);
    }

    #[test]
    fn test_nft_metadata_seal_open() -> Result<(), StegoError> {
        let metadata = NftMetadata {
            faction: "Owls".into(),
            superpower: "night vision".into(),
            keys_clue: "under the third stone".into(),
            level: 3,
            owner: "0xabc123".into(),
        };
        let sealed = metadata.seal()?;
        assert_eq!(NftMetadata::open(&sealed, "0xabc123")?, metadata);
        assert!(NftMetadata::open(&sealed, "0xother").is_err());
        Ok(())
    }
}
