// Local decryption of `Salted__` envelopes
//
// Layout: b"Salted__" | 8-byte salt | AES-256-CBC ciphertext (PKCS#7).
// A malformed envelope is an expected classification outcome, so the public
// entry point returns `Option`; the `Result` variant keeps the failure kind
// for strict callers.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, KeyIvInit};
use tracing::debug;

use super::errors::ResolveError;
use super::kdf::{self, SALT_LEN};

type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const ENVELOPE_MARKER: &[u8; 8] = b"Salted__";
const HEADER_LEN: usize = ENVELOPE_MARKER.len() + SALT_LEN;
const BLOCK_LEN: usize = 16;

/// Parsed cipher envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherEnvelope {
    pub salt: [u8; SALT_LEN],
    pub ciphertext: Vec<u8>,
}

impl CipherEnvelope {
    /// Split raw envelope bytes, checking the literal marker
    pub fn parse(raw: &[u8]) -> Result<Self, ResolveError> {
        if raw.len() < HEADER_LEN || &raw[..ENVELOPE_MARKER.len()] != ENVELOPE_MARKER {
            return Err(ResolveError::EnvelopeMalformed(
                "missing Salted__ marker".to_string(),
            ));
        }

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&raw[ENVELOPE_MARKER.len()..HEADER_LEN]);
        let ciphertext = raw[HEADER_LEN..].to_vec();

        if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
            return Err(ResolveError::EnvelopeMalformed(format!(
                "ciphertext length {} is not a positive multiple of {}",
                ciphertext.len(),
                BLOCK_LEN
            )));
        }

        Ok(Self { salt, ciphertext })
    }

    /// Decode base64 text and parse the envelope
    pub fn from_base64(encoded: &str) -> Result<Self, ResolveError> {
        let raw = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ResolveError::EnvelopeMalformed(format!("base64: {}", e)))?;
        Self::parse(&raw)
    }

    /// Decrypt with a password, returning the UTF-8 plaintext
    pub fn open(&self, password: &str) -> Result<String, ResolveError> {
        let secret = kdf::derive(password.as_bytes(), &self.salt);

        let plaintext = Aes256CbcDec::new(&secret.key.into(), &secret.iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&self.ciphertext)
            .map_err(|_| ResolveError::CipherFailure("bad padding (wrong key?)".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| ResolveError::CipherFailure("plaintext is not UTF-8".to_string()))
    }
}

/// Check whether `encoded` is a base64 `Salted__` envelope, without decrypting
pub fn looks_like_envelope(encoded: &str) -> bool {
    CipherEnvelope::from_base64(encoded).is_ok()
}

/// Decrypt an envelope, keeping the failure kind
pub fn try_decrypt(envelope_base64: &str, password: &str) -> Result<String, ResolveError> {
    let envelope = CipherEnvelope::from_base64(envelope_base64)?;
    let plaintext = envelope.open(password)?;
    debug!(bytes = plaintext.len(), "Envelope decrypted");
    Ok(plaintext)
}

/// Decrypt an envelope; any malformed input or cipher failure yields `None`
pub fn decrypt(envelope_base64: &str, password: &str) -> Option<String> {
    try_decrypt(envelope_base64, password).ok()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cbc::cipher::BlockEncryptMut;

    type Aes256CbcEnc = cbc::Encryptor<Aes256>;

    // openssl enc -aes-256-cbc -md md5 -S 0102030405060708 -pass pass:megacloud-test-password
    pub(crate) const VECTOR_PASSWORD: &str = "megacloud-test-password";
    pub(crate) const VECTOR_ENVELOPE: &str = "U2FsdGVkX18BAgMEBQYHCIdoM9SqatbJZ1CeOh3VenICLICRUqqx7ICMP9rx1hQEmV1s7NsHM/WgKf5/8EhY5Zp2xOQyR78xgixlTSq8Zal45Sk8eThLsU/soFSebIvK";
    pub(crate) const VECTOR_PLAINTEXT: &str =
        r#"[{"file":"https://cdn.example.net/hls/abc/master.m3u8","type":"hls"}]"#;

    /// Build an envelope the way the provider does
    pub(crate) fn seal(plaintext: &str, password: &str, salt: [u8; SALT_LEN]) -> String {
        let secret = kdf::derive(password.as_bytes(), &salt);
        let ciphertext = Aes256CbcEnc::new(&secret.key.into(), &secret.iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut raw = ENVELOPE_MARKER.to_vec();
        raw.extend_from_slice(&salt);
        raw.extend_from_slice(&ciphertext);
        STANDARD.encode(raw)
    }

    #[test]
    fn test_decrypts_openssl_vector() {
        assert_eq!(
            decrypt(VECTOR_ENVELOPE, VECTOR_PASSWORD).as_deref(),
            Some(VECTOR_PLAINTEXT)
        );
    }

    #[test]
    fn test_seal_matches_openssl_vector() {
        let sealed = seal(VECTOR_PLAINTEXT, VECTOR_PASSWORD, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(sealed, VECTOR_ENVELOPE);
    }

    #[test]
    fn test_round_trip() {
        let plaintext = "https://cdn.example.net/hls/xyz/index.m3u8";
        let sealed = seal(plaintext, "rotating-key", *b"\xde\xad\xbe\xef\x00\x11\x22\x33");
        assert_eq!(decrypt(&sealed, "rotating-key").as_deref(), Some(plaintext));
    }

    #[test]
    fn test_wrong_marker_is_none() {
        let mut raw = b"Salted_X".to_vec();
        raw.extend_from_slice(&[0u8; 8 + 16]);
        let encoded = STANDARD.encode(raw);

        assert_eq!(decrypt(&encoded, VECTOR_PASSWORD), None);
        assert!(matches!(
            try_decrypt(&encoded, VECTOR_PASSWORD),
            Err(ResolveError::EnvelopeMalformed(_))
        ));
    }

    #[test]
    fn test_not_base64_is_none() {
        assert_eq!(decrypt("%%% definitely not base64 %%%", VECTOR_PASSWORD), None);
        assert!(!looks_like_envelope("%%%"));
    }

    #[test]
    fn test_wrong_password_is_cipher_failure() {
        assert!(matches!(
            try_decrypt(VECTOR_ENVELOPE, "wrong-password"),
            Err(ResolveError::CipherFailure(_))
        ));
    }

    #[test]
    fn test_truncated_ciphertext_is_malformed() {
        let raw = STANDARD.decode(VECTOR_ENVELOPE).unwrap();
        let truncated = STANDARD.encode(&raw[..raw.len() - 3]);
        assert!(matches!(
            try_decrypt(&truncated, VECTOR_PASSWORD),
            Err(ResolveError::EnvelopeMalformed(_))
        ));
    }

    #[test]
    fn test_looks_like_envelope() {
        assert!(looks_like_envelope(VECTOR_ENVELOPE));
        assert!(!looks_like_envelope(&STANDARD.encode("plain opaque token data!")));
    }
}
