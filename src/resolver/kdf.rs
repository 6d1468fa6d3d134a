// Legacy password-based key derivation
//
// MD5 chaining compatible with OpenSSL's `EVP_BytesToKey` (one iteration),
// which is what `Salted__` envelopes produced by CryptoJS / `openssl enc -md md5`
// rely on. Output must match the encrypting side bit for bit.

pub const KEY_LEN: usize = 32;
pub const IV_LEN: usize = 16;
pub const SALT_LEN: usize = 8;

/// AES-256 key and CBC IV derived from a password and salt
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedSecret {
    pub key: [u8; KEY_LEN],
    pub iv: [u8; IV_LEN],
}

impl std::fmt::Debug for DerivedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DerivedSecret { .. }")
    }
}

/// Derive `key_len + iv_len` bytes and split them into (key, iv)
pub fn derive_with_lengths(
    password: &[u8],
    salt: &[u8],
    key_len: usize,
    iv_len: usize,
) -> (Vec<u8>, Vec<u8>) {
    let total = key_len + iv_len;
    let mut derived: Vec<u8> = Vec::with_capacity(total + 16);
    let mut prev: Vec<u8> = Vec::new();

    while derived.len() < total {
        let digest = md5::compute([prev.as_slice(), password, salt].concat());
        derived.extend_from_slice(&digest.0);
        prev = digest.0.to_vec();
    }

    let iv = derived[key_len..total].to_vec();
    derived.truncate(key_len);
    (derived, iv)
}

/// Derive the AES-256-CBC key and IV for an envelope salt
pub fn derive(password: &[u8], salt: &[u8; SALT_LEN]) -> DerivedSecret {
    let (key_bytes, iv_bytes) = derive_with_lengths(password, salt, KEY_LEN, IV_LEN);

    let mut key = [0u8; KEY_LEN];
    let mut iv = [0u8; IV_LEN];
    key.copy_from_slice(&key_bytes);
    iv.copy_from_slice(&iv_bytes);

    DerivedSecret { key, iv }
}
