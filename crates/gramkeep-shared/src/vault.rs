//! Credential vault for Telegram session secrets.
//!
//! Session strings are stored AES-256-CBC encrypted under a key the
//! operator supplies as a 64-hex-character string.  Every call draws a
//! fresh random 16-byte IV; the persisted envelope is
//! `hex(iv) + ":" + hex(ciphertext)`.  Decrypted secrets are never
//! cached -- callers decrypt on demand and drop the plaintext when the
//! session is open.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use crate::constants::{ENVELOPE_SEPARATOR, IV_SIZE, SESSION_KEY_HEX_LEN, SESSION_KEY_SIZE};
use crate::error::VaultError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Generate a fresh vault key, hex-encoded for storage in configuration.
pub fn generate_key() -> String {
    let mut key = [0u8; SESSION_KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut key);
    hex::encode(key)
}

/// Validate and decode the operator-supplied hex key.
///
/// Runs before any cryptographic operation so a bad deployment fails
/// loudly instead of producing undecryptable envelopes.
fn decode_key(key: &str) -> Result<[u8; SESSION_KEY_SIZE], VaultError> {
    if key.len() != SESSION_KEY_HEX_LEN {
        return Err(VaultError::Configuration(format!(
            "session key must be {} hex characters, got {}",
            SESSION_KEY_HEX_LEN,
            key.len()
        )));
    }

    let bytes = hex::decode(key)
        .map_err(|_| VaultError::Configuration("session key is not valid hex".to_string()))?;

    let mut out = [0u8; SESSION_KEY_SIZE];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Encrypt `plaintext` into an `hex(iv):hex(ciphertext)` envelope.
pub fn encrypt(key: &str, plaintext: &[u8]) -> Result<String, VaultError> {
    let key = decode_key(key)?;

    let mut iv = [0u8; IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let ciphertext =
        Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Ok(format!(
        "{}{}{}",
        hex::encode(iv),
        ENVELOPE_SEPARATOR,
        hex::encode(ciphertext)
    ))
}

/// Decrypt an envelope produced by [`encrypt`].
pub fn decrypt(key: &str, envelope: &str) -> Result<Vec<u8>, VaultError> {
    let key = decode_key(key)?;

    let (iv_hex, ct_hex) = envelope
        .split_once(ENVELOPE_SEPARATOR)
        .ok_or_else(|| VaultError::Decryption("envelope is missing the iv separator".to_string()))?;

    let iv_bytes = hex::decode(iv_hex)
        .map_err(|_| VaultError::Decryption("envelope iv is not valid hex".to_string()))?;
    if iv_bytes.len() != IV_SIZE {
        return Err(VaultError::Decryption(format!(
            "envelope iv must be {} bytes, got {}",
            IV_SIZE,
            iv_bytes.len()
        )));
    }

    let ciphertext = hex::decode(ct_hex)
        .map_err(|_| VaultError::Decryption("envelope ciphertext is not valid hex".to_string()))?;

    let mut iv = [0u8; IV_SIZE];
    iv.copy_from_slice(&iv_bytes);

    Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| {
            VaultError::Decryption("ciphertext could not be decrypted with this key".to_string())
        })
}

/// Decrypt an envelope that is known to hold UTF-8 text (session strings).
pub fn decrypt_string(key: &str, envelope: &str) -> Result<String, VaultError> {
    let bytes = decrypt(key, envelope)?;
    String::from_utf8(bytes)
        .map_err(|_| VaultError::Decryption("decrypted payload is not valid UTF-8".to_string()))
}
