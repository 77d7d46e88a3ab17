// SPDX-FileCopyrightText: 2026 Biogate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations used inside key stores.
//!
//! Every call to [`seal`] draws a fresh 96-bit nonce from the system CSPRNG.
//! The nonce is the "iv" persisted next to the ciphertext.

use biogate_core::BiogateError;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

/// Length of an AES-256 key in bytes.
pub const KEY_LEN: usize = 32;

/// Length of the GCM nonce (iv) in bytes.
pub const IV_LEN: usize = NONCE_LEN;

fn less_safe_key(key: &[u8; KEY_LEN]) -> Result<LessSafeKey, BiogateError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key)
        .map_err(|_| BiogateError::Crypto("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext`, authenticating `aad` alongside it.
///
/// Returns `(ciphertext_with_tag, iv)`.
pub fn seal(
    key: &[u8; KEY_LEN],
    aad: &[u8],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; IV_LEN]), BiogateError> {
    let key = less_safe_key(key)?;
    let iv = random_bytes::<IV_LEN>()?;
    let nonce = Nonce::assume_unique_for_key(iv);

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| BiogateError::Crypto("AES-256-GCM encryption failed".to_string()))?;

    Ok((in_out, iv))
}

/// Decrypt a ciphertext produced by [`seal`] with the same key and `aad`.
pub fn open(
    key: &[u8; KEY_LEN],
    aad: &[u8],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, BiogateError> {
    let iv: [u8; IV_LEN] = iv
        .try_into()
        .map_err(|_| BiogateError::Crypto(format!("iv must be {IV_LEN} bytes, got {}", iv.len())))?;
    let key = less_safe_key(key)?;
    let nonce = Nonce::assume_unique_for_key(iv);

    let mut in_out = Zeroizing::new(ciphertext.to_vec());
    let len = key
        .open_in_place(nonce, Aad::from(aad), &mut in_out)
        .map_err(|_| {
            BiogateError::Crypto(
                "AES-256-GCM decryption failed -- wrong key or corrupted data".to_string(),
            )
        })?
        .len();
    in_out.truncate(len);
    Ok(in_out)
}

/// Generate a random AES-256 key.
pub fn generate_key() -> Result<Zeroizing<[u8; KEY_LEN]>, BiogateError> {
    Ok(Zeroizing::new(random_bytes::<KEY_LEN>()?))
}

/// Fill an array from the system CSPRNG.
pub fn random_bytes<const N: usize>() -> Result<[u8; N], BiogateError> {
    let mut out = [0u8; N];
    SystemRandom::new()
        .fill(&mut out)
        .map_err(|_| BiogateError::Crypto("system RNG failure".to_string()))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = generate_key().unwrap();
        let (ct, iv) = seal(&key, b"9bot_0_1", b"123456:bot-token").unwrap();
        let pt = open(&key, b"9bot_0_1", &iv, &ct).unwrap();
        assert_eq!(pt.as_slice(), b"123456:bot-token");
    }

    #[test]
    fn each_seal_uses_a_fresh_iv() {
        let key = generate_key().unwrap();
        let (ct1, iv1) = seal(&key, b"", b"same").unwrap();
        let (ct2, iv2) = seal(&key, b"", b"same").unwrap();
        assert_ne!(iv1, iv2);
        assert_ne!(ct1, ct2);
    }

    #[test]
    fn aad_mismatch_fails() {
        let key = generate_key().unwrap();
        let (ct, iv) = seal(&key, b"9bot_0_1", b"secret").unwrap();
        assert!(open(&key, b"9bot_0_2", &iv, &ct).is_err());
    }

    #[test]
    fn wrong_key_fails() {
        let (ct, iv) = seal(&generate_key().unwrap(), b"", b"secret").unwrap();
        assert!(open(&generate_key().unwrap(), b"", &iv, &ct).is_err());
    }

    #[test]
    fn short_iv_is_rejected_not_panicking() {
        let key = generate_key().unwrap();
        let (ct, _) = seal(&key, b"", b"secret").unwrap();
        let err = open(&key, b"", &[0u8; 4], &ct).unwrap_err();
        assert!(err.to_string().contains("iv must be"));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = generate_key().unwrap();
        let (mut ct, iv) = seal(&key, b"", b"do not tamper").unwrap();
        ct[0] ^= 0x01;
        assert!(open(&key, b"", &iv, &ct).is_err());
    }

    #[test]
    fn ciphertext_carries_the_tag() {
        let key = generate_key().unwrap();
        let (ct, _) = seal(&key, b"", b"hello").unwrap();
        assert_eq!(ct.len(), 5 + 16);
    }
}
