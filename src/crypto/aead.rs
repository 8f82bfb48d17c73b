//! ALFA Reveal - AEAD Decryption
//!
//! AES-256-GCM over `ciphertext || tag`, 128-bit tag, key from PBKDF2.
//! `seal` is the authoring counterpart used to produce encrypted blocks.

use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray, Aead, KeyInit},
    aes::Aes256,
    Aes256Gcm, AesGcm, Nonce,
};
use rand::RngCore;
use secrecy::SecretString;

use super::kdf::{derive_key, HashAlgorithm};
use super::metadata::EncryptionMetadata;
use crate::error::{RevealError, RevealResult};

/// GCM authentication tag length (128 bits)
pub const TAG_LEN: usize = 16;

/// Standard GCM nonce length
pub const NONCE_LEN: usize = 12;

/// Salt length used by [`seal`]
pub const SALT_LEN: usize = 16;

/// AES-256-GCM with a 16-byte IV (accepted on decrypt only)
type Aes256Gcm16 = AesGcm<Aes256, U16>;

// ═══════════════════════════════════════════════════════════════════════════
// DECRYPTION
// ═══════════════════════════════════════════════════════════════════════════

/// Decrypt a block published with `metadata`.
///
/// Wrong passphrase, flipped ciphertext/tag bits and malformed parameters all
/// come back as the same [`RevealError::DecryptionFailure`].
pub fn decrypt(
    passphrase: &SecretString,
    metadata: &EncryptionMetadata,
    ciphertext: &[u8],
) -> RevealResult<Vec<u8>> {
    if metadata.tag.len() != TAG_LEN {
        return Err(RevealError::DecryptionFailure);
    }

    let key = derive_key(passphrase, &metadata.salt, metadata.iterations, metadata.hash)?;

    let mut merged = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    merged.extend_from_slice(ciphertext);
    merged.extend_from_slice(&metadata.tag);

    log::debug!(
        "Decrypting with {}, {}B salt, {} iter, {}B IV, {}B content ({}B with tag)",
        metadata.hash,
        metadata.salt.len(),
        metadata.iterations,
        metadata.init.len(),
        ciphertext.len(),
        merged.len()
    );

    match metadata.init.len() {
        NONCE_LEN => open::<Aes256Gcm>(&*key, &metadata.init, &merged),
        16 => open::<Aes256Gcm16>(&*key, &metadata.init, &merged),
        _ => Err(RevealError::DecryptionFailure),
    }
}

fn open<C: Aead + KeyInit>(key: &[u8], iv: &[u8], merged: &[u8]) -> RevealResult<Vec<u8>> {
    let cipher = C::new_from_slice(key).map_err(|_| RevealError::DecryptionFailure)?;
    cipher
        .decrypt(GenericArray::from_slice(iv), merged)
        .map_err(|_| RevealError::DecryptionFailure)
}

// ═══════════════════════════════════════════════════════════════════════════
// SEALING (authoring side)
// ═══════════════════════════════════════════════════════════════════════════

/// Parameters for [`seal`]
#[derive(Debug, Clone, Copy)]
pub struct SealParams {
    pub hash: HashAlgorithm,
    pub iterations: u32,
}

impl Default for SealParams {
    fn default() -> Self {
        Self {
            hash: HashAlgorithm::Sha256,
            iterations: 100_000,
        }
    }
}

/// Output of [`seal`]: ciphertext without tag plus the public metadata
#[derive(Debug, Clone)]
pub struct Sealed {
    pub metadata: EncryptionMetadata,
    pub ciphertext: Vec<u8>,
}

impl Sealed {
    /// Ciphertext as written into `data-content`
    pub fn ciphertext_hex(&self) -> String {
        hex::encode(&self.ciphertext)
    }
}

/// Encrypt `plaintext` under a passphrase with a fresh salt and IV
pub fn seal(
    plaintext: &[u8],
    passphrase: &SecretString,
    params: &SealParams,
) -> RevealResult<Sealed> {
    if params.iterations == 0 {
        return Err(RevealError::EncryptionFailed("iteration count must be positive".into()));
    }

    let mut salt = [0u8; SALT_LEN];
    let mut init = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    rand::thread_rng().fill_bytes(&mut init);

    let key = derive_key(passphrase, &salt, params.iterations, params.hash)
        .map_err(|_| RevealError::EncryptionFailed("key derivation failed".into()))?;

    let cipher = Aes256Gcm::new_from_slice(&*key)
        .map_err(|e| RevealError::EncryptionFailed(e.to_string()))?;

    let mut ciphertext = cipher
        .encrypt(Nonce::from_slice(&init), plaintext)
        .map_err(|e| RevealError::EncryptionFailed(e.to_string()))?;

    let tag = ciphertext.split_off(ciphertext.len() - TAG_LEN);

    Ok(Sealed {
        metadata: EncryptionMetadata {
            salt: salt.to_vec(),
            init: init.to_vec(),
            hash: params.hash,
            tag,
            iterations: params.iterations,
        },
        ciphertext,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::metadata::decode_hex;

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    fn fast() -> SealParams {
        SealParams {
            hash: HashAlgorithm::Sha256,
            iterations: 1000,
        }
    }

    #[test]
    fn test_decrypt_external_vector() {
        // Produced outside this crate with PBKDF2-SHA256 + AES-256-GCM
        let metadata = EncryptionMetadata {
            salt: b"0123456789abcdef".to_vec(),
            init: (0u8..12).collect(),
            hash: HashAlgorithm::Sha256,
            tag: decode_hex("8a27758a759865a51ed7fe6d76b1798a").unwrap(),
            iterations: 1000,
        };
        let ciphertext = decode_hex("3db8c32a07db1815cd3a785eca7dad615a4556230e15b91a").unwrap();

        let plaintext = decrypt(&secret("hunter2"), &metadata, &ciphertext).unwrap();
        assert_eq!(String::from_utf8(plaintext).unwrap(), "<p>Witaj, ALFA! 🔐</p>");
    }

    #[test]
    fn test_seal_roundtrip() {
        let plaintext = "Tajna treść strony ALFA".as_bytes();
        let sealed = seal(plaintext, &secret("open sesame"), &fast()).unwrap();

        assert_eq!(sealed.ciphertext.len(), plaintext.len());
        assert_eq!(sealed.metadata.tag.len(), TAG_LEN);

        let decrypted = decrypt(&secret("open sesame"), &sealed.metadata, &sealed.ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let sealed = seal(b"secret", &secret("right"), &fast()).unwrap();
        let result = decrypt(&secret("wrong"), &sealed.metadata, &sealed.ciphertext);
        assert!(matches!(result, Err(RevealError::DecryptionFailure)));
    }

    #[test]
    fn test_bit_flips_fail() {
        let pass = secret("flip");
        let sealed = seal(b"integrity matters", &pass, &fast()).unwrap();

        for i in 0..sealed.ciphertext.len() * 8 {
            let mut ct = sealed.ciphertext.clone();
            ct[i / 8] ^= 1 << (i % 8);
            assert!(matches!(
                decrypt(&pass, &sealed.metadata, &ct),
                Err(RevealError::DecryptionFailure)
            ));
        }

        for i in 0..TAG_LEN * 8 {
            let mut meta = sealed.metadata.clone();
            meta.tag[i / 8] ^= 1 << (i % 8);
            assert!(matches!(
                decrypt(&pass, &meta, &sealed.ciphertext),
                Err(RevealError::DecryptionFailure)
            ));
        }
    }

    #[test]
    fn test_bad_lengths_fail() {
        let pass = secret("len");
        let sealed = seal(b"abc", &pass, &fast()).unwrap();

        let mut short_tag = sealed.metadata.clone();
        short_tag.tag.truncate(12);
        assert!(decrypt(&pass, &short_tag, &sealed.ciphertext).is_err());

        let mut odd_iv = sealed.metadata.clone();
        odd_iv.init.truncate(8);
        assert!(decrypt(&pass, &odd_iv, &sealed.ciphertext).is_err());
    }

    #[test]
    fn test_sixteen_byte_iv() {
        let pass = secret("long iv");
        let salt = b"fedcba9876543210";
        let iv = [7u8; 16];
        let key = derive_key(&pass, salt, 500, HashAlgorithm::Sha384).unwrap();

        let cipher = Aes256Gcm16::new_from_slice(&*key).unwrap();
        let mut ct = cipher.encrypt(GenericArray::from_slice(&iv), b"sixteen".as_slice()).unwrap();
        let tag = ct.split_off(ct.len() - TAG_LEN);

        let meta = EncryptionMetadata {
            salt: salt.to_vec(),
            init: iv.to_vec(),
            hash: HashAlgorithm::Sha384,
            tag,
            iterations: 500,
        };
        assert_eq!(decrypt(&pass, &meta, &ct).unwrap(), b"sixteen");
    }
}
