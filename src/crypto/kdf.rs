//! ALFA Reveal - PBKDF2 Key Derivation
//!
//! Turns the viewer's passphrase into a 256-bit AES key using the hash,
//! salt and iteration count published next to the ciphertext.

use std::fmt;

use hmac::Hmac;
use pbkdf2::pbkdf2;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::error::{RevealError, RevealResult};

/// Key length for AES-256
pub const KEY_LEN: usize = 32;

/// PRF hash published in `data-hash`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "SHA-256")]
    Sha256,
    #[serde(rename = "SHA-384")]
    Sha384,
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        Self::Sha256
    }
}

impl HashAlgorithm {
    /// Parse a WebCrypto-style name. Case and the dash are optional
    /// (`SHA-256`, `sha256`).
    pub fn parse(name: &str) -> Option<Self> {
        let normalized: String = name
            .trim()
            .chars()
            .filter(|c| *c != '-')
            .map(|c| c.to_ascii_uppercase())
            .collect();

        match normalized.as_str() {
            "SHA1" => Some(Self::Sha1),
            "SHA256" => Some(Self::Sha256),
            "SHA384" => Some(Self::Sha384),
            "SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Canonical name, as written into `data-hash`
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    /// Name without the dash (external tools expect `SHA256`)
    pub fn compact_name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derive the AES-256 key from a passphrase with PBKDF2-HMAC.
///
/// Every failure is reported as [`RevealError::DecryptionFailure`].
pub fn derive_key(
    passphrase: &SecretString,
    salt: &[u8],
    iterations: u32,
    hash: HashAlgorithm,
) -> RevealResult<Zeroizing<[u8; KEY_LEN]>> {
    if iterations == 0 {
        return Err(RevealError::DecryptionFailure);
    }

    let password = passphrase.expose_secret().as_bytes();
    let mut key = Zeroizing::new([0u8; KEY_LEN]);

    let derived = match hash {
        HashAlgorithm::Sha1 => pbkdf2::<Hmac<Sha1>>(password, salt, iterations, &mut *key),
        HashAlgorithm::Sha256 => pbkdf2::<Hmac<Sha256>>(password, salt, iterations, &mut *key),
        HashAlgorithm::Sha384 => pbkdf2::<Hmac<Sha384>>(password, salt, iterations, &mut *key),
        HashAlgorithm::Sha512 => pbkdf2::<Hmac<Sha512>>(password, salt, iterations, &mut *key),
    };
    derived.map_err(|_| RevealError::DecryptionFailure)?;

    Ok(key)
}
