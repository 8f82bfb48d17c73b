//! ALFA Reveal - Encryption Metadata
//!
//! Parameters published next to an encrypted block: salt, IV, hash, tag and
//! iteration count. None of them are secret.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};

use super::kdf::HashAlgorithm;
use crate::error::{ErrorCode, RevealError, RevealResult};

/// Attribute names read from the metadata element
pub mod attrs {
    pub const SALT: &str = "data-salt";
    pub const INIT: &str = "data-init";
    pub const HASH: &str = "data-hash";
    pub const TAG: &str = "data-tag";
    pub const ITERATIONS: &str = "data-iterations";

    /// All attributes that must be present
    pub const REQUIRED: [&str; 5] = [SALT, INIT, HASH, TAG, ITERATIONS];
}

/// Decoded encryption parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionMetadata {
    /// PBKDF2 salt
    pub salt: Vec<u8>,
    /// AES-GCM initialization vector
    pub init: Vec<u8>,
    /// PBKDF2 PRF hash
    pub hash: HashAlgorithm,
    /// GCM authentication tag, stored apart from the ciphertext
    pub tag: Vec<u8>,
    /// PBKDF2 iteration count
    pub iterations: u32,
}

impl EncryptionMetadata {
    /// Read metadata from element attributes.
    ///
    /// An absent attribute is an authoring error
    /// (`ERR_BROKEN_INFO_REF_LATE`). A present but undecodable value is
    /// reported as a plain decryption failure.
    pub fn from_attributes(attributes: &BTreeMap<String, String>) -> RevealResult<Self> {
        if attrs::REQUIRED.iter().any(|name| !attributes.contains_key(*name)) {
            return Err(RevealError::MissingMetadata(ErrorCode::BrokenInfoRefLate));
        }

        let get = |name: &str| attributes.get(name).map(String::as_str).unwrap_or_default();

        let salt = decode_base64(get(attrs::SALT))?;
        let init = decode_base64(get(attrs::INIT))?;
        let hash = HashAlgorithm::parse(get(attrs::HASH)).ok_or(RevealError::DecryptionFailure)?;
        let tag = decode_hex(get(attrs::TAG))?;
        let iterations = get(attrs::ITERATIONS)
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(RevealError::DecryptionFailure)?;

        Ok(Self {
            salt,
            init,
            hash,
            tag,
            iterations,
        })
    }

    /// Render as element attributes (inverse of [`Self::from_attributes`])
    pub fn to_attributes(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        out.insert(attrs::SALT.to_string(), STANDARD.encode(&self.salt));
        out.insert(attrs::INIT.to_string(), STANDARD.encode(&self.init));
        out.insert(attrs::HASH.to_string(), self.hash.name().to_string());
        out.insert(attrs::TAG.to_string(), hex::encode(&self.tag));
        out.insert(attrs::ITERATIONS.to_string(), self.iterations.to_string());
        out
    }
}

/// Decode hex, ignoring whitespace and case
pub fn decode_hex(input: &str) -> RevealResult<Vec<u8>> {
    let compact: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    hex::decode(compact).map_err(|_| RevealError::DecryptionFailure)
}

fn decode_base64(input: &str) -> RevealResult<Vec<u8>> {
    STANDARD
        .decode(input.trim())
        .map_err(|_| RevealError::DecryptionFailure)
}
