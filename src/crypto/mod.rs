//! ALFA Reveal - Cryptographic Core
//!
//! PBKDF2 key derivation and AES-256-GCM for passphrase-locked page content.

pub mod kdf;
pub mod aead;
pub mod metadata;
pub mod recipe;

pub use kdf::*;
pub use aead::*;
pub use metadata::*;
pub use recipe::*;
