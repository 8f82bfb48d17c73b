//! # ALFA Reveal
//!
//! Passphrase-locked content and on-demand media for static pages.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                      ALFA REVEAL                         │
//! │  ┌───────────────────────────────────────────────────┐  │
//! │  │                   REVEAL PAGE                      │  │
//! │  │   PageEvent → ScanGuard → controllers → Document   │  │
//! │  └──────────┬─────────────────────────────┬──────────┘  │
//! │             │                             │             │
//! │  ┌──────────┴──────────┐      ┌───────────┴──────────┐  │
//! │  │  MEDIA REVEAL       │      │  ENCRYPTED CONTENT   │  │
//! │  │  size threshold     │      │  password form       │  │
//! │  │  click-to-load      │      │  pre-flight codes    │  │
//! │  └──────────┬──────────┘      └───────────┬──────────┘  │
//! │             │                             │             │
//! │  ┌──────────┴──────────┐      ┌───────────┴──────────┐  │
//! │  │  PROGRESSIVE FETCH  │      │  CRYPTO CORE         │  │
//! │  │  reqwest stream     │      │  PBKDF2 → AES-256-GCM│  │
//! │  │  chunk progress     │      │  CyberChef recipe    │  │
//! │  └─────────────────────┘      └──────────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Key derived with PBKDF2-HMAC (SHA-1/256/384/512), 256-bit
//! - Content sealed with AES-256-GCM, 128-bit tag
//! - Every decryption failure looks the same to the viewer
//! - Passphrases held as `SecretString`, keys zeroized after use

pub mod authoring;
pub mod config;
pub mod crypto;
pub mod dom;
pub mod error;
pub mod fetch;
pub mod page;
pub mod reveal;

pub use config::{PageContext, RevealConfig};
pub use dom::{Document, Element, NodeId};
pub use error::{ErrorCode, RevealError, RevealResult};
pub use fetch::{HttpTransport, ProgressiveFetcher, SizeUnits, Transport};
pub use page::{PageEvent, PageSummary, RevealPage};
pub use reveal::{EncryptedContentController, MediaRevealController, RevealState};

/// ALFA Reveal version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ALFA Reveal signature
pub const SIGNATURE: &str = "ALFA_REVEAL_v1";
