//! ALFA Reveal - Encrypted Content Controller
//!
//! Attaches a password form to every `.encrypted-content` block, checks the
//! authored markup up front and decrypts on submit. Authoring mistakes lock
//! the form with a code naming the missing piece; a wrong passphrase only
//! asks the viewer to try again.

use std::collections::HashMap;

use secrecy::{ExposeSecret, SecretString};

use super::{tag, untagged, Placeholder, RevealState, StateTable};
use crate::config::PageContext;
use crate::crypto::{decode_hex, decrypt, offline_recipe, EncryptionMetadata, OfflineRecipe};
use crate::dom::{Content, Document, Element, Link, NodeId, PasswordForm};
use crate::error::{ErrorCode, RevealError, RevealResult};

/// Encrypted placeholder class
pub const ENCRYPTED_CLASS: &str = "encrypted-content";

/// Set once the password form is attached
pub const FORM_ADDED: &str = "encrypted-content--form-added";

/// Set after a successful decryption
pub const UNLOCKED: &str = "unlocked";

/// Id of the element carrying the encryption metadata
pub const INFO_REF: &str = "data-encryption-info-by";

/// Hex ciphertext
pub const CONTENT: &str = "data-content";

/// Shown after a failed attempt; the form stays usable
pub const RETRY_MESSAGE: &str = "Decryption failed. Check your password and try again?";

/// Encrypted placeholders
pub struct EncryptedPlaceholder;

impl Placeholder for EncryptedPlaceholder {
    const CLASS: &'static str = ENCRYPTED_CLASS;
    const TAGGED: &'static str = FORM_ADDED;
}

/// Result of [`EncryptedContentController::submit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Plaintext is in place
    Unlocked,
    /// Form not submittable (empty, locked or already unlocked)
    Ignored,
}

/// Everything needed to decrypt one block
#[derive(Debug, Clone)]
pub struct EncryptedBlock {
    pub metadata: EncryptionMetadata,
    pub content_hex: String,
}

/// Structural checks, in order: info reference, content, referenced element
fn preflight<'a>(doc: &'a Document, el: &Element) -> Result<&'a Element, ErrorCode> {
    let info_id = el.attr(INFO_REF).ok_or(ErrorCode::NoInfoRef)?;
    el.attr(CONTENT).ok_or(ErrorCode::NoContent)?;
    doc.element_by_id(info_id)
        .and_then(|info| doc.get(info))
        .ok_or(ErrorCode::BrokenInfoRef)
}

/// Read the metadata and ciphertext for the block at `node`
pub fn locate(doc: &Document, node: NodeId) -> RevealResult<EncryptedBlock> {
    let el = doc
        .get(node)
        .filter(|el| el.has_class(ENCRYPTED_CLASS))
        .ok_or_else(|| RevealError::PlaceholderNotFound(node.to_string()))?;

    let info = preflight(doc, el).map_err(RevealError::MissingMetadata)?;
    let metadata = EncryptionMetadata::from_attributes(&info.attributes)?;

    Ok(EncryptedBlock {
        metadata,
        content_hex: el.attr(CONTENT).unwrap_or_default().to_string(),
    })
}

/// External decryption recipe for the block at `node`
pub fn recipe_for(doc: &Document, node: NodeId) -> RevealResult<OfflineRecipe> {
    let block = locate(doc, node)?;
    Ok(offline_recipe(&block.metadata, &block.content_hex))
}

fn with_form<R>(doc: &mut Document, node: NodeId, edit: impl FnOnce(&mut PasswordForm) -> R) -> Option<R> {
    let mut result = None;
    doc.modify(node, |el| {
        if let Content::Form(form) = &mut el.content {
            result = Some(edit(form));
        }
    });
    result
}

fn form(doc: &Document, node: NodeId) -> Option<&PasswordForm> {
    match doc.get(node).map(|el| &el.content) {
        Some(Content::Form(form)) => Some(form),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONTROLLER
// ═══════════════════════════════════════════════════════════════════════════

/// Drives every encrypted block of one page
pub struct EncryptedContentController {
    context: PageContext,
    next_form_id: u64,
    states: StateTable,
    /// Current password field contents, per block
    passphrases: HashMap<NodeId, SecretString>,
}

impl EncryptedContentController {
    pub fn new(context: PageContext) -> Self {
        Self {
            context,
            next_form_id: 0,
            states: StateTable::default(),
            passphrases: HashMap::new(),
        }
    }

    pub fn context(&self) -> &PageContext {
        &self.context
    }

    pub fn state(&self, node: NodeId) -> RevealState {
        self.states.get(node)
    }

    pub fn states(&self) -> &StateTable {
        &self.states
    }

    /// Attach forms to new blocks. Returns how many were tagged.
    pub fn scan(&mut self, doc: &mut Document) -> usize {
        let mut tagged = 0;

        for node in untagged::<EncryptedPlaceholder>(doc) {
            let mut form = PasswordForm::new(self.next_form_id);
            let state = self.check(doc, node, &mut form);

            if !tag::<EncryptedPlaceholder>(doc, node) {
                continue;
            }
            self.next_form_id += 1;
            doc.modify(node, |el| el.content = Content::Form(form));
            self.states.set(node, state);
            tagged += 1;
        }

        tagged
    }

    /// Pre-flight a fresh form, locking it when the block can never be
    /// decrypted in place
    fn check(&self, doc: &Document, node: NodeId, form: &mut PasswordForm) -> RevealState {
        let el = match doc.get(node) {
            Some(el) => el,
            None => return RevealState::Failed,
        };

        if let Err(code) = preflight(doc, el) {
            log::warn!("Encrypted block {} rejected: {}", node, code);
            form.lock(code.message());
            return RevealState::Failed;
        }

        if self.context.can_decrypt() {
            return RevealState::AwaitingTrigger;
        }

        match locate(doc, node) {
            Ok(block) => {
                let recipe = offline_recipe(&block.metadata, &block.content_hex);
                form.lock(ErrorCode::NotSecureContext.message());
                form.link = Some(Link {
                    href: recipe.link,
                    text: "Decrypt with CyberChef".to_string(),
                    new_tab: true,
                });
            }
            Err(RevealError::MissingMetadata(code)) => form.lock(code.message()),
            Err(_) => form.lock(ErrorCode::BrokenInfoRefLate.message()),
        }
        RevealState::Failed
    }

    /// Password field changed. Returns whether submit is now enabled.
    pub fn input(&mut self, doc: &mut Document, node: NodeId, passphrase: SecretString) -> bool {
        let locked = match form(doc, node) {
            Some(form) => form.locked,
            None => return false,
        };
        if locked {
            return false;
        }

        let enabled = !passphrase.expose_secret().is_empty();
        with_form(doc, node, |form| form.submit_enabled = enabled);

        if enabled {
            self.passphrases.insert(node, passphrase);
        } else {
            self.passphrases.remove(&node);
        }
        enabled
    }

    /// Try the current passphrase on the block at `node`
    pub async fn submit(&mut self, doc: &mut Document, node: NodeId) -> RevealResult<SubmitOutcome> {
        let enabled = form(doc, node).map_or(false, |form| form.submit_enabled && !form.locked);
        let passphrase = match self.passphrases.get(&node) {
            Some(p) if enabled => SecretString::new(p.expose_secret().clone()),
            _ => return Ok(SubmitOutcome::Ignored),
        };

        self.states.set(node, RevealState::Loading);

        let block = match locate(doc, node) {
            Ok(block) => Some(block),
            Err(RevealError::MissingMetadata(code)) => {
                log::warn!("Encrypted block {} rejected at submit: {}", node, code);
                with_form(doc, node, |form| form.lock(code.message()));
                self.passphrases.remove(&node);
                self.states.set(node, RevealState::Failed);
                return Err(RevealError::MissingMetadata(code));
            }
            Err(_) => None,
        };

        let plaintext = match block {
            Some(EncryptedBlock { metadata, content_hex }) => {
                tokio::task::spawn_blocking(move || -> RevealResult<Vec<u8>> {
                    let ciphertext = decode_hex(&content_hex)?;
                    decrypt(&passphrase, &metadata, &ciphertext)
                })
                .await
                .map_err(|_| RevealError::DecryptionFailure)
                .and_then(|r| r)
            }
            None => Err(RevealError::DecryptionFailure),
        };

        match plaintext {
            Ok(bytes) => {
                let html = String::from_utf8_lossy(&bytes).into_owned();
                doc.modify(node, |el| {
                    el.content = Content::Markup { html };
                    el.classes.insert(UNLOCKED.to_string());
                });
                self.passphrases.remove(&node);
                self.states.set(node, RevealState::Resolved);
                log::info!("Unlocked encrypted block {}", node);
                Ok(SubmitOutcome::Unlocked)
            }
            Err(_) => {
                with_form(doc, node, |form| form.message = Some(RETRY_MESSAGE.to_string()));
                self.states.set(node, RevealState::Failed);
                log::info!("Decryption of {} failed", node);
                Err(RevealError::DecryptionFailure)
            }
        }
    }
}
