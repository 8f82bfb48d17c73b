//! ALFA Reveal - Placeholder Lifecycle
//!
//! Shared machinery for both controllers: find untagged placeholders, tag
//! them once, wait for a trigger, resolve.
//!
//! ```text
//! Untagged ──scan──▶ AwaitingTrigger ──trigger──▶ Loading ──▶ Resolved
//!                          ▲                         │
//!                          └──────── retry ◀── Failed ◀┘
//! ```

pub mod encrypted;
pub mod media;
pub mod transfer;

use std::collections::HashMap;

use serde::Serialize;

use crate::dom::{Document, NodeId};

pub use encrypted::{EncryptedContentController, EncryptedPlaceholder, SubmitOutcome};
pub use media::{LoadOutcome, MediaPlaceholder, MediaRevealController, ReplacementType};
pub use transfer::{ImageTransfer, MediaSource};

// ═══════════════════════════════════════════════════════════════════════════
// STATE
// ═══════════════════════════════════════════════════════════════════════════

/// Where a placeholder is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealState {
    Untagged,
    AwaitingTrigger,
    Loading,
    Resolved,
    Failed,
}

impl Default for RevealState {
    fn default() -> Self {
        Self::Untagged
    }
}

/// Per-node lifecycle state, owned by one controller
#[derive(Debug, Default)]
pub struct StateTable {
    states: HashMap<NodeId, RevealState>,
}

impl StateTable {
    pub fn get(&self, node: NodeId) -> RevealState {
        self.states.get(&node).copied().unwrap_or_default()
    }

    pub fn set(&mut self, node: NodeId, state: RevealState) {
        log::trace!("{} -> {:?}", node, state);
        self.states.insert(node, state);
    }

    pub fn counts(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for state in self.states.values() {
            match state {
                RevealState::Untagged => {}
                RevealState::AwaitingTrigger => counts.awaiting += 1,
                RevealState::Loading => counts.loading += 1,
                RevealState::Resolved => counts.resolved += 1,
                RevealState::Failed => counts.failed += 1,
            }
        }
        counts
    }
}

/// Tally of tagged placeholders by state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub awaiting: usize,
    pub loading: usize,
    pub resolved: usize,
    pub failed: usize,
}

// ═══════════════════════════════════════════════════════════════════════════
// PLACEHOLDERS
// ═══════════════════════════════════════════════════════════════════════════

/// A placeholder category: the class that marks it and the class that
/// records it has been handled
pub trait Placeholder {
    const CLASS: &'static str;
    const TAGGED: &'static str;
}

/// Placeholders of kind `P` not yet tagged, in document order
pub fn untagged<P: Placeholder>(doc: &Document) -> Vec<NodeId> {
    doc.iter()
        .filter(|(_, el)| el.has_class(P::CLASS) && !el.has_class(P::TAGGED))
        .map(|(node, _)| node)
        .collect()
}

/// Tag `node` as handled. Returns `false` if it already was.
pub fn tag<P: Placeholder>(doc: &mut Document, node: NodeId) -> bool {
    match doc.get(node) {
        Some(el) if !el.has_class(P::TAGGED) => doc.modify(node, |el| {
            el.classes.insert(P::TAGGED.to_string());
        }),
        _ => false,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SCAN GUARD
// ═══════════════════════════════════════════════════════════════════════════

/// Keeps the mutation-driven rescan from re-entering itself
#[derive(Debug, Default)]
pub struct ScanGuard {
    active: bool,
}

impl ScanGuard {
    /// Enter a scan. Returns `false` if one is already running.
    pub fn try_enter(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        true
    }

    pub fn leave(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
