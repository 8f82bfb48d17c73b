//! ALFA Reveal - Media Reveal Controller
//!
//! Deferred media placeholders (`.replaced`). Small media loads on sight,
//! large media waits for a click. Remote sources stream in with a live
//! progress line, get decoded off the cooperative thread and are published
//! through the document's object-URL store before the placeholder is swapped.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::transfer::{ImageTransfer, MediaSource};
use super::{tag, untagged, Placeholder, RevealState, StateTable};
use crate::config::RevealConfig;
use crate::dom::{Content, Document, Element, InfoPanel, NodeId};
use crate::error::{RevealError, RevealResult};
use crate::fetch::{Blob, Flow, ProgressiveFetcher, SizeUnits, Transport};

/// Media placeholder class
pub const REPLACED_CLASS: &str = "replaced";

/// Set once the info panel is attached
pub const STATS_APPLIED: &str = "content-replacement-stats-applied";

/// Set while a load is running or done
pub const USED_MARKER: &str = "content-replacement--used";

/// Declared media size in bytes (`-1` when it could not be measured)
pub const CONTENT_SIZE: &str = "data-content-size";

/// Media kind
pub const REPLACEMENT_TYPE: &str = "data-replacement-type";

pub const STATUS_LOADING: &str = "Loading...";
pub const STATUS_CLICK: &str = "Click to load";
pub const STATUS_FAILED: &str = "Failed to load";

/// Media placeholders
pub struct MediaPlaceholder;

impl Placeholder for MediaPlaceholder {
    const CLASS: &'static str = REPLACED_CLASS;
    const TAGGED: &'static str = STATS_APPLIED;
}

/// Supported `data-replacement-type` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementType {
    Image,
}

impl ReplacementType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "img" => Some(Self::Image),
            _ => None,
        }
    }

    /// Panel label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Image => "Image",
        }
    }
}

/// Result of [`MediaRevealController::load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Placeholder swapped for the real element
    Replaced,
    /// A load already ran or is running
    AlreadyUsed,
    /// Node is no longer a media placeholder
    Gone,
}

/// Parse `data-content-size`. Negative and malformed values are unknown.
fn declared_size(el: &Element) -> Option<u64> {
    el.attr(CONTENT_SIZE)
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .and_then(|n| u64::try_from(n).ok())
}

fn is_placeholder(doc: &Document, node: NodeId) -> bool {
    doc.get(node).map_or(false, |el| el.has_class(REPLACED_CLASS))
}

fn set_panel(doc: &mut Document, node: NodeId, status: &str, click_to_load: bool) {
    doc.modify(node, |el| {
        if let Content::Panel(panel) = &mut el.content {
            panel.status = status.to_string();
            panel.click_to_load = click_to_load;
        }
    });
}

// ═══════════════════════════════════════════════════════════════════════════
// CONTROLLER
// ═══════════════════════════════════════════════════════════════════════════

/// Drives every media placeholder of one page
pub struct MediaRevealController<T: Transport> {
    fetcher: ProgressiveFetcher<T>,
    autoload_threshold: u64,
    units: SizeUnits,
    states: StateTable,
    /// Nodes with a pending one-shot click trigger
    armed: HashSet<NodeId>,
    /// Unsupported types already reported
    warned: HashSet<String>,
    abort: Arc<AtomicBool>,
}

impl<T: Transport> MediaRevealController<T> {
    pub fn new(fetcher: ProgressiveFetcher<T>, config: &RevealConfig) -> Self {
        Self {
            fetcher,
            autoload_threshold: config.autoload_threshold,
            units: config.size_units,
            states: StateTable::default(),
            armed: HashSet::new(),
            warned: HashSet::new(),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share an externally owned abort flag
    pub fn with_abort_handle(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = abort;
        self
    }

    /// Setting the flag aborts the in-flight transfer at its next chunk
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn fetcher(&self) -> &ProgressiveFetcher<T> {
        &self.fetcher
    }

    pub fn state(&self, node: NodeId) -> RevealState {
        self.states.get(node)
    }

    pub fn states(&self) -> &StateTable {
        &self.states
    }

    /// Whether a click on `node` would start a load
    pub fn is_armed(&self, node: NodeId) -> bool {
        self.armed.contains(&node)
    }

    /// Attach panels to new placeholders and autoload the small ones.
    /// Returns how many placeholders were tagged.
    pub async fn scan(&mut self, doc: &mut Document) -> usize {
        let mut tagged = 0;

        for node in untagged::<MediaPlaceholder>(doc) {
            let (raw_type, size) = match doc.get(node) {
                Some(el) => (
                    el.attr(REPLACEMENT_TYPE).unwrap_or_default().to_string(),
                    declared_size(el),
                ),
                None => continue,
            };

            let kind = match ReplacementType::parse(&raw_type) {
                Some(kind) => kind,
                None => {
                    if self.warned.insert(raw_type.clone()) {
                        log::warn!("Unknown replacement type {:?}, leaving {} untouched", raw_type, node);
                    }
                    continue;
                }
            };

            let autoload = size.map_or(false, |size| size <= self.autoload_threshold);
            let status = if autoload { STATUS_LOADING } else { STATUS_CLICK };
            let panel = InfoPanel {
                label: kind.label().to_string(),
                size: size.map_or_else(|| "unknown size".to_string(), |s| self.units.format(s)),
                status: status.to_string(),
                click_to_load: !autoload,
            };

            if !tag::<MediaPlaceholder>(doc, node) {
                continue;
            }
            doc.modify(node, |el| el.content = Content::Panel(panel));
            self.states.set(node, RevealState::AwaitingTrigger);
            tagged += 1;

            if autoload {
                log::debug!("Autoloading {} ({:?} bytes)", node, size);
                if let Err(e) = self.load(doc, node).await {
                    log::debug!("Autoload of {} failed: {}", node, e);
                }
            } else {
                self.armed.insert(node);
            }
        }

        tagged
    }

    /// Fire the one-shot click trigger on `node`. Clicks on unarmed nodes
    /// are ignored and return `Ok(None)`.
    pub async fn trigger(
        &mut self,
        doc: &mut Document,
        node: NodeId,
    ) -> RevealResult<Option<LoadOutcome>> {
        if !self.armed.remove(&node) {
            log::debug!("Ignoring click on {}", node);
            return Ok(None);
        }
        self.load(doc, node).await.map(Some)
    }

    /// Replace the placeholder at `node` with its media
    pub async fn load(&mut self, doc: &mut Document, node: NodeId) -> RevealResult<LoadOutcome> {
        let placeholder = match doc.get(node) {
            Some(el) if el.has_class(REPLACED_CLASS) => el.clone(),
            _ => return Ok(LoadOutcome::Gone),
        };
        if placeholder.has_class(USED_MARKER) {
            return Ok(LoadOutcome::AlreadyUsed);
        }

        doc.modify(node, |el| {
            el.classes.insert(USED_MARKER.to_string());
        });
        set_panel(doc, node, STATUS_LOADING, false);
        self.armed.remove(&node);
        self.states.set(node, RevealState::Loading);

        match self.resolve(doc, node, &placeholder).await {
            Ok(()) => {
                self.states.set(node, RevealState::Resolved);
                log::info!("Loaded media {}", node);
                Ok(LoadOutcome::Replaced)
            }
            Err(RevealError::Aborted { received }) => {
                self.abort.store(false, Ordering::SeqCst);
                log::info!("Media {} aborted after {} bytes", node, received);
                self.rearm(doc, node, STATUS_CLICK);
                self.states.set(node, RevealState::AwaitingTrigger);
                Err(RevealError::Aborted { received })
            }
            Err(e) => {
                self.fail(doc, node, &e);
                Err(e)
            }
        }
    }

    async fn resolve(
        &self,
        doc: &mut Document,
        node: NodeId,
        placeholder: &Element,
    ) -> RevealResult<()> {
        let raw_type = placeholder.attr(REPLACEMENT_TYPE).unwrap_or_default();
        match ReplacementType::parse(raw_type) {
            Some(ReplacementType::Image) => {}
            None => return Err(RevealError::UnsupportedReplacementType(raw_type.to_string())),
        }

        let transfer = ImageTransfer::from_element(placeholder)?;

        let src = match &transfer.source {
            MediaSource::Inline(data_url) => data_url.clone(),
            MediaSource::Remote(src) => {
                let blob = self.fetch(doc, node, src).await?;
                let blob = decode_check(blob).await?;
                doc.create_object_url(blob)
            }
        };

        if !doc.replace(node, transfer.into_element(&src)) {
            return Err(RevealError::PlaceholderNotFound(node.to_string()));
        }
        Ok(())
    }

    async fn fetch(&self, doc: &mut Document, node: NodeId, src: &str) -> RevealResult<Blob> {
        let units = self.units;
        let abort = Arc::clone(&self.abort);

        let blob = self
            .fetcher
            .fetch_with_progress(src, |progress| {
                if abort.load(Ordering::SeqCst) {
                    return Flow::Abort;
                }
                set_panel(doc, node, &progress.describe(units), false);
                Flow::Continue
            })
            .await?;

        if !blob.complete {
            return Err(RevealError::Aborted {
                received: blob.len() as u64,
            });
        }
        Ok(blob)
    }

    fn rearm(&mut self, doc: &mut Document, node: NodeId, status: &str) {
        doc.modify(node, |el| {
            el.classes.remove(USED_MARKER);
        });
        set_panel(doc, node, status, true);
        self.armed.insert(node);
    }

    fn fail(&mut self, doc: &mut Document, node: NodeId, error: &RevealError) {
        log::warn!("Media {} failed: {}", node, error);
        self.states.set(node, RevealState::Failed);

        if !is_placeholder(doc, node) {
            return;
        }
        if error.is_retryable() {
            self.rearm(doc, node, STATUS_FAILED);
        } else {
            set_panel(doc, node, STATUS_FAILED, false);
        }
    }
}

/// Make sure the bytes decode as an image before they go live
async fn decode_check(blob: Blob) -> RevealResult<Blob> {
    let is_svg = blob
        .content_type
        .as_deref()
        .map_or(false, |ct| ct.starts_with("image/svg"));
    if is_svg {
        return Ok(blob);
    }

    tokio::task::spawn_blocking(move || -> RevealResult<Blob> {
        image::load_from_memory(&blob.bytes)?;
        Ok(blob)
    })
    .await
    .map_err(|e| RevealError::ImageDecode(e.to_string()))?
}
