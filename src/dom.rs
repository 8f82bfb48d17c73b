//! ALFA Reveal - Document Model
//!
//! A flat, ordered element list standing in for the page. Mutations are
//! recorded while an observer is connected so the page runtime can rescan,
//! and fetched media is published through an object-URL store.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RevealResult;
use crate::fetch::Blob;

/// Prefix for object URLs handed out by [`Document::create_object_url`]
pub const OBJECT_URL_PREFIX: &str = "blob:alfa-reveal/";

/// Position of an element in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ELEMENT CONTENT
// ═══════════════════════════════════════════════════════════════════════════

/// External link rendered inside a form message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    pub text: String,
    /// Opens in a new tab with `noopener noreferrer`
    pub new_tab: bool,
}

/// Password form attached to an encrypted placeholder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordForm {
    /// Per-page unique form number
    pub form_id: u64,
    /// Id of the password input (`decryption-key-{form_id}`)
    pub input_id: String,
    pub submit_enabled: bool,
    /// Terminal state: no further interaction possible
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<Link>,
}

impl PasswordForm {
    pub fn new(form_id: u64) -> Self {
        Self {
            form_id,
            input_id: format!("decryption-key-{}", form_id),
            submit_enabled: false,
            locked: false,
            message: None,
            link: None,
        }
    }

    /// Show a terminal message and disable the form for good
    pub fn lock(&mut self, message: impl Into<String>) {
        self.locked = true;
        self.submit_enabled = false;
        self.message = Some(message.into());
    }
}

/// "replaced-info" panel shown in place of deferred media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoPanel {
    /// Media kind, e.g. "Image"
    pub label: String,
    /// Human-readable declared size
    pub size: String,
    /// Status line (click hint, live progress, failure)
    pub status: String,
    /// Whether the panel invites a click
    pub click_to_load: bool,
}

/// Typed element content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Content {
    Empty,
    Markup { html: String },
    Form(PasswordForm),
    Panel(InfoPanel),
}

impl Default for Content {
    fn default() -> Self {
        Self::Empty
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ELEMENT
// ═══════════════════════════════════════════════════════════════════════════

/// Document element
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub classes: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub content: Content,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.insert(class.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_content(mut self, content: Content) -> Self {
        self.content = content;
        self
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MUTATIONS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Added,
    Replaced,
    Modified,
}

/// One observed change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub node: NodeId,
    pub kind: MutationKind,
}

// ═══════════════════════════════════════════════════════════════════════════
// DOCUMENT
// ═══════════════════════════════════════════════════════════════════════════

/// The page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    elements: Vec<Element>,
    #[serde(skip)]
    observing: bool,
    #[serde(skip)]
    records: Vec<MutationRecord>,
    #[serde(skip)]
    objects: BTreeMap<String, Blob>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_elements(elements: Vec<Element>) -> Self {
        Self {
            elements,
            ..Default::default()
        }
    }

    /// Parse the JSON interchange form (`{"elements": [...]}`)
    pub fn from_json(json: &str) -> RevealResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> RevealResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, node: NodeId) -> Option<&Element> {
        self.elements.get(node.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Element)> {
        self.elements.iter().enumerate().map(|(i, el)| (NodeId(i), el))
    }

    /// First element whose `id` matches
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.iter()
            .find(|(_, el)| el.id.as_deref() == Some(id))
            .map(|(node, _)| node)
    }

    /// All elements carrying `class`, in document order
    pub fn find_by_class(&self, class: &str) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, el)| el.has_class(class))
            .map(|(node, _)| node)
            .collect()
    }

    /// Append an element at the end of the document
    pub fn append(&mut self, element: Element) -> NodeId {
        let node = NodeId(self.elements.len());
        self.elements.push(element);
        self.record(node, MutationKind::Added);
        node
    }

    /// Swap the element at `node` for `element` in one step
    pub fn replace(&mut self, node: NodeId, element: Element) -> bool {
        match self.elements.get_mut(node.0) {
            Some(slot) => {
                *slot = element;
                self.record(node, MutationKind::Replaced);
                true
            }
            None => false,
        }
    }

    /// Edit the element at `node` in place
    pub fn modify<F>(&mut self, node: NodeId, edit: F) -> bool
    where
        F: FnOnce(&mut Element),
    {
        match self.elements.get_mut(node.0) {
            Some(el) => {
                edit(el);
                self.record(node, MutationKind::Modified);
                true
            }
            None => false,
        }
    }

    // ─── observer ──────────────────────────────────────────────────────────

    /// Start recording mutations
    pub fn observe(&mut self) {
        self.observing = true;
    }

    /// Stop recording and drop pending records
    pub fn disconnect(&mut self) {
        self.observing = false;
        self.records.clear();
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Drain pending mutation records
    pub fn take_records(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.records)
    }

    fn record(&mut self, node: NodeId, kind: MutationKind) {
        if self.observing {
            self.records.push(MutationRecord { node, kind });
        }
    }

    // ─── object URLs ───────────────────────────────────────────────────────

    /// Publish a blob and return a URL that media elements can point at
    pub fn create_object_url(&mut self, blob: Blob) -> String {
        let url = format!("{}{}", OBJECT_URL_PREFIX, self.objects.len());
        self.objects.insert(url.clone(), blob);
        url
    }

    pub fn object(&self, url: &str) -> Option<&Blob> {
        self.objects.get(url)
    }

    pub fn objects(&self) -> impl Iterator<Item = (&str, &Blob)> {
        self.objects.iter().map(|(url, blob)| (url.as_str(), blob))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queries() {
        let mut doc = Document::new();
        let a = doc.append(Element::new("div").with_id("a").with_class("replaced"));
        let b = doc.append(Element::new("div").with_class("encrypted-content"));
        let c = doc.append(Element::new("div").with_class("replaced"));

        assert_eq!(doc.element_by_id("a"), Some(a));
        assert_eq!(doc.element_by_id("zzz"), None);
        assert_eq!(doc.find_by_class("replaced"), vec![a, c]);
        assert_eq!(doc.find_by_class("encrypted-content"), vec![b]);
    }

    #[test]
    fn test_records_only_while_observing() {
        let mut doc = Document::new();
        let a = doc.append(Element::new("p"));
        assert!(doc.take_records().is_empty());

        doc.observe();
        doc.modify(a, |el| {
            el.classes.insert("x".into());
        });
        doc.replace(a, Element::new("img"));
        let b = doc.append(Element::new("p"));

        let records = doc.take_records();
        assert_eq!(
            records,
            vec![
                MutationRecord { node: a, kind: MutationKind::Modified },
                MutationRecord { node: a, kind: MutationKind::Replaced },
                MutationRecord { node: b, kind: MutationKind::Added },
            ]
        );
        assert!(doc.take_records().is_empty());

        doc.disconnect();
        doc.append(Element::new("p"));
        assert!(doc.take_records().is_empty());
    }

    #[test]
    fn test_missing_node_is_untouched() {
        let mut doc = Document::new();
        assert!(!doc.replace(NodeId(3), Element::new("img")));
        assert!(!doc.modify(NodeId(3), |_| {}));
    }

    #[test]
    fn test_json_roundtrip_keeps_structure() {
        let json = r#"{
            "elements": [
                {"tag": "div", "id": "info", "attributes": {"data-salt": "AAAA"}},
                {"tag": "div", "classes": ["encrypted-content"],
                 "attributes": {"data-encryption-info-by": "info", "data-content": "00"}}
            ]
        }"#;
        let doc = Document::from_json(json).unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.get(NodeId(1)).unwrap().attr("data-content"), Some("00"));
        assert_eq!(doc.get(NodeId(0)).unwrap().content, Content::Empty);

        let again = Document::from_json(&doc.to_json_pretty().unwrap()).unwrap();
        assert_eq!(again.get(NodeId(1)), doc.get(NodeId(1)));
    }

    #[test]
    fn test_object_urls() {
        let mut doc = Document::new();
        let url = doc.create_object_url(Blob {
            bytes: vec![1, 2, 3],
            content_type: Some("image/png".into()),
            complete: true,
        });
        assert!(url.starts_with(OBJECT_URL_PREFIX));
        assert_eq!(doc.object(&url).unwrap().bytes, vec![1, 2, 3]);
        assert_eq!(doc.objects().count(), 1);
    }
}
