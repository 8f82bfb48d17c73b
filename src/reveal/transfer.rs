//! ALFA Reveal - Media Attribute Transfer
//!
//! Builds the real `<img>` from a placeholder's `data-img-*` attributes.
//! Only names on the allow-list make it across.

use std::collections::BTreeMap;

use crate::dom::Element;
use crate::error::{RevealError, RevealResult};

/// Prefix of transferable placeholder attributes
pub const IMG_PREFIX: &str = "data-img-";

/// Source attribute, handled separately from the allow-list
pub const IMG_SRC: &str = "data-img-src";

/// Map a `data-img-*` suffix onto the attribute it becomes on the image
fn allowed_image_attribute(name: &str) -> Option<&'static str> {
    match name {
        "alt" => Some("alt"),
        "title" => Some("title"),
        "width" => Some("width"),
        "height" => Some("height"),
        "format" => Some("format"),
        "loading" => Some("loading"),
        "decoding" => Some("decoding"),
        "sizes" => Some("sizes"),
        "crossorigin" => Some("crossorigin"),
        "referrerpolicy" => Some("referrerpolicy"),
        _ => None,
    }
}

/// Where the media bytes come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// `data:` URL, assigned directly
    Inline(String),
    /// Anything else, fetched progressively
    Remote(String),
}

impl MediaSource {
    pub fn parse(src: &str) -> Self {
        let trimmed = src.trim();
        if trimmed.get(..5).map_or(false, |p| p.eq_ignore_ascii_case("data:")) {
            Self::Inline(trimmed.to_string())
        } else {
            Self::Remote(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Inline(s) | Self::Remote(s) => s,
        }
    }
}

/// Attributes collected from a media placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTransfer {
    pub source: MediaSource,
    pub attributes: BTreeMap<String, String>,
}

impl ImageTransfer {
    /// Collect the transfer for `placeholder`; unknown names are dropped
    pub fn from_element(placeholder: &Element) -> RevealResult<Self> {
        let src = placeholder
            .attr(IMG_SRC)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RevealError::InvalidSource(format!("placeholder has no {}", IMG_SRC)))?;

        let mut attributes = BTreeMap::new();
        for (name, value) in &placeholder.attributes {
            let suffix = match name.strip_prefix(IMG_PREFIX) {
                Some(suffix) if name != IMG_SRC => suffix,
                _ => continue,
            };
            match allowed_image_attribute(suffix) {
                Some(target) => {
                    attributes.insert(target.to_string(), value.clone());
                }
                None => log::warn!("Dropping unsupported media attribute {}", name),
            }
        }

        Ok(Self {
            source: MediaSource::parse(src),
            attributes,
        })
    }

    /// The `<img>` that replaces the placeholder, pointing at `src`
    pub fn into_element(self, src: &str) -> Element {
        let mut img = Element::new("img").with_attr("src", src);
        img.attributes.extend(self.attributes);
        img
    }
}
