//! ALFA Reveal - Authoring Helpers
//!
//! Build-time side of the pipeline: turn sealed content into page elements
//! and stamp media placeholders with their measured size.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::crypto::Sealed;
use crate::dom::{Document, Element};
use crate::fetch::{Flow, ProgressiveFetcher, Transport};
use crate::reveal::encrypted::{CONTENT, ENCRYPTED_CLASS, INFO_REF};
use crate::reveal::media::{CONTENT_SIZE, REPLACED_CLASS};
use crate::reveal::transfer::{MediaSource, IMG_SRC};

/// Size written when a source cannot be measured
pub const UNMEASURED: i64 = -1;

/// Metadata element and encrypted placeholder for `sealed`
pub fn sealed_elements(
    sealed: &Sealed,
    info_id: &str,
    placeholder_id: Option<&str>,
) -> (Element, Element) {
    let mut info = Element::new("div").with_id(info_id);
    info.attributes = sealed.metadata.to_attributes();

    let mut placeholder = Element::new("div")
        .with_class(ENCRYPTED_CLASS)
        .with_attr(INFO_REF, info_id)
        .with_attr(CONTENT, sealed.ciphertext_hex());
    if let Some(id) = placeholder_id {
        placeholder = placeholder.with_id(id);
    }

    (info, placeholder)
}

/// Outcome of one [`SizeAnnotator::annotate`] pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnnotateReport {
    /// Placeholders that got a real size
    pub measured: usize,
    /// Inline `data:` sources, left alone
    pub skipped: usize,
    /// Placeholders stamped with `-1`
    pub failed: usize,
}

impl AnnotateReport {
    pub fn merge(&mut self, other: AnnotateReport) {
        self.measured += other.measured;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Measures media sources and writes `data-content-size`.
///
/// Remote sources are downloaded, local ones are looked up on disk:
/// absolute paths under `site_root`, relative ones next to the document.
/// Results are cached for the lifetime of the annotator.
pub struct SizeAnnotator<'a, T: Transport> {
    fetcher: &'a ProgressiveFetcher<T>,
    site_root: PathBuf,
    cache: HashMap<String, i64>,
}

impl<'a, T: Transport> SizeAnnotator<'a, T> {
    pub fn new(fetcher: &'a ProgressiveFetcher<T>, site_root: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            site_root: site_root.into(),
            cache: HashMap::new(),
        }
    }

    /// Stamp every media placeholder in `doc`; `doc_dir` is the directory
    /// the document lives in
    pub async fn annotate(&mut self, doc: &mut Document, doc_dir: &Path) -> AnnotateReport {
        let mut report = AnnotateReport::default();

        let targets: Vec<_> = doc
            .iter()
            .filter(|(_, el)| el.has_class(REPLACED_CLASS))
            .filter_map(|(node, el)| el.attr(IMG_SRC).map(|src| (node, src.to_string())))
            .collect();

        for (node, src) in targets {
            let size = match MediaSource::parse(&src) {
                MediaSource::Inline(_) => {
                    log::debug!("Skipping inline source on {}", node);
                    report.skipped += 1;
                    continue;
                }
                MediaSource::Remote(src) => self.measure(&src, doc_dir).await,
            };

            if size == UNMEASURED {
                report.failed += 1;
            } else {
                report.measured += 1;
            }
            doc.modify(node, |el| {
                el.attributes.insert(CONTENT_SIZE.to_string(), size.to_string());
            });
        }

        report
    }

    async fn measure(&mut self, src: &str, doc_dir: &Path) -> i64 {
        let is_remote = src.starts_with("http://") || src.starts_with("https://");
        let key = if is_remote {
            src.to_string()
        } else {
            self.local_path(src, doc_dir).to_string_lossy().into_owned()
        };

        if let Some(size) = self.cache.get(&key) {
            return *size;
        }

        let size = if is_remote {
            self.measure_remote(src).await
        } else {
            measure_local(Path::new(&key)).await
        };
        self.cache.insert(key, size);
        size
    }

    fn local_path(&self, src: &str, doc_dir: &Path) -> PathBuf {
        match src.strip_prefix('/') {
            Some(rooted) => self.site_root.join(rooted),
            None => doc_dir.join(src),
        }
    }

    async fn measure_remote(&self, url: &str) -> i64 {
        if url.starts_with("http://") {
            log::warn!("Insecure media URL {} may cause mixed content errors", url);
        }
        match self.fetcher.fetch_with_progress(url, |_| Flow::Continue).await {
            Ok(blob) => blob.len() as i64,
            Err(e) => {
                log::warn!("Could not measure {}: {}", url, e);
                UNMEASURED
            }
        }
    }
}

async fn measure_local(path: &Path) -> i64 {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta.len() as i64,
        _ => {
            log::warn!("Skipping missing media at {}", path.display());
            UNMEASURED
        }
    }
}
