//! ALFA Reveal - Page Runtime
//!
//! One `RevealPage` per page load. Owns the document, both controllers and
//! the scan guard; every viewer interaction arrives as a [`PageEvent`].
//!
//! ```text
//! DocumentReady ──▶ rescan ──▶ observe
//! Mutated       ──▶ rescan (guarded, self-induced records dropped)
//! Click(node)   ──▶ media.trigger
//! Input / Submit ─▶ encrypted.input / encrypted.submit
//! ```

use secrecy::SecretString;
use serde::Serialize;

use crate::config::{PageContext, RevealConfig};
use crate::dom::{Document, NodeId};
use crate::error::RevealResult;
use crate::fetch::{ProgressiveFetcher, Transport};
use crate::reveal::{EncryptedContentController, MediaRevealController, ScanGuard, StateCounts};

/// Viewer and browser events
pub enum PageEvent {
    /// Initial load finished
    DocumentReady,
    /// The document changed outside the runtime
    Mutated,
    /// Click on a media panel
    Click(NodeId),
    /// Password field contents changed
    Input { node: NodeId, passphrase: SecretString },
    /// Password form submitted
    Submit(NodeId),
}

/// Placeholder tallies for the whole page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageSummary {
    pub media: StateCounts,
    pub encrypted: StateCounts,
}

/// Runtime for one loaded page
pub struct RevealPage<T: Transport> {
    document: Document,
    media: MediaRevealController<T>,
    encrypted: EncryptedContentController,
    guard: ScanGuard,
    ready: bool,
}

impl<T: Transport> RevealPage<T> {
    pub fn new(
        document: Document,
        fetcher: ProgressiveFetcher<T>,
        config: &RevealConfig,
        context: PageContext,
    ) -> Self {
        Self {
            document,
            media: MediaRevealController::new(fetcher, config),
            encrypted: EncryptedContentController::new(context),
            guard: ScanGuard::default(),
            ready: false,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Mutable access for outside edits. Follow up with
    /// [`PageEvent::Mutated`] so new placeholders get picked up.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn media(&self) -> &MediaRevealController<T> {
        &self.media
    }

    pub fn encrypted(&self) -> &EncryptedContentController {
        &self.encrypted
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Route one event, then process whatever it mutated
    pub async fn dispatch(&mut self, event: PageEvent) -> RevealResult<()> {
        let result = match event {
            PageEvent::DocumentReady => {
                self.on_ready().await;
                Ok(())
            }
            PageEvent::Mutated => Ok(()),
            PageEvent::Click(node) => self
                .media
                .trigger(&mut self.document, node)
                .await
                .map(|_| ()),
            PageEvent::Input { node, passphrase } => {
                self.encrypted.input(&mut self.document, node, passphrase);
                Ok(())
            }
            PageEvent::Submit(node) => self
                .encrypted
                .submit(&mut self.document, node)
                .await
                .map(|_| ()),
        };

        self.flush_mutations().await;
        result
    }

    async fn on_ready(&mut self) {
        if self.ready {
            log::debug!("Document already initialised");
            return;
        }
        self.rescan().await;
        self.document.observe();
        self.ready = true;
        log::info!("Page ready: {} elements", self.document.len());
    }

    async fn flush_mutations(&mut self) {
        while !self.document.take_records().is_empty() {
            if !self.rescan().await {
                break;
            }
        }
    }

    /// Run both scans. Returns `false` if a scan is already in progress.
    pub async fn rescan(&mut self) -> bool {
        if !self.guard.try_enter() {
            log::debug!("Rescan skipped, scan in progress");
            return false;
        }

        let media = self.media.scan(&mut self.document).await;
        let encrypted = self.encrypted.scan(&mut self.document);
        self.guard.leave();

        let own = self.document.take_records().len();
        if media + encrypted > 0 {
            log::debug!(
                "Rescan tagged {} media and {} encrypted placeholders ({} records dropped)",
                media,
                encrypted,
                own
            );
        }
        true
    }

    pub fn summary(&self) -> PageSummary {
        PageSummary {
            media: self.media.states().counts(),
            encrypted: self.encrypted.states().counts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::crypto::{seal, SealParams};
    use crate::dom::{Content, Element};
    use crate::fetch::transport::testing::{MemoryTransport, Route};
    use crate::reveal::encrypted::{CONTENT, ENCRYPTED_CLASS, FORM_ADDED, INFO_REF, UNLOCKED};
    use crate::reveal::media::{CONTENT_SIZE, REPLACED_CLASS, REPLACEMENT_TYPE, STATS_APPLIED};
    use crate::reveal::RevealState;

    const SMALL: &str = "https://media.alfa.dev/small.png";
    const LARGE: &str = "https://media.alfa.dev/large.png";
    const PASS: &str = "tajne-haslo";

    fn png(size: u32) -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(size, size);
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
            .unwrap();
        buffer
    }

    fn media(src: &str, size: u64) -> Element {
        Element::new("div")
            .with_class(REPLACED_CLASS)
            .with_attr(REPLACEMENT_TYPE, "img")
            .with_attr(CONTENT_SIZE, size.to_string())
            .with_attr("data-img-src", src)
            .with_attr("data-img-title", "ALFA")
    }

    fn encrypted_pair(plaintext: &str) -> (Element, Element) {
        let params = SealParams {
            iterations: 1000,
            ..Default::default()
        };
        let sealed = seal(plaintext.as_bytes(), &SecretString::new(PASS.into()), &params).unwrap();
        let mut info = Element::new("div").with_id("enc-info");
        info.attributes = sealed.metadata.to_attributes();
        let block = Element::new("div")
            .with_class(ENCRYPTED_CLASS)
            .with_attr(INFO_REF, "enc-info")
            .with_attr(CONTENT, sealed.ciphertext_hex());
        (info, block)
    }

    fn transport() -> MemoryTransport {
        let transport = MemoryTransport::new();
        transport.route(SMALL, Route::ok(png(2), 32));
        transport.route(LARGE, Route::ok(png(64), 256));
        transport
    }

    fn page(document: Document, context: PageContext) -> RevealPage<MemoryTransport> {
        RevealPage::new(
            document,
            ProgressiveFetcher::new(transport()),
            &RevealConfig::default(),
            context,
        )
    }

    fn requests(page: &RevealPage<MemoryTransport>) -> usize {
        page.media().fetcher().transport().requests().len()
    }

    fn secret(s: &str) -> SecretString {
        SecretString::new(s.to_string())
    }

    #[tokio::test]
    async fn test_full_page() {
        let (info, block) = encrypted_pair("<h2>Dziennik</h2>");
        let mut doc = Document::new();
        let small = doc.append(media(SMALL, 10));
        let large = doc.append(media(LARGE, 2_000_000));
        doc.append(info);
        let locked = doc.append(block);

        let mut page = page(doc, PageContext::default());
        page.dispatch(PageEvent::DocumentReady).await.unwrap();

        assert_eq!(page.document().get(small).unwrap().tag, "img");
        assert_eq!(page.document().get(small).unwrap().attr("title"), Some("ALFA"));
        assert!(page.document().get(large).unwrap().has_class(STATS_APPLIED));
        assert!(page.document().get(locked).unwrap().has_class(FORM_ADDED));
        assert_eq!(requests(&page), 1);

        page.dispatch(PageEvent::Click(large)).await.unwrap();
        page.dispatch(PageEvent::Click(large)).await.unwrap();
        assert_eq!(requests(&page), 2);
        assert_eq!(page.document().get(large).unwrap().tag, "img");

        page.dispatch(PageEvent::Input {
            node: locked,
            passphrase: secret(PASS),
        })
        .await
        .unwrap();
        page.dispatch(PageEvent::Submit(locked)).await.unwrap();

        let el = page.document().get(locked).unwrap();
        assert!(el.has_class(UNLOCKED));
        assert_eq!(
            el.content,
            Content::Markup {
                html: "<h2>Dziennik</h2>".into()
            }
        );

        let summary = page.summary();
        assert_eq!(summary.media.resolved, 2);
        assert_eq!(summary.encrypted.resolved, 1);
    }

    #[tokio::test]
    async fn test_ready_is_idempotent() {
        let (info, block) = encrypted_pair("x");
        let mut doc = Document::new();
        let small = doc.append(media(SMALL, 10));
        let large = doc.append(media(LARGE, 2_000_000));
        doc.append(info);
        doc.append(block);

        let mut page = page(doc, PageContext::default());
        page.dispatch(PageEvent::DocumentReady).await.unwrap();
        page.dispatch(PageEvent::DocumentReady).await.unwrap();
        page.dispatch(PageEvent::Mutated).await.unwrap();
        assert!(page.rescan().await);

        assert!(page.is_ready());
        assert_eq!(requests(&page), 1);
        assert_eq!(page.document().find_by_class(FORM_ADDED).len(), 1);
        assert_eq!(page.document().find_by_class(STATS_APPLIED), vec![large]);
        assert_eq!(page.document().get(small).unwrap().tag, "img");
        assert!(page.document_mut().take_records().is_empty());
    }

    #[tokio::test]
    async fn test_mutations_pick_up_new_placeholders() {
        let mut page = page(Document::new(), PageContext::default());
        page.dispatch(PageEvent::DocumentReady).await.unwrap();

        let (info, block) = encrypted_pair("late");
        page.document_mut().append(info);
        let late_block = page.document_mut().append(block);
        let late_media = page.document_mut().append(media(SMALL, 10));
        page.dispatch(PageEvent::Mutated).await.unwrap();

        assert!(page.document().get(late_block).unwrap().has_class(FORM_ADDED));
        assert_eq!(page.document().get(late_media).unwrap().tag, "img");
        assert_eq!(page.encrypted().state(late_block), RevealState::AwaitingTrigger);
    }

    #[tokio::test]
    async fn test_guard_blocks_reentry() {
        let mut doc = Document::new();
        let node = doc.append(media(LARGE, 2_000_000));
        let mut page = page(doc, PageContext::default());

        assert!(page.guard.try_enter());
        assert!(!page.rescan().await);
        assert!(!page.document().get(node).unwrap().has_class(STATS_APPLIED));

        page.guard.leave();
        assert!(page.rescan().await);
        assert!(page.document().get(node).unwrap().has_class(STATS_APPLIED));
    }

    #[tokio::test]
    async fn test_wrong_passphrase_surfaces_error() {
        let (info, block) = encrypted_pair("x");
        let mut doc = Document::new();
        doc.append(info);
        let node = doc.append(block);

        let mut page = page(doc, PageContext::default());
        page.dispatch(PageEvent::DocumentReady).await.unwrap();
        page.dispatch(PageEvent::Input {
            node,
            passphrase: secret("wrong"),
        })
        .await
        .unwrap();

        assert!(page.dispatch(PageEvent::Submit(node)).await.is_err());
        assert_eq!(page.summary().encrypted.failed, 1);
        assert!(!page.document().get(node).unwrap().has_class(UNLOCKED));
    }

    #[tokio::test]
    async fn test_nocrypt_page_never_decrypts() {
        let (info, block) = encrypted_pair("x");
        let mut doc = Document::new();
        doc.append(info);
        let node = doc.append(block);

        let mut page = page(doc, PageContext::default().with_query("nocrypt=1"));
        page.dispatch(PageEvent::DocumentReady).await.unwrap();
        page.dispatch(PageEvent::Input {
            node,
            passphrase: secret(PASS),
        })
        .await
        .unwrap();
        page.dispatch(PageEvent::Submit(node)).await.unwrap();

        match &page.document().get(node).unwrap().content {
            Content::Form(form) => {
                assert!(form.locked);
                assert!(form.link.is_some());
            }
            other => panic!("expected form, got {:?}", other),
        }
    }
}
