//! ALFA Reveal - Progressive Fetcher
//!
//! `fetch_with_progress`: GET a URL, stream the body through the collector
//! and hand back a [`Blob`]. Retry policy belongs to the caller.

use reqwest::Url;

use super::collector::{collect, Flow};
use super::transport::Transport;
use super::units::SizeUnits;
use crate::error::{RevealError, RevealResult};

/// Binary payload of a finished (or aborted) transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    /// `false` when the transfer was aborted part-way
    pub complete: bool,
}

impl Blob {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Received/total byte counts after a chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub received: u64,
    pub total: Option<u64>,
}

impl Progress {
    /// Whole percent, when the total is known
    pub fn percent(&self) -> Option<u64> {
        self.total.map(|total| {
            if total == 0 {
                100
            } else {
                (self.received.saturating_mul(100) / total).min(100)
            }
        })
    }

    /// `"{received} / {total} {percent}%"` or `"{received} received"`
    pub fn describe(&self, units: SizeUnits) -> String {
        match (self.total, self.percent()) {
            (Some(total), Some(percent)) => format!(
                "{} / {} {}%",
                units.format(self.received),
                units.format(total),
                percent
            ),
            _ => format!("{} received", units.format(self.received)),
        }
    }
}

/// Streams media over a [`Transport`] with progress reporting
pub struct ProgressiveFetcher<T: Transport> {
    transport: T,
    base_url: Option<Url>,
}

impl<T: Transport> ProgressiveFetcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            base_url: None,
        }
    }

    /// Resolve relative sources against `base`
    pub fn with_base_url(mut self, base: &str) -> RevealResult<Self> {
        let url = Url::parse(base)
            .map_err(|e| RevealError::Config(format!("base_url {}: {}", base, e)))?;
        self.base_url = Some(url);
        Ok(self)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Absolute http(s) URL for `src`
    pub fn resolve(&self, src: &str) -> RevealResult<Url> {
        let url = match Url::parse(src) {
            Ok(url) => url,
            Err(_) => match &self.base_url {
                Some(base) => base
                    .join(src)
                    .map_err(|e| RevealError::InvalidSource(format!("{}: {}", src, e)))?,
                None => {
                    return Err(RevealError::InvalidSource(format!(
                        "relative source {} without a base URL",
                        src
                    )))
                }
            },
        };

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(RevealError::InvalidSource(format!(
                "unsupported scheme {} in {}",
                other, src
            ))),
        }
    }

    /// Fetch `src`, calling `on_progress` after every chunk.
    ///
    /// Returning [`Flow::Abort`] stops the transfer; the partial blob comes
    /// back with `complete == false`.
    pub async fn fetch_with_progress<F>(&self, src: &str, mut on_progress: F) -> RevealResult<Blob>
    where
        F: FnMut(Progress) -> Flow,
    {
        let url = self.resolve(src)?;
        log::debug!("GET {}", url);

        let response = self.transport.get(url.as_str()).await?;
        if !response.is_success() {
            return Err(RevealError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            });
        }

        let content_type = response.content_type;
        let collected = collect(response.body, response.content_length, |received, total| {
            on_progress(Progress { received, total })
        })
        .await?;

        log::debug!(
            "Fetched {} bytes from {} (complete: {})",
            collected.bytes.len(),
            url,
            collected.complete
        );

        Ok(Blob {
            bytes: collected.bytes,
            content_type,
            complete: collected.complete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::transport::testing::{MemoryTransport, Route};

    const URL: &str = "https://media.alfa.dev/photo.jpg";

    #[tokio::test]
    async fn test_fetch_reports_progress() {
        let transport = MemoryTransport::new();
        transport.route(URL, Route::ok(vec![9u8; 2500], 1000));
        let fetcher = ProgressiveFetcher::new(transport);

        let mut updates = Vec::new();
        let blob = fetcher
            .fetch_with_progress(URL, |p| {
                updates.push(p);
                Flow::Continue
            })
            .await
            .unwrap();

        assert!(blob.complete);
        assert_eq!(blob.len(), 2500);
        assert_eq!(updates.len(), 3);
        assert_eq!(updates.last().unwrap().received, 2500);
        assert!(updates.iter().all(|p| p.total == Some(2500)));
        assert_eq!(
            updates[0].describe(SizeUnits::Decimal),
            "1.00 KB / 2.50 KB 40%"
        );
    }

    #[tokio::test]
    async fn test_unknown_total() {
        let transport = MemoryTransport::new();
        let mut route = Route::ok(vec![1u8; 1500], 1500);
        route.declare_length = false;
        transport.route(URL, route);
        let fetcher = ProgressiveFetcher::new(transport);

        let mut last = None;
        fetcher
            .fetch_with_progress(URL, |p| {
                last = Some(p);
                Flow::Continue
            })
            .await
            .unwrap();

        let last = last.unwrap();
        assert_eq!(last.percent(), None);
        assert_eq!(last.describe(SizeUnits::Decimal), "1.50 KB received");
    }

    #[tokio::test]
    async fn test_http_error_not_retried() {
        let transport = MemoryTransport::new();
        transport.route(URL, Route::status(404));
        let fetcher = ProgressiveFetcher::new(transport);

        let result = fetcher.fetch_with_progress(URL, |_| Flow::Continue).await;
        assert!(matches!(result, Err(RevealError::HttpStatus { status: 404, .. })));
        assert_eq!(fetcher.transport().requests().len(), 1);
    }

    #[tokio::test]
    async fn test_relative_sources() {
        let transport = MemoryTransport::new();
        transport.route("https://alfa.dev/static/a.png", Route::ok(vec![0u8; 4], 4));

        let bare = ProgressiveFetcher::new(MemoryTransport::new());
        assert!(matches!(
            bare.resolve("static/a.png"),
            Err(RevealError::InvalidSource(_))
        ));

        let fetcher = ProgressiveFetcher::new(transport)
            .with_base_url("https://alfa.dev/posts/")
            .unwrap();
        let blob = fetcher
            .fetch_with_progress("/static/a.png", |_| Flow::Continue)
            .await
            .unwrap();
        assert_eq!(blob.len(), 4);
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        let fetcher = ProgressiveFetcher::new(MemoryTransport::new());
        assert!(fetcher.resolve("javascript:alert(1)").is_err());
        assert!(fetcher.resolve("file:///etc/passwd").is_err());
    }

    #[test]
    fn test_percent_edges() {
        let empty = Progress { received: 0, total: Some(0) };
        assert_eq!(empty.percent(), Some(100));
        let over = Progress { received: 12, total: Some(10) };
        assert_eq!(over.percent(), Some(100));
    }
}
