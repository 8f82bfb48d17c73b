//! ALFA Reveal - HTTP Transport
//!
//! The seam between the fetch pipeline and the network. Production code goes
//! through `reqwest`; tests plug in an in-memory transport.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{stream::BoxStream, StreamExt};

use crate::error::{RevealError, RevealResult};

/// Response body as a stream of chunks
pub type BodyStream = BoxStream<'static, RevealResult<Vec<u8>>>;

/// Status line, selected headers and the streamed body
pub struct Response {
    pub status: u16,
    /// `content-length`, when the server sent one
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
    pub body: BodyStream,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> RevealResult<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn get(&self, url: &str) -> RevealResult<Response> {
        (**self).get(url).await
    }
}

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> RevealResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| RevealError::Config(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> RevealResult<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RevealError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let content_length = response.content_length();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| RevealError::StreamReadFailure(e.to_string()))
            })
            .boxed();

        Ok(Response {
            status,
            content_length,
            content_type,
            body,
        })
    }
}
