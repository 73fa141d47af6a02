//! One HTTP request per query, returned as a live byte stream or a buffered body.

use std::pin::Pin;
use std::time::Duration;

use futures::StreamExt as _;
use tracing::debug;

use crate::errors::{ProviderError, RelayError};
use crate::provider::Provider;

/// Default timeout applied by [`HttpTransport`] when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Incremental response body. Read failures surface as transport errors.
pub type ByteStream = Pin<
    Box<dyn futures::Stream<Item = Result<bytes::Bytes, ProviderError>> + Send + 'static>,
>;

/// A fully prepared vendor request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportRequest {
    pub provider: Provider,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Serialized JSON body.
    pub body: String,
    /// Per-request timeout override.
    pub timeout: Option<Duration>,
}

impl TransportRequest {
    /// URL with any `key=` query value masked, safe for logs.
    pub fn redacted_url(&self) -> String {
        match self.url.split_once("key=") {
            Some((head, tail)) => {
                let rest = tail.find('&').map(|idx| &tail[idx..]).unwrap_or("");
                format!("{head}key=[API_KEY_HIDDEN]{rest}")
            }
            None => self.url.clone(),
        }
    }

    /// Header names only; values may carry credentials.
    pub fn header_names(&self) -> Vec<&str> {
        self.headers.iter().map(|(name, _)| name.as_str()).collect()
    }
}

/// Buffered response from a batch vendor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchResponse {
    pub status: u16,
    pub body: String,
}

/// Performs exactly one request per call and never retries.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the body as it arrives.
    ///
    /// Non-2xx responses are read in full and returned as
    /// [`ProviderError::HttpStatus`].
    async fn open_stream(&self, request: TransportRequest) -> Result<ByteStream, ProviderError>;

    /// Sends the request and waits for the whole body.
    async fn fetch(&self, request: TransportRequest) -> Result<BatchResponse, ProviderError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Builds a client with the given default timeout.
    pub fn new(timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn send(&self, request: TransportRequest) -> Result<reqwest::Response, ProviderError> {
        let provider = request.provider;
        debug!(
            provider = %provider,
            url = %request.redacted_url(),
            headers = ?request.header_names(),
            "sending provider request"
        );
        let mut http_req = self.client.post(&request.url);
        for (name, value) in &request.headers {
            http_req = http_req.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            http_req = http_req.timeout(timeout);
        }
        let response = http_req
            .body(request.body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(provider, describe(&e)))?;

        let status = response.status();
        debug!(provider = %provider, status = status.as_u16(), "received response status");
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::http_status(provider, status.as_u16(), body));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn open_stream(&self, request: TransportRequest) -> Result<ByteStream, ProviderError> {
        let provider = request.provider;
        let response = self.send(request).await?;
        let stream = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| {
                ProviderError::transport(provider, format!("streaming read failed: {}", describe(&e)))
            })
        });
        Ok(Box::pin(stream))
    }

    async fn fetch(&self, request: TransportRequest) -> Result<BatchResponse, ProviderError> {
        let provider = request.provider;
        let response = self.send(request).await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            ProviderError::transport(provider, format!("failed to read body: {}", describe(&e)))
        })?;
        Ok(BatchResponse { status, body })
    }
}

fn describe(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        format!("request failed: {err}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> TransportRequest {
        TransportRequest {
            provider: Provider::Gemini,
            url: url.to_string(),
            headers: vec![("x-api-key".into(), "secret".into())],
            body: "{}".into(),
            timeout: None,
        }
    }

    #[test]
    fn redacts_key_query_parameter() {
        let req = request("https://host/v1beta/models/m:streamGenerateContent?key=abc123&alt=json");
        assert_eq!(
            req.redacted_url(),
            "https://host/v1beta/models/m:streamGenerateContent?key=[API_KEY_HIDDEN]&alt=json"
        );
        assert_eq!(request("https://host/v1/messages").redacted_url(), "https://host/v1/messages");
    }

    #[test]
    fn header_names_hide_values() {
        assert_eq!(request("http://h").header_names(), vec!["x-api-key"]);
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let transport = HttpTransport::new(Duration::from_secs(2)).expect("client");
        let err = transport
            .fetch(request("http://127.0.0.1:9/v1/messages"))
            .await
            .expect_err("nothing listens on the discard port");
        assert!(matches!(err, ProviderError::Transport { provider: Provider::Gemini, .. }));
    }
}
