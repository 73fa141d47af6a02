use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::chunker::{Chunk, DEFAULT_MAX_CHUNK_LEN};
use crate::config::ProviderConfig;
use crate::dispatch::{Dispatcher, delivery_channel};
use crate::errors::RelayError;
use crate::query::{Query, QueryHandle, QueryTask, spawn_query};
use crate::transport::{DEFAULT_TIMEOUT, HttpTransport, Transport};

pub(crate) struct RelayInner {
    transport: Arc<dyn Transport>,
    max_chunk_len: usize,
    runtime: Option<tokio::runtime::Handle>,
}

/// Entry point for submitting queries.
///
/// Cheap to clone; every clone shares one transport.
#[derive(Clone)]
pub struct Relay {
    pub(crate) inner: Arc<RelayInner>,
}

impl Relay {
    /// Starts a builder for configuring the transport and chunk limit.
    pub fn builder() -> RelayBuilder {
        RelayBuilder::default()
    }

    pub fn max_chunk_len(&self) -> usize {
        self.inner.max_chunk_len
    }

    /// Validates the query and starts it on its own task.
    ///
    /// `config` is cloned into the task, so later changes by the caller do not
    /// affect this query. Chunks arrive on the queue paired with `dispatcher`.
    pub fn submit(
        &self,
        config: &ProviderConfig,
        query: Query,
        dispatcher: Dispatcher,
    ) -> Result<QueryHandle, RelayError> {
        config.validate()?;
        if query.text.trim().is_empty() {
            return Err(RelayError::Validation("query text must not be empty".into()));
        }
        let runtime = match &self.inner.runtime {
            Some(handle) => handle.clone(),
            None => tokio::runtime::Handle::try_current().map_err(|_| {
                RelayError::Config("no tokio runtime available to run the query".into())
            })?,
        };

        let query_id = Uuid::new_v4();
        debug!(query_id = %query_id, provider = %config.provider, "submitting query");
        Ok(spawn_query(
            &runtime,
            QueryTask {
                query_id,
                config: config.clone(),
                query,
                max_chunk_len: self.inner.max_chunk_len,
                transport: self.inner.transport.clone(),
                dispatcher,
            },
        ))
    }

    /// Runs a query to completion and returns every chunk it produced.
    ///
    /// On a vendor failure the error is returned and the failure notice is
    /// dropped.
    pub async fn collect(
        &self,
        config: &ProviderConfig,
        query: Query,
    ) -> Result<Vec<Chunk>, RelayError> {
        let (dispatcher, mut queue) = delivery_channel(16);
        let handle = self.submit(config, query, dispatcher)?;
        let mut chunks = Vec::new();
        while let Some(delivery) = queue.recv().await {
            chunks.push(delivery.chunk);
        }
        handle.wait().await?;
        Ok(chunks)
    }
}

/// Builder for a [`Relay`].
#[derive(Default)]
pub struct RelayBuilder {
    transport: Option<Arc<dyn Transport>>,
    max_chunk_len: Option<usize>,
    timeout: Option<Duration>,
    runtime: Option<tokio::runtime::Handle>,
}

impl RelayBuilder {
    /// Replaces the default HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the chunk limit in characters (default 250).
    pub fn max_chunk_len(mut self, max_chunk_len: usize) -> Self {
        self.max_chunk_len = Some(max_chunk_len);
        self
    }

    /// Default request timeout for the built-in HTTP transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Runtime that query tasks are spawned on.
    ///
    /// Without one, `submit` uses the runtime it is called from.
    pub fn runtime(mut self, runtime: tokio::runtime::Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<Relay, RelayError> {
        let max_chunk_len = self.max_chunk_len.unwrap_or(DEFAULT_MAX_CHUNK_LEN);
        if max_chunk_len == 0 {
            return Err(RelayError::Config(
                "max_chunk_len must be greater than 0".into(),
            ));
        }
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.timeout.unwrap_or(DEFAULT_TIMEOUT))?),
        };
        Ok(Relay {
            inner: Arc::new(RelayInner {
                transport,
                max_chunk_len,
                runtime: self.runtime,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::provider::Provider;
    use crate::transport::{BatchResponse, ByteStream, TransportRequest};
    use bytes::Bytes;
    use futures::stream;

    struct ScriptedTransport {
        body: &'static str,
    }

    #[async_trait::async_trait]
    impl Transport for ScriptedTransport {
        async fn open_stream(&self, _req: TransportRequest) -> Result<ByteStream, ProviderError> {
            let items: Vec<Result<Bytes, ProviderError>> =
                vec![Ok(Bytes::from_static(self.body.as_bytes()))];
            Ok(Box::pin(stream::iter(items)))
        }

        async fn fetch(&self, _req: TransportRequest) -> Result<BatchResponse, ProviderError> {
            Ok(BatchResponse {
                status: 200,
                body: self.body.to_string(),
            })
        }
    }

    fn relay(body: &'static str) -> Relay {
        Relay::builder()
            .transport(Arc::new(ScriptedTransport { body }))
            .max_chunk_len(10)
            .build()
            .expect("build relay")
    }

    #[test]
    fn build_rejects_zero_chunk_len() {
        let result = Relay::builder().max_chunk_len(0).build();
        assert!(
            matches!(result, Err(RelayError::Config(message)) if message.contains("max_chunk_len"))
        );
    }

    #[test]
    fn default_build_uses_http_transport_and_limit() {
        let relay = Relay::builder().build().expect("build");
        assert_eq!(relay.max_chunk_len(), DEFAULT_MAX_CHUNK_LEN);
    }

    #[tokio::test]
    async fn submit_validates_before_spawning() {
        let relay = relay("");
        let (dispatcher, _queue) = delivery_channel(1);

        let missing_key = ProviderConfig::new(Provider::Anthropic, "your_anthropic_key_here");
        let err = relay
            .submit(&missing_key, Query::new("hi"), dispatcher.clone())
            .expect_err("placeholder key");
        assert!(
            matches!(err, RelayError::Config(message) if message.contains("Anthropic API key not set"))
        );

        let config = ProviderConfig::new(Provider::Anthropic, "real");
        let err = relay
            .submit(&config, Query::new("   "), dispatcher)
            .expect_err("blank query");
        assert!(matches!(err, RelayError::Validation(_)));
    }

    #[test]
    fn submit_outside_runtime_is_config_error() {
        let relay = relay("");
        let (dispatcher, _queue) = delivery_channel(1);
        let err = relay
            .submit(
                &ProviderConfig::new(Provider::OpenAi, "sk"),
                Query::new("hi"),
                dispatcher,
            )
            .expect_err("no runtime");
        assert!(matches!(err, RelayError::Config(message) if message.contains("runtime")));
    }

    #[test]
    fn explicit_runtime_lets_sync_callers_submit() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .expect("runtime");
        let relay = Relay::builder()
            .transport(Arc::new(ScriptedTransport {
                body: "data: {\"choices\":[{\"delta\":{\"content\":\"sync host\"}}]}\n\ndata: [DONE]\n\n",
            }))
            .runtime(runtime.handle().clone())
            .build()
            .expect("build");
        let (dispatcher, mut queue) = delivery_channel(4);
        let handle = relay
            .submit(
                &ProviderConfig::new(Provider::OpenAi, "sk"),
                Query::new("hi"),
                dispatcher,
            )
            .expect("submit");
        let report = runtime.block_on(handle.wait()).expect("report");
        assert_eq!(report.chunks, 1);

        let mut seen = Vec::new();
        assert_eq!(queue.try_drain(&mut |text: &str| seen.push(text.to_string())), 1);
        assert_eq!(seen, vec!["sync host"]);
    }

    #[tokio::test]
    async fn collect_returns_all_chunks() {
        let relay = relay(
            "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"Sheep drop wool.\"}}\n\ndata: {\"type\":\"message_stop\"}\n\n",
        );
        let chunks = relay
            .collect(&ProviderConfig::new(Provider::Anthropic, "k"), Query::new("q"))
            .await
            .expect("collect");
        let texts: Vec<_> = chunks.iter().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["Sheep", "drop wool."]);
        assert_eq!(chunks[1].sequence, 1);
    }
}
