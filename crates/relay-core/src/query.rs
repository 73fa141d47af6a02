use std::sync::Arc;

use futures::StreamExt as _;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chunker::Chunk;
use crate::config::ProviderConfig;
use crate::dispatch::Dispatcher;
use crate::errors::RelayError;
use crate::pipeline::StreamState;
use crate::provider::Provider;
use crate::transport::{Transport, TransportRequest};
use crate::vendors;

/// Free-text user question.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Query {
    pub text: String,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Handle used to request cancellation of a running query.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// The query stops reading from the vendor and dispatches nothing after it
    /// observes the request; it then ends with [`RelayError::Cancelled`].
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Summary of a query that ran to completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryReport {
    pub query_id: Uuid,
    pub provider: Provider,
    /// Chunks dispatched, including a failure notice if one was sent.
    pub chunks: u64,
}

/// Handle to a query running on its own task.
///
/// Dropping the handle detaches the task; it keeps running to completion.
#[derive(Debug)]
pub struct QueryHandle {
    query_id: Uuid,
    abort_handle: AbortHandle,
    join: JoinHandle<Result<QueryReport, RelayError>>,
}

impl QueryHandle {
    pub fn query_id(&self) -> Uuid {
        self.query_id
    }

    /// Returns a handle that can cancel the query.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    pub fn abort(&self) {
        self.abort_handle.abort();
    }

    /// Waits for the query task and returns its outcome.
    pub async fn wait(self) -> Result<QueryReport, RelayError> {
        match self.join.await {
            Ok(result) => result,
            Err(err) => Err(RelayError::protocol_msg(format!(
                "query task {} ended abnormally: {err}",
                self.query_id
            ))),
        }
    }
}

/// Everything one query task needs, moved into the task at spawn.
pub(crate) struct QueryTask {
    pub query_id: Uuid,
    pub config: ProviderConfig,
    pub query: Query,
    pub max_chunk_len: usize,
    pub transport: Arc<dyn Transport>,
    pub dispatcher: Dispatcher,
}

pub(crate) fn spawn_query(runtime: &tokio::runtime::Handle, task: QueryTask) -> QueryHandle {
    let (abort_tx, abort_rx) = watch::channel(false);
    let query_id = task.query_id;
    let join = runtime.spawn(run_query(task, abort_rx));
    QueryHandle {
        query_id,
        abort_handle: AbortHandle { tx: abort_tx },
        join,
    }
}

async fn run_query(
    task: QueryTask,
    mut abort_rx: watch::Receiver<bool>,
) -> Result<QueryReport, RelayError> {
    let QueryTask {
        query_id,
        config,
        query,
        max_chunk_len,
        transport,
        dispatcher,
    } = task;
    let provider = config.provider;
    let request = vendors::build_request(&config, &query.text);
    info!(query_id = %query_id, provider = %provider, model = %config.model, "query started");
    if config.debug {
        debug!(
            query_id = %query_id,
            url = %request.redacted_url(),
            body = %request.body,
            "provider request"
        );
    }

    let mut state = StreamState::for_config(&config, max_chunk_len);
    let mut ctx = TaskContext {
        query_id,
        dispatcher: &dispatcher,
        abort_rx: &mut abort_rx,
    };
    let outcome = drive(transport.as_ref(), request, &mut state, &mut ctx).await;
    match outcome {
        Ok(()) => {
            info!(query_id = %query_id, provider = %provider, chunks = state.emitted(), "query completed");
            Ok(QueryReport {
                query_id,
                provider,
                chunks: state.emitted(),
            })
        }
        Err(RelayError::Provider(err)) => {
            warn!(query_id = %query_id, provider = %provider, error = %err, "query failed");
            if let Some(notice) = state.failure_notice(&err.user_message(max_chunk_len))
                && let Err(dispatch_err) = ctx.deliver_all(vec![notice]).await
            {
                warn!(query_id = %query_id, error = %dispatch_err, "failure notice not delivered");
            }
            Err(RelayError::Provider(err))
        }
        Err(RelayError::Cancelled) => {
            info!(query_id = %query_id, chunks = state.emitted(), "query cancelled");
            Err(RelayError::Cancelled)
        }
        Err(err) => {
            warn!(query_id = %query_id, error = %err, "query aborted");
            Err(err)
        }
    }
}

struct TaskContext<'a> {
    query_id: Uuid,
    dispatcher: &'a Dispatcher,
    abort_rx: &'a mut watch::Receiver<bool>,
}

impl TaskContext<'_> {
    /// Dispatches chunks in order, stopping at the first observed abort.
    async fn deliver_all(&mut self, chunks: Vec<Chunk>) -> Result<(), RelayError> {
        for chunk in chunks {
            tokio::select! {
                biased;
                _ = wait_for_abort(self.abort_rx) => return Err(RelayError::Cancelled),
                sent = self.dispatcher.dispatch(self.query_id, chunk) => sent?,
            }
        }
        Ok(())
    }
}

async fn drive(
    transport: &dyn Transport,
    request: TransportRequest,
    state: &mut StreamState,
    ctx: &mut TaskContext<'_>,
) -> Result<(), RelayError> {
    if !state.provider().is_streaming() {
        let response = tokio::select! {
            biased;
            _ = wait_for_abort(ctx.abort_rx) => return Err(RelayError::Cancelled),
            fetched = transport.fetch(request) => fetched?,
        };
        debug!(query_id = %ctx.query_id, status = response.status, bytes = response.body.len(), "batch body received");
        let mut chunks = state.consume(response.body.as_bytes());
        chunks.extend(state.finish());
        return ctx.deliver_all(chunks).await;
    }

    let mut stream = tokio::select! {
        biased;
        _ = wait_for_abort(ctx.abort_rx) => return Err(RelayError::Cancelled),
        opened = transport.open_stream(request) => opened?,
    };
    loop {
        let next = tokio::select! {
            biased;
            _ = wait_for_abort(ctx.abort_rx) => return Err(RelayError::Cancelled),
            next = stream.next() => next,
        };
        match next {
            Some(Ok(bytes)) => {
                let chunks = state.consume(&bytes);
                ctx.deliver_all(chunks).await?;
                if state.is_done() {
                    return Ok(());
                }
            }
            Some(Err(err)) => return Err(err.into()),
            None => {
                let chunks = state.finish();
                return ctx.deliver_all(chunks).await;
            }
        }
    }
}

/// Resolves once abort is requested. Never resolves if every handle is gone.
async fn wait_for_abort(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
