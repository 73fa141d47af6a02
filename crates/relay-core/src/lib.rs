//! Multi-vendor LLM answer relay.
//!
//! Sends one free-text query to Anthropic, OpenAI or Gemini and turns the
//! vendor's response, streamed or batch, into an ordered sequence of short,
//! naturally broken chunks delivered to a display sink.
//!
//! # Usage
//!
//! ```no_run
//! use relay_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), RelayError> {
//! let relay = Relay::builder().build()?;
//! let config = ProviderConfig::from_env(Provider::OpenAi)?;
//!
//! let (dispatcher, queue) = delivery_channel(16);
//! let handle = relay.submit(&config, Query::new("How do I tame a wolf?"), dispatcher)?;
//! queue.run(&mut |text: &str| println!("{text}")).await;
//! handle.wait().await?;
//! # Ok(())
//! # }
//! ```

/// Bounded re-segmentation of answer text.
pub mod chunker;
/// Per-query vendor settings.
pub mod config;
/// Canonical vendor output units.
pub mod delta;
/// Ordered chunk handoff to the display owner.
pub mod dispatch;
/// Public error types.
pub mod errors;
/// Parser selection per provider.
pub mod normalizer;
/// Per-query parser plus chunker state.
pub mod pipeline;
/// Common imports for typical usage.
pub mod prelude;
/// Supported vendors.
pub mod provider;
/// Query values, task handles and cancellation.
pub mod query;
/// Relay entry point and builder.
pub mod relay;
/// Settings file loader.
pub mod settings;
/// HTTP transport contract and `reqwest` implementation.
pub mod transport;
/// Vendor wire formats.
pub mod vendors;

pub use chunker::{Chunk, Chunker, ChunkerState, DEFAULT_MAX_CHUNK_LEN};
pub use config::ProviderConfig;
pub use delta::{Delta, DeltaKind};
pub use dispatch::{Delivery, DeliveryQueue, Dispatcher, DisplaySink, delivery_channel};
pub use errors::{ProviderError, RelayError};
pub use normalizer::Normalizer;
pub use pipeline::StreamState;
pub use provider::Provider;
pub use query::{AbortHandle, Query, QueryHandle, QueryReport};
pub use relay::{Relay, RelayBuilder};
pub use settings::RelayConfig;
pub use transport::{HttpTransport, Transport, TransportRequest};
