//! Common imports for typical relay usage.
pub use crate::{
    AbortHandle, Chunk, DeliveryQueue, Dispatcher, DisplaySink, Provider, ProviderConfig, Query,
    QueryHandle, Relay, RelayBuilder, RelayConfig, RelayError, delivery_channel,
};
