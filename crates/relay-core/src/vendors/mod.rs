//! Vendor wire formats: request builders and response parsers.
//!
//! Each vendor module owns both directions of its wire contract. Parsers turn
//! raw response bytes into canonical [`Delta`]s and never fail; unreadable
//! frames are logged and skipped.

mod anthropic;
mod gemini;
mod lines;
mod openai;

pub use anthropic::AnthropicParser;
pub use gemini::{EMPTY_RESPONSE_PLACEHOLDER, GeminiParser};
pub use openai::OpenAiParser;

use crate::config::ProviderConfig;
use crate::delta::Delta;
use crate::provider::Provider;
use crate::transport::TransportRequest;

/// Incremental decoder from vendor bytes to deltas.
pub trait DeltaParser {
    /// Feeds one read (or a whole batch body) and returns the deltas it completes.
    fn consume(&mut self, input: &[u8]) -> Vec<Delta>;

    /// Signals end of input. Drains any unterminated line and guarantees the
    /// delta sequence ends with exactly one `End`.
    fn finish(&mut self) -> Vec<Delta>;
}

/// Builds the HTTP request for `query` in the config's vendor format.
pub fn build_request(config: &ProviderConfig, query: &str) -> TransportRequest {
    match config.provider {
        Provider::Anthropic => anthropic::build_request(config, query),
        Provider::OpenAi => openai::build_request(config, query),
        Provider::Gemini => gemini::build_request(config, query),
    }
}
