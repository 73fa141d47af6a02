use crate::chunker::{Chunk, Chunker};
use crate::config::ProviderConfig;
use crate::delta::Delta;
use crate::normalizer::Normalizer;
use crate::provider::Provider;
use crate::vendors::DeltaParser;

/// Per-query pipeline state: vendor parser plus chunker.
///
/// Owned by exactly one query task and dropped when the query ends.
#[derive(Debug)]
pub struct StreamState {
    normalizer: Normalizer,
    chunker: Chunker,
}

impl StreamState {
    pub fn new(provider: Provider, max_chunk_len: usize) -> Self {
        Self {
            normalizer: Normalizer::new(provider, false),
            chunker: Chunker::new(max_chunk_len),
        }
    }

    pub fn for_config(config: &ProviderConfig, max_chunk_len: usize) -> Self {
        Self {
            normalizer: Normalizer::for_config(config),
            chunker: Chunker::new(max_chunk_len),
        }
    }

    pub fn provider(&self) -> Provider {
        self.normalizer.provider()
    }

    /// Feeds raw transport bytes and returns the chunks they complete.
    pub fn consume(&mut self, input: &[u8]) -> Vec<Chunk> {
        let deltas = self.normalizer.consume(input);
        self.push_all(deltas)
    }

    /// Signals end of input and returns the final chunks.
    pub fn finish(&mut self) -> Vec<Chunk> {
        let deltas = self.normalizer.finish();
        self.push_all(deltas)
    }

    /// True once the end of generation has been processed.
    pub fn is_done(&self) -> bool {
        self.chunker.is_done()
    }

    pub fn emitted(&self) -> u64 {
        self.chunker.emitted()
    }

    /// Ends the query with a single user-facing failure chunk.
    pub fn failure_notice(&mut self, message: &str) -> Option<Chunk> {
        self.chunker.notice(message)
    }

    fn push_all(&mut self, deltas: Vec<Delta>) -> Vec<Chunk> {
        let mut out = Vec::new();
        for delta in deltas {
            out.extend(self.chunker.push(delta));
        }
        out
    }
}
