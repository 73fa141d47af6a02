use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::delta::Delta;
use crate::errors::ProviderError;
use crate::provider::Provider;
use crate::transport::TransportRequest;

use super::DeltaParser;
use super::lines::{LineDecoder, data_payload};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2000;

pub(crate) fn build_request(config: &ProviderConfig, query: &str) -> TransportRequest {
    let mut body = serde_json::json!({
        "model": config.model,
        "messages": [{ "role": "user", "content": query }],
        "stream": true,
        "max_tokens": MAX_TOKENS,
    });
    if let Some(system) = config.system_prompt.as_deref() {
        body["system"] = Value::from(system);
    }
    TransportRequest {
        provider: Provider::Anthropic,
        url: config.endpoint(),
        headers: vec![
            ("content-type".into(), "application/json".into()),
            ("x-api-key".into(), config.api_key.clone()),
            ("anthropic-version".into(), ANTHROPIC_VERSION.into()),
        ],
        body: body.to_string(),
        timeout: config.timeout,
    }
}

/// Parser for the Anthropic Messages event stream.
#[derive(Debug, Default)]
pub struct AnthropicParser {
    lines: LineDecoder,
    finished: bool,
    debug: bool,
}

impl AnthropicParser {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    fn handle_line(&mut self, line: &str, out: &mut Vec<Delta>) {
        if self.debug {
            debug!(provider = "anthropic", line, "received line");
        }
        let Some(data) = data_payload(line) else {
            return;
        };
        if data.is_empty() {
            return;
        }
        match map_anthropic_frame(data) {
            Ok(Some(delta)) => {
                self.finished = delta.is_end();
                out.push(delta);
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "skipping malformed frame"),
        }
    }
}

impl DeltaParser for AnthropicParser {
    fn consume(&mut self, input: &[u8]) -> Vec<Delta> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        for line in self.lines.push_chunk(input) {
            self.handle_line(&line, &mut out);
            if self.finished {
                break;
            }
        }
        out
    }

    fn finish(&mut self) -> Vec<Delta> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        if let Some(line) = self.lines.take_remainder() {
            self.handle_line(&line, &mut out);
        }
        if !self.finished {
            warn!(provider = "anthropic", "stream closed without message_stop");
            self.finished = true;
            out.push(Delta::end());
        }
        out
    }
}

/// Classifies one `data:` payload.
///
/// Returns `Ok(None)` for frames that carry nothing for the user (pings,
/// message metadata, tool-input deltas).
pub(crate) fn map_anthropic_frame(data: &str) -> Result<Option<Delta>, ProviderError> {
    let value: Value = serde_json::from_str(data).map_err(|e| {
        ProviderError::malformed(Provider::Anthropic, format!("invalid JSON frame: {e}"))
    })?;
    let Some(event_type) = value.get("type").and_then(Value::as_str) else {
        return Ok(None);
    };
    match event_type {
        "content_block_delta" => Ok(value
            .get("delta")
            .and_then(|d| d.get("text"))
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(Delta::text)),
        "content_block_stop" => Ok(Some(Delta::flush())),
        "message_stop" => Ok(Some(Delta::end())),
        "error" => {
            let message = value
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown stream error");
            warn!(provider = "anthropic", vendor_message = message, "vendor reported stream error");
            Ok(None)
        }
        _ => Ok(None),
    }
}
