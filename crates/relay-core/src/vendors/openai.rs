use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::delta::Delta;
use crate::errors::ProviderError;
use crate::provider::Provider;
use crate::transport::TransportRequest;

use super::DeltaParser;
use super::lines::{LineDecoder, data_payload};

const DONE_SENTINEL: &str = "[DONE]";
const MAX_TOKENS: u32 = 2000;

pub(crate) fn build_request(config: &ProviderConfig, query: &str) -> TransportRequest {
    let mut messages = Vec::new();
    if let Some(system) = config.system_prompt.as_deref() {
        messages.push(serde_json::json!({ "role": "system", "content": system }));
    }
    messages.push(serde_json::json!({ "role": "user", "content": query }));

    let body = serde_json::json!({
        "model": config.model,
        "messages": messages,
        "stream": true,
        "max_tokens": MAX_TOKENS,
    });
    TransportRequest {
        provider: Provider::OpenAi,
        url: config.endpoint(),
        headers: vec![
            ("Content-Type".into(), "application/json".into()),
            ("Authorization".into(), format!("Bearer {}", config.api_key)),
        ],
        body: body.to_string(),
        timeout: config.timeout,
    }
}

/// Parser for the OpenAI chat-completions stream.
///
/// Only the literal `[DONE]` sentinel ends the stream. A finish reason
/// flushes buffered text but more frames may still follow it.
#[derive(Debug, Default)]
pub struct OpenAiParser {
    lines: LineDecoder,
    finished: bool,
    debug: bool,
}

impl OpenAiParser {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }

    fn handle_line(&mut self, line: &str, out: &mut Vec<Delta>) {
        if self.debug {
            debug!(provider = "openai", line, "received line");
        }
        let Some(data) = data_payload(line) else {
            return;
        };
        if data.is_empty() {
            return;
        }
        if data == DONE_SENTINEL {
            self.finished = true;
            out.push(Delta::end());
            return;
        }
        match map_openai_frame(data) {
            Ok(deltas) => out.extend(deltas),
            Err(err) => warn!(error = %err, "skipping malformed frame"),
        }
    }
}

impl DeltaParser for OpenAiParser {
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
            warn!(provider = "openai", "stream closed without [DONE]");
            self.finished = true;
            out.push(Delta::end());
        }
        out
    }
}

/// Maps one non-sentinel `data:` payload to zero, one or two deltas.
pub(crate) fn map_openai_frame(data: &str) -> Result<Vec<Delta>, ProviderError> {
    let value: Value = serde_json::from_str(data).map_err(|e| {
        ProviderError::malformed(Provider::OpenAi, format!("invalid JSON frame: {e}"))
    })?;
    if let Some(message) = value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
    {
        warn!(provider = "openai", vendor_message = message, "vendor reported stream error");
        return Ok(Vec::new());
    }

    let mut deltas = Vec::new();
    let Some(choice) = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    else {
        return Ok(deltas);
    };
    if let Some(text) = choice
        .get("delta")
        .and_then(|d| d.get("content"))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
    {
        deltas.push(Delta::text(text));
    }
    if choice.get("finish_reason").and_then(Value::as_str).is_some() {
        deltas.push(Delta::flush());
    }
    Ok(deltas)
}
