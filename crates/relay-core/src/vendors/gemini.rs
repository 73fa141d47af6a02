use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::delta::Delta;
use crate::errors::ProviderError;
use crate::provider::Provider;
use crate::transport::TransportRequest;

use super::DeltaParser;

/// Text delivered when the body held no extractable answer.
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "(Received empty response from Gemini)";

pub(crate) fn build_request(config: &ProviderConfig, query: &str) -> TransportRequest {
    let mut body = serde_json::json!({
        "contents": [{ "role": "user", "parts": [{ "text": query }] }],
        "generationConfig": { "responseMimeType": "text/plain" },
    });
    if let Some(system) = config.system_prompt.as_deref() {
        body["system_instruction"] = serde_json::json!({ "parts": [{ "text": system }] });
    }
    TransportRequest {
        provider: Provider::Gemini,
        url: config.endpoint(),
        headers: vec![("Content-Type".into(), "application/json".into())],
        body: body.to_string(),
        timeout: config.timeout,
    }
}

/// Parser for the Gemini `streamGenerateContent` body, read in one piece.
///
/// `consume` only buffers; all text is produced by `finish` once the body is
/// complete.
#[derive(Debug, Default)]
pub struct GeminiParser {
    body: Vec<u8>,
    finished: bool,
    debug: bool,
}

impl GeminiParser {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            ..Self::default()
        }
    }
}

impl DeltaParser for GeminiParser {
    fn consume(&mut self, input: &[u8]) -> Vec<Delta> {
        if !self.finished {
            self.body.extend_from_slice(input);
        }
        Vec::new()
    }

    fn finish(&mut self) -> Vec<Delta> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        let body = String::from_utf8_lossy(&self.body).into_owned();
        self.body.clear();
        if self.debug {
            debug!(provider = "gemini", body = %body, "received body");
        }

        let text = collect_text(&body);
        // whitespace-only text would trim away to zero chunks
        if text.trim().is_empty() {
            let err = ProviderError::empty(Provider::Gemini);
            warn!(error = %err, "substituting placeholder text");
            return vec![Delta::text(EMPTY_RESPONSE_PLACEHOLDER), Delta::end()];
        }
        vec![Delta::text(text), Delta::end()]
    }
}

/// Concatenates the first text part of every response object in `body`.
///
/// Accepts a JSON array of objects or one object per line. An array that fails
/// to parse is rescanned line by line.
pub(crate) fn collect_text(body: &str) -> String {
    let trimmed = body.trim_start();
    let objects = if trimmed.starts_with('[') {
        match serde_json::from_str::<Vec<Value>>(trimmed) {
            Ok(values) => values,
            Err(err) => {
                warn!(provider = "gemini", error = %err, "array body did not parse, scanning lines");
                scan_lines(body)
            }
        }
    } else {
        scan_lines(body)
    };

    let mut text = String::new();
    for object in objects.iter().filter(|value| value.is_object()) {
        if let Some(part) = first_part_text(object) {
            text.push_str(part);
        }
    }
    text
}

fn scan_lines(body: &str) -> Vec<Value> {
    body.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches('[')
                .trim_end_matches([',', ']'])
        })
        .filter(|line| line.starts_with('{'))
        .filter_map(|line| match serde_json::from_str::<Value>(line) {
            Ok(value) => Some(value),
            Err(err) => {
                let err = ProviderError::malformed(Provider::Gemini, err.to_string());
                warn!(error = %err, "skipping unparseable line");
                None
            }
        })
        .collect()
}

fn first_part_text(object: &Value) -> Option<&str> {
    object
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .get(0)?
        .get("text")?
        .as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str) -> String {
        serde_json::json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
        })
        .to_string()
    }

    fn run(body: &str) -> Vec<Delta> {
        let mut parser = GeminiParser::new(false);
        let (head, tail) = body.split_at(body.len() / 2);
        assert!(parser.consume(head.as_bytes()).is_empty());
        assert!(parser.consume(tail.as_bytes()).is_empty());
        parser.finish()
    }

    #[test]
    fn request_uses_key_in_url_and_optional_system_instruction() {
        let config = ProviderConfig::new(Provider::Gemini, "g-key")
            .model("gemini-pro")
            .system_prompt("short answers");
        let req = build_request(&config, "hi \"there\"");
        assert_eq!(
            req.url,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:streamGenerateContent?key=g-key"
        );
        assert_eq!(req.headers, vec![("Content-Type".to_string(), "application/json".to_string())]);

        let body: Value = serde_json::from_str(&req.body).expect("json body");
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "short answers");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi \"there\"");
        assert_eq!(body["generationConfig"]["responseMimeType"], "text/plain");

        let bare = build_request(&ProviderConfig::new(Provider::Gemini, "k"), "q");
        let body: Value = serde_json::from_str(&bare.body).expect("json body");
        assert!(body.get("system_instruction").is_none());
    }

    #[test]
    fn array_body_is_concatenated_into_one_delta() {
        let body = format!("[{},\n{}]", candidate("Creepers "), candidate("explode."));
        assert_eq!(
            run(&body),
            vec![Delta::text("Creepers explode."), Delta::end()]
        );
    }

    #[test]
    fn newline_delimited_objects_are_accepted() {
        let body = format!("{}\n\n{}\n", candidate("a"), candidate("b"));
        assert_eq!(run(&body), vec![Delta::text("ab"), Delta::end()]);
    }

    #[test]
    fn empty_body_yields_placeholder() {
        let mut parser = GeminiParser::new(false);
        assert_eq!(
            parser.finish(),
            vec![Delta::text(EMPTY_RESPONSE_PLACEHOLDER), Delta::end()]
        );
        assert!(parser.finish().is_empty());
    }

    #[test]
    fn whitespace_only_text_yields_placeholder() {
        let body = format!("[{}, {}]", candidate("\n"), candidate("  "));
        assert_eq!(
            run(&body),
            vec![Delta::text(EMPTY_RESPONSE_PLACEHOLDER), Delta::end()]
        );
    }

    #[test]
    fn non_object_elements_and_missing_parts_are_skipped() {
        let body = format!(
            "[1, \"x\", {{\"candidates\": []}}, {}, {{\"usageMetadata\": {{}}}}]",
            candidate("only")
        );
        assert_eq!(collect_text(&body), "only");
    }

    #[test]
    fn broken_array_falls_back_to_line_scan() {
        let body = format!("[{},\n{},\n", candidate("one "), candidate("two"));
        assert_eq!(collect_text(&body), "one two");
    }

    #[test]
    fn input_after_finish_is_ignored() {
        let mut parser = GeminiParser::new(true);
        parser.consume(candidate("done").as_bytes());
        assert_eq!(parser.finish(), vec![Delta::text("done"), Delta::end()]);
        assert!(parser.consume(candidate("late").as_bytes()).is_empty());
        assert!(parser.finish().is_empty());
    }
}
