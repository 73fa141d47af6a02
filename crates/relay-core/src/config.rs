use std::time::Duration;

use crate::errors::RelayError;
use crate::provider::Provider;

/// Immutable per-query view of one vendor's settings.
///
/// A query clones this at submission time, so later edits to the caller's
/// settings never affect a request that is already in flight.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderConfig {
    pub provider: Provider,
    /// API key; sent as a header or a URL parameter depending on the vendor.
    pub api_key: String,
    /// Vendor model id, passed through unchanged.
    pub model: String,
    /// Optional system prompt, passed through unchanged.
    pub system_prompt: Option<String>,
    /// Logs request bodies and raw response lines when set.
    pub debug: bool,
    /// Base URL of the vendor API.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// Per-request timeout overriding the transport default.
    pub timeout: Option<Duration>,
}

impl ProviderConfig {
    /// Creates a config with the vendor's default model and endpoint.
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            model: provider.default_model().to_string(),
            system_prompt: None,
            debug: false,
            base_url: provider.default_base_url().to_string(),
            timeout: None,
        }
    }

    /// Builds a config from the vendor's API key variable (for example
    /// `OPENAI_API_KEY`) and optional model variable (`OPENAI_MODEL`).
    pub fn from_env(provider: Provider) -> Result<Self, RelayError> {
        let api_key = std::env::var(provider.api_key_env()).unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(RelayError::Config(format!(
                "missing {} for {} provider",
                provider.api_key_env(),
                provider.vendor_name()
            )));
        }
        let mut config = Self::new(provider, api_key);
        if let Ok(model) = std::env::var(provider.model_env())
            && !model.trim().is_empty()
        {
            config.model = model;
        }
        Ok(config)
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the system prompt; blank prompts are treated as absent.
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Overrides the API base URL (for proxies or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// False for blank keys and for the placeholder written into new settings files.
    pub fn has_valid_api_key(&self) -> bool {
        let key = self.api_key.trim();
        !key.is_empty() && key != self.provider.key_placeholder()
    }

    /// Full request URL for this vendor.
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.provider {
            Provider::Anthropic => format!("{base}/v1/messages"),
            Provider::OpenAi => format!("{base}/v1/chat/completions"),
            Provider::Gemini => format!(
                "{base}/v1beta/models/{}:streamGenerateContent?key={}",
                self.model, self.api_key
            ),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), RelayError> {
        if !self.has_valid_api_key() {
            return Err(RelayError::Config(format!(
                "{} API key not set. Set {} or add it to the settings file",
                self.provider.vendor_name(),
                self.provider.api_key_env()
            )));
        }
        if self.model.trim().is_empty() {
            return Err(RelayError::Config("model must not be empty".into()));
        }
        if self.base_url.trim().is_empty() {
            return Err(RelayError::Config("base_url must not be empty".into()));
        }
        Ok(())
    }
}
