//! Read-only loader for the JSON settings file (`llmcommand.json`).
//!
//! Every key is optional; missing keys take the defaults below. Writing the
//! file back is left to the host application.

use std::path::Path;

use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::errors::RelayError;
use crate::provider::Provider;

/// Default file name, relative to the host's config directory.
pub const SETTINGS_FILE_NAME: &str = "llmcommand.json";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful Minecraft assistant. Answer questions about Minecraft and provide helpful advice to players. Keep responses concise to fit in the Minecraft chat.";

/// Persisted user settings covering every vendor.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelayConfig {
    pub anthropic_api_key: String,
    pub openai_api_key: String,
    pub gemini_api_key: String,
    pub anthropic_model: String,
    pub openai_model: String,
    pub gemini_model: String,
    pub system_prompt: String,
    /// Provider name as typed by the user; see [`RelayConfig::provider`].
    pub current_provider: String,
    pub debug_mode: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            anthropic_api_key: String::new(),
            openai_api_key: String::new(),
            gemini_api_key: String::new(),
            anthropic_model: Provider::Anthropic.default_model().to_string(),
            openai_model: Provider::OpenAi.default_model().to_string(),
            gemini_model: Provider::Gemini.default_model().to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            current_provider: Provider::Anthropic.as_str().to_string(),
            debug_mode: false,
        }
    }
}

impl RelayConfig {
    /// Loads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, RelayError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "settings file not found, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(RelayError::Config(format!(
                    "failed to read settings file {}: {err}",
                    path.display()
                )));
            }
        };
        Self::from_json(&text).map_err(|err| match err {
            RelayError::Config(message) => {
                RelayError::Config(format!("{}: {message}", path.display()))
            }
            other => other,
        })
    }

    /// Parses settings from JSON text.
    pub fn from_json(text: &str) -> Result<Self, RelayError> {
        serde_json::from_str(text)
            .map_err(|e| RelayError::Config(format!("invalid settings JSON: {e}")))
    }

    /// The selected provider. Unrecognised names fall back to Anthropic.
    pub fn provider(&self) -> Provider {
        match self.current_provider.parse() {
            Ok(provider) => provider,
            Err(_) => {
                warn!(
                    current_provider = %self.current_provider,
                    "unknown provider in settings, falling back to anthropic"
                );
                Provider::Anthropic
            }
        }
    }

    /// Snapshot of the currently selected provider.
    pub fn snapshot(&self) -> ProviderConfig {
        self.snapshot_for(self.provider())
    }

    /// Snapshot of a specific provider's settings.
    pub fn snapshot_for(&self, provider: Provider) -> ProviderConfig {
        let (api_key, model) = match provider {
            Provider::Anthropic => (&self.anthropic_api_key, &self.anthropic_model),
            Provider::OpenAi => (&self.openai_api_key, &self.openai_model),
            Provider::Gemini => (&self.gemini_api_key, &self.gemini_model),
        };
        let mut config = ProviderConfig::new(provider, api_key.clone())
            .system_prompt(self.system_prompt.clone())
            .debug(self.debug_mode);
        if !model.trim().is_empty() {
            config = config.model(model.clone());
        }
        config
    }
}
