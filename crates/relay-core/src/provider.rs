use std::fmt;
use std::str::FromStr;

use crate::errors::RelayError;

/// The fixed set of vendors a query can be routed to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Anthropic Messages API (token-event stream).
    Anthropic,
    /// OpenAI Chat Completions API (choice-delta stream).
    #[serde(rename = "openai")]
    OpenAi,
    /// Google Gemini `streamGenerateContent`, read as one batch body.
    Gemini,
}

impl Provider {
    /// All supported providers, in menu order.
    pub const ALL: [Provider; 3] = [Provider::Anthropic, Provider::OpenAi, Provider::Gemini];

    /// Stable lowercase id (`anthropic`, `openai`, `gemini`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    /// Vendor name used in configuration messages.
    pub fn vendor_name(self) -> &'static str {
        match self {
            Self::Anthropic => "Anthropic",
            Self::OpenAi => "OpenAI",
            Self::Gemini => "Gemini",
        }
    }

    /// Name shown to the user when a query fails.
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Anthropic => "Claude",
            Self::OpenAi => "OpenAI",
            Self::Gemini => "Gemini",
        }
    }

    /// Whether the vendor response is consumed incrementally.
    pub fn is_streaming(self) -> bool {
        !matches!(self, Self::Gemini)
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Self::Anthropic => "claude-3-haiku-20240307",
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-2.0-flash",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Anthropic => "https://api.anthropic.com",
            Self::OpenAi => "https://api.openai.com",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    /// Environment variable holding the API key.
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Environment variable holding an optional model override.
    pub fn model_env(self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_MODEL",
            Self::OpenAi => "OPENAI_MODEL",
            Self::Gemini => "GEMINI_MODEL",
        }
    }

    /// Value written into fresh settings files in place of a real key.
    pub fn key_placeholder(self) -> &'static str {
        match self {
            Self::Anthropic => "your_anthropic_key_here",
            Self::OpenAi => "your_openai_key_here",
            Self::Gemini => "your_gemini_key_here",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = RelayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(RelayError::Config(format!(
                "unknown provider `{other}` (expected anthropic, openai or gemini)"
            ))),
        }
    }
}
