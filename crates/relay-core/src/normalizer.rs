use crate::config::ProviderConfig;
use crate::delta::Delta;
use crate::provider::Provider;
use crate::vendors::{AnthropicParser, DeltaParser, GeminiParser, OpenAiParser};

/// The parser for one query, chosen once from its provider.
#[derive(Debug)]
pub enum Normalizer {
    Anthropic(AnthropicParser),
    OpenAi(OpenAiParser),
    Gemini(GeminiParser),
}

impl Normalizer {
    pub fn new(provider: Provider, debug: bool) -> Self {
        match provider {
            Provider::Anthropic => Self::Anthropic(AnthropicParser::new(debug)),
            Provider::OpenAi => Self::OpenAi(OpenAiParser::new(debug)),
            Provider::Gemini => Self::Gemini(GeminiParser::new(debug)),
        }
    }

    pub fn for_config(config: &ProviderConfig) -> Self {
        Self::new(config.provider, config.debug)
    }

    pub fn provider(&self) -> Provider {
        match self {
            Self::Anthropic(_) => Provider::Anthropic,
            Self::OpenAi(_) => Provider::OpenAi,
            Self::Gemini(_) => Provider::Gemini,
        }
    }

    fn parser(&mut self) -> &mut dyn DeltaParser {
        match self {
            Self::Anthropic(parser) => parser,
            Self::OpenAi(parser) => parser,
            Self::Gemini(parser) => parser,
        }
    }
}

impl DeltaParser for Normalizer {
    fn consume(&mut self, input: &[u8]) -> Vec<Delta> {
        self.parser().consume(input)
    }

    fn finish(&mut self) -> Vec<Delta> {
        self.parser().finish()
    }
}
