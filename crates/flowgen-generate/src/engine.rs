use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;

use flowgen_core::{ai_configured, AiSettings};

use crate::GenerateError;

/// Prompt in, raw text out. The only network-facing seam of the pipeline.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

fn map_backend(provider: &str) -> Result<LLMBackend, GenerateError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(GenerateError::UnknownProvider(other.to_string())),
    }
}

/// [`TextGenerator`] backed by the `llm` crate, configured from [`AiSettings`].
#[derive(Debug, Clone)]
pub struct LlmEngine {
    settings: AiSettings,
}

impl LlmEngine {
    pub fn new(settings: AiSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl TextGenerator for LlmEngine {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let settings = &self.settings;
        if !ai_configured(settings) {
            return Err(GenerateError::NotConfigured);
        }
        let backend = map_backend(&settings.provider)?;

        log::debug!(provider = settings.provider.as_str(), model = settings.model.as_str(); "Sending prompt");

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&settings.model)
            .temperature(settings.temperature)
            .max_tokens(settings.max_tokens);

        if !settings.api_key.is_empty() {
            builder = builder.api_key(&settings.api_key);
        }

        let llm = builder
            .build()
            .map_err(|e| GenerateError::Build(e.to_string()))?;

        let messages = vec![ChatMessage::user().content(prompt).build()];

        let response = llm
            .chat(&messages)
            .await
            .map_err(|e| GenerateError::Chat(e.to_string()))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(GenerateError::EmptyResponse),
        }
    }
}
