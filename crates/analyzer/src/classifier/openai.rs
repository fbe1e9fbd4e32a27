use super::config::ClassifierConfig;
use super::prompts;
use super::schemas::{CandidateRecord, ClassificationRequest};
use super::{ClassifierError, ExternalClassifier};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
        ChatCompletionResponseFormat, ChatCompletionResponseFormatType,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::debug;

const DEFAULT_MODEL: &str = "gpt-4o";

/// Chat-completion backed classifier. Credentials and endpoint come from
/// [`ClassifierConfig`] only.
pub struct OpenAiClassifier {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClassifier {
    pub fn from_config(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let api_key = config.api_key.clone().ok_or(ClassifierError::NotConfigured)?;
        let mut openai = OpenAIConfig::new().with_api_key(api_key);
        if let Some(endpoint) = &config.endpoint {
            openai = openai.with_api_base(endpoint.clone());
        }

        Ok(Self {
            client: Client::with_config(openai),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: 0.1,
            max_tokens: 2000,
        })
    }

    async fn complete(&self, user_prompt: String) -> Result<String, ClassifierError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: prompts::SYSTEM_PROMPT.to_string(),
                ..Default::default()
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(user_prompt),
                ..Default::default()
            }),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_tokens(self.max_tokens)
            .response_format(ChatCompletionResponseFormat {
                r#type: ChatCompletionResponseFormatType::JsonObject,
            })
            .build()
            .map_err(|e| ClassifierError::Api(e.to_string()))?;

        debug!("Sending classification request to {}", self.model);
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ClassifierError::Unreachable(e.to_string()))?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ClassifierError::Malformed("No content in response".to_string()))
    }
}

#[async_trait]
impl ExternalClassifier for OpenAiClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    async fn classify(&self, request: &ClassificationRequest) -> Result<String, ClassifierError> {
        self.complete(prompts::single_prompt(request)).await
    }

    async fn classify_batch(&self, candidates: &[CandidateRecord]) -> Result<String, ClassifierError> {
        self.complete(prompts::batch_prompt(candidates)).await
    }
}
