//! Chat backends that answer a [`Conversation`].
//!
//! Async methods are not dyn-compatible, so [`LlmBackend`] dispatches by enum
//! over the two wire formats we speak. Both share one endpoint and one
//! send path; they differ only in where the system prompt goes, how
//! the key is presented, and where the reply text sits in the response.

use serde_json::{Value, json};

use crate::config::{BackendType, LlmBackendConfig};
use crate::error::RunnerError;

/// Upper bound on reply length.
const MAX_TOKENS: u32 = 1024;

/// Anthropic API revision sent with every request.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Who spoke a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The simulation, asking for a decision.
    User,
    /// The model, answering.
    Assistant,
}

impl Role {
    /// Wire name shared by both APIs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Speaker.
    pub role: Role,
    /// Text.
    pub content: String,
}

/// A system prompt followed by alternating turns, ending with a user turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Persona and response contract.
    pub system: String,
    /// Turns, oldest first.
    pub messages: Vec<ChatMessage>,
}

impl Conversation {
    fn turns(&self) -> impl Iterator<Item = Value> + '_ {
        self.messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": m.content}))
    }
}

/// Where and as whom requests are sent.
#[derive(Debug, Clone)]
struct Endpoint {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl Endpoint {
    fn new(config: &LlmBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Send `request` and return the JSON body of a successful response.
    async fn send(
        &self,
        provider: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, RunnerError> {
        let response = request
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| RunnerError::LlmBackend(format!("{provider} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .text()
                .await
                .unwrap_or_else(|e| format!("unable to read error body: {e}"));
            return Err(RunnerError::LlmBackend(format!(
                "{provider} returned {status}: {detail}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RunnerError::LlmBackend(format!("{provider} response was not JSON: {e}")))
    }
}

/// Pull the string at `pointer` out of a response body.
fn reply_text(provider: &str, body: &Value, pointer: &str) -> Result<String, RunnerError> {
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            RunnerError::LlmBackend(format!("{provider} response has no text at {pointer}"))
        })
}

/// A chat backend.
pub enum LlmBackend {
    /// `OpenAI`-compatible chat completions (`OpenAI`, `DeepSeek`, Ollama).
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Send `conversation` and return the reply text.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::LlmBackend`] if the call fails or the reply
    /// text cannot be found.
    pub async fn complete(&self, conversation: &Conversation) -> Result<String, RunnerError> {
        match self {
            Self::OpenAi(backend) => backend.complete(conversation).await,
            Self::Anthropic(backend) => backend.complete(conversation).await,
        }
    }

    /// Backend name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::OpenAi(_) => OpenAiBackend::NAME,
            Self::Anthropic(_) => AnthropicBackend::NAME,
        }
    }
}

/// `POST {api_url}/chat/completions` with bearer auth. The system prompt is
/// the first message and the reply is `choices[0].message.content`.
pub struct OpenAiBackend {
    endpoint: Endpoint,
}

impl OpenAiBackend {
    const NAME: &'static str = "openai-compatible";
    const REPLY: &'static str = "/choices/0/message/content";

    fn body(&self, conversation: &Conversation) -> Value {
        let system = json!({"role": "system", "content": conversation.system});
        let messages: Vec<Value> = std::iter::once(system).chain(conversation.turns()).collect();
        json!({
            "model": self.endpoint.model,
            "messages": messages,
            "max_tokens": MAX_TOKENS,
            "response_format": {"type": "json_object"},
        })
    }

    async fn complete(&self, conversation: &Conversation) -> Result<String, RunnerError> {
        let request = self
            .endpoint
            .client
            .post(self.endpoint.url("chat/completions"))
            .bearer_auth(&self.endpoint.api_key)
            .json(&self.body(conversation));
        let body = self.endpoint.send(Self::NAME, request).await?;
        reply_text(Self::NAME, &body, Self::REPLY)
    }
}

/// `POST {api_url}/messages` with `x-api-key`. The system prompt is a
/// top-level field and the reply is `content[0].text`.
pub struct AnthropicBackend {
    endpoint: Endpoint,
}

impl AnthropicBackend {
    const NAME: &'static str = "anthropic";
    const REPLY: &'static str = "/content/0/text";

    fn body(&self, conversation: &Conversation) -> Value {
        let messages: Vec<Value> = conversation.turns().collect();
        json!({
            "model": self.endpoint.model,
            "max_tokens": MAX_TOKENS,
            "system": conversation.system,
            "messages": messages,
        })
    }

    async fn complete(&self, conversation: &Conversation) -> Result<String, RunnerError> {
        let request = self
            .endpoint
            .client
            .post(self.endpoint.url("messages"))
            .header("x-api-key", &self.endpoint.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.body(conversation));
        let body = self.endpoint.send(Self::NAME, request).await?;
        reply_text(Self::NAME, &body, Self::REPLY)
    }
}

/// Build the backend named by `config`.
pub fn create_backend(config: &LlmBackendConfig) -> LlmBackend {
    let endpoint = Endpoint::new(config);
    match config.backend_type {
        BackendType::OpenAi => LlmBackend::OpenAi(OpenAiBackend { endpoint }),
        BackendType::Anthropic => LlmBackend::Anthropic(AnthropicBackend { endpoint }),
    }
}
