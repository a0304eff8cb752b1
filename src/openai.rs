use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;

use crate::provider::{Answerer, Embedder, Embedding};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Deterministic, least-creative sampling for answer synthesis
const ANSWER_TEMPERATURE: f32 = 0.0;

/// Configuration for the OpenAI API
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub api_base: String,
    pub embedding_model: String,
    pub chat_model: String,
}

impl OpenAiConfig {
    /// Create a configuration bound to a credential, with endpoint and
    /// model names optionally overridden from the environment.
    pub fn new(api_key: impl Into<String>) -> Self {
        OpenAiConfig {
            api_key: api_key.into(),
            api_base: env::var("OPENAI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            embedding_model: env::var("DOCQUERY_EMBEDDING_MODEL")
                .unwrap_or_else(|_| DEFAULT_EMBEDDING_MODEL.to_string()),
            chat_model: env::var("DOCQUERY_CHAT_MODEL")
                .unwrap_or_else(|_| DEFAULT_CHAT_MODEL.to_string()),
        }
    }

    /// Create a configuration taking the credential from `OPENAI_API_KEY`
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")?;
        Ok(Self::new(api_key))
    }
}

/// Client for the OpenAI embeddings and chat-completions endpoints
#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new OpenAI client
    pub fn new(config: OpenAiConfig) -> Self {
        let client = reqwest::Client::new();
        OpenAiClient { config, client }
    }

    async fn post_json<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        request: &T,
    ) -> Result<R> {
        let url = format!("{}/{}", self.config.api_base.trim_end_matches('/'), path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "API request failed: {} {}",
                status,
                api_error_message(&error_text)
            ));
        }

        Ok(response.json().await?)
    }

    /// Generate embeddings for a batch of texts
    pub async fn get_embeddings(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: texts,
        };

        let mut response_data: EmbeddingResponse = self.post_json("embeddings", &request).await?;

        // The API may return entries out of order; index is authoritative
        response_data.data.sort_by_key(|d| d.index);

        if response_data.data.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Embedding response size mismatch: sent {}, received {}",
                texts.len(),
                response_data.data.len()
            ));
        }

        Ok(response_data
            .data
            .into_iter()
            .map(|d| Embedding { values: d.embedding })
            .collect())
    }

    /// Generate an answer conditioned only on the supplied context chunks
    pub async fn generate_answer(&self, context: &str, question: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.config.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "Answer the question using only the provided context.".to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Context:\n{}\n\nQuestion: {}", context, question),
                },
            ],
            temperature: ANSWER_TEMPERATURE,
        };

        let response_data: ChatResponse = self.post_json("chat/completions", &request).await?;

        response_data
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("No response generated"))
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let embeddings = self.get_embeddings(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.get_embeddings(texts).await
    }
}

#[async_trait]
impl Answerer for OpenAiClient {
    async fn answer(&self, context_chunks: &[String], question: &str) -> Result<String> {
        // "Stuff" aggregation: every retrieved chunk goes into one call
        let context = context_chunks.join("\n\n");
        self.generate_answer(&context, question).await
    }
}

/// Pull the human-readable message out of an API error body, falling
/// back to the raw body when it is not the documented JSON shape.
fn api_error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: ErrorDetail,
    }

    #[derive(Deserialize)]
    struct ErrorDetail {
        message: String,
    }

    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| body.to_string())
}

// Wire structures for the OpenAI API

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChatChoiceMessage {
    content: String,
}
