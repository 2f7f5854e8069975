//! Answer generation through an OpenAI-compatible chat-completions API.
//!
//! Works against Groq (the default), OpenAI, or any server that speaks the
//! same protocol. The prompt confines the model to the retrieved context and
//! tells it to reply with [`FALLBACK_MESSAGE`] when the answer is absent.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use docqa_core::{Generator, FALLBACK_MESSAGE};
use tracing::debug;

use crate::config::GenerationConfig;

pub fn system_prompt() -> String {
    format!(
        "You are a question-answering assistant.\n\
         Rules:\n\
         1. Use ONLY the provided context to answer.\n\
         2. If the answer is not present in the context, reply exactly: \"{}\"\n\
         3. Do not use outside knowledge and do not make anything up.",
        FALLBACK_MESSAGE
    )
}

pub fn user_prompt(question: &str, context: &str) -> String {
    format!(
        "Context:\n{}\n\nQuestion: {}\n\nGive a precise answer.",
        context, question
    )
}

pub struct ChatGenerator {
    client: reqwest::Client,
    model: String,
    temperature: f64,
    base_url: String,
    api_key_env: String,
}

impl ChatGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            base_url: config.resolved_base_url().to_string(),
            api_key_env: config.resolved_api_key_env().to_string(),
        })
    }
}

#[async_trait]
impl Generator for ChatGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, question: &str, context: &str) -> Result<String> {
        let api_key = std::env::var(&self.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", self.api_key_env))?;

        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "system", "content": system_prompt()},
                {"role": "user", "content": user_prompt(question, context)},
            ],
        });

        debug!(model = %self.model, url = %self.base_url, "requesting chat completion");
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("chat request to {} failed", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("chat API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_chat_response(&json)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    let content = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| anyhow!("Invalid chat response: missing choices[0].message.content"))?;
    Ok(content.trim().to_string())
}

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "groq" | "openai" => Ok(Arc::new(ChatGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
