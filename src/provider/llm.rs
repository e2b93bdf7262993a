//! Language-model transport (§6.4, §4.6). A single `complete` abstraction;
//! provider selection is by a `provider:name` tag (e.g. `ollama:llama3`,
//! `anthropic:claude-3-5-sonnet`), matching §6.1's `--model PROVIDER:NAME` flag.

use crate::error::{AppError, AppResult};
use std::time::Duration;

#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        model: &str,
        json_mode: bool,
    ) -> AppResult<String>;
}

/// Splits a `provider:name` tag, defaulting to `ollama` when no provider prefix is present.
pub fn split_provider_tag(tag: &str) -> (&str, &str) {
    match tag.split_once(':') {
        Some((provider, name)) => (provider, name),
        None => ("ollama", tag),
    }
}

/// Thin HTTP-backed client covering the three configured providers
/// (`ollama`, `openai`, `anthropic`). Connection/timeout/5xx failures are
/// surfaced as `AppError::Transport` for the caller's retry-with-backoff
/// wrapper (`util::backoff`) to handle (§5, §7).
pub struct HttpLlmClient {
    client: reqwest::Client,
    ollama_base_url: String,
    ollama_api_key: Option<String>,
    openai_api_key: Option<String>,
    anthropic_api_key: Option<String>,
    timeout: Duration,
}

impl HttpLlmClient {
    pub fn new(
        ollama_base_url: String,
        ollama_api_key: Option<String>,
        openai_api_key: Option<String>,
        anthropic_api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            ollama_base_url,
            ollama_api_key,
            openai_api_key,
            anthropic_api_key,
            timeout,
        }
    }

    async fn complete_ollama(&self, system: &str, user: &str, model: &str) -> AppResult<String> {
        let mut req = self
            .client
            .post(format!("{}/api/generate", self.ollama_base_url.trim_end_matches('/')))
            .timeout(self.timeout)
            .json(&serde_json::json!({
                "model": model,
                "system": system,
                "prompt": user,
                "stream": false,
            }));
        if let Some(key) = &self.ollama_api_key {
            req = req.bearer_auth(key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| AppError::transport(format!("ollama request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::transport(format!("ollama returned {}", resp.status())));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AppError::transport(format!("ollama response parse failed: {e}")))?;
        Ok(body["response"].as_str().unwrap_or_default().to_string())
    }

    async fn complete_openai(&self, system: &str, user: &str, model: &str) -> AppResult<String> {
        let key = self
            .openai_api_key
            .as_ref()
            .ok_or_else(|| AppError::config("OPENAI_API_KEY not set"))?;
        let resp = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .timeout(self.timeout)
            .bearer_auth(key)
            .json(&serde_json::json!({
                "model": model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": user},
                ],
            }))
            .send()
            .await
            .map_err(|e| AppError::transport(format!("openai request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::transport(format!("openai returned {}", resp.status())));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AppError::transport(format!("openai response parse failed: {e}")))?;
        Ok(body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn complete_anthropic(&self, system: &str, user: &str, model: &str) -> AppResult<String> {
        let key = self
            .anthropic_api_key
            .as_ref()
            .ok_or_else(|| AppError::config("ANTHROPIC_API_KEY not set"))?;
        let resp = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .timeout(self.timeout)
            .header("x-api-key", key)
            .header("anthropic-version", "2023-06-01")
            .json(&serde_json::json!({
                "model": model,
                "system": system,
                "max_tokens": 2048,
                "messages": [{"role": "user", "content": user}],
            }))
            .send()
            .await
            .map_err(|e| AppError::transport(format!("anthropic request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(AppError::transport(format!("anthropic returned {}", resp.status())));
        }
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| AppError::transport(format!("anthropic response parse failed: {e}")))?;
        Ok(body["content"][0]["text"].as_str().unwrap_or_default().to_string())
    }
}

#[async_trait::async_trait]
impl LlmProvider for HttpLlmClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        model: &str,
        _json_mode: bool,
    ) -> AppResult<String> {
        let (provider, name) = split_provider_tag(model);
        crate::util::backoff::retry_with_backoff(self.timeout, || async {
            match provider {
                "openai" => self.complete_openai(system, user, name).await,
                "anthropic" => self.complete_anthropic(system, user, name).await,
                _ => self.complete_ollama(system, user, name).await,
            }
        })
        .await
    }
}

/// Deterministic fixture used by tests and the default `--crew`-less local
/// run when no real model endpoint is reachable: classifies by keyword
/// rather than an actual model, but implements the same contract.
pub struct FixtureLlmProvider;

#[async_trait::async_trait]
impl LlmProvider for FixtureLlmProvider {
    async fn complete(
        &self,
        _system: &str,
        user: &str,
        _model: &str,
        _json_mode: bool,
    ) -> AppResult<String> {
        let lower = user.to_lowercase();
        let industry = if lower.contains("saas") || lower.contains("software") {
            "Software"
        } else if lower.contains("market") {
            "Marketing"
        } else {
            "Other"
        };
        Ok(serde_json::json!({
            "industry": industry,
            "company_size_estimate": "small",
            "marketing_sophistication": 5,
            "sender_intent": "promotional",
            "product_type": "unknown",
            "product_description": "",
            "pain_points": [],
            "target_audience": "",
            "partner_program_detected": lower.contains("partner"),
            "renewal_signal_detected": lower.contains("renew"),
            "ai_confidence": 0.5,
        })
        .to_string())
    }
}
