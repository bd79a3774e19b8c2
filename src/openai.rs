//! OpenAI-compatible chat.completions transport.
//!
//! Mistral, OpenAI and DeepSeek all speak this wire format; a `ProviderProfile` picks the
//! base URL, model, key variable and whether to ask for a strict JSON object.
//! Calls log model names, latencies and response sizes (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::config::{resolve_api_key, ProviderProfile};
use crate::error::ProviderError;
use crate::prompt::ChatPrompt;
use crate::provider::ChatTransport;
use crate::util::trunc_for_log;

#[derive(Clone)]
pub struct OpenAiCompatible {
  client: Option<reqwest::Client>,
  profile: ProviderProfile,
}

impl OpenAiCompatible {
  /// Never fails: a client that cannot be built is reported on the first call instead.
  pub fn new(profile: ProviderProfile) -> Self {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(120))
      .build()
      .map_err(|e| warn!(target: "gateway", provider = %profile.id, error = %e, "HTTP client build failed"))
      .ok();
    Self { client, profile }
  }

  fn request_body(&self, prompt: &ChatPrompt) -> ChatCompletionRequest {
    let mut messages = Vec::with_capacity(2);
    if !prompt.system.trim().is_empty() {
      messages.push(ChatMessageReq { role: "system".into(), content: prompt.system.clone() });
    }
    messages.push(ChatMessageReq { role: "user".into(), content: prompt.user.clone() });
    ChatCompletionRequest {
      model: self.profile.model.clone(),
      messages,
      temperature: self.profile.temperature,
      response_format: self
        .profile
        .json_mode
        .then(|| ResponseFormat { r#type: "json_object".into() }),
      max_tokens: None,
    }
  }
}

#[async_trait]
impl ChatTransport for OpenAiCompatible {
  #[instrument(level = "info", skip(self, prompt), fields(provider = %self.profile.id, model = %self.profile.model))]
  async fn complete(&self, prompt: &ChatPrompt) -> Result<String, ProviderError> {
    // Credentials are read per call so keys added after startup are picked up.
    let api_key = resolve_api_key(&self.profile.api_key_env)
      .ok_or_else(|| ProviderError::Configuration(format!("{} is not set", self.profile.api_key_env)))?;
    let client = self
      .client
      .as_ref()
      .ok_or_else(|| ProviderError::Configuration("HTTP client unavailable".into()))?;

    let url = format!("{}/chat/completions", self.profile.base_url.trim_end_matches('/'));
    let start = Instant::now();
    let res = client
      .post(&url)
      .header(USER_AGENT, "medeval-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", api_key))
      .json(&self.request_body(prompt))
      .send()
      .await
      .map_err(|e| ProviderError::Transport(e.to_string()))?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
      return Err(ProviderError::Http { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse =
      res.json().await.map_err(|e| ProviderError::Transport(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(
        target: "gateway",
        prompt_tokens = ?usage.prompt_tokens,
        completion_tokens = ?usage.completion_tokens,
        total_tokens = ?usage.total_tokens,
        elapsed = ?start.elapsed(),
        "Chat completion usage"
      );
    }

    let text = body
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .unwrap_or_default();
    if text.trim().is_empty() {
      return Err(ProviderError::EmptyResponse);
    }
    Ok(text)
  }
}

// ---- Wire DTOs ----

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_format: Option<ResponseFormat>,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat { #[serde(rename = "type")] r#type: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  #[serde(default)] choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI-style error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::default_providers;

  fn prompt() -> ChatPrompt {
    ChatPrompt { system: "sys".into(), user: "usr".into() }
  }

  #[test]
  fn request_body_follows_profile() {
    let mut profiles = default_providers();
    let deepseek = OpenAiCompatible::new(profiles.pop().unwrap());
    let v = serde_json::to_value(deepseek.request_body(&prompt())).unwrap();
    assert_eq!(v["model"], "deepseek-chat");
    assert!(v.get("response_format").is_none());
    assert_eq!(v["messages"][1]["content"], "usr");

    let openai = OpenAiCompatible::new(profiles.pop().unwrap());
    let v = serde_json::to_value(openai.request_body(&prompt())).unwrap();
    assert_eq!(v["response_format"]["type"], "json_object");
  }

  #[test]
  fn error_body_message_is_extracted() {
    let body = r#"{"error":{"message":"Invalid API key","type":"auth"}}"#;
    assert_eq!(extract_openai_error(body).as_deref(), Some("Invalid API key"));
    assert_eq!(extract_openai_error("<html>502</html>"), None);
  }

  #[tokio::test]
  async fn missing_key_fails_before_any_request() {
    let mut profile = default_providers().remove(0);
    profile.api_key_env = "MEDEVAL_TEST_KEY_THAT_IS_NEVER_SET".into();
    profile.base_url = "http://127.0.0.1:9".into();
    let err = OpenAiCompatible::new(profile).complete(&prompt()).await.unwrap_err();
    assert!(matches!(err, ProviderError::Configuration(m) if m.contains("MEDEVAL_TEST_KEY")));
  }
}
