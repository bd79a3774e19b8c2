//! Gateway configuration: provider order, per-provider transport settings and prompts.
//!
//! Loaded from the TOML file named by GATEWAY_CONFIG_PATH; any missing section falls back
//! to the defaults below. Per-provider env overrides: `<ID>_BASE_URL`, `<ID>_MODEL`.
//!
//! Example:
//! ```toml
//! call_timeout_secs = 45
//!
//! [[providers]]
//! id = "openai"
//! base_url = "https://api.openai.com/v1"
//! model = "gpt-4o"
//! api_key_env = "OPENAI_API_KEY"
//! score_scale = "one_to_ten"
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::ScoreScale;

#[derive(Clone, Debug, Deserialize)]
pub struct GatewayConfig {
  /// Per-adapter deadline in seconds; 0 disables it.
  #[serde(default = "default_call_timeout_secs")]
  pub call_timeout_secs: u64,
  /// Providers in priority order.
  #[serde(default = "default_providers")]
  pub providers: Vec<ProviderProfile>,
  #[serde(default)]
  pub prompts: Prompts,
}

impl Default for GatewayConfig {
  fn default() -> Self {
    Self {
      call_timeout_secs: default_call_timeout_secs(),
      providers: default_providers(),
      prompts: Prompts::default(),
    }
  }
}

impl GatewayConfig {
  pub fn call_timeout(&self) -> Option<Duration> {
    if self.call_timeout_secs == 0 { None } else { Some(Duration::from_secs(self.call_timeout_secs)) }
  }
}

fn default_call_timeout_secs() -> u64 { 60 }

/// One OpenAI-compatible chat-completions backend.
#[derive(Clone, Debug, Deserialize)]
pub struct ProviderProfile {
  pub id: String,
  pub base_url: String,
  pub model: String,
  /// Name of the env variable holding the API key. Read at call time.
  pub api_key_env: String,
  #[serde(default = "default_temperature")]
  pub temperature: f32,
  /// Ask the backend for `response_format: json_object`.
  #[serde(default = "default_true")]
  pub json_mode: bool,
  #[serde(default)]
  pub score_scale: ScoreScale,
  #[serde(default = "default_true")]
  pub enabled: bool,
}

fn default_temperature() -> f32 { 0.7 }
fn default_true() -> bool { true }

pub fn default_providers() -> Vec<ProviderProfile> {
  vec![
    ProviderProfile {
      id: "mistral".into(),
      base_url: "https://api.mistral.ai/v1".into(),
      model: "mistral-large-latest".into(),
      api_key_env: "MISTRAL_API_KEY".into(),
      temperature: 0.7,
      json_mode: true,
      score_scale: ScoreScale::OneToTen,
      enabled: true,
    },
    ProviderProfile {
      id: "openai".into(),
      base_url: "https://api.openai.com/v1".into(),
      model: "gpt-4o".into(),
      api_key_env: "OPENAI_API_KEY".into(),
      temperature: 0.7,
      json_mode: true,
      score_scale: ScoreScale::OneToTen,
      enabled: true,
    },
    ProviderProfile {
      id: "deepseek".into(),
      base_url: "https://api.deepseek.com/v1".into(),
      model: "deepseek-chat".into(),
      api_key_env: "DEEPSEEK_API_KEY".into(),
      temperature: 0.7,
      json_mode: false,
      score_scale: ScoreScale::Percent,
      enabled: true,
    },
  ]
}

/// Prompts sent to every provider. Placeholders are filled with `util::fill_template`.
///
/// Question generation: `{count} {specialty} {difficulty} {target_year} {topics_line} {focus}`.
/// Evaluation: `{question} {scenario} {answer} {model_answer} {score_guidance} {score_placeholder}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub question_system: String,
  pub question_user_template: String,
  pub evaluation_system: String,
  pub evaluation_user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      question_system: "You are an experienced medical educator creating high-quality short answer questions for UK medical students that align with the UKMLA framework. Respond ONLY with a single strict JSON object.".into(),
      question_user_template: DEFAULT_QUESTION_TEMPLATE.into(),
      evaluation_system: "You are an experienced medical educator assessing a medical student's short answer against the UKMLA curriculum. Respond ONLY with a single strict JSON object.".into(),
      evaluation_user_template: DEFAULT_EVALUATION_TEMPLATE.into(),
    }
  }
}

const DEFAULT_QUESTION_TEMPLATE: &str = r#"Generate {count} clinical case scenarios for UK medical students based on the UKMLA curriculum.

## Question Parameters
- Specialty: {specialty}
- Difficulty Level: {difficulty}
- Target Year Level: {target_year}
{topics_line}

## Question Structure
For each question:
1. Write a realistic clinical vignette (130-180 words) with demographics, presenting complaint and timeline, key history, examination findings and relevant results with reference ranges.
2. Ask 1-3 specific questions that test clinical reasoning, suit the {difficulty} level and show mark allocation.
3. For the {difficulty} level, focus on {focus}.

## Answer Requirements
For each question provide a concise model answer that would receive full marks, 2-3 strengths to look for, 2-3 common areas for improvement, 2-3 learning points and 2-3 related resources with real URLs (NICE, NHS, BMJ Best Practice).

## Output Format
Return a JSON object with this structure:
{
  "questions": [
    {
      "specialty": "{specialty}",
      "difficulty": "{difficulty}",
      "scenario": "The clinical case scenario text...",
      "question": "The specific question text with mark allocation...",
      "modelAnswer": "The concise, accurate model answer...",
      "strengths": ["Strength 1", "Strength 2"],
      "areasForImprovement": ["Area 1", "Area 2"],
      "learningPoints": ["Learning point 1", "Learning point 2"],
      "relatedResources": [
        { "title": "NICE Guidelines - [Topic]", "url": "https://www.nice.org.uk/guidance/[id]" }
      ]
    }
  ]
}

Ensure all questions are clinically accurate and reflect current UK practice."#;

const DEFAULT_EVALUATION_TEMPLATE: &str = r#"## Question Information
Question: {question}
Clinical Scenario: {scenario}
Student's Answer: {answer}
Model Answer: {model_answer}

## Assessment Guidelines
Compare the student's answer with the model answer. Consider clinical reasoning, missing critical elements, valid points beyond the model answer, and anything outdated, unsafe or incorrect.

## Score Guidance
{score_guidance} based on:
- Clinical accuracy and relevance (50%)
- Completeness of key points (25%)
- Application of clinical reasoning (25%)

## Return Format
Return a JSON object with this structure:
{
  "score": {score_placeholder},
  "modelAnswer": "Concise model answer with key points highlighted (HTML allowed)",
  "strengths": ["Specific strength", "Another specific strength"],
  "areasForImprovement": ["Specific, actionable area", "Another area"],
  "learningPoints": ["Focused learning point", "Another learning point"],
  "relatedResources": [
    { "title": "NICE Guidelines - [Topic]", "url": "https://www.nice.org.uk/guidance/[id]" }
  ]
}

Each feedback point should be one or two sentences."#;

/// Parse a TOML document into a config, then apply env overrides.
pub fn parse_gateway_config(src: &str) -> Result<GatewayConfig, toml::de::Error> {
  let mut cfg = toml::from_str::<GatewayConfig>(src)?;
  apply_env_overrides(&mut cfg);
  Ok(cfg)
}

/// Load from GATEWAY_CONFIG_PATH. On any IO/parse error, log and use defaults.
pub fn load_gateway_config_from_env() -> GatewayConfig {
  let Ok(path) = std::env::var("GATEWAY_CONFIG_PATH") else {
    let mut cfg = GatewayConfig::default();
    apply_env_overrides(&mut cfg);
    return cfg;
  };
  let loaded = match std::fs::read_to_string(&path) {
    Ok(s) => match parse_gateway_config(&s) {
      Ok(cfg) => {
        info!(target: "medeval_backend", %path, providers = cfg.providers.len(), "Loaded gateway config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "medeval_backend", %path, error = %e, "Failed to parse TOML config; using defaults");
        None
      }
    },
    Err(e) => {
      error!(target: "medeval_backend", %path, error = %e, "Failed to read TOML config file; using defaults");
      None
    }
  };
  loaded.unwrap_or_else(|| {
    let mut cfg = GatewayConfig::default();
    apply_env_overrides(&mut cfg);
    cfg
  })
}

fn apply_env_overrides(cfg: &mut GatewayConfig) {
  for p in &mut cfg.providers {
    let prefix = p.id.to_ascii_uppercase().replace('-', "_");
    if let Ok(url) = std::env::var(format!("{prefix}_BASE_URL")) {
      p.base_url = url;
    }
    if let Ok(model) = std::env::var(format!("{prefix}_MODEL")) {
      p.model = model;
    }
  }
}

/// Read an API key from the environment. Empty values count as absent.
pub fn resolve_api_key(env_name: &str) -> Option<String> {
  let raw = std::env::var(env_name).ok()?;
  let key = unwrap_stored_token(raw.trim());
  if key.is_empty() { None } else { Some(key) }
}

/// Tokens copied out of a browser's localStorage look like `{"value":"...","__version":"0"}`.
pub fn unwrap_stored_token(raw: &str) -> String {
  #[derive(Deserialize)]
  struct Stored { value: String }
  match serde_json::from_str::<Stored>(raw) {
    Ok(s) => s.value.trim().to_string(),
    Err(_) => raw.to_string(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_follow_priority_order() {
    let cfg = GatewayConfig::default();
    let ids: Vec<_> = cfg.providers.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["mistral", "openai", "deepseek"]);
    assert_eq!(cfg.call_timeout(), Some(Duration::from_secs(60)));
    assert_eq!(cfg.providers[2].score_scale, ScoreScale::Percent);
  }

  #[test]
  fn partial_toml_keeps_default_prompts() {
    let src = r#"
call_timeout_secs = 0

[[providers]]
id = "local-llm"
base_url = "http://localhost:8080/v1"
model = "llama3"
api_key_env = "LOCAL_LLM_KEY"
score_scale = "percent"

[prompts]
question_system = "Be terse."
"#;
    let cfg = parse_gateway_config(src).unwrap();
    assert_eq!(cfg.call_timeout(), None);
    assert_eq!(cfg.providers.len(), 1);
    let p = &cfg.providers[0];
    assert_eq!(p.score_scale, ScoreScale::Percent);
    assert!(p.json_mode && p.enabled);
    assert_eq!(p.temperature, 0.7);
    assert_eq!(cfg.prompts.question_system, "Be terse.");
    assert_eq!(cfg.prompts.evaluation_user_template, Prompts::default().evaluation_user_template);
  }

  #[test]
  fn stored_token_is_unwrapped() {
    assert_eq!(unwrap_stored_token(r#"{"value":"abc123","__version":"0"}"#), "abc123");
    assert_eq!(unwrap_stored_token("plain-key"), "plain-key");
  }

  #[test]
  fn missing_key_env_is_none() {
    assert_eq!(resolve_api_key("MEDEVAL_TEST_KEY_THAT_IS_NEVER_SET"), None);
  }
}
