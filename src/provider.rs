//! Provider adapters.
//!
//! A `ChatTransport` turns a prompt into raw model text. `LlmAdapter` wraps one transport and
//! implements both logical operations on top of it: build the prompt, call, normalize,
//! unwrap the expected layout, validate.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::config::Prompts;
use crate::domain::{AnswerEvaluation, GeneratedQuestion, QuestionRequest, ScoreScale};
use crate::error::ProviderError;
use crate::normalize::{extract_first_object, extract_object_list, normalize_with_strategy, Normalized};
use crate::prompt::{evaluation_prompt, question_prompt, ChatPrompt};
use crate::util::trunc_for_log;

/// Raw text completion against one backend.
#[async_trait]
pub trait ChatTransport: Send + Sync {
  /// Returns the model's reply text. Blank replies must be reported as `EmptyResponse`.
  async fn complete(&self, prompt: &ChatPrompt) -> Result<String, ProviderError>;
}

/// The two operations the gateway coordinates across backends.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
  fn id(&self) -> &str;

  async fn generate_questions(&self, req: &QuestionRequest) -> Result<Vec<GeneratedQuestion>, ProviderError>;

  async fn evaluate_answer(
    &self,
    question: &GeneratedQuestion,
    answer: &str,
  ) -> Result<AnswerEvaluation, ProviderError>;
}

pub struct LlmAdapter<T> {
  id: String,
  transport: T,
  prompts: Arc<Prompts>,
  scale: ScoreScale,
}

impl<T: ChatTransport> LlmAdapter<T> {
  pub fn new(id: impl Into<String>, transport: T, prompts: Arc<Prompts>, scale: ScoreScale) -> Self {
    Self { id: id.into(), transport, prompts, scale }
  }

  async fn call(&self, prompt: &ChatPrompt) -> Result<String, ProviderError> {
    let start = Instant::now();
    let raw = self.transport.complete(prompt).await?;
    debug!(
      target: "gateway",
      provider = %self.id,
      elapsed = ?start.elapsed(),
      prompt_len = prompt.total_len(),
      reply_len = raw.len(),
      "Backend replied"
    );
    if raw.trim().is_empty() {
      return Err(ProviderError::EmptyResponse);
    }
    Ok(raw)
  }

  fn normalize(&self, raw: &str) -> Normalized {
    let (n, strategy) = normalize_with_strategy(raw);
    match strategy {
      Some(s) => debug!(target: "gateway", provider = %self.id, strategy = ?s, "Reply normalized"),
      None => warn!(
        target: "gateway",
        provider = %self.id,
        preview = %trunc_for_log(raw, 120),
        "Reply has no recoverable structure"
      ),
    }
    n
  }
}

#[async_trait]
impl<T: ChatTransport> QuestionProvider for LlmAdapter<T> {
  fn id(&self) -> &str {
    &self.id
  }

  #[instrument(level = "info", skip(self, req), fields(provider = %self.id, specialty = %req.specialty, difficulty = %req.difficulty, count = req.count))]
  async fn generate_questions(&self, req: &QuestionRequest) -> Result<Vec<GeneratedQuestion>, ProviderError> {
    let raw = self.call(&question_prompt(&self.prompts, req)).await?;

    let items = match self.normalize(&raw) {
      Normalized::Document(mut doc) => match doc.remove("questions") {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(ProviderError::UnexpectedShape("`questions` is not a list".into())),
        None => return Err(ProviderError::UnexpectedShape("object has no `questions` list".into())),
      },
      Normalized::List(items) => items,
      Normalized::Unparsed(text) => extract_object_list(&text)
        .ok_or_else(|| ProviderError::MalformedResponse(trunc_for_log(&text, 80)))?,
    };

    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().take(req.count as usize).enumerate() {
      out.push(question_from_value(item, req).map_err(|e| match e {
        ProviderError::UnexpectedShape(m) => ProviderError::UnexpectedShape(format!("question {i}: {m}")),
        other => other,
      })?);
    }
    Ok(out)
  }

  #[instrument(level = "info", skip(self, question, answer), fields(provider = %self.id, answer_len = answer.len()))]
  async fn evaluate_answer(
    &self,
    question: &GeneratedQuestion,
    answer: &str,
  ) -> Result<AnswerEvaluation, ProviderError> {
    let raw = self.call(&evaluation_prompt(&self.prompts, question, answer, self.scale)).await?;

    let doc = match self.normalize(&raw) {
      Normalized::Document(doc) => doc,
      Normalized::List(_) => {
        return Err(ProviderError::UnexpectedShape("evaluation reply is a list".into()))
      }
      Normalized::Unparsed(text) => extract_first_object(&text)
        .ok_or_else(|| ProviderError::MalformedResponse(trunc_for_log(&text, 80)))?,
    };

    let mut eval: AnswerEvaluation = serde_json::from_value(Value::Object(doc))
      .map_err(|e| ProviderError::UnexpectedShape(format!("evaluation: {e}")))?;
    eval.score_scale = self.scale;
    Ok(eval)
  }
}

/// Specialty and difficulty always come from the request, whatever the model echoed back.
fn question_from_value(item: Value, req: &QuestionRequest) -> Result<GeneratedQuestion, ProviderError> {
  let Value::Object(mut map) = item else {
    return Err(ProviderError::UnexpectedShape("item is not an object".into()));
  };
  stamp_request(&mut map, req);
  let q: GeneratedQuestion = serde_json::from_value(Value::Object(map))
    .map_err(|e| ProviderError::UnexpectedShape(e.to_string()))?;
  match q.violation() {
    Some(v) => Err(ProviderError::UnexpectedShape(v.into())),
    None => Ok(q),
  }
}

fn stamp_request(map: &mut Map<String, Value>, req: &QuestionRequest) {
  map.insert("specialty".into(), Value::String(req.specialty.clone()));
  map.insert("difficulty".into(), Value::String(req.difficulty.as_str().into()));
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Difficulty, RelatedResource};
  use serde_json::json;

  struct Canned(String);

  #[async_trait]
  impl ChatTransport for Canned {
    async fn complete(&self, _prompt: &ChatPrompt) -> Result<String, ProviderError> {
      Ok(self.0.clone())
    }
  }

  fn adapter(reply: &str) -> LlmAdapter<Canned> {
    LlmAdapter::new("test", Canned(reply.into()), Arc::new(Prompts::default()), ScoreScale::OneToTen)
  }

  fn req() -> QuestionRequest {
    QuestionRequest { specialty: "Cardiology".into(), difficulty: Difficulty::Foundation, count: 3, topics: None }
  }

  fn item(n: u32) -> Value {
    json!({
      "specialty": "Cardio",
      "difficulty": "Advanced",
      "scenario": format!("Case {n}: a 58-year-old man with chest pain."),
      "question": "What is the most likely diagnosis? (2 marks)",
      "modelAnswer": "Acute coronary syndrome.",
      "strengths": ["Recognises ischaemic pain"],
      "areasForImprovement": ["Risk factors"],
      "learningPoints": ["ECG within 10 minutes"],
      "relatedResources": [{"title": "NICE CG95", "url": "https://www.nice.org.uk/guidance/cg95"}]
    })
  }

  fn sample_question() -> GeneratedQuestion {
    serde_json::from_value(item(1)).unwrap()
  }

  #[tokio::test]
  async fn fenced_empty_question_list_is_ok() {
    let a = adapter("Sure! Here you go:\n```json\n{\"questions\":[]}\n```");
    assert!(a.generate_questions(&req()).await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn questions_take_specialty_and_difficulty_from_request() {
    let reply = json!({"questions": [item(1), item(2)]}).to_string();
    let qs = adapter(&reply).generate_questions(&req()).await.unwrap();
    assert_eq!(qs.len(), 2);
    assert!(qs.iter().all(|q| q.specialty == "Cardiology" && q.difficulty == Difficulty::Foundation));
    assert!(matches!(&qs[0].related_resources[0], RelatedResource::Link { url, .. } if url.contains("cg95")));
  }

  #[tokio::test]
  async fn bare_list_is_accepted_and_capped_at_count() {
    let reply = json!([item(1), item(2), item(3), item(4)]).to_string();
    assert_eq!(adapter(&reply).generate_questions(&req()).await.unwrap().len(), 3);
  }

  #[tokio::test]
  async fn unparsed_reply_falls_back_to_object_list_extraction() {
    let reply = format!("Set A: {} then {{draft] notes}}", json!([item(1)]));
    let qs = adapter(&reply).generate_questions(&req()).await.unwrap();
    assert_eq!(qs.len(), 1);
  }

  #[tokio::test]
  async fn prose_without_structure_is_malformed() {
    let err = adapter("I cannot write questions today.").generate_questions(&req()).await.unwrap_err();
    assert!(matches!(err, ProviderError::MalformedResponse(_)));
  }

  #[tokio::test]
  async fn wrong_shapes_are_rejected() {
    let err = adapter(r#"{"items": []}"#).generate_questions(&req()).await.unwrap_err();
    assert!(matches!(err, ProviderError::UnexpectedShape(_)));

    let mut bad = item(1);
    bad["learningPoints"] = json!([]);
    let reply = json!({"questions": [bad]}).to_string();
    let err = adapter(&reply).generate_questions(&req()).await.unwrap_err();
    assert!(matches!(err, ProviderError::UnexpectedShape(m) if m.contains("learningPoints")));
  }

  #[tokio::test]
  async fn blank_reply_is_empty_response() {
    let err = adapter("   \n").generate_questions(&req()).await.unwrap_err();
    assert!(matches!(err, ProviderError::EmptyResponse));
  }

  #[tokio::test]
  async fn evaluation_carries_declared_scale() {
    let reply = r#"Here is my assessment: {"score": "85%", "strengths": ["Clear"], "learningPoints": ["Troponin timing"]}"#;
    let a = LlmAdapter::new("ds", Canned(reply.into()), Arc::new(Prompts::default()), ScoreScale::Percent);
    let e = a.evaluate_answer(&sample_question(), "ACS").await.unwrap();
    assert_eq!(e.score, 85.0);
    assert_eq!(e.score_scale, ScoreScale::Percent);
    assert_eq!(e.strengths, vec!["Clear".to_string()]);
    assert!(e.areas_for_improvement.is_empty());
  }

  #[tokio::test]
  async fn evaluation_recovers_first_object_from_prose() {
    let reply = r#"Score {"score": 7, "modelAnswer": "<b>ACS</b>"} and also {"note": 1}"#;
    let e = adapter(reply).evaluate_answer(&sample_question(), "MI").await.unwrap();
    assert_eq!(e.score, 7.0);
    assert_eq!(e.model_answer, "<b>ACS</b>");
  }

  #[tokio::test]
  async fn evaluation_shape_errors() {
    let err = adapter(r#"[{"score": 7}]"#).evaluate_answer(&sample_question(), "x").await.unwrap_err();
    assert!(matches!(err, ProviderError::UnexpectedShape(_)));
    let err = adapter(r#"{"strengths": ["x"]}"#).evaluate_answer(&sample_question(), "x").await.unwrap_err();
    assert!(matches!(err, ProviderError::UnexpectedShape(_)));
    let err = adapter("Good effort overall.").evaluate_answer(&sample_question(), "x").await.unwrap_err();
    assert!(matches!(err, ProviderError::MalformedResponse(_)));
  }
}
