//! Fallback coordinator.
//!
//! Adapters are tried strictly in priority order, one at a time. The first success wins;
//! every failure (including a timeout) makes that adapter sticky-failed until
//! `reset_providers` is called. There is no time-based recovery.
//!
//! Shared state (the sticky set and the most recent serving provider) sits behind one
//! mutex that is never held across an await. Each call also returns its own serving
//! provider in `Served`, so concurrent requests never read each other's marker.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{AnswerEvaluation, GeneratedQuestion, QuestionRequest};
use crate::error::{GatewayError, ProviderError};
use crate::provider::QuestionProvider;

/// A successful gateway result and the adapter that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct Served<T> {
  pub provider: String,
  pub value: T,
}

/// Eligibility of one adapter, for the status endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
  pub id: String,
  pub failed: bool,
}

#[derive(Default)]
struct Selection {
  failed: HashSet<String>,
  current: Option<String>,
}

pub struct Gateway {
  providers: Vec<Arc<dyn QuestionProvider>>,
  state: Mutex<Selection>,
  call_timeout: Option<Duration>,
}

impl Gateway {
  pub fn new(providers: Vec<Arc<dyn QuestionProvider>>, call_timeout: Option<Duration>) -> Self {
    Self { providers, state: Mutex::new(Selection::default()), call_timeout }
  }

  #[instrument(level = "info", skip(self, req), fields(specialty = %req.specialty, difficulty = %req.difficulty, count = req.count))]
  pub async fn generate_questions(&self, req: &QuestionRequest) -> Result<Served<Vec<GeneratedQuestion>>, GatewayError> {
    self.run("generate_questions", move |p| async move { p.generate_questions(req).await }).await
  }

  #[instrument(level = "info", skip(self, question, answer), fields(answer_len = answer.len()))]
  pub async fn evaluate_answer(
    &self,
    question: &GeneratedQuestion,
    answer: &str,
  ) -> Result<Served<AnswerEvaluation>, GatewayError> {
    self.run("evaluate_answer", move |p| async move { p.evaluate_answer(question, answer).await }).await
  }

  /// Serving adapter of the most recent successful call, if that call succeeded.
  pub fn current_provider(&self) -> Option<String> {
    self.state.lock().current.clone()
  }

  /// Make every adapter eligible again.
  pub fn reset_providers(&self) {
    let mut st = self.state.lock();
    let cleared = st.failed.len();
    st.failed.clear();
    st.current = None;
    info!(target: "gateway", cleared, "Provider failure state reset");
  }

  pub fn provider_status(&self) -> Vec<ProviderStatus> {
    let st = self.state.lock();
    self
      .providers
      .iter()
      .map(|p| ProviderStatus { id: p.id().to_string(), failed: st.failed.contains(p.id()) })
      .collect()
  }

  async fn run<T, F, Fut>(&self, op: &'static str, call: F) -> Result<Served<T>, GatewayError>
  where
    F: Fn(Arc<dyn QuestionProvider>) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
  {
    self.state.lock().current = None;
    let mut attempted = Vec::new();
    // Correlates the attempts of one gateway call in the logs.
    let call_id = Uuid::new_v4();

    for provider in &self.providers {
      let id = provider.id().to_string();
      if self.state.lock().failed.contains(&id) {
        debug!(target: "gateway", %call_id, provider = %id, op, "Skipping sticky-failed provider");
        continue;
      }

      attempted.push(id.clone());
      let start = Instant::now();
      let outcome = self.with_deadline(call(provider.clone())).await;
      let elapsed = start.elapsed();

      match outcome {
        Ok(value) => {
          info!(target: "gateway", %call_id, provider = %id, op, ?elapsed, "Provider served request");
          self.state.lock().current = Some(id.clone());
          return Ok(Served { provider: id, value });
        }
        Err(e) => {
          warn!(target: "gateway", %call_id, provider = %id, op, ?elapsed, kind = e.kind(), error = %e, "Provider failed; marking sticky");
          self.state.lock().failed.insert(id);
        }
      }
    }

    warn!(target: "gateway", %call_id, op, ?attempted, "All providers exhausted");
    Err(GatewayError::AllProvidersExhausted { attempted })
  }

  async fn with_deadline<T>(
    &self,
    fut: impl Future<Output = Result<T, ProviderError>>,
  ) -> Result<T, ProviderError> {
    match self.call_timeout {
      Some(limit) => tokio::time::timeout(limit, fut)
        .await
        .unwrap_or(Err(ProviderError::Timeout(limit))),
      None => fut.await,
    }
  }
}
