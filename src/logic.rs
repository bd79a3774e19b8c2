//! Request flows shared by the HTTP handlers.
//!
//! This includes:
//!   - Question generation through the gateway, then persistence
//!   - Answer evaluation through the gateway, then answer/attempt/activity records
//!   - Synthetic batch evaluation (no AI call)
//!   - Feedback assembly and the dashboard aggregates

use std::collections::HashSet;

use chrono::Duration;
use rand::Rng;
use tracing::{error, info, instrument};

use crate::domain::{
  AnswerEvaluation, Difficulty, GeneratedQuestion, QuestionRequest, RelatedResource, ScoreScale, MissingDifficulty,
};
use crate::error::{ApiError, StoreError};
use crate::protocol::*;
use crate::seeds::MOCK_USER_ID;
use crate::state::AppState;
use crate::store::{
  ActivityKind, Attempt, NewActivity, NewSpecialty, Resource, ResourceKind, Specialty, Store, StoredAnswer,
  StoredQuestion, User, UserId, UserStats,
};
use crate::util::trunc_for_log;

pub const MAX_QUESTIONS_PER_REQUEST: i64 = 20;

fn validate_generate(body: &GenerateIn) -> Result<QuestionRequest, ApiError> {
  let specialty = body.specialty.trim();
  if specialty.is_empty() {
    return Err(ApiError::Validation("Specialty is required".into()));
  }
  // Unrecognised labels are kept and pitched at the early-clinical year; only a blank one is rejected.
  let difficulty: Difficulty = body.difficulty.parse().map_err(|e: MissingDifficulty| ApiError::Validation(e.to_string()))?;
  if !(1..=MAX_QUESTIONS_PER_REQUEST).contains(&body.count) {
    return Err(ApiError::Validation(format!("count must be between 1 and {MAX_QUESTIONS_PER_REQUEST}")));
  }
  Ok(QuestionRequest {
    specialty: specialty.to_string(),
    difficulty,
    count: body.count as u32,
    topics: body.topics.clone().filter(|t| !t.trim().is_empty()),
  })
}

async fn specialty_for(store: &dyn Store, name: &str) -> Result<Specialty, StoreError> {
  if let Some(s) = store.specialty_by_name(name).await? {
    return Ok(s);
  }
  match store.create_specialty(NewSpecialty::named(name)).await {
    Ok(s) => Ok(s),
    // Lost a race with a concurrent request creating the same specialty.
    Err(StoreError::Duplicate(_)) => store
      .specialty_by_name(name)
      .await?
      .ok_or_else(|| StoreError::Duplicate(name.to_string())),
    Err(e) => Err(e),
  }
}

#[instrument(level = "info", skip(state, body), fields(specialty = %body.specialty, difficulty = %body.difficulty, count = body.count))]
pub async fn generate_questions(state: &AppState, body: &GenerateIn) -> Result<GenerateOut, ApiError> {
  let req = validate_generate(body)?;
  let served = state.gateway.generate_questions(&req).await?;
  let specialty = specialty_for(state.store.as_ref(), &req.specialty).await?;

  let mut questions = Vec::with_capacity(served.value.len());
  for q in &served.value {
    match state.store.create_question(specialty.id, Some(MOCK_USER_ID), q).await {
      Ok(saved) => questions.push(QuestionSummary {
        id: saved.id,
        specialty: q.specialty.clone(),
        difficulty: q.difficulty.clone(),
        scenario: q.scenario.clone(),
        question: q.question.clone(),
      }),
      Err(e) => error!(target: "medeval_backend", error = %e, "Failed to save generated question; skipping"),
    }
  }

  info!(target: "medeval_backend", provider = %served.provider, saved = questions.len(), "Questions generated");
  Ok(GenerateOut { provider: served.provider, questions })
}

async fn load_question(state: &AppState, question_id: &QuestionRef) -> Result<StoredQuestion, ApiError> {
  let not_found = || ApiError::NotFound("Question not found".into());
  let id = question_id.id().ok_or_else(not_found)?;
  state.store.get_question(id).await?.ok_or_else(not_found)
}

async fn specialty_name(state: &AppState, specialty_id: i64) -> Result<String, ApiError> {
  let all = state.store.specialties().await?;
  Ok(all.into_iter().find(|s| s.id == specialty_id).map(|s| s.name).unwrap_or_else(|| "Medical".into()))
}

fn as_generated(q: &StoredQuestion, specialty: String) -> GeneratedQuestion {
  GeneratedQuestion {
    specialty,
    difficulty: q.difficulty.clone(),
    scenario: q.scenario.clone(),
    question: q.question.clone(),
    model_answer: q.model_answer.clone(),
    strengths: q.strengths.clone(),
    areas_for_improvement: q.areas_for_improvement.clone(),
    learning_points: q.learning_points.clone(),
    related_resources: q.related_resources.clone(),
  }
}

/// Persist the answer, its attempt and an activity entry, then refresh the dashboard stats.
async fn record_answer(
  state: &AppState,
  question: &StoredQuestion,
  specialty: &str,
  answer: &str,
  evaluation: &AnswerEvaluation,
) -> Result<StoredAnswer, ApiError> {
  let store = state.store.as_ref();
  let saved = store.save_answer(question.id, MOCK_USER_ID, answer, evaluation).await?;
  store.save_attempt(question.id, MOCK_USER_ID, evaluation.score, evaluation.score_scale).await?;
  store
    .log_activity(NewActivity {
      user_id: MOCK_USER_ID,
      kind: ActivityKind::Answer,
      title: format!("{} Question Response", question.difficulty),
      description: format!("Answered {} question on {}", question.difficulty, specialty),
      duration: 0,
    })
    .await?;
  refresh_user_stats(store, MOCK_USER_ID).await?;
  Ok(saved)
}

#[instrument(level = "info", skip(state, body), fields(question_id = %body.question_id, answer_len = body.answer.len()))]
pub async fn submit_answer(state: &AppState, body: &AnswerIn) -> Result<AnswerOut, ApiError> {
  if body.answer.trim().is_empty() {
    return Err(ApiError::Validation("Answer is required".into()));
  }
  let question = load_question(state, &body.question_id).await?;
  let specialty = specialty_name(state, question.specialty_id).await?;

  let served = state
    .gateway
    .evaluate_answer(&as_generated(&question, specialty.clone()), &body.answer)
    .await?;
  let saved = record_answer(state, &question, &specialty, &body.answer, &served.value).await?;

  info!(
    target: "medeval_backend",
    provider = %served.provider,
    question_id = question.id,
    score = served.value.score,
    scale = ?served.value.score_scale,
    "Answer evaluated"
  );
  Ok(AnswerOut { provider: served.provider, answer: saved })
}

/// Canned evaluation used by the batch route: random 6 to 10 on the 1-10 scale.
pub fn synthetic_evaluation(question: &StoredQuestion) -> AnswerEvaluation {
  let model_answer = if question.model_answer.trim().is_empty() {
    "Standard medical approach would be...".to_string()
  } else {
    question.model_answer.clone()
  };
  AnswerEvaluation {
    score: rand::thread_rng().gen_range(6..=10) as f64,
    score_scale: ScoreScale::OneToTen,
    model_answer,
    strengths: vec!["Good understanding of diagnosis".into(), "Appropriate management plan".into()],
    areas_for_improvement: vec![
      "Could provide more detailed rationale".into(),
      "Additional tests to consider".into(),
    ],
    learning_points: vec!["Remember key clinical guidelines".into(), "Consider differential diagnoses".into()],
    related_resources: vec![
      RelatedResource::Plain("NICE Guidelines".into()),
      RelatedResource::Plain("BMJ Best Practice".into()),
    ],
  }
}

#[instrument(level = "info", skip(state, body), fields(items = body.answers.len()))]
pub async fn submit_batch(state: &AppState, body: &BatchIn) -> Result<BatchOut, ApiError> {
  if body.answers.iter().any(|a| a.answer.trim().is_empty()) {
    return Err(ApiError::Validation("Answer is required".into()));
  }

  let mut results = Vec::with_capacity(body.answers.len());
  for item in &body.answers {
    let question_id = item.question_id.to_string();
    let question = match load_question(state, &item.question_id).await {
      Ok(q) => q,
      Err(e) => {
        results.push(BatchItemOut::Error { question_id, message: e.to_string() });
        continue;
      }
    };

    let evaluation = synthetic_evaluation(&question);
    let outcome = match specialty_name(state, question.specialty_id).await {
      Ok(specialty) => record_answer(state, &question, &specialty, &item.answer, &evaluation).await.map(|_| ()),
      Err(e) => Err(e),
    };
    match outcome {
      Ok(()) => results.push(BatchItemOut::Success { question_id, evaluation }),
      Err(e) => {
        error!(target: "medeval_backend", %question_id, error = %e, "Batch item failed");
        results.push(BatchItemOut::Error { question_id, message: e.to_string() });
      }
    }
  }
  Ok(BatchOut { provider: None, results })
}

#[instrument(level = "info", skip(state))]
pub async fn feedback(state: &AppState, question_id: &str) -> Result<FeedbackOut, ApiError> {
  let question = load_question(state, &QuestionRef::Text(question_id.to_string())).await?;
  let answer = state
    .store
    .answer_for_question(question.id, MOCK_USER_ID)
    .await?
    .ok_or_else(|| ApiError::NotFound("Answer not found".into()))?;
  let specialty = specialty_name(state, question.specialty_id).await?;
  let e = answer.evaluation;

  Ok(FeedbackOut {
    id: question.id,
    specialty,
    difficulty: question.difficulty,
    scenario: question.scenario,
    question: question.question,
    user_answer: answer.answer,
    score: e.score,
    score_scale: e.score_scale,
    model_answer: e.model_answer,
    strengths: e.strengths,
    areas_for_improvement: e.areas_for_improvement,
    learning_points: e.learning_points,
    related_resources: e.related_resources,
  })
}

fn mean_percent<'a>(attempts: impl Iterator<Item = &'a Attempt>) -> Option<f64> {
  let (n, sum) = attempts.fold((0usize, 0.0), |(n, sum), a| (n + 1, sum + a.percent()));
  if n == 0 { None } else { Some(sum / n as f64) }
}

/// Recompute the dashboard summary from the user's attempts.
#[instrument(level = "debug", skip(store))]
pub async fn refresh_user_stats(store: &dyn Store, user_id: UserId) -> Result<UserStats, StoreError> {
  let now = store.now();
  let attempts = store.attempts(user_id).await?;
  let week_ago = now - Duration::days(7);
  let fortnight_ago = now - Duration::days(14);

  let this_week: Vec<&Attempt> = attempts.iter().filter(|a| a.created_at >= week_ago).collect();
  let last_week: Vec<&Attempt> =
    attempts.iter().filter(|a| a.created_at >= fortnight_ago && a.created_at < week_ago).collect();

  let accuracy_weekly_change = match (mean_percent(this_week.iter().copied()), mean_percent(last_week.iter().copied())) {
    (Some(cur), Some(prev)) => (cur - prev).round() as i64,
    _ => 0,
  };

  let by_specialty = store.performance_by_specialty(user_id).await?;
  let strongest = by_specialty.first();
  let weakest = by_specialty.last();
  let active_days = attempts.iter().map(|a| a.created_at.date_naive()).collect::<HashSet<_>>().len();

  let stats = UserStats {
    questions_answered: attempts.len() as i64,
    accuracy_rate: mean_percent(attempts.iter()).unwrap_or(0.0).round() as i64,
    questions_weekly_change: this_week.len() as i64 - last_week.len() as i64,
    accuracy_weekly_change,
    strongest_area: strongest.map(|p| p.name.clone()),
    strongest_area_accuracy: strongest.map(|p| p.accuracy.round() as i64).unwrap_or(0),
    weakest_area: weakest.map(|p| p.name.clone()),
    weakest_area_accuracy: weakest.map(|p| p.accuracy.round() as i64).unwrap_or(0),
    active_days: active_days as i64,
    updated_at: None,
  };
  store.update_user_stats(user_id, stats).await
}

pub async fn current_user(state: &AppState) -> Result<User, ApiError> {
  state
    .store
    .user(MOCK_USER_ID)
    .await?
    .ok_or_else(|| ApiError::NotFound("User not found".into()))
}

pub async fn stats(state: &AppState) -> Result<StatsOut, ApiError> {
  Ok(StatsOut::from(state.store.user_stats(MOCK_USER_ID).await?))
}

pub async fn specialties(state: &AppState) -> Result<Vec<Specialty>, ApiError> {
  Ok(state.store.specialties().await?)
}

pub async fn recent_activity(state: &AppState) -> Result<Vec<ActivityOut>, ApiError> {
  let now = state.store.now();
  let rows = state.store.recent_activity(MOCK_USER_ID, 4).await?;
  Ok(rows.iter().map(|a| activity_out(a, now)).collect())
}

pub async fn performance(state: &AppState) -> Result<PerformanceOut, ApiError> {
  let stats = state.store.user_stats(MOCK_USER_ID).await?.unwrap_or_default();
  let by_difficulty = state.store.performance_by_difficulty(MOCK_USER_ID).await?;
  Ok(PerformanceOut {
    total_questions: stats.questions_answered,
    overall_accuracy: stats.accuracy_rate,
    active_days: stats.active_days,
    by_difficulty: by_difficulty.into_iter().map(NamedAccuracy::from).collect(),
  })
}

pub async fn performance_by_specialty(state: &AppState) -> Result<Vec<NamedAccuracy>, ApiError> {
  let rows = state.store.performance_by_specialty(MOCK_USER_ID).await?;
  Ok(rows.into_iter().map(NamedAccuracy::from).collect())
}

pub async fn progress(state: &AppState) -> Result<Vec<ProgressOut>, ApiError> {
  let rows = state.store.progress_over_time(MOCK_USER_ID, 30).await?;
  Ok(rows.into_iter().map(ProgressOut::from).collect())
}

pub async fn weekly_activity(state: &AppState) -> Result<Vec<DayActivityOut>, ApiError> {
  let rows = state.store.weekly_activity(MOCK_USER_ID).await?;
  Ok(rows.into_iter().map(DayActivityOut::from).collect())
}

/// Path segment to resource type: `guidelines`, `questionbanks` or `ukmla`.
pub fn resource_kind(segment: &str) -> Option<ResourceKind> {
  match segment {
    "guidelines" => Some(ResourceKind::Guideline),
    "questionbanks" => Some(ResourceKind::Questionbank),
    "ukmla" => Some(ResourceKind::Ukmla),
    _ => None,
  }
}

pub async fn resources(state: &AppState, segment: &str) -> Result<Vec<Resource>, ApiError> {
  let kind = resource_kind(segment)
    .ok_or_else(|| ApiError::NotFound(format!("Unknown resource collection '{}'", trunc_for_log(segment, 40))))?;
  Ok(state.store.resources(kind).await?)
}

pub fn providers(state: &AppState) -> ProvidersOut {
  ProvidersOut { current: state.gateway.current_provider(), providers: state.gateway.provider_status() }
}

pub fn reset_providers(state: &AppState) -> ProvidersOut {
  state.gateway.reset_providers();
  providers(state)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::store::MemoryStore;

  fn body(specialty: &str, difficulty: &str, count: i64) -> GenerateIn {
    GenerateIn { specialty: specialty.into(), difficulty: difficulty.into(), count, topics: Some("  ".into()) }
  }

  #[test]
  fn generate_validation() {
    let req = validate_generate(&body(" Cardiology ", "ukmla", 20)).unwrap();
    assert_eq!(req.specialty, "Cardiology");
    assert_eq!(req.difficulty, Difficulty::Ukmla);
    assert_eq!(req.topics, None);

    let req = validate_generate(&body("Cardiology", "Expert", 1)).unwrap();
    assert_eq!(req.difficulty, Difficulty::Other("Expert".into()));

    for bad in [body("", "Foundation", 1), body("Cardiology", " ", 1), body("Cardiology", "Foundation", 0), body("Cardiology", "Foundation", 21)] {
      assert!(matches!(validate_generate(&bad), Err(ApiError::Validation(_))));
    }
  }

  #[test]
  fn synthetic_scores_stay_in_band() {
    let q = StoredQuestion {
      id: 1,
      specialty_id: 1,
      user_id: None,
      difficulty: Difficulty::Foundation,
      scenario: "s".into(),
      question: "q".into(),
      model_answer: String::new(),
      strengths: vec![],
      areas_for_improvement: vec![],
      learning_points: vec![],
      related_resources: vec![],
      created_at: chrono::Utc::now(),
    };
    for _ in 0..50 {
      let e = synthetic_evaluation(&q);
      assert!((6.0..=10.0).contains(&e.score));
      assert_eq!(e.model_answer, "Standard medical approach would be...");
    }
  }

  #[tokio::test]
  async fn stats_track_strongest_and_weakest_specialty() {
    let store = MemoryStore::seeded();
    let gq = GeneratedQuestion {
      specialty: "x".into(),
      difficulty: Difficulty::Intermediate,
      scenario: "s".into(),
      question: "q".into(),
      model_answer: String::new(),
      strengths: vec![],
      areas_for_improvement: vec![],
      learning_points: vec![],
      related_resources: vec![],
    };
    let cardio = store.specialty_by_name("Cardiology").await.unwrap().unwrap().id;
    let renal = store.specialty_by_name("Nephrology").await.unwrap().unwrap().id;
    let q1 = store.create_question(cardio, Some(1), &gq).await.unwrap();
    let q2 = store.create_question(renal, Some(1), &gq).await.unwrap();
    store.save_attempt(q1.id, 1, 9.0, ScoreScale::OneToTen).await.unwrap();
    store.save_attempt(q2.id, 1, 40.0, ScoreScale::Percent).await.unwrap();

    let s = refresh_user_stats(&store, 1).await.unwrap();
    assert_eq!(s.questions_answered, 2);
    assert_eq!(s.accuracy_rate, 65);
    assert_eq!(s.questions_weekly_change, 2);
    assert_eq!(s.accuracy_weekly_change, 0);
    assert_eq!(s.strongest_area.as_deref(), Some("Cardiology"));
    assert_eq!(s.strongest_area_accuracy, 90);
    assert_eq!(s.weakest_area.as_deref(), Some("Nephrology"));
    assert_eq!(s.active_days, 1);
    assert!(store.user_stats(1).await.unwrap().unwrap().updated_at.is_some());
  }

  #[test]
  fn resource_segments() {
    assert_eq!(resource_kind("guidelines"), Some(ResourceKind::Guideline));
    assert_eq!(resource_kind("questionbanks"), Some(ResourceKind::Questionbank));
    assert_eq!(resource_kind("other"), None);
  }
}
