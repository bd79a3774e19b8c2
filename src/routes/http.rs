//! HTTP endpoint handlers. These are thin wrappers that forward to `logic`.
//! Each handler is instrumented; failures surface as `ApiError` responses.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::logic;
use crate::protocol::*;
use crate::state::AppState;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_user(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::current_user(&state).await?))
}

#[instrument(level = "info", skip(state, body), fields(specialty = %body.specialty, count = body.count))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GenerateIn>,
) -> Result<impl IntoResponse, ApiError> {
  let out = logic::generate_questions(&state, &body).await?;
  info!(target: "medeval_backend", provider = %out.provider, n = out.questions.len(), "HTTP questions generated");
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, body), fields(question_id = %body.question_id, answer_len = body.answer.len()))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AnswerIn>,
) -> Result<impl IntoResponse, ApiError> {
  let out = logic::submit_answer(&state, &body).await?;
  info!(target: "medeval_backend", provider = %out.provider, answer_id = out.answer.id, "HTTP answer evaluated");
  Ok((StatusCode::CREATED, Json(out)))
}

#[instrument(level = "info", skip(state, body), fields(items = body.answers.len()))]
pub async fn http_post_batch(
  State(state): State<Arc<AppState>>,
  Json(body): Json<BatchIn>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::submit_batch(&state, &body).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_feedback(
  State(state): State<Arc<AppState>>,
  Path(question_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::feedback(&state, &question_id).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::stats(&state).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_specialties(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::specialties(&state).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_activity(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::recent_activity(&state).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_performance(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::performance(&state).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_performance_by_specialty(
  State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::performance_by_specialty(&state).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_progress(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::progress(&state).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_weekly_activity(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::weekly_activity(&state).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_resources(
  State(state): State<Arc<AppState>>,
  Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
  Ok(Json(logic::resources(&state, &kind).await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_providers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(logic::providers(&state))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_reset_providers(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let out = logic::reset_providers(&state);
  info!(target: "gateway", "Provider failure marks cleared over HTTP");
  Json(out)
}
