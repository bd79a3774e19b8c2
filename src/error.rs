//! Error taxonomy.
//!
//! - `ProviderError`: one adapter failed; the gateway marks it and moves on.
//! - `GatewayError`: every adapter was skipped or failed; the only error callers see.
//! - `StoreError`: the storage collaborator rejected a write or read.
//! - `ApiError`: HTTP-facing errors with a status code and `{"message": ...}` body.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
  #[error("missing credentials: {0}")]
  Configuration(String),

  #[error("backend returned no content")]
  EmptyResponse,

  #[error("no structured document could be recovered: {0}")]
  MalformedResponse(String),

  #[error("structured reply has an unexpected shape: {0}")]
  UnexpectedShape(String),

  #[error("backend did not answer within {0:?}")]
  Timeout(std::time::Duration),

  #[error("transport error: {0}")]
  Transport(String),

  #[error("backend HTTP {status}: {message}")]
  Http { status: u16, message: String },
}

impl ProviderError {
  /// Short stable label for logs.
  pub fn kind(&self) -> &'static str {
    match self {
      ProviderError::Configuration(_) => "configuration",
      ProviderError::EmptyResponse => "empty_response",
      ProviderError::MalformedResponse(_) => "malformed_response",
      ProviderError::UnexpectedShape(_) => "unexpected_shape",
      ProviderError::Timeout(_) => "timeout",
      ProviderError::Transport(_) => "transport",
      ProviderError::Http { .. } => "http",
    }
  }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
  /// Provider names are kept for logs; the message shown to users does not list them.
  #[error("All AI providers failed. Please check your API credentials.")]
  AllProvidersExhausted { attempted: Vec<String> },
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("{entity} {id} does not exist")]
  MissingReference { entity: &'static str, id: i64 },

  #[error("{0} already exists")]
  Duplicate(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  #[error("{0}")]
  Validation(String),

  #[error("{0}")]
  NotFound(String),

  #[error(transparent)]
  Gateway(#[from] GatewayError),

  #[error("storage error: {0}")]
  Storage(String),
}

impl From<StoreError> for ApiError {
  fn from(e: StoreError) -> Self {
    ApiError::Storage(e.to_string())
  }
}

#[derive(Serialize)]
struct ErrorOut {
  message: String,
}

impl IntoResponse for ApiError {
  fn into_response(self) -> axum::response::Response {
    let status = match &self {
      ApiError::Validation(_) => StatusCode::BAD_REQUEST,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Gateway(_) => StatusCode::BAD_GATEWAY,
      ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorOut { message: self.to_string() })).into_response()
  }
}
