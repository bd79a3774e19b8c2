//! MedEval · Medical Question Backend
//!
//! - Axum HTTP API
//! - AI gateway over OpenAI-compatible providers (Mistral, OpenAI, DeepSeek by default)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   MISTRAL_API_KEY     : credentials for the first provider
//!   OPENAI_API_KEY      : credentials for the second provider
//!   DEEPSEEK_API_KEY    : credentials for the third provider
//!   <ID>_BASE_URL       : per-provider endpoint override, e.g. OPENAI_BASE_URL
//!   <ID>_MODEL          : per-provider model override
//!   GATEWAY_CONFIG_PATH : path to TOML config (providers, timeout, prompts)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use medeval_backend::routes::build_router;
use medeval_backend::state::AppState;
use medeval_backend::telemetry;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Gateway from config + env, seeded in-memory store.
  let state = Arc::new(AppState::new());

  let app = build_router(state.clone());

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "medeval_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
