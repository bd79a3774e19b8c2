//! Application state: the AI gateway and the storage collaborator.
//!
//! The gateway is built from `GatewayConfig`: one `LlmAdapter<OpenAiCompatible>` per
//! enabled provider profile, in the configured priority order. Missing credentials do
//! not prevent construction; those adapters fail (and turn sticky) on first use.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::{load_gateway_config_from_env, resolve_api_key, GatewayConfig};
use crate::gateway::Gateway;
use crate::openai::OpenAiCompatible;
use crate::provider::{LlmAdapter, QuestionProvider};
use crate::store::{MemoryStore, Store};

#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub store: Arc<dyn Store>,
}

impl AppState {
    /// Build state from env: load gateway config, build adapters, seed the in-memory store.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_gateway_config_from_env();
        let gateway = build_gateway(&cfg);
        Self::from_parts(gateway, Arc::new(MemoryStore::seeded()))
    }

    pub fn from_parts(gateway: Gateway, store: Arc<dyn Store>) -> Self {
        Self { gateway: Arc::new(gateway), store }
    }
}

/// Adapters in priority order; disabled profiles are left out entirely.
pub fn build_gateway(cfg: &GatewayConfig) -> Gateway {
    let prompts = Arc::new(cfg.prompts.clone());
    let mut providers: Vec<Arc<dyn QuestionProvider>> = Vec::new();

    for profile in cfg.providers.iter().filter(|p| p.enabled) {
        let has_key = resolve_api_key(&profile.api_key_env).is_some();
        info!(
            target: "gateway",
            provider = %profile.id,
            base_url = %profile.base_url,
            model = %profile.model,
            score_scale = ?profile.score_scale,
            credentials = if has_key { "present" } else { "missing" },
            "Provider registered"
        );
        let transport = OpenAiCompatible::new(profile.clone());
        providers.push(Arc::new(LlmAdapter::new(
            profile.id.clone(),
            transport,
            prompts.clone(),
            profile.score_scale,
        )));
    }

    if providers.is_empty() {
        warn!(target: "gateway", "No providers enabled; every AI call will report exhaustion");
    }
    Gateway::new(providers, cfg.call_timeout())
}
