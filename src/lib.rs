//! MedEval backend: clinical question generation and answer evaluation for medical
//! students, served over a JSON API.
//!
//! The AI gateway (`gateway`) tries LLM providers in priority order, normalizes their
//! replies (`normalize`, `provider`) and marks failing providers so later calls skip
//! them until reset. Everything around it (storage, dashboard aggregates, HTTP) lives
//! in the remaining modules.

pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod logic;
pub mod normalize;
pub mod openai;
pub mod prompt;
pub mod protocol;
pub mod provider;
pub mod routes;
pub mod seeds;
pub mod state;
pub mod store;
pub mod telemetry;
pub mod util;
