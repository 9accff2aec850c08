//! HTTP front end for the Portaria gatehouse register.
//!
//! Exposes an axum [`Router`] backed by a [`PresenceEngine`] over any
//! [`RegistrationStore`]. The routes and JSON field names match the legacy
//! gatehouse server, so existing clients keep working.

pub mod error;
pub mod registrations;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use portaria_core::{PresenceEngine, store::RegistrationStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `portaria.toml` and
/// `PORTARIA_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `engine`.
///
/// Unknown paths, and known paths hit with the wrong method, answer 404 with
/// the same JSON body.
pub fn router<S>(engine: Arc<PresenceEngine<S>>) -> Router
where
  S: RegistrationStore + 'static,
{
  Router::new()
    .route("/cadastrar", post(registrations::create::<S>).fallback(not_found))
    .route("/listar", get(registrations::list::<S>).fallback(not_found))
    .fallback(not_found)
    .layer(TraceLayer::new_for_http())
    .with_state(engine)
}

async fn not_found() -> ApiError { ApiError::NotFound }

// ─── Integration tests ────────────────────────────────────────────────────────
