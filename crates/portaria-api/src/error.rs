//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body has the shape `{"message": "..."}`, matching the success
//! body of `POST /cadastrar`.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  #[error("{0}")]
  Conflict(String),

  #[error("Rota não encontrada!")]
  NotFound,

  #[error("Erro: Corpo da requisição muito grande!")]
  PayloadTooLarge,

  /// A store failure, reported with a short context prefix.
  #[error("{context}: {source}")]
  Store {
    context: &'static str,
    #[source]
    source:  portaria_core::Error,
  },
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::NotFound => StatusCode::NOT_FOUND,
      ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
      ApiError::Store { .. } => {
        tracing::error!(error = %self, "store failure");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };
    (status, Json(json!({ "message": self.to_string() }))).into_response()
  }
}
