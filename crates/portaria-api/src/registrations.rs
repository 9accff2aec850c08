//! Handlers for the registration endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/cadastrar` | Body: [`RegisterBody`]; 200, 400, 409 or 500 |
//! | `GET`  | `/listar` | Optional `?tipo=<category>`; returns [`RecordItem`]s |
//!
//! Wire field names are Portuguese and kept as-is for existing clients.

use std::sync::Arc;

use axum::{
  Json,
  body::Bytes,
  extract::{Query, State, rejection::BytesRejection},
  http::StatusCode,
};
use chrono::Local;
use portaria_core::{
  Error, PresenceEngine,
  record::{Category, Record, Registration, format_stay},
  store::RegistrationStore,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ApiError;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── Register ─────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /cadastrar`.
#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub nome:        String,
  pub cpf:         String,
  pub bloco:       String,
  pub apartamento: String,
  /// Category, either canonical (`visitor`) or Portuguese (`visitante`).
  pub tipo:        String,
  /// A non-blank plate means the person declared a vehicle.
  #[serde(default)]
  pub placa:       Option<String>,
}

impl RegisterBody {
  fn into_registration(self) -> Result<Registration, ApiError> {
    let category: Category = self
      .tipo
      .parse()
      .map_err(|_| ApiError::BadRequest(format!("Erro: Tipo de cadastro inválido: {}", self.tipo)))?;
    let has_vehicle = self.placa.as_deref().is_some_and(|p| !p.trim().is_empty());

    Ok(Registration {
      name: self.nome,
      identity_number: self.cpf,
      block: self.bloco,
      unit: self.apartamento,
      category,
      has_vehicle,
      plate: self.placa,
    })
  }
}

/// `POST /cadastrar`
///
/// The body is read as raw bytes so that malformed JSON and missing fields
/// both map to 400, whatever the `Content-Type`. Only a JSON object is a
/// valid body.
pub async fn create<S>(
  State(engine): State<Arc<PresenceEngine<S>>>,
  body: Result<Bytes, BytesRejection>,
) -> Result<Json<serde_json::Value>, ApiError>
where
  S: RegistrationStore,
{
  let body = body.map_err(|rejection| {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
      ApiError::PayloadTooLarge
    } else {
      ApiError::BadRequest("Erro: Dados JSON inválidos!".to_owned())
    }
  })?;

  let value: serde_json::Value = serde_json::from_slice(&body)
    .map_err(|_| ApiError::BadRequest("Erro: Dados JSON inválidos!".to_owned()))?;
  if !value.is_object() {
    return Err(ApiError::BadRequest("Erro: Dados JSON inválidos!".to_owned()));
  }
  let body: RegisterBody = serde_json::from_value(value)
    .map_err(|e| ApiError::BadRequest(format!("Erro: Campo obrigatório ausente: {e}")))?;

  match engine.register(body.into_registration()?).await {
    Ok(_) => Ok(Json(json!({ "message": "Cadastro realizado com sucesso!" }))),
    Err(Error::InvalidIdentity(_)) => Err(ApiError::BadRequest("Erro: CPF inválido!".to_owned())),
    Err(Error::EmptyField(field)) => Err(ApiError::BadRequest(format!(
      "Erro: Campo obrigatório vazio: {}",
      wire_field(field)
    ))),
    Err(Error::DuplicateIdentity(_)) => Err(ApiError::Conflict("Erro: CPF já cadastrado!".to_owned())),
    Err(e) => Err(ApiError::Store { context: "Erro no banco de dados", source: e }),
  }
}

/// Map an engine field name back to the JSON key the client sent.
fn wire_field(field: &str) -> &str {
  match field {
    "name" => "nome",
    "block" => "bloco",
    "unit" => "apartamento",
    other => other,
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub tipo: Option<String>,
}

/// One element of the `GET /listar` response.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RecordItem {
  pub nome:              String,
  pub cpf:               String,
  pub bloco:             String,
  pub apartamento:       String,
  pub tipo:              String,
  pub placa:             Option<String>,
  /// Check-in time, local clock.
  pub horario:           String,
  pub horario_saida:     Option<String>,
  /// Length of the stay as `H:MM:SS`.
  pub tempo_permanencia: Option<String>,
}

impl From<Record> for RecordItem {
  fn from(r: Record) -> Self {
    Self {
      nome:              r.name,
      cpf:               r.identity_number.into(),
      bloco:             r.block,
      apartamento:       r.unit,
      tipo:              r.category.label().to_owned(),
      placa:             r.plate,
      horario:           r.check_in_at.with_timezone(&Local).format(TIME_FORMAT).to_string(),
      horario_saida:     r
        .check_out_at
        .map(|at| at.with_timezone(&Local).format(TIME_FORMAT).to_string()),
      tempo_permanencia: r.duration.map(format_stay),
    }
  }
}

/// `GET /listar[?tipo=<category>]`
pub async fn list<S>(
  State(engine): State<Arc<PresenceEngine<S>>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<RecordItem>>, ApiError>
where
  S: RegistrationStore,
{
  let category = params
    .tipo
    .map(|t| {
      t.parse::<Category>()
        .map_err(|_| ApiError::BadRequest(format!("Erro: Tipo de cadastro inválido: {t}")))
    })
    .transpose()?;

  let records = engine
    .list_records(category)
    .await
    .map_err(|e| ApiError::Store { context: "Erro ao listar cadastros", source: e })?;
  Ok(Json(records.into_iter().map(RecordItem::from).collect()))
}
