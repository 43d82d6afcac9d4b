//! HTTP handlers for the session endpoints.
//!
//! Request bodies are parsed here and rejected with 400 before anything is
//! sent to the registry. Bodies are read as raw bytes so clients that omit
//! `Content-Type: application/json` are still served.

use std::sync::Arc;

use {
    axum::{Json, body::Bytes, extract::State},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    sesh_sessions::SessionRecord,
    uuid::Uuid,
};

use crate::{error::ApiError, state::GatewayState};

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(alias = "Name")]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<SessionRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CloseSessionRequest {
    #[serde(alias = "Id")]
    pub id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteSessionRequest {
    #[serde(alias = "Id")]
    pub id: Option<Uuid>,
    #[serde(alias = "Content")]
    pub content: Option<String>,
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

// ── Handlers ─────────────────────────────────────────────────────────────────

pub async fn create_session(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> Result<Json<CreateSessionResponse>, ApiError> {
    let req: CreateSessionRequest = parse_body(&body)?;
    let name = req
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Invalid create session object".into()))?;

    let id = state.registry.create(name).await?;
    Ok(Json(CreateSessionResponse { id }))
}

pub async fn list_sessions(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<ListSessionsResponse>, ApiError> {
    let sessions = state.registry.list().await?;
    Ok(Json(ListSessionsResponse { sessions }))
}

pub async fn close_session(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> Result<String, ApiError> {
    let req: CloseSessionRequest = parse_body(&body)?;
    let id = req
        .id
        .ok_or_else(|| ApiError::BadRequest("Invalid close session object".into()))?;

    state.registry.close(id).await?;
    Ok(format!("Successfully closed session with id {id}\n"))
}

pub async fn write_session(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> Result<String, ApiError> {
    let req: WriteSessionRequest = parse_body(&body)?;
    let (Some(id), Some(content)) = (req.id, req.content) else {
        return Err(ApiError::BadRequest("Invalid write session object".into()));
    };

    state.registry.write(id, content).await?;
    Ok(format!("Successfully wrote to session with id {id}\n"))
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
