use axum::{extract::State, Json};
use serde_json::Value;
use std::sync::Arc;

use crate::error::ApiResult;
use crate::pipeline::RequestIdentity;
use crate::AppState;

pub const WELCOME_TEXT: &str = "Bem vindo ao desafio técnico DevOps Globo!";

// ─── GET /texto ──────────────────────────────────────────────────

pub async fn get_texto(
    State(state): State<Arc<AppState>>,
    req: RequestIdentity,
) -> ApiResult<Json<Value>> {
    state.routes.texto.call(req).await.map(Json)
}

pub async fn welcome_text(_req: RequestIdentity) -> ApiResult<Value> {
    Ok(Value::from(WELCOME_TEXT))
}
