use axum::{extract::State, Json};
use serde_json::Value;
use std::sync::Arc;

use crate::error::ApiResult;
use crate::pipeline::RequestIdentity;
use crate::AppState;

/// `DD/MM/YYYY HH:MM:SS`
pub const CLOCK_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

pub const CLOCK_PREFIX: &str = "Hora do servidor: ";

// ─── GET /hora ───────────────────────────────────────────────────

pub async fn get_hora(
    State(state): State<Arc<AppState>>,
    req: RequestIdentity,
) -> ApiResult<Json<Value>> {
    state.routes.hora.call(req).await.map(Json)
}

/// Server local time, rendered with [`CLOCK_FORMAT`].
pub async fn server_time(_req: RequestIdentity) -> ApiResult<Value> {
    let now = chrono::Local::now().format(CLOCK_FORMAT);
    Ok(Value::String(format!("{CLOCK_PREFIX}{now}")))
}
