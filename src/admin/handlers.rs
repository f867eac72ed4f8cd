use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::http::server::AppState;
use crate::resilience::BreakerSnapshot;

/// Operator escape hatch: force a breaker back to closed.
pub async fn reset_breaker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BreakerSnapshot>, StatusCode> {
    let breaker = state.ctx.breakers.get(&name).ok_or(StatusCode::NOT_FOUND)?;
    breaker.reset();
    tracing::info!(breaker = %name, "Breaker reset by operator");
    Ok(Json(breaker.snapshot()))
}
