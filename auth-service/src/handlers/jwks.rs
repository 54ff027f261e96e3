//! Public key distribution for access token verification by relying parties.

use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::services::Jwks;
use crate::AppState;

/// `GET /.well-known/jwks.json`
pub async fn get(State(state): State<AppState>) -> Result<Json<Jwks>, AppError> {
    let jwks = state.jwt.get_jwks().map_err(AppError::Internal)?;
    Ok(Json(jwks))
}
