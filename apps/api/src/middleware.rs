use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use keyward_core::AppError;
use subtle::ConstantTimeEq;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn require_admin_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .unwrap_or_default();

    if !tokens_match(presented, &state.admin_token) {
        return Err(AppError::Unauthorized("admin bearer token required".to_owned()).into());
    }

    Ok(next.run(request).await)
}

fn tokens_match(presented: &str, expected: &str) -> bool {
    bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}
