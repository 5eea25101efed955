use anyhow::anyhow;
use axum::body::Body;
use axum::http::StatusCode;
use axum::{extract::Request, response::Response};
use axum::middleware::Next;

use academy_common::EnvVars;

use crate::response::AppError;
use crate::utils::extract_bearer_token;
use crate::env::ApiServerEnv;

/// Lets a request through only when its bearer token equals `DRAW_PASSWORD`.
pub async fn admin_only(
    req: Request, next: Next
) -> Result<Response<Body>, AppError> {
    let env = ApiServerEnv::load();
    let password = env.get_env_var("DRAW_PASSWORD");
    if password.is_empty() {
        return Err(AppError::new(StatusCode::FORBIDDEN, anyhow!("admin routes are disabled")));
    }

    let token = extract_bearer_token(&req)?;
    if token != password {
        tracing::warn!("[admin_only] rejected {} {}", req.method(), req.uri().path());
        return Err(AppError::new(StatusCode::UNAUTHORIZED, anyhow!("invalid admin password")));
    }

    Ok(next.run(req).await)
}
