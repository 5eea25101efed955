use anyhow::anyhow;
use axum::extract::Request;
use axum::http::{header, StatusCode};
use tracing_subscriber::EnvFilter;

use crate::response::AppError;

pub fn extract_bearer_token(req: &Request) -> Result<String, AppError> {
    let auth_header = req.headers().get(header::AUTHORIZATION);

    match auth_header {
        Some(value) => {
            let value = value
                .to_str()?
                .split_whitespace()
                .collect::<Vec<_>>();

            if value.len() != 2 || value[0] != "Bearer" {
                return Err(AppError::new(
                    StatusCode::UNAUTHORIZED,
                    anyhow!("invalid authorization header"),
                ));
            }

            Ok(value[1].to_string())
        }
        _ => {
            Err(AppError::new(
                StatusCode::UNAUTHORIZED,
                anyhow!("missing authorization header"),
            ))
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default `info` level.
pub fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

#[cfg(test)]
mod tests {
    use axum::body::Body;

    use super::*;

    fn request(auth: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/exports/merge");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn reads_bearer_token() {
        assert_eq!(extract_bearer_token(&request(Some("Bearer s3cret"))).unwrap(), "s3cret");
    }

    #[test]
    fn rejects_malformed_headers() {
        for auth in [None, Some("Basic abc"), Some("Bearer"), Some("Bearer a b")] {
            let err = extract_bearer_token(&request(auth)).unwrap_err();
            assert_eq!(err.0, StatusCode::UNAUTHORIZED);
        }
    }
}
