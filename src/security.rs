use crate::models::ApiError;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{self, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{collections::HashMap, convert::Infallible, env, sync::Arc};
use tracing::{info, warn};

/// Operator keys for the run endpoints. Each run is attributed to the
/// operator that triggered it.
#[derive(Clone, Default)]
pub struct AuthState {
    records: Arc<HashMap<String, AuthContext>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuthContext {
    pub operator: String,
    pub api_key_id: String,
}

impl AuthState {
    pub fn from_env() -> Self {
        let raw = env::var("PUBLISHER_API_KEYS").unwrap_or_default();
        Self::from_pairs(&raw)
    }

    /// Parses `operator:key` pairs separated by commas.
    pub fn from_pairs(raw: &str) -> Self {
        let records = parse_keys(raw);
        if records.is_empty() {
            warn!(
                target = "hermes.api",
                "PUBLISHER_API_KEYS produced no keys; run endpoints will reject every request"
            );
        } else {
            info!(target = "hermes.api", key_count = records.len(), "loaded API keys");
        }
        Self {
            records: Arc::new(records),
        }
    }

    fn authenticate(&self, presented: &str) -> Option<AuthContext> {
        self.records.get(presented).cloned()
    }
}

pub async fn require_api_auth(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Infallible> {
    let Some(presented) = extract_api_key(request.headers()) else {
        return Ok(unauthorized_response(
            "missing_api_key",
            "Provide X-Hermes-Key or Bearer token",
        ));
    };

    let Some(context) = state.authenticate(&presented) else {
        warn!(target = "hermes.api", "rejected unknown API key");
        return Ok(unauthorized_response("invalid_api_key", "Key not recognized"));
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn extract_api_key(headers: &http::HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(http::header::AUTHORIZATION)
        && let Ok(raw) = value.to_str()
        && raw.len() >= 7
        && raw[..6].eq_ignore_ascii_case("bearer")
    {
        return Some(raw[6..].trim().to_string());
    }
    headers
        .get("X-Hermes-Key")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn unauthorized_response(code: &str, message: &str) -> Response {
    let payload = ApiError {
        error: code.to_string(),
        detail: Some(message.to_string()),
    };
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

fn parse_keys(raw: &str) -> HashMap<String, AuthContext> {
    let mut entries = HashMap::new();
    for (idx, token) in raw.split(',').enumerate() {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut parts = trimmed.splitn(2, ':');
        let operator = parts.next().map(str::trim).filter(|s| !s.is_empty());
        let key = parts.next().map(str::trim).filter(|s| !s.is_empty());
        match (operator, key) {
            (Some(operator), Some(secret)) => {
                entries.insert(
                    secret.to_string(),
                    AuthContext {
                        operator: operator.to_string(),
                        api_key_id: format!("key-{:02}", idx + 1),
                    },
                );
            }
            _ => warn!(
                target = "hermes.api",
                entry = idx + 1,
                "ignored malformed PUBLISHER_API_KEYS entry"
            ),
        }
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn parses_operator_pairs_and_skips_malformed() {
        let keys = parse_keys("ania:k1, broken ,:k3, marek:k2");
        assert_eq!(keys.len(), 2);
        assert_eq!(
            keys.get("k2"),
            Some(&AuthContext {
                operator: "marek".into(),
                api_key_id: "key-04".into(),
            })
        );
    }

    #[test]
    fn bearer_wins_over_custom_header() {
        let mut headers = http::HeaderMap::new();
        headers.insert("X-Hermes-Key", HeaderValue::from_static("custom"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("custom"));
        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer  token-1 "),
        );
        assert_eq!(extract_api_key(&headers).as_deref(), Some("token-1"));
    }

    #[test]
    fn empty_key_list_accepts_nothing() {
        let state = AuthState::from_pairs("");
        assert!(state.authenticate("").is_none());
        assert!(state.authenticate("secret").is_none());
    }
}
