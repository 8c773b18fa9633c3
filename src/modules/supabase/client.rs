use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::core::config::SupabaseConfig;
use crate::core::error::{AppError, Result};

/// Identity a BaaS request is made as
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    /// Anonymous request, the anon key doubles as bearer token
    Anon,
    /// Request on behalf of a signed-in user
    User(&'a str),
}

/// Client for the hosted Postgres/Auth/Storage platform
pub struct SupabaseClient {
    pub(super) http_client: Client,
    pub(super) base_url: String,
    pub(super) anon_key: String,
    pub(super) bucket: String,
    pub(super) signed_url_expiry_secs: u64,
}

/// Error body shapes returned by GoTrue and PostgREST
#[derive(Debug, Default, Deserialize)]
struct UpstreamErrorBody {
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl UpstreamErrorBody {
    fn code(&self) -> Option<String> {
        match &self.code {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => self.error_code.clone(),
        }
    }

    fn message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
    }
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "BaaS client configured for {} (bucket: {})",
            config.url,
            config.storage_bucket
        );

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            bucket: config.storage_bucket.clone(),
            signed_url_expiry_secs: config.signed_url_expiry_secs,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn signed_url_expiry_secs(&self) -> u64 {
        self.signed_url_expiry_secs
    }

    /// Attach `apikey` and bearer headers for the given identity
    pub(super) fn authorize(&self, builder: RequestBuilder, auth: Auth<'_>) -> RequestBuilder {
        let bearer = match auth {
            Auth::Anon => self.anon_key.as_str(),
            Auth::User(token) => token,
        };
        builder.header("apikey", &self.anon_key).bearer_auth(bearer)
    }

    /// Send a request, mapping transport failures and non-2xx statuses to `AppError`
    pub(super) async fn send(&self, builder: RequestBuilder, context: &str) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            tracing::error!("BaaS request failed ({}): {}", context, e);
            AppError::Upstream {
                status: 502,
                message: format!("Failed to reach backend service: {}", e),
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!("BaaS error ({}): HTTP {} - {}", context, status, body);
        Err(map_upstream_error(status, &body))
    }

    pub(super) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = self.send(builder, context).await?;
        response.json::<T>().await.map_err(|e| {
            tracing::error!("Failed to parse BaaS response ({}): {}", context, e);
            AppError::Upstream {
                status: 502,
                message: format!("Failed to parse backend response: {}", e),
            }
        })
    }
}

/// Translate an upstream status and body into the matching application error
pub fn map_upstream_error(status: StatusCode, body: &str) -> AppError {
    let parsed: UpstreamErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = parsed.code().unwrap_or_default();
    let message = parsed
        .message()
        .unwrap_or_else(|| format!("Backend service returned HTTP {}", status.as_u16()));

    if code == "PGRST116" || status == StatusCode::NOT_FOUND {
        return AppError::NotFound(message);
    }
    if code == "23505" || status == StatusCode::CONFLICT {
        return AppError::Conflict(message);
    }
    if code == "42501" || status == StatusCode::FORBIDDEN {
        return AppError::Forbidden(message);
    }

    match status {
        StatusCode::UNAUTHORIZED => AppError::Unauthorized(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => AppError::BadRequest(message),
        _ => AppError::Upstream {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_postgrest_single_row_miss() {
        let body = r#"{"code":"PGRST116","details":"The result contains 0 rows","hint":null,"message":"JSON object requested, multiple (or no) rows returned"}"#;
        assert!(matches!(
            map_upstream_error(StatusCode::NOT_ACCEPTABLE, body),
            AppError::NotFound(_)
        ));
    }

    #[test]
    fn test_map_unique_violation() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#;
        assert!(matches!(
            map_upstream_error(StatusCode::CONFLICT, body),
            AppError::Conflict(_)
        ));
    }

    #[test]
    fn test_map_gotrue_errors() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        match map_upstream_error(StatusCode::BAD_REQUEST, body) {
            AppError::BadRequest(msg) => assert_eq!(msg, "Invalid login credentials"),
            other => panic!("unexpected error: {:?}", other),
        }

        let body = r#"{"code":401,"msg":"invalid JWT"}"#;
        assert!(matches!(
            map_upstream_error(StatusCode::UNAUTHORIZED, body),
            AppError::Unauthorized(_)
        ));
    }

    #[test]
    fn test_map_unknown_status_is_upstream() {
        match map_upstream_error(StatusCode::SERVICE_UNAVAILABLE, "not json") {
            AppError::Upstream { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "Backend service returned HTTP 503");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_map_rls_violation() {
        let body = r#"{"code":"42501","message":"new row violates row-level security policy"}"#;
        assert!(matches!(
            map_upstream_error(StatusCode::UNAUTHORIZED, body),
            AppError::Forbidden(_)
        ));
    }
}
