use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;

use crate::core::error::{AppError, Result};
use crate::modules::supabase::{BaasUser, SupabaseClient};

const TOKEN_AUDIENCE: &str = "authenticated";

/// Validates access tokens issued by the BaaS auth service
///
/// With a JWT secret configured, tokens are verified locally (HS256).
/// Otherwise each token is resolved through the auth `/user` endpoint.
pub struct TokenValidator {
    client: Arc<SupabaseClient>,
    decoding_key: Option<DecodingKey>,
}

#[derive(Debug, Clone, Deserialize)]
struct Claims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
    #[serde(rename = "exp")]
    _exp: u64,
}

impl TokenValidator {
    pub fn new(client: Arc<SupabaseClient>, jwt_secret: Option<&str>) -> Self {
        Self {
            client,
            decoding_key: jwt_secret.map(|s| DecodingKey::from_secret(s.as_bytes())),
        }
    }

    pub fn validates_locally(&self) -> bool {
        self.decoding_key.is_some()
    }

    pub async fn validate_token(&self, token: &str) -> Result<BaasUser> {
        match &self.decoding_key {
            Some(key) => Self::validate_locally(token, key),
            None => self.client.get_user(token).await.map_err(|e| {
                tracing::debug!("Remote token validation failed: {}", e);
                AppError::Unauthorized("Invalid or expired token".to_string())
            }),
        }
    }

    fn validate_locally(token: &str, key: &DecodingKey) -> Result<BaasUser> {
        let header =
            decode_header(token).map_err(|e| AppError::Unauthorized(e.to_string()))?;

        if header.alg != Algorithm::HS256 {
            return Err(AppError::Unauthorized(format!(
                "Unsupported algorithm: {:?}",
                header.alg
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[TOKEN_AUDIENCE]);

        let claims = decode::<Claims>(token, key, &validation)
            .map_err(|e| AppError::Unauthorized(e.to_string()))?
            .claims;

        Ok(BaasUser {
            id: claims.sub,
            email: claims.email,
            user_metadata: claims.user_metadata,
            created_at: None,
            updated_at: None,
            email_confirmed_at: None,
        })
    }
}
