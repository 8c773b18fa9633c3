use std::sync::Arc;
use std::time::Duration;

use axum::{extract::Request, middleware::Next, Router};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};

use crate::core::config::SupabaseConfig;
use crate::features::auth::model::{AuthenticatedUser, Role};
use crate::modules::supabase::SupabaseClient;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret";
pub const TEST_ACCESS_TOKEN: &str = "test-access-token";

pub fn test_supabase_config(base_url: &str) -> SupabaseConfig {
    SupabaseConfig {
        url: base_url.to_string(),
        anon_key: "anon.key.sig".to_string(),
        jwt_secret: None,
        storage_bucket: "documents".to_string(),
        signed_url_expiry_secs: 3600,
        http_timeout: Duration::from_secs(5),
    }
}

pub fn test_supabase_client(base_url: &str) -> Arc<SupabaseClient> {
    Arc::new(SupabaseClient::new(&test_supabase_config(base_url)).unwrap())
}

/// Sign an HS256 access token shaped like the BaaS ones
pub fn sign_test_token(secret: &str, sub: &str, aud: &str, exp_offset_secs: i64) -> String {
    let claims = json!({
        "sub": sub,
        "aud": aud,
        "email": format!("{}@example.com", sub),
        "role": "authenticated",
        "user_metadata": { "username": sub },
        "exp": Utc::now().timestamp() + exp_offset_secs,
    });

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// Serve `router` as a stand-in BaaS on an ephemeral port, returning its base URL
pub async fn spawn_fake_baas(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn create_user(id: &str, role: Role) -> AuthenticatedUser {
    AuthenticatedUser {
        id: id.to_string(),
        email: Some(format!("{}@example.com", id)),
        user_metadata: json!({ "username": id, "name": "Test User" }),
        created_at: Some(Utc::now()),
        updated_at: Some(Utc::now()),
        role,
        role_assigned: true,
        access_token: TEST_ACCESS_TOKEN.to_string(),
    }
}

/// Attach a fixed user to every request, standing in for `auth_middleware`
pub fn with_user(router: Router, user: AuthenticatedUser) -> Router {
    router.layer(axum::middleware::from_fn(
        move |mut request: Request, next: Next| {
            let user = user.clone();
            async move {
                request.extensions_mut().insert(user);
                next.run(request).await
            }
        },
    ))
}

/// Pull the `data` field out of a success envelope
pub fn data_of(body: &Value) -> &Value {
    assert_eq!(body["success"], true, "not a success envelope: {}", body);
    &body["data"]
}
