use crate::features::auth::handlers;
use crate::features::auth::services::AuthService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Public auth routes (no authentication required)
pub fn public_routes(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh_token))
        .route("/auth/forgot-password", post(handlers::forgot_password))
        .with_state(service)
}

/// Protected auth routes (require an authenticated session)
pub fn protected_routes(service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/auth/me", get(handlers::get_me))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/admin/assign-role", post(handlers::assign_role))
        .route("/auth/admin/users", get(handlers::list_users))
        .with_state(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::CookieConfig;
    use crate::features::auth::model::Role;
    use crate::features::auth::roles::RoleService;
    use crate::shared::test_helpers::{
        create_user, data_of, spawn_fake_baas, test_supabase_client, with_user,
    };
    use axum::{
        extract::RawQuery,
        http::{header, HeaderValue, StatusCode},
        Json,
    };
    use axum_test::{TestResponse, TestServer};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const FRONTEND: &str = "https://app.example.com";

    fn session_json(user_id: &str) -> Value {
        json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "expires_in": 3600,
            "token_type": "bearer",
            "user": {
                "id": user_id,
                "email": "ana@example.com",
                "user_metadata": { "username": "ana", "name": "Ana Diaz" }
            }
        })
    }

    fn invalid_grant(description: &str) -> (StatusCode, Json<Value>) {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": description })),
        )
    }

    /// Token endpoint accepting one password and two refresh tokens
    fn token_routes(router: Router) -> Router {
        router.route(
            "/auth/v1/token",
            post(|Json(body): Json<Value>| async move {
                if let Some(password) = body.get("password") {
                    if body["email"] == "ana@example.com" && password == "correct-horse" {
                        return (StatusCode::OK, Json(session_json("user-1")));
                    }
                    return invalid_grant("Invalid login credentials");
                }
                match body["refresh_token"].as_str() {
                    Some("cookie-refresh") | Some("body-refresh") => {
                        (StatusCode::OK, Json(session_json("user-1")))
                    }
                    _ => invalid_grant("Invalid Refresh Token: Refresh Token Not Found"),
                }
            }),
        )
    }

    fn roles_route(router: Router, rows: Value) -> Router {
        router.route(
            "/rest/v1/user_roles",
            get(move || {
                let rows = rows.clone();
                async move { Json(rows) }
            })
            .post(|Json(body): Json<Value>| async move { (StatusCode::CREATED, Json(body)) }),
        )
    }

    async fn public_server(baas: Router) -> TestServer {
        let url = spawn_fake_baas(baas).await;
        let client = test_supabase_client(&url);
        let roles = Arc::new(RoleService::new(client.clone()));
        let service = Arc::new(AuthService::new(
            client,
            roles,
            FRONTEND.to_string(),
            CookieConfig::default(),
        ));
        TestServer::new(public_routes(service)).unwrap()
    }

    async fn protected_server(
        baas: Router,
        user: crate::features::auth::model::AuthenticatedUser,
    ) -> TestServer {
        let url = spawn_fake_baas(baas).await;
        let client = test_supabase_client(&url);
        let roles = Arc::new(RoleService::new(client.clone()));
        let service = Arc::new(AuthService::new(
            client,
            roles,
            FRONTEND.to_string(),
            CookieConfig::default(),
        ));
        TestServer::new(with_user(protected_routes(service), user)).unwrap()
    }

    fn set_cookies(response: &TestResponse) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(String::from))
            .collect()
    }

    fn clears_both_cookies(cookies: &[String]) -> bool {
        ["access_token=", "refresh_token="].iter().all(|name| {
            cookies
                .iter()
                .any(|c| c.starts_with(name) && c.contains("Max-Age=0"))
        })
    }

    #[tokio::test]
    async fn test_login_sets_session_cookies() {
        let baas = roles_route(
            token_routes(Router::new()).route(
                "/rest/v1/profiles",
                get(|| async { Json(json!([{ "user_id": "user-1" }])) }),
            ),
            json!([]),
        );
        let server = public_server(baas).await;

        let response = server
            .post("/auth/login")
            .json(&json!({ "email": "  Ana@Example.com ", "password": "correct-horse" }))
            .await;
        response.assert_status_ok();

        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("access_token=new-access")));
        assert!(cookies.iter().any(|c| c.starts_with("refresh_token=new-refresh")));
        assert!(cookies.iter().all(|c| c.contains("HttpOnly")));

        let body: Value = response.json();
        let data = data_of(&body);
        assert_eq!(data["user"]["id"], "user-1");
        assert_eq!(data["user"]["role"], "owner");
        assert_eq!(data["session"]["expires_in"], 3600);
    }

    #[tokio::test]
    async fn test_login_maps_invalid_credentials() {
        let server = public_server(roles_route(token_routes(Router::new()), json!([]))).await;

        let response = server
            .post("/auth/login")
            .json(&json!({ "email": "ana@example.com", "password": "wrong-horse" }))
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        let body: Value = response.json();
        assert_eq!(body["code"], "AUTH_ERROR");
        assert_eq!(body["error"], "Incorrect email or login details");
        assert!(set_cookies(&response).is_empty());

        server
            .post("/auth/login")
            .json(&json!({ "email": "not-an-email", "password": "correct-horse" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_pending_confirmation() {
        let role_inserts = Arc::new(AtomicUsize::new(0));
        let counted = role_inserts.clone();
        let baas = Router::new()
            .route(
                "/auth/v1/signup",
                post(|Json(body): Json<Value>| async move {
                    if body["email"] == "taken@example.com" {
                        return (
                            StatusCode::UNPROCESSABLE_ENTITY,
                            Json(json!({
                                "code": 422,
                                "error_code": "user_already_exists",
                                "msg": "User already registered"
                            })),
                        );
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "id": "user-9",
                            "email": body["email"],
                            "user_metadata": body["data"]
                        })),
                    )
                }),
            )
            // Anonymous profile insert refused by row-level security
            .route(
                "/rest/v1/profiles",
                post(|| async {
                    (
                        StatusCode::UNAUTHORIZED,
                        Json(json!({ "message": "new row violates row-level security policy" })),
                    )
                }),
            )
            .route(
                "/rest/v1/user_roles",
                post(move || {
                    counted.fetch_add(1, Ordering::SeqCst);
                    async { StatusCode::CREATED }
                }),
            );
        let server = public_server(baas).await;

        let response = server
            .post("/auth/register")
            .json(&json!({
                "email": "ana@example.com",
                "password": "hunter22",
                "username": "Ana_01",
                "name": "Ana Diaz"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        assert!(set_cookies(&response).is_empty());

        let body: Value = response.json();
        let data = data_of(&body);
        assert_eq!(data["user"]["id"], "user-9");
        assert_eq!(data["user"]["username"], "ana_01");
        assert_eq!(data["user"]["role"], "owner");
        assert!(data["session"].is_null());
        assert_eq!(role_inserts.load(Ordering::SeqCst), 0);

        let response = server
            .post("/auth/register")
            .json(&json!({
                "email": "taken@example.com",
                "password": "hunter22",
                "username": "taken",
                "name": "Someone"
            }))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"], "This email is already registered");
    }

    #[tokio::test]
    async fn test_register_with_session_assigns_default_role() {
        let baas = roles_route(
            Router::new()
                .route(
                    "/auth/v1/signup",
                    post(|| async { Json(session_json("user-9")) }),
                )
                .route(
                    "/rest/v1/profiles",
                    post(|Json(body): Json<Value>| async move { (StatusCode::CREATED, Json(body)) }),
                ),
            json!([]),
        );
        let server = public_server(baas).await;

        let response = server
            .post("/auth/register")
            .json(&json!({
                "email": "ana@example.com",
                "password": "hunter22",
                "username": "ana",
                "name": "Ana Diaz"
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let cookies = set_cookies(&response);
        assert!(cookies.iter().any(|c| c.starts_with("access_token=new-access")));

        server
            .post("/auth/register")
            .json(&json!({
                "email": "ana@example.com",
                "password": "hunter22",
                "username": "a",
                "name": "Ana Diaz"
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_refresh_prefers_body_then_cookie() {
        let baas = roles_route(
            token_routes(Router::new()),
            json!([{ "user_id": "user-1", "role": "auditor" }]),
        );
        let server = public_server(baas).await;

        let response = server
            .post("/auth/refresh")
            .add_header(
                header::COOKIE,
                HeaderValue::from_static("refresh_token=cookie-refresh"),
            )
            .await;
        response.assert_status_ok();
        assert!(set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("refresh_token=new-refresh")));
        let body: Value = response.json();
        assert_eq!(data_of(&body)["user"]["role"], "auditor");

        server
            .post("/auth/refresh")
            .add_header(header::COOKIE, HeaderValue::from_static("refresh_token=stale"))
            .json(&json!({ "refresh_token": "body-refresh" }))
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_cookies() {
        let server = public_server(roles_route(token_routes(Router::new()), json!([]))).await;

        let response = server
            .post("/auth/refresh")
            .add_header(
                header::COOKIE,
                HeaderValue::from_static("access_token=old; refresh_token=stale"),
            )
            .await;
        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(clears_both_cookies(&set_cookies(&response)));
        let body: Value = response.json();
        assert_eq!(body["error"], "Session could not be renewed");

        server
            .post("/auth/refresh")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_forgot_password_is_neutral() {
        let redirects = Arc::new(Mutex::new(Vec::<String>::new()));
        let seen = redirects.clone();
        let baas = Router::new().route(
            "/auth/v1/recover",
            post(move |RawQuery(query): RawQuery| {
                seen.lock().unwrap().push(query.unwrap_or_default());
                async {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({ "msg": "User not found" })),
                    )
                }
            }),
        );
        let server = public_server(baas).await;

        let response = server
            .post("/auth/forgot-password")
            .json(&json!({ "email": "nobody@example.com" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(
            body["message"],
            "If the email exists, you will receive reset instructions"
        );

        let redirects = redirects.lock().unwrap();
        assert_eq!(redirects.len(), 1);
        assert!(redirects[0].contains(&*urlencoding::encode(&format!(
            "{}/reset-password",
            FRONTEND
        ))));
    }

    #[tokio::test]
    async fn test_logout_clears_cookies_when_sign_out_fails() {
        let sign_outs = Arc::new(AtomicUsize::new(0));
        let counted = sign_outs.clone();
        let baas = Router::new().route(
            "/auth/v1/logout",
            post(move || {
                counted.fetch_add(1, Ordering::SeqCst);
                async { StatusCode::INTERNAL_SERVER_ERROR }
            }),
        );
        let server = protected_server(baas, create_user("user-1", Role::Owner)).await;

        let response = server
            .post("/auth/logout")
            .add_header(
                header::COOKIE,
                HeaderValue::from_static("access_token=a; refresh_token=r"),
            )
            .await;
        response.assert_status_ok();
        assert!(clears_both_cookies(&set_cookies(&response)));
        assert_eq!(sign_outs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_me_reports_role_status() {
        let mut pending = create_user("user-1", Role::Owner);
        pending.role_assigned = false;
        let server = protected_server(Router::new(), pending).await;

        let response = server.get("/auth/me").await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(data_of(&body)["status"], "pending_role_assignment");
        assert_eq!(data_of(&body)["role"], "owner");

        let server =
            protected_server(Router::new(), create_user("user-2", Role::Auditor)).await;
        let body: Value = server.get("/auth/me").await.json();
        assert_eq!(data_of(&body)["status"], "active");
    }

    #[tokio::test]
    async fn test_admin_endpoints_require_admin() {
        let rows = json!([
            { "user_id": "admin-1", "role": "admin" },
            { "user_id": "user-2", "role": "recipient" }
        ]);

        let owner =
            protected_server(roles_route(Router::new(), rows.clone()), create_user("user-1", Role::Owner))
                .await;
        let response = owner.get("/auth/admin/users").await;
        response.assert_status(StatusCode::FORBIDDEN);
        let body: Value = response.json();
        assert_eq!(body["code"], "PERMISSION_ERROR");
        owner
            .post("/auth/admin/assign-role")
            .json(&json!({ "user_id": "user-2", "role": "auditor" }))
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let admin =
            protected_server(roles_route(Router::new(), rows), create_user("admin-1", Role::Admin))
                .await;
        let body: Value = admin.get("/auth/admin/users").await.json();
        let users = data_of(&body);
        assert_eq!(users[0]["is_current_user"], true);
        assert_eq!(users[1]["is_current_user"], false);
        assert_eq!(body["meta"]["total"], 2);

        let response = admin
            .post("/auth/admin/assign-role")
            .json(&json!({ "user_id": "user-2", "role": "auditor" }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(data_of(&body)["role"], "auditor");

        admin
            .post("/auth/admin/assign-role")
            .json(&json!({ "user_id": "user-2", "role": "superuser" }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }
}
