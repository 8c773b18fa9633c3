use crate::core::error::AppError;
use crate::features::auth::cookies::{with_session_cookies, without_session_cookies};
use crate::features::auth::{Authenticated, Authenticator};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use base64::prelude::*;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestId, RequestId};
use tracing::Span;
use uuid::Uuid;

/// Request ID generator using UUID v7 (time-ordered)
#[derive(Clone, Copy)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Custom MakeSpan that includes request_id in the tracing span
#[derive(Clone, Debug)]
pub struct MakeSpanWithRequestId;

impl<B> tower_http::trace::MakeSpan<B> for MakeSpanWithRequestId {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> Span {
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

/// CORS for the browser frontend
///
/// Explicit origins allow credentials so session cookies travel; a `*` entry
/// opens every origin but then credentials cannot be allowed.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE]);

    if allowed_origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(AllowOrigin::list(origins))
            .allow_credentials(true)
    }
}

/// Basic auth guard in front of the Swagger UI
pub async fn swagger_auth_middleware(
    State(credentials): State<Arc<String>>,
    req: Request,
    next: Next,
) -> Response {
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Basic "))
        .and_then(|encoded| BASE64_STANDARD.decode(encoded).ok())
        .and_then(|decoded| String::from_utf8(decoded).ok())
        .is_some_and(|creds| creds == *credentials);

    if authorized {
        return next.run(req).await;
    }

    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"Swagger UI\"")],
        "Unauthorized",
    )
        .into_response()
}

/// Resolve the caller and attach `AuthenticatedUser` to the request
///
/// A session renewed on the way is written back as cookies on the response.
/// When authentication fails for good, both session cookies are cleared.
pub async fn auth_middleware(
    State(authenticator): State<Arc<Authenticator>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    match authenticator.authenticate(&jar, req.headers()).await {
        Ok(Authenticated { user, refreshed }) => {
            req.extensions_mut().insert(user);
            let response = next.run(req).await;

            match refreshed {
                Some(session) => {
                    let jar = with_session_cookies(jar, authenticator.cookie_config(), &session);
                    (jar, response).into_response()
                }
                None => response,
            }
        }
        Err(err @ AppError::Unauthorized(_)) => {
            let jar = without_session_cookies(jar, authenticator.cookie_config());
            (jar, err).into_response()
        }
        Err(err) => err.into_response(),
    }
}
