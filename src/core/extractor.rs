use axum::{
    body::Body,
    extract::{rejection::JsonRejection, ConnectInfo, FromRequest, FromRequestParts, Path, Request},
    http::{request::Parts, Extensions, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;

/// Custom JSON extractor that provides consistent error responses
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppJsonRejection;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(value) => Ok(Self(value.0)),
            Err(rejection) => Err(AppJsonRejection(rejection)),
        }
    }
}

pub struct AppJsonRejection(JsonRejection);

impl IntoResponse for AppJsonRejection {
    fn into_response(self) -> Response {
        let message = match self.0 {
            JsonRejection::JsonDataError(err) => format!("Invalid JSON data: {}", err),
            JsonRejection::JsonSyntaxError(err) => format!("Invalid JSON syntax: {}", err),
            JsonRejection::MissingJsonContentType(err) => {
                format!("Missing JSON content type: {}", err)
            }
            _ => "Failed to parse JSON body".to_string(),
        };

        AppError::BadRequest(message).into_response()
    }
}

/// Single UUID path parameter; anything else is a 400
pub struct UuidPath(pub Uuid);

impl<S> FromRequestParts<S> for UuidPath
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        parse_uuid(&raw, "id").map(UuidPath)
    }
}

/// Parse a UUID supplied by the client, naming the field in the error
pub fn parse_uuid(raw: &str, field: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::BadRequest(format!("Invalid {} format, expected a UUID", field)))
}

/// First `X-Forwarded-For` entry, else the peer address. Only fit for
/// keying rate limits, the header is client controlled.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
}

/// Proxy addresses whose `X-Forwarded-For` entries are believed.
///
/// Installed as a request extension; when absent no proxy is trusted.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies(Arc<Vec<IpAddr>>);

impl TrustedProxies {
    pub fn new(proxies: Vec<IpAddr>) -> Self {
        Self(Arc::new(
            proxies.into_iter().map(|ip| ip.to_canonical()).collect(),
        ))
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        self.0.contains(&ip.to_canonical())
    }

    /// Walk forwarded hops right to left from a trusted peer and return the
    /// first untrusted one. An untrusted peer is returned as is.
    pub fn resolve(&self, peer: Option<IpAddr>, headers: &HeaderMap) -> Option<IpAddr> {
        let peer = peer?;
        if !self.contains(peer) {
            return Some(peer);
        }

        let hops: Vec<&str> = headers
            .get_all("x-forwarded-for")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|hop| !hop.is_empty())
            .collect();

        let mut client = peer;
        for hop in hops.iter().rev() {
            // An unreadable hop means the chain cannot be trusted past it
            let ip: IpAddr = hop.parse().ok()?;
            client = ip;
            if !self.contains(ip) {
                break;
            }
        }
        Some(client)
    }
}

/// Caller IP address as seen through trusted proxies, `None` when unknown
pub struct ClientIp(pub Option<IpAddr>);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let trusted = parts
            .extensions
            .get::<TrustedProxies>()
            .cloned()
            .unwrap_or_default();

        Ok(ClientIp(trusted.resolve(peer, &parts.headers)))
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use axum_test::TestServer;

    async fn echo(UuidPath(id): UuidPath) -> String {
        id.to_string()
    }

    #[tokio::test]
    async fn test_uuid_path() {
        let server = TestServer::new(Router::new().route("/items/{id}", get(echo))).unwrap();

        let id = Uuid::new_v4();
        server
            .get(&format!("/items/{}", id))
            .await
            .assert_text(id.to_string());

        let response = server.get("/items/not-a-uuid").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[test]
    fn test_parse_uuid_names_field() {
        match parse_uuid("nope", "document_id") {
            Err(AppError::BadRequest(msg)) => assert!(msg.contains("document_id")),
            other => panic!("unexpected: {:?}", other.map(|u| u.to_string())),
        }
    }

    fn ip(raw: &str) -> IpAddr {
        raw.parse().unwrap()
    }

    fn forwarded(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", axum::http::HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_untrusted_peer_ignores_forwarded_header() {
        let trusted = TrustedProxies::default();
        let headers = forwarded("203.0.113.7");

        assert_eq!(
            trusted.resolve(Some(ip("198.51.100.66")), &headers),
            Some(ip("198.51.100.66"))
        );
        assert_eq!(trusted.resolve(None, &headers), None);
    }

    #[test]
    fn test_trusted_peer_yields_rightmost_untrusted_hop() {
        let trusted = TrustedProxies::new(vec![ip("10.0.0.1"), ip("10.0.0.2")]);

        let headers = forwarded("203.0.113.7, 198.51.100.66, 10.0.0.2");
        assert_eq!(
            trusted.resolve(Some(ip("10.0.0.1")), &headers),
            Some(ip("198.51.100.66"))
        );

        let headers = forwarded("garbage, 10.0.0.2");
        assert_eq!(trusted.resolve(Some(ip("10.0.0.1")), &headers), None);

        assert_eq!(
            trusted.resolve(Some(ip("::ffff:10.0.0.1")), &HeaderMap::new()),
            Some(ip("::ffff:10.0.0.1"))
        );
    }

    #[tokio::test]
    async fn test_client_ip_extractor_uses_peer_address() {
        use axum::extract::connect_info::MockConnectInfo;

        async fn show(ClientIp(ip): ClientIp) -> String {
            ip.map(|ip| ip.to_string()).unwrap_or_default()
        }

        let app = Router::new()
            .route("/ip", get(show))
            .layer(MockConnectInfo(SocketAddr::from(([198, 51, 100, 66], 4000))));
        let server = TestServer::new(app).unwrap();

        server
            .get("/ip")
            .add_header(
                axum::http::HeaderName::from_static("x-forwarded-for"),
                axum::http::HeaderValue::from_static("203.0.113.7"),
            )
            .await
            .assert_text("198.51.100.66");
    }
}
