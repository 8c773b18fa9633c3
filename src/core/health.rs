use axum::{http::StatusCode, routing::get, Router};

/// Liveness check, no auth and no upstream calls
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is up"))
)]
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

pub fn routes() -> Router {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_test::TestServer;

    #[tokio::test]
    async fn test_health_is_ok() {
        let server = TestServer::new(routes()).unwrap();
        server.get("/health").await.assert_status_ok();
    }
}
