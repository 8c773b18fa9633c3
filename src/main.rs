mod core;
mod features;
mod modules;
mod shared;

use crate::core::config::Config;
use crate::core::error::set_production_mode;
use crate::core::extractor::TrustedProxies;
use crate::core::health;
use crate::core::middleware;
use crate::core::openapi::{ApiDoc, SwaggerInfoModifier};
use crate::core::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::features::auth::routes as auth_routes;
use crate::features::auth::{AuthService, Authenticator, RoleService, TokenValidator};
use crate::features::documents::{routes as documents_routes, DocumentService};
use crate::features::shares::{routes as shares_routes, ShareService};
use crate::modules::supabase::SupabaseClient;
use axum::{extract::DefaultBodyLimit, middleware::from_fn_with_state, Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::Modify;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

fn main() -> anyhow::Result<()> {
    // Build Tokio runtime with configurable worker threads
    let worker_threads = std::env::var("TOKIO_WORKER_THREADS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .max_blocking_threads(worker_threads * 4)
        .enable_all()
        .build()?;

    runtime.block_on(async_main(worker_threads))
}

async fn async_main(worker_threads: usize) -> anyhow::Result<()> {
    // Load .env file BEFORE initializing logger so RUST_LOG is available
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    set_production_mode(config.app.environment.is_production());

    let available_cpus = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    tracing::info!(
        "System info: available_cpus={}, tokio_worker_threads={}, pid={}",
        available_cpus,
        worker_threads,
        std::process::id()
    );
    tracing::info!(
        "Configuration loaded ({:?} environment)",
        config.app.environment
    );

    // BaaS client shared by every service
    let supabase = Arc::new(SupabaseClient::new(&config.supabase)?);
    tracing::info!(
        "BaaS client initialized for {} (bucket: {})",
        supabase.base_url(),
        supabase.bucket()
    );

    // Auth
    let role_service = Arc::new(RoleService::new(Arc::clone(&supabase)));
    let token_validator = Arc::new(TokenValidator::new(
        Arc::clone(&supabase),
        config.supabase.jwt_secret.as_deref(),
    ));
    if token_validator.validates_locally() {
        tracing::info!("Access tokens validated locally (HS256)");
    } else {
        tracing::info!("Access tokens validated against the BaaS auth endpoint");
    }
    let authenticator = Arc::new(Authenticator::new(
        Arc::clone(&token_validator),
        Arc::clone(&role_service),
        Arc::clone(&supabase),
        config.cookies.clone(),
    ));
    let auth_service = Arc::new(AuthService::new(
        Arc::clone(&supabase),
        Arc::clone(&role_service),
        config.app.frontend_url.clone(),
        config.cookies.clone(),
    ));
    tracing::info!("Auth services initialized");

    let document_service = Arc::new(DocumentService::new(Arc::clone(&supabase)));
    let share_service = Arc::new(ShareService::new(
        Arc::clone(&supabase),
        &config.app.frontend_url,
    ));
    tracing::info!("Document and share services initialized");

    // In-process rate limiting with periodic purge of stale windows
    let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));
    rate_limiter.spawn_cleanup_task(config.rate_limit.cleanup_interval);
    if config.app.trusted_proxies.is_empty() {
        tracing::info!("No trusted proxies, share token IP checks use the peer address");
    } else {
        tracing::info!("Trusted proxies: {:?}", config.app.trusted_proxies);
    }
    tracing::info!(
        "Rate limiting: {} requests per {:?}",
        config.rate_limit.max_requests,
        config.rate_limit.window
    );

    // Build application router with dynamic swagger config
    let swagger_modifier = SwaggerInfoModifier {
        title: config.swagger.title.clone(),
        version: config.swagger.version.clone(),
        description: config.swagger.description.clone(),
    };

    let mut openapi = ApiDoc::openapi();
    swagger_modifier.modify(&mut openapi);

    let swagger = if let Some(credentials) = config.swagger.credentials() {
        tracing::info!("Swagger UI basic auth enabled");
        Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
            .layer(from_fn_with_state(
                Arc::new(credentials),
                middleware::swagger_auth_middleware,
            ))
    } else {
        tracing::info!("Swagger UI basic auth disabled (no credentials configured)");
        Router::new().merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
    };

    // Protected routes: authentication runs first so limits are keyed per user
    let protected_routes = Router::new()
        .merge(auth_routes::protected_routes(Arc::clone(&auth_service)))
        .merge(documents_routes(document_service))
        .merge(shares_routes(share_service))
        .route_layer(from_fn_with_state(
            Arc::clone(&rate_limiter),
            rate_limit_middleware,
        ))
        .route_layer(from_fn_with_state(
            Arc::clone(&authenticator),
            middleware::auth_middleware,
        ));

    // Public routes are limited per client IP
    let public_routes = Router::new()
        .merge(auth_routes::public_routes(auth_service))
        .route_layer(from_fn_with_state(
            Arc::clone(&rate_limiter),
            rate_limit_middleware,
        ));

    let app = Router::new()
        .merge(swagger)
        .merge(protected_routes)
        .merge(public_routes)
        .merge(health::routes())
        .layer(DefaultBodyLimit::max(config.app.max_request_body_size))
        .layer(Extension(TrustedProxies::new(
            config.app.trusted_proxies.clone(),
        )))
        .layer(middleware::cors_layer(&config.app.cors_allowed_origins))
        // Propagate X-Request-Id to response headers
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::MakeSpanWithRequestId)
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Generate X-Request-Id using UUID v7 (or use client-provided one)
        .layer(SetRequestIdLayer::x_request_id(middleware::MakeRequestUuid));

    // Start server
    let addr = config.app.server_address();
    let socket_addr: SocketAddr = addr
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid address: {}", e))?;

    // Use socket2 for TCP listener configuration
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(socket_addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    #[cfg(unix)]
    socket.set_reuse_port(true)?;
    socket.set_nodelay(true)?;

    socket.set_recv_buffer_size(256 * 1024)?;
    socket.set_send_buffer_size(256 * 1024)?;

    #[cfg(target_os = "linux")]
    {
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(std::time::Duration::from_secs(60))
            .with_interval(std::time::Duration::from_secs(10))
            .with_retries(3);
        socket.set_tcp_keepalive(&keepalive)?;
    }
    #[cfg(not(target_os = "linux"))]
    {
        let keepalive = socket2::TcpKeepalive::new().with_time(std::time::Duration::from_secs(60));
        socket.set_tcp_keepalive(&keepalive)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&socket_addr.into())?;
    socket.listen(65535)?;

    let listener = tokio::net::TcpListener::from_std(socket.into())?;
    tracing::info!("Server listening on {}", format!("http://{}", addr));
    tracing::info!(
        "Swagger UI available at {}",
        format!("http://{}/swagger-ui/", addr)
    );

    // Peer addresses feed rate limiting and share-token IP checks
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
