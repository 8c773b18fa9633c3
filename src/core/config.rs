use std::env;
use std::net::IpAddr;
use std::time::Duration;

use reqwest::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub supabase: SupabaseConfig,
    pub cookies: CookieConfig,
    pub rate_limit: RateLimitConfig,
    pub swagger: SwaggerConfig,
}

/// Runtime environment, decides how much error detail reaches clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub cors_allowed_origins: Vec<String>,
    pub max_request_body_size: usize,
    pub frontend_url: String,
    /// Reverse proxies allowed to report the client address via `X-Forwarded-For`
    pub trusted_proxies: Vec<IpAddr>,
}

/// Connection settings for the hosted Postgres/Auth/Storage platform
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project base URL (e.g. https://xyz.supabase.co)
    pub url: String,
    /// Public anon key, sent as `apikey` on every request
    pub anon_key: String,
    /// JWT secret; when present access tokens are validated locally
    pub jwt_secret: Option<String>,
    /// Storage bucket holding uploaded document files
    pub storage_bucket: String,
    /// Signed URL lifetime in seconds
    pub signed_url_expiry_secs: u64,
    pub http_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub domain: Option<String>,
    pub secure: bool,
    pub access_max_age: Duration,
    pub refresh_max_age: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
    pub cleanup_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct SwaggerConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        // Load .env file if exists, ignore if not found (optional for production)
        if let Err(e) = dotenvy::dotenv() {
            if !e.to_string().contains("not found") {
                eprintln!("Warning: Error loading .env file: {}", e);
            }
        }

        let app = AppConfig::from_env()?;
        let cookies = CookieConfig::from_env(app.environment)?;

        Ok(Config {
            supabase: SupabaseConfig::from_env()?,
            rate_limit: RateLimitConfig::from_env()?,
            swagger: SwaggerConfig::from_env()?,
            cookies,
            app,
        })
    }
}

impl AppConfig {
    const DEFAULT_PORT: u16 = 3001;
    const DEFAULT_MAX_REQUEST_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

    pub fn from_env() -> Result<Self, String> {
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT")
            .unwrap_or_else(|_| Self::DEFAULT_PORT.to_string())
            .parse::<u16>()
            .map_err(|e| format!("Invalid PORT: {}", e))?;
        if port == 0 {
            return Err("PORT must be between 1 and 65535".to_string());
        }

        let environment = parse_environment(&env::var("APP_ENV").unwrap_or_default())?;

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        if !is_valid_url(&frontend_url) {
            return Err("FRONTEND_URL is not a valid URL".to_string());
        }

        // Cookies need explicit origins, so default to the frontend instead of "*"
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_else(|_| frontend_url.clone())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_request_body_size = env::var("MAX_REQUEST_BODY_SIZE")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_REQUEST_BODY_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| "MAX_REQUEST_BODY_SIZE must be a valid number".to_string())?;

        let trusted_proxies = parse_ip_list(&env::var("TRUSTED_PROXIES").unwrap_or_default())
            .map_err(|e| format!("TRUSTED_PROXIES: {}", e))?;

        Ok(Self {
            host,
            port,
            environment,
            cors_allowed_origins,
            max_request_body_size,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            trusted_proxies,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl SupabaseConfig {
    const DEFAULT_BUCKET: &'static str = "documents";
    const DEFAULT_SIGNED_URL_EXPIRY_SECS: u64 = 3600; // 1 hour
    const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

    pub fn from_env() -> Result<Self, String> {
        let url = env::var("SUPABASE_URL")
            .map_err(|_| "SUPABASE_URL is not configured".to_string())?;
        if !is_valid_url(&url) {
            return Err("SUPABASE_URL is not a valid URL".to_string());
        }

        let anon_key = env::var("SUPABASE_ANON_KEY")
            .map_err(|_| "SUPABASE_ANON_KEY is not configured".to_string())?;
        if !looks_like_jwt(&anon_key) {
            return Err("SUPABASE_ANON_KEY is not a valid JWT token".to_string());
        }

        let jwt_secret = env::var("SUPABASE_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty());

        let storage_bucket = env::var("SUPABASE_STORAGE_BUCKET")
            .unwrap_or_else(|_| Self::DEFAULT_BUCKET.to_string());

        let signed_url_expiry_secs = env::var("SUPABASE_SIGNED_URL_EXPIRY_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_SIGNED_URL_EXPIRY_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "SUPABASE_SIGNED_URL_EXPIRY_SECS must be a valid number".to_string())?;

        let http_timeout_secs = env::var("SUPABASE_HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_HTTP_TIMEOUT_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "SUPABASE_HTTP_TIMEOUT_SECS must be a valid number".to_string())?;

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            jwt_secret,
            storage_bucket,
            signed_url_expiry_secs,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}

impl CookieConfig {
    const ACCESS_MAX_AGE_SECS: u64 = 15 * 60; // 15 minutes
    const REFRESH_MAX_AGE_SECS: u64 = 7 * 24 * 60 * 60; // 7 days

    pub fn from_env(environment: Environment) -> Result<Self, String> {
        let domain = env::var("COOKIE_DOMAIN").ok().filter(|s| !s.is_empty());
        if let Some(ref d) = domain {
            if !is_valid_domain(d) {
                return Err("COOKIE_DOMAIN is not valid".to_string());
            }
        }

        let secure = match env::var("COOKIE_SECURE") {
            Ok(v) => v
                .parse::<bool>()
                .map_err(|_| "COOKIE_SECURE must be true or false".to_string())?,
            Err(_) => environment.is_production(),
        };

        Ok(Self {
            // Domain-scoped cookies only make sense behind the production host
            domain: domain.filter(|_| environment.is_production()),
            secure,
            access_max_age: Duration::from_secs(Self::ACCESS_MAX_AGE_SECS),
            refresh_max_age: Duration::from_secs(Self::REFRESH_MAX_AGE_SECS),
        })
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            domain: None,
            secure: false,
            access_max_age: Duration::from_secs(Self::ACCESS_MAX_AGE_SECS),
            refresh_max_age: Duration::from_secs(Self::REFRESH_MAX_AGE_SECS),
        }
    }
}

impl RateLimitConfig {
    const DEFAULT_MAX_REQUESTS: u32 = 100;
    const DEFAULT_WINDOW_MINUTES: u64 = 1;
    const DEFAULT_CLEANUP_SECS: u64 = 3600; // 1 hour

    pub fn from_env() -> Result<Self, String> {
        let max_requests = env::var("RATE_LIMIT_MAX")
            .unwrap_or_else(|_| Self::DEFAULT_MAX_REQUESTS.to_string())
            .parse::<u32>()
            .map_err(|_| "RATE_LIMIT_MAX must be a valid number".to_string())?;

        let window_minutes = env::var("RATE_LIMIT_WINDOW")
            .unwrap_or_else(|_| Self::DEFAULT_WINDOW_MINUTES.to_string())
            .parse::<u64>()
            .map_err(|_| "RATE_LIMIT_WINDOW must be a valid number of minutes".to_string())?;

        let cleanup_secs = env::var("RATE_LIMIT_CLEANUP_SECS")
            .unwrap_or_else(|_| Self::DEFAULT_CLEANUP_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| "RATE_LIMIT_CLEANUP_SECS must be a valid number".to_string())?;

        Ok(Self {
            max_requests,
            window: Duration::from_secs(window_minutes * 60),
            cleanup_interval: Duration::from_secs(cleanup_secs.max(1)),
        })
    }
}

impl SwaggerConfig {
    pub fn from_env() -> Result<Self, String> {
        // Only use credentials if they are non-empty
        let username = env::var("SWAGGER_USERNAME").ok().filter(|s| !s.is_empty());
        let password = env::var("SWAGGER_PASSWORD").ok().filter(|s| !s.is_empty());
        let title = env::var("SWAGGER_TITLE").unwrap_or_else(|_| "Docvault API".to_string());
        let version = env::var("SWAGGER_VERSION").unwrap_or_else(|_| "0.1.0".to_string());
        let description = env::var("SWAGGER_DESCRIPTION")
            .unwrap_or_else(|_| "Document management and secure sharing API".to_string());

        Ok(Self {
            username,
            password,
            title,
            version,
            description,
        })
    }

    /// Returns credentials in "username:password" format if auth is enabled
    pub fn credentials(&self) -> Option<String> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
            _ => None,
        }
    }
}

fn parse_environment(value: &str) -> Result<Environment, String> {
    match value.trim().to_lowercase().as_str() {
        "" | "development" | "dev" => Ok(Environment::Development),
        "production" | "prod" => Ok(Environment::Production),
        other => Err(format!(
            "APP_ENV must be 'development' or 'production', got '{}'",
            other
        )),
    }
}

fn parse_ip_list(raw: &str) -> Result<Vec<IpAddr>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<IpAddr>()
                .map_err(|_| format!("'{}' is not an IP address", s))
        })
        .collect()
}

fn is_valid_url(url: &str) -> bool {
    Url::parse(url).is_ok()
}

/// Basic JWT shape check: three non-empty dot-separated segments
fn looks_like_jwt(token: &str) -> bool {
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty())
}

fn is_valid_domain(domain: &str) -> bool {
    crate::shared::validation::DOMAIN_REGEX.is_match(domain)
}
