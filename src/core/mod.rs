pub mod config;
pub mod error;
pub mod extractor;
pub mod health;
pub mod middleware;
pub mod openapi;
pub mod rate_limit;
