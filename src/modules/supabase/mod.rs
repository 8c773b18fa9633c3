//! BaaS client
//!
//! Thin reqwest wrapper over the hosted platform's HTTP surfaces:
//! GoTrue auth (`/auth/v1`), PostgREST tables and RPC (`/rest/v1`)
//! and object storage (`/storage/v1`).
//!
//! Every call is made on behalf of a caller (`Auth`) so row-level
//! security is evaluated against that user.

mod auth;
mod client;
mod query;
mod rest;
mod storage;

pub use auth::{BaasUser, Session};
pub use client::{Auth, SupabaseClient};
pub use query::Query;
