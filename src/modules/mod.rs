//! Modules layer - Infrastructure components for external integrations
//!
//! Contains the client for the hosted backend platform (auth, tables, storage).

pub mod supabase;
