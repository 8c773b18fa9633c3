// =============================================================================
// COOKIES
// =============================================================================

/// Cookie carrying the BaaS access token
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Cookie carrying the BaaS refresh token
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

// =============================================================================
// BAAS TABLES
// =============================================================================

pub const TABLE_DOCUMENTS: &str = "documents";
pub const TABLE_USER_ROLES: &str = "user_roles";
pub const TABLE_DOCUMENT_SHARES: &str = "document_shares";
pub const TABLE_SHARE_TOKENS: &str = "share_tokens";
pub const TABLE_DOCUMENT_VERIFICATIONS: &str = "document_verifications";
pub const TABLE_PROFILES: &str = "profiles";

// =============================================================================
// BAAS STORED PROCEDURES
// =============================================================================

pub const RPC_CHECK_SHARE_PERMISSION: &str = "check_document_share_permission";
pub const RPC_VERIFY_SHARE_ACCESS: &str = "verify_document_share_access";
pub const RPC_CLEANUP_EXPIRED_SHARES: &str = "cleanup_expired_shares";

// =============================================================================
// SHARING
// =============================================================================

/// Random bytes in a share token (hex encoded to 64 chars)
pub const SHARE_TOKEN_BYTES: usize = 32;

/// Default lifetime of a secure share when neither expires_at nor expires_in_hours is given
pub const DEFAULT_SHARE_EXPIRY_HOURS: i64 = 24;

/// Upper bound for expires_in_hours (one year)
pub const MAX_SHARE_EXPIRY_HOURS: i64 = 8760;

/// Minimum query length for user search
pub const USER_SEARCH_MIN_CHARS: usize = 3;

/// Maximum users returned by user search
pub const USER_SEARCH_LIMIT: usize = 10;
