//! Redemption rules for share links
//!
//! Pure functions over a stored row, the current time, the caller and the
//! client address. The service loads rows and applies side effects.

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use thiserror::Error;

use crate::core::error::AppError;
use crate::features::shares::models::{DocumentShare, ShareToken};

/// Why a share link cannot be redeemed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("This share link has been revoked")]
    Revoked,
    #[error("This share link has expired")]
    Expired,
    #[error("This share link has reached its usage limit")]
    UsageExhausted,
    #[error("This share link cannot be used from your network address")]
    AddressNotAllowed,
    #[error("This share link was issued to another user")]
    WrongRecipient,
}

impl From<AccessDenied> for AppError {
    fn from(denied: AccessDenied) -> Self {
        AppError::Forbidden(denied.to_string())
    }
}

/// Secure share: active, not expired and naming the caller
pub fn check_secure_share(
    share: &DocumentShare,
    now: DateTime<Utc>,
    caller_id: &str,
) -> Result<(), AccessDenied> {
    if !share.is_active {
        return Err(AccessDenied::Revoked);
    }
    if share.is_expired(now) {
        return Err(AccessDenied::Expired);
    }
    if !share.names_recipient(caller_id) {
        return Err(AccessDenied::WrongRecipient);
    }
    Ok(())
}

/// Legacy token: checks revocation, expiry, usage cap, IP allow-list and recipient in that order
///
/// An absent or empty allow-list admits every address; a non-empty list
/// rejects callers whose address is unknown.
pub fn validate_share_token(
    token: &ShareToken,
    now: DateTime<Utc>,
    caller_id: &str,
    client_ip: Option<IpAddr>,
) -> Result<(), AccessDenied> {
    if token.is_revoked {
        return Err(AccessDenied::Revoked);
    }
    if now > token.expires_at {
        return Err(AccessDenied::Expired);
    }
    if token.max_uses.is_some_and(|max| token.used_count >= max) {
        return Err(AccessDenied::UsageExhausted);
    }

    if let Some(allowed) = token.allowed_ips.as_deref().filter(|ips| !ips.is_empty()) {
        let admitted = client_ip.is_some_and(|ip| {
            allowed
                .iter()
                .filter_map(|entry| entry.trim().parse::<IpAddr>().ok())
                .any(|entry| entry == ip || same_mapped_address(entry, ip))
        });
        if !admitted {
            return Err(AccessDenied::AddressNotAllowed);
        }
    }

    if let Some(recipient) = token.shared_with.as_deref() {
        if recipient != caller_id {
            return Err(AccessDenied::WrongRecipient);
        }
    }

    Ok(())
}

/// `::ffff:a.b.c.d` and `a.b.c.d` denote the same client
fn same_mapped_address(a: IpAddr, b: IpAddr) -> bool {
    match (a, b) {
        (IpAddr::V4(v4), IpAddr::V6(v6)) | (IpAddr::V6(v6), IpAddr::V4(v4)) => {
            v6.to_ipv4_mapped() == Some(v4)
        }
        _ => false,
    }
}
