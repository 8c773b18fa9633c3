use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::core::config::CookieConfig;
use crate::modules::supabase::Session;
use crate::shared::constants::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};

fn build_cookie(
    config: &CookieConfig,
    name: &'static str,
    value: String,
    max_age: Option<Duration>,
) -> Cookie<'static> {
    let mut builder = Cookie::build((name, value))
        .http_only(true)
        .secure(config.secure)
        .same_site(SameSite::Lax)
        .path("/");

    if let Some(domain) = &config.domain {
        builder = builder.domain(domain.clone());
    }
    if let Some(max_age) = max_age {
        builder = builder.max_age(time::Duration::seconds(max_age.as_secs() as i64));
    }

    builder.build()
}

/// Store both session tokens as HttpOnly cookies
pub fn with_session_cookies(jar: CookieJar, config: &CookieConfig, session: &Session) -> CookieJar {
    jar.add(build_cookie(
        config,
        ACCESS_TOKEN_COOKIE,
        session.access_token.clone(),
        Some(config.access_max_age),
    ))
    .add(build_cookie(
        config,
        REFRESH_TOKEN_COOKIE,
        session.refresh_token.clone(),
        Some(config.refresh_max_age),
    ))
}

/// Expire both session cookies
pub fn without_session_cookies(jar: CookieJar, config: &CookieConfig) -> CookieJar {
    jar.remove(build_cookie(config, ACCESS_TOKEN_COOKIE, String::new(), None))
        .remove(build_cookie(config, REFRESH_TOKEN_COOKIE, String::new(), None))
}

pub fn access_token_from(jar: &CookieJar) -> Option<String> {
    jar.get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

pub fn refresh_token_from(jar: &CookieJar) -> Option<String> {
    jar.get(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
