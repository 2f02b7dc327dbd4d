//! Reading the session cookie from requests and writing it to responses.

use cookie::Cookie;
use cookie::time::{Duration as CookieDuration, OffsetDateTime};
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};

use crate::codec::SessionCodec;
use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// Find the session ID carried by the request's cookies.
///
/// Every `Cookie` header is scanned and each cookie with the configured
/// name is tried in turn; the first one with a valid signature wins. A
/// stale cookie set at another path therefore cannot shadow a good one.
pub(crate) fn session_id_from_headers(
    headers: &HeaderMap,
    config: &StoreConfig,
    codec: &SessionCodec,
) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(|parsed| parsed.ok())
        .filter(|c| c.name() == config.cookie_name)
        .find_map(|c| codec.verify_cookie(&config.cookie_name, c.value()))
}

/// Append a `Set-Cookie` header carrying the signed session ID.
pub(crate) fn append_session_cookie(
    headers: &mut HeaderMap,
    config: &StoreConfig,
    codec: &SessionCodec,
    id: &str,
    max_age: std::time::Duration,
) -> Result<()> {
    let value = codec.sign_cookie(&config.cookie_name, id);
    let cookie = base_cookie(config, value)
        .max_age(CookieDuration::seconds(max_age.as_secs() as i64))
        .build();
    append(headers, &cookie)
}

/// Append a `Set-Cookie` header that makes the client drop the session cookie.
pub(crate) fn append_removal_cookie(headers: &mut HeaderMap, config: &StoreConfig) -> Result<()> {
    let cookie = base_cookie(config, String::new())
        .max_age(CookieDuration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build();
    append(headers, &cookie)
}

fn base_cookie(config: &StoreConfig, value: String) -> cookie::CookieBuilder<'static> {
    let mut builder = Cookie::build((config.cookie_name.clone(), value))
        .path(config.path.clone())
        .http_only(config.http_only)
        .secure(config.secure)
        .same_site(config.same_site);
    if let Some(ref domain) = config.domain {
        builder = builder.domain(domain.clone());
    }
    builder
}

fn append(headers: &mut HeaderMap, cookie: &Cookie<'_>) -> Result<()> {
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| Error::ConfigInvalid(format!("cookie is not a valid header value: {}", e)))?;
    headers.append(SET_COOKIE, value);
    Ok(())
}
