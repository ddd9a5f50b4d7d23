use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    jar.get(name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Cookie carrying a renewed access token: site-wide, http-only, secure,
/// same-site lax.
pub fn access_token_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, token.to_string()))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

pub fn append_access_token_cookie(headers: &mut HeaderMap, token: &str) {
    match HeaderValue::from_str(&access_token_cookie(token).to_string()) {
        Ok(value) => {
            headers.append(SET_COOKIE, value);
        }
        Err(err) => {
            tracing::warn!(error = %err, "renewed access token is not a valid header value");
        }
    }
}
