//! Browser sessions keyed by a cookie.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use uuid::Uuid;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "vortex_session";

/// Session id for the current request, minting a cookie when the browser
/// does not have one yet.
///
/// Always return the jar alongside the response so a freshly minted cookie
/// reaches the browser.
pub fn ensure_session(jar: CookieJar) -> (String, CookieJar) {
    if let Some(id) = session_id(&jar) {
        return (id, jar);
    }

    let id = Uuid::new_v4().to_string();
    let cookie = Cookie::build((SESSION_COOKIE, id.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    (id, jar.add(cookie))
}

/// Existing session id, if the browser sent a well-formed one.
pub fn session_id(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| Uuid::parse_str(v).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mints_session_once() {
        let (id, jar) = ensure_session(CookieJar::new());
        assert!(Uuid::parse_str(&id).is_ok());

        let cookie = jar.get(SESSION_COOKIE).unwrap();
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));

        let (again, _) = ensure_session(jar);
        assert_eq!(again, id);
    }

    #[test]
    fn test_ignores_malformed_cookie() {
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "not-a-uuid"));
        assert_eq!(session_id(&jar), None);

        let (id, _) = ensure_session(jar);
        assert_ne!(id, "not-a-uuid");
    }
}
