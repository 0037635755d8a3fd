//! Carries the GLPI session token of a browser between requests.
//!
//! The token lives in a signed cookie ([`SESSION_COOKIE`]) and, when enabled,
//! in a longer-lived mirror cookie ([`MIRROR_COOKIE`]) so a browser restart
//! does not force a new login.

use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::COOKIE, request, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json, RequestPartsExt as _,
};
use axum_extra::{
    extract::cookie::{Cookie, CookieJar, SameSite},
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{api, config, server::SharedAppState};

pub const SESSION_COOKIE: &str = "ptc.sid";
pub const MIRROR_COOKIE: &str = "glpi_session_token";

/// GLPI's own web interface names its session cookie `glpi_<hash>`.
const WEB_COOKIE_PREFIX: &str = "glpi_";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Claims {
    pub session_token: String,
    pub exp: i64,
}

/// Signing keys and cookie policy.
pub struct Keys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_time: Duration,
    mirror_cookie: bool,
    mirror_cookie_max_age: Duration,
    secure: bool,
}

impl Keys {
    pub fn new(config: &config::Session) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            expiration_time: config.expiration_time,
            mirror_cookie: config.mirror_cookie,
            mirror_cookie_max_age: config.mirror_cookie_max_age,
            secure: config.secure,
        }
    }

    pub fn sign(
        &self,
        session_token: &str,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let expires_at = OffsetDateTime::now_utc() + self.expiration_time;
        encode(
            &Header::default(),
            &Claims {
                session_token: session_token.to_owned(),
                exp: expires_at.unix_timestamp(),
            },
            &self.encoding_key,
        )
    }

    /// GLPI session token of a valid, unexpired signed cookie value.
    pub fn verify(&self, signed: &str) -> Option<String> {
        decode::<Claims>(signed, &self.decoding_key, &Validation::default())
            .ok()
            .map(|data| data.claims.session_token)
            .filter(|token| !token.is_empty())
    }

    /// Stores `session_token` in the response cookies.
    pub fn establish(
        &self,
        jar: CookieJar,
        session_token: &str,
    ) -> Result<CookieJar, jsonwebtoken::errors::Error> {
        let signed = Cookie::build((SESSION_COOKIE, self.sign(session_token)?))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(cookie_max_age(self.expiration_time));
        let jar = jar.add(signed);

        if !self.mirror_cookie {
            return Ok(jar);
        }
        let mirror = Cookie::build((MIRROR_COOKIE, session_token.to_owned()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(cookie_max_age(self.mirror_cookie_max_age));
        Ok(jar.add(mirror))
    }

    /// Looks the GLPI session token up in the request, in order of trust.
    pub fn find(
        &self,
        bearer: Option<&str>,
        headers: &HeaderMap,
        dev: &config::Dev,
    ) -> Option<GlpiSession> {
        let found = |token: &str, source| {
            (!token.is_empty()).then(|| GlpiSession {
                token: token.to_owned(),
                source,
            })
        };

        if let Some(s) = bearer.and_then(|t| found(t, Source::Bearer)) {
            return Some(s);
        }

        let cookies = request_cookies(headers);
        let named = |name: &str| {
            cookies.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
        };

        if let Some(token) = named(SESSION_COOKIE).and_then(|v| self.verify(v)) {
            return Some(GlpiSession {
                token,
                source: Source::SignedCookie,
            });
        }
        if let Some(s) = named(MIRROR_COOKIE)
            .and_then(|t| found(t, Source::MirrorCookie))
        {
            return Some(s);
        }
        if let Some(s) = cookies
            .iter()
            .filter(|(n, _)| {
                n.starts_with(WEB_COOKIE_PREFIX) && n != MIRROR_COOKIE
            })
            .find_map(|(_, v)| found(v, Source::WebCookie))
        {
            return Some(s);
        }

        dev.bypass_auth
            .then(|| found(&dev.fake_session, Source::DevBypass))
            .flatten()
    }
}

/// Removes every cookie [`Keys::establish`] may have set.
pub fn clear(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
        .remove(Cookie::build(MIRROR_COOKIE).path("/"))
}

/// Readable by scripts, for local testing with the development bypass.
pub fn dev_bypass_cookie(token: &str, max_age: Duration) -> Cookie<'static> {
    Cookie::build((MIRROR_COOKIE, token.to_owned()))
        .path("/")
        .same_site(SameSite::Lax)
        .max_age(cookie_max_age(max_age))
        .build()
}

fn cookie_max_age(d: Duration) -> time::Duration {
    time::Duration::try_from(d).unwrap_or(time::Duration::MAX)
}

/// Cookies of the request in header order.
fn request_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| {
            Cookie::split_parse(value.to_owned())
                .filter_map(Result::ok)
                .map(|c| (c.name().to_owned(), c.value().to_owned()))
                .collect::<Vec<_>>()
        })
        .collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Source {
    Bearer,
    SignedCookie,
    MirrorCookie,
    WebCookie,
    DevBypass,
}

/// GLPI session token of the caller.
#[derive(Clone, Debug, PartialEq)]
pub struct GlpiSession {
    pub token: String,
    pub source: Source,
}

#[derive(Debug)]
pub struct NoSession;

impl IntoResponse for NoSession {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(api::Failure::require_login("not authenticated")),
        )
            .into_response()
    }
}

#[async_trait]
impl FromRequestParts<SharedAppState> for GlpiSession {
    type Rejection = NoSession;

    async fn from_request_parts(
        parts: &mut request::Parts,
        state: &SharedAppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .ok();
        state
            .sessions
            .find(
                bearer.as_ref().map(|TypedHeader(a)| a.token()),
                &parts.headers,
                &state.dev,
            )
            .ok_or(NoSession)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{header::AUTHORIZATION, HeaderValue};

    use super::*;

    fn keys() -> Keys {
        Keys::new(&config::Session::default())
    }

    fn headers(cookie: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        h
    }

    #[test]
    fn signed_token_round_trips() {
        let keys = keys();
        let signed = keys.sign("abc").unwrap();
        assert_eq!(keys.verify(&signed).as_deref(), Some("abc"));
    }

    #[test]
    fn rejects_foreign_signatures() {
        let other = Keys::new(&config::Session {
            secret: "another-secret".into(),
            ..config::Session::default()
        });
        let signed = other.sign("abc").unwrap();
        assert_eq!(keys().verify(&signed), None);
        assert_eq!(keys().verify("not-a-jwt"), None);
    }

    #[test]
    fn establishes_signed_and_mirror_cookies() {
        let jar = keys().establish(CookieJar::new(), "abc").unwrap();

        let signed = jar.get(SESSION_COOKIE).unwrap();
        assert_eq!(signed.http_only(), Some(true));
        assert_eq!(keys().verify(signed.value()).as_deref(), Some("abc"));

        let mirror = jar.get(MIRROR_COOKIE).unwrap();
        assert_eq!(mirror.value(), "abc");
        assert_eq!(mirror.max_age(), Some(time::Duration::days(7)));
    }

    #[test]
    fn mirror_cookie_can_be_disabled() {
        let keys = Keys::new(&config::Session {
            mirror_cookie: false,
            ..config::Session::default()
        });
        let jar = keys.establish(CookieJar::new(), "abc").unwrap();
        assert!(jar.get(MIRROR_COOKIE).is_none());
    }

    #[test]
    fn finds_session_in_order_of_trust() {
        let keys = keys();
        let dev = config::Dev::default();
        let signed = keys.sign("signed").unwrap();

        let h = headers(&format!(
            "glpi_0123abcd=web; {MIRROR_COOKIE}=mirror; {SESSION_COOKIE}={signed}",
        ));
        assert_eq!(
            keys.find(Some("bearer"), &h, &dev).unwrap().source,
            Source::Bearer,
        );
        assert_eq!(
            keys.find(None, &h, &dev),
            Some(GlpiSession {
                token: "signed".into(),
                source: Source::SignedCookie,
            }),
        );

        let h = headers(&format!("glpi_0123abcd=web; {MIRROR_COOKIE}=mirror"));
        assert_eq!(keys.find(None, &h, &dev).unwrap().token, "mirror");

        let h = headers("other=1; glpi_0123abcd=web");
        assert_eq!(
            keys.find(None, &h, &dev),
            Some(GlpiSession {
                token: "web".into(),
                source: Source::WebCookie,
            }),
        );
    }

    #[test]
    fn expired_signed_cookie_is_ignored() {
        let keys = keys();
        let expired = encode(
            &Header::default(),
            &Claims {
                session_token: "old".into(),
                exp: 1_000,
            },
            &EncodingKey::from_secret(
                config::Session::default().secret.as_bytes(),
            ),
        )
        .unwrap();
        let h = headers(&format!("{SESSION_COOKIE}={expired}"));
        assert_eq!(keys.find(None, &h, &config::Dev::default()), None);
    }

    #[test]
    fn dev_bypass_only_stands_in_for_missing_sessions() {
        let keys = keys();
        let dev = config::Dev {
            bypass_auth: true,
            ..config::Dev::default()
        };

        assert_eq!(
            keys.find(None, &HeaderMap::new(), &dev),
            Some(GlpiSession {
                token: "dev-bypass-session".into(),
                source: Source::DevBypass,
            }),
        );
        let h = headers(&format!("{MIRROR_COOKIE}=real"));
        assert_eq!(keys.find(None, &h, &dev).unwrap().token, "real");
        assert_eq!(
            keys.find(None, &HeaderMap::new(), &config::Dev::default()),
            None,
        );
    }

    #[test]
    fn ignores_unrelated_headers() {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(keys().find(None, &h, &config::Dev::default()), None);
    }
}
