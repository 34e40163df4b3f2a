//! `Cookie` request header parsing.
//!
//! Values are percent-decoded. A value that does not decode to valid UTF-8
//! is kept as sent.

use std::{collections::HashMap, convert::Infallible};

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::COOKIE, request::Parts, HeaderMap},
};

/// Cookies sent with a request, by name. When a name repeats, the first
/// value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(HashMap<String, String>);

impl Cookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut map = HashMap::new();
        for value in headers.get_all(COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            for pair in raw.split(';') {
                let Some((name, value)) = pair.split_once('=') else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let value = value.trim();
                let value = value
                    .strip_prefix('"')
                    .and_then(|v| v.strip_suffix('"'))
                    .unwrap_or(value);
                map.entry(name.to_owned())
                    .or_insert_with(|| percent_decode(value).unwrap_or_else(|| value.to_owned()));
            }
        }
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }
}

/// `None` when an escape is malformed or the bytes are not UTF-8.
fn percent_decode(value: &str) -> Option<String> {
    if !value.contains('%') {
        return Some(value.to_owned());
    }
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            if !hex.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Cookies {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(values: &[&'static str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for &v in values {
            map.append(COOKIE, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn parses_pairs_and_trims() {
        let cookies = Cookies::from_headers(&headers(&["accessToken=abc.def.ghi; theme = dark"]));
        assert_eq!(cookies.get("accessToken"), Some("abc.def.ghi"));
        assert_eq!(cookies.get("theme"), Some("dark"));
    }

    #[test]
    fn first_value_wins_across_headers() {
        let cookies = Cookies::from_headers(&headers(&["a=1; a=2", "a=3"]));
        assert_eq!(cookies.get("a"), Some("1"));
    }

    #[test]
    fn strips_quotes_and_skips_garbage() {
        let cookies = Cookies::from_headers(&headers(&["q=\"quoted\"; novalue; =empty"]));
        assert_eq!(cookies.get("q"), Some("quoted"));
        assert_eq!(cookies.get("novalue"), None);
        assert_eq!(cookies.get(""), None);
    }

    #[test]
    fn values_are_percent_decoded() {
        let cookies = Cookies::from_headers(&headers(&[
            "greeting=hello%20world; token=a%2Eb%2ec; name=%C3%A9t%C3%A9; plus=a+b",
        ]));
        assert_eq!(cookies.get("greeting"), Some("hello world"));
        assert_eq!(cookies.get("token"), Some("a.b.c"));
        assert_eq!(cookies.get("name"), Some("\u{e9}t\u{e9}"));
        assert_eq!(cookies.get("plus"), Some("a+b"));
    }

    #[test]
    fn undecodable_values_are_kept_as_sent() {
        let cookies = Cookies::from_headers(&headers(&["bad=%zz; short=50%; sign=%+1; latin=%E9"]));
        assert_eq!(cookies.get("bad"), Some("%zz"));
        assert_eq!(cookies.get("short"), Some("50%"));
        assert_eq!(cookies.get("sign"), Some("%+1"));
        assert_eq!(cookies.get("latin"), Some("%E9"));
    }

    #[tokio::test]
    async fn works_as_an_extractor() {
        use axum::{body::Body, http::Request, routing::get, Router};
        use tower::ServiceExt;

        let app: Router = Router::new().route(
            "/",
            get(|cookies: Cookies| async move { cookies.get("theme").unwrap_or("none").to_owned() }),
        );
        let req = Request::get("/")
            .header(COOKIE, "theme=dark")
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"dark");
    }
}
