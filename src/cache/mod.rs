// Offline cache gateway: versioned precache plus network-first and cache-first request handling.

pub mod gateway;
pub mod network;
pub mod storage;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Method, Url};

/// An intercepted request. Passed-through requests are forwarded with their
/// headers and body intact.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// A page navigation, which asks for HTML.
    pub fn navigate(url: Url) -> Self {
        Self::get(url).with_header(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,*/*;q=0.8"),
        )
    }

    pub fn is_document(&self) -> bool {
        self.headers
            .get(ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |accept| accept.contains("text/html"))
    }

    /// Cache key: the absolute URL without its fragment.
    pub fn cache_key(&self) -> String {
        cache_key(&self.url)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, content_type: Option<&str>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }

    /// Only plain 200 responses are worth caching.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }
}

pub(crate) fn cache_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn navigation_is_a_document_request() {
        let url = Url::parse("https://fit.example/fitness.html#top").unwrap();
        assert!(Request::navigate(url.clone()).is_document());
        assert!(!Request::get(url.clone()).is_document());
        let json = Request::get(url.clone())
            .with_header(ACCEPT, HeaderValue::from_static("application/json"));
        assert!(!json.is_document());
        assert_eq!(Request::get(url).cache_key(), "https://fit.example/fitness.html");
    }
}
