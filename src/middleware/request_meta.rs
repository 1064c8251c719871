use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use serde::Serialize;

/// Headers consulted for the client address, in priority order
const CLIENT_IP_HEADERS: &[&str] = &[
    "X-Forwarded-For",
    "Proxy-Client-IP",
    "WL-Proxy-Client-IP",
    "HTTP_X_FORWARDED_FOR",
    "HTTP_X_FORWARDED",
    "HTTP_X_CLUSTER_CLIENT_IP",
    "HTTP_CLIENT_IP",
    "HTTP_FORWARDED_FOR",
    "HTTP_FORWARDED",
    "HTTP_VIA",
    "REMOTE_ADDR",
];

/// Client details attached to audit entries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap, remote: Option<SocketAddr>) -> Self {
        Self {
            ip_address: client_ip(headers).or_else(|| remote.map(|addr| addr.ip().to_string())),
            user_agent: headers
                .get(axum::http::header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }
}

fn client_ip(headers: &HeaderMap) -> Option<String> {
    CLIENT_IP_HEADERS.iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?;
        if value.is_empty() || value.eq_ignore_ascii_case("unknown") {
            return None;
        }
        // Take the first address when a proxy chain is present
        value.split(',').next().map(|ip| ip.trim().to_string())
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestMeta
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let remote = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(RequestMeta::from_headers(&parts.headers, remote))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn prefers_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("user-agent", HeaderValue::from_static("curl/8.0"));

        let meta = RequestMeta::from_headers(&headers, None);
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn skips_unknown_and_falls_back_to_socket() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("unknown"));

        let remote: SocketAddr = "192.0.2.10:5555".parse().unwrap();
        let meta = RequestMeta::from_headers(&headers, Some(remote));
        assert_eq!(meta.ip_address.as_deref(), Some("192.0.2.10"));
    }

    #[test]
    fn later_headers_are_consulted() {
        let mut headers = HeaderMap::new();
        headers.insert("proxy-client-ip", HeaderValue::from_static("198.51.100.4"));
        let meta = RequestMeta::from_headers(&headers, None);
        assert_eq!(meta.ip_address.as_deref(), Some("198.51.100.4"));
    }
}
