pub mod password;
pub mod validation;

pub use password::{hash_password, verify_password, Password, PasswordHashString};
pub use validation::{validate_password_complexity, ValidatedJson};

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Extract the client IP and user agent from a request. A proxy-supplied
/// `x-forwarded-for` wins over the socket address.
pub fn request_meta(
    headers: &HeaderMap,
    addr: Option<SocketAddr>,
) -> (Option<String>, Option<String>) {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .or_else(|| addr.map(|a| a.ip().to_string()));

    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.chars().take(500).collect());

    (ip, user_agent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_ip_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.1.2.3, 10.0.0.1"));
        headers.insert("user-agent", HeaderValue::from_static("test-agent"));

        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let (ip, ua) = request_meta(&headers, Some(addr));

        assert_eq!(ip.as_deref(), Some("10.1.2.3"));
        assert_eq!(ua.as_deref(), Some("test-agent"));
    }

    #[test]
    fn test_socket_addr_fallback() {
        let headers = HeaderMap::new();
        let addr: SocketAddr = "192.168.1.5:443".parse().unwrap();
        let (ip, ua) = request_meta(&headers, Some(addr));

        assert_eq!(ip.as_deref(), Some("192.168.1.5"));
        assert!(ua.is_none());
    }
}
