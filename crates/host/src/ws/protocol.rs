//! Handshake checks for bridge connections

use tokio_tungstenite::tungstenite::handshake::server::Request;
use url::Url;

/// Origins a UI may connect from
/// Only loopback is allowed
pub const ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost",
    "http://127.0.0.1",
    "https://localhost",
    "https://127.0.0.1",
];

/// Validate origin header against whitelist using strict URL parsing
///
/// Scheme and host are compared exactly, so `http://localhost.evil.com`
/// does not pass as `http://localhost`.
pub fn validate_origin(origin: &str) -> bool {
    let Ok(origin_url) = Url::parse(origin) else {
        return false;
    };

    let origin_host = origin_url.host_str().unwrap_or("");
    let origin_scheme = origin_url.scheme();

    ALLOWED_ORIGINS.iter().any(|allowed| {
        let Ok(allowed_url) = Url::parse(allowed) else {
            return false;
        };
        origin_scheme == allowed_url.scheme() && origin_host == allowed_url.host_str().unwrap_or("")
    })
}

/// Origin check for a handshake request
///
/// A missing header means a native client, which is allowed. A header that
/// is present but unreadable is not.
pub fn request_origin_allowed(req: &Request) -> (bool, Option<String>) {
    match req.headers().get(http::header::ORIGIN) {
        None => (true, None),
        Some(value) => match value.to_str() {
            Ok(origin) => (validate_origin(origin), Some(origin.to_string())),
            Err(_) => (false, None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_origins_pass() {
        assert!(validate_origin("http://localhost"));
        assert!(validate_origin("http://localhost:9417"));
        assert!(validate_origin("http://127.0.0.1:3000"));
        assert!(validate_origin("https://localhost:443"));
    }

    #[test]
    fn lookalike_origins_fail() {
        assert!(!validate_origin("http://localhost.evil.com"));
        assert!(!validate_origin("http://evil.localhost.com"));
        assert!(!validate_origin("http://127.0.0.1.evil.com"));
        assert!(!validate_origin("http://192.168.1.1"));
        assert!(!validate_origin("not-a-url"));
        assert!(!validate_origin(""));
    }

    #[test]
    fn missing_origin_header_is_native_client() {
        let req = Request::builder().uri("/").body(()).unwrap();
        assert_eq!(request_origin_allowed(&req), (true, None));

        let req = Request::builder()
            .uri("/")
            .header("origin", "http://evil.com")
            .body(())
            .unwrap();
        assert_eq!(
            request_origin_allowed(&req),
            (false, Some("http://evil.com".to_string()))
        );
    }
}
