//! Request middleware: logging, security headers and rate limiting.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

const SECURITY_HEADERS: [(HeaderName, &str); 6] = [
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_XSS_PROTECTION, "1; mode=block"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (
        HeaderName::from_static("permissions-policy"),
        "geolocation=(), microphone=(), camera=()",
    ),
    (
        header::STRICT_TRANSPORT_SECURITY,
        "max-age=31536000; includeSubDomains",
    ),
];

pub async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}

pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

/// Client key: the peer address, or the first `X-Forwarded-For` hop when
/// forwarded headers are trusted.
fn client_key(request: &Request, trust_forwarded: bool) -> String {
    if trust_forwarded {
        if let Some(forwarded) = request
            .headers()
            .get(FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            return forwarded.to_string();
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_key(&request, state.trust_forwarded);
    if let Err(retry_after) = state.limiter.check(&client) {
        debug!(%client, "rate limited");
        return Err(ApiError::RateLimited { retry_after });
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_from(peer: &str, forwarded: Option<&str>) -> Request {
        let mut builder = Request::builder()
            .uri("/api/eval/scorers")
            .extension(ConnectInfo(peer.parse::<SocketAddr>().unwrap()));
        if let Some(forwarded) = forwarded {
            builder = builder.header(FORWARDED_FOR, forwarded);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn peer_address_is_the_default_key() {
        let request = request_from("192.0.2.1:5555", Some("10.0.0.9"));
        assert_eq!(client_key(&request, false), "192.0.2.1");
    }

    #[test]
    fn trusted_forwarded_header_uses_the_first_hop() {
        let request = request_from("192.0.2.1:5555", Some(" 10.0.0.9 , 172.16.0.1"));
        assert_eq!(client_key(&request, true), "10.0.0.9");

        let blank = request_from("192.0.2.1:5555", Some(""));
        assert_eq!(client_key(&blank, true), "192.0.2.1");
    }

    #[test]
    fn missing_peer_falls_back_to_unknown() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&request, false), "unknown");
    }
}
