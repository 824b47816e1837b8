//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `checkout_rate_limiter`: strict limits for session creation (~12/min)
//! - `api_rate_limiter`: relaxed limits for the account API (~60/min)
//!
//! The webhook route is not limited; its deliveries come from the processor.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Single-address proxy headers tried after `X-Forwarded-For`.
const FALLBACK_IP_HEADERS: [&str; 2] = ["x-real-ip", "fly-client-ip"];

/// Per-client key extractor.
///
/// With `trust_proxy_headers` set (deployed behind Cloudflare or Fly.io) it
/// checks `CF-Connecting-IP`, then `X-Forwarded-For` (first hop), then the
/// other single-address proxy headers, then the peer address. Otherwise the
/// headers are client-controlled and only the peer address is used.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor {
    trust_proxy_headers: bool,
}

impl ClientIpKeyExtractor {
    #[must_use]
    pub const fn new(trust_proxy_headers: bool) -> Self {
        Self {
            trust_proxy_headers,
        }
    }
}

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        let peer = || {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        };

        if !self.trust_proxy_headers {
            return peer().ok_or(GovernorError::UnableToExtractKey);
        }

        let headers = req.headers();
        let header_ip = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok())
        };

        header_ip("cf-connecting-ip")
            .or_else(|| header_ip("x-forwarded-for"))
            .or_else(|| FALLBACK_IP_HEADERS.iter().find_map(|h| header_ip(h)))
            .or_else(peer)
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Create rate limiter for checkout: ~12 sessions per minute per IP.
///
/// Configuration: 1 request every 5 seconds (replenish), burst of 5.
///
/// # Panics
///
/// This function will not panic. The configuration uses only valid positive
/// integers, which are always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn checkout_rate_limiter(trust_proxy_headers: bool) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trust_proxy_headers))
        .per_second(5)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(5) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Create rate limiter for the account API: ~60 requests per minute per IP.
///
/// # Panics
///
/// This function will not panic. The configuration uses only valid positive
/// integers, which are always accepted by `GovernorConfigBuilder`.
#[must_use]
pub fn api_rate_limiter(trust_proxy_headers: bool) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor::new(trust_proxy_headers))
        .per_second(1)
        .burst_size(30)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(30) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_governor::key_extractor::KeyExtractor;

    use super::*;

    const PROXIED: ClientIpKeyExtractor = ClientIpKeyExtractor::new(true);
    const DIRECT: ClientIpKeyExtractor = ClientIpKeyExtractor::new(false);

    fn request(headers: &[(&str, &str)]) -> Request<()> {
        let mut builder = Request::builder().uri("/api/checkout-session");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap()
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let req = request(&[
            ("x-forwarded-for", "10.0.0.1, 10.0.0.2"),
            ("cf-connecting-ip", "203.0.113.7"),
        ]);
        let ip = PROXIED.extract(&req).unwrap();
        assert_eq!(ip.to_string(), "203.0.113.7");
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let req = request(&[("x-forwarded-for", "198.51.100.4, 10.0.0.2")]);
        let ip = PROXIED.extract(&req).unwrap();
        assert_eq!(ip.to_string(), "198.51.100.4");
    }

    #[test]
    fn test_fly_header_fallback() {
        let req = request(&[("fly-client-ip", "2001:db8::1")]);
        let ip = PROXIED.extract(&req).unwrap();
        assert_eq!(ip.to_string(), "2001:db8::1");
    }

    #[test]
    fn test_peer_address_fallback() {
        let mut req = request(&[]);
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 50123))));
        let ip = PROXIED.extract(&req).unwrap();
        assert_eq!(ip.to_string(), "127.0.0.1");
    }

    #[test]
    fn test_no_client_ip() {
        let req = request(&[("x-real-ip", "not-an-ip")]);
        assert!(PROXIED.extract(&req).is_err());
    }

    #[test]
    fn test_direct_ignores_forwarded_headers() {
        let mut req = request(&[
            ("cf-connecting-ip", "203.0.113.7"),
            ("x-forwarded-for", "198.51.100.4"),
        ]);
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 50123))));
        let ip = DIRECT.extract(&req).unwrap();
        assert_eq!(ip.to_string(), "192.0.2.10");
    }

    #[test]
    fn test_direct_rotating_header_keeps_key() {
        let peer = ConnectInfo(SocketAddr::from(([192, 0, 2, 10], 50123)));
        let keys: Vec<IpAddr> = ["198.51.100.1", "198.51.100.2"]
            .into_iter()
            .map(|spoofed| {
                let mut req = request(&[("x-forwarded-for", spoofed)]);
                req.extensions_mut().insert(peer);
                DIRECT.extract(&req).unwrap()
            })
            .collect();
        assert!(keys.iter().all(|ip| ip.to_string() == "192.0.2.10"));
    }

    #[test]
    fn test_direct_without_peer_address() {
        let req = request(&[("x-forwarded-for", "198.51.100.4")]);
        assert!(DIRECT.extract(&req).is_err());
    }
}
