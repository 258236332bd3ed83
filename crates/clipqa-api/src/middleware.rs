//! API middleware: rate limiting, CORS, security headers, request ids and
//! request logging.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderValue, Method, Request, Response};
use axum::middleware::Next;
use axum::response::IntoResponse;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::metrics;

type ClientLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Clients tracked before idle entries are evicted.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// A client limiter idle this long is dropped on the next sweep.
const CLIENT_IDLE_TTL: Duration = Duration::from_secs(3600);

struct ClientEntry {
    limiter: Arc<ClientLimiter>,
    last_seen: Instant,
}

/// One governor limiter per client IP.
#[derive(Clone)]
pub struct RateLimiterCache {
    clients: Arc<Mutex<HashMap<IpAddr, ClientEntry>>>,
    quota: Quota,
}

impl RateLimiterCache {
    pub fn new(requests_per_second: u32, burst: u32) -> Self {
        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst.max(requests_per_second)).unwrap_or(rate);
        Self {
            clients: Arc::new(Mutex::new(HashMap::new())),
            quota: Quota::per_second(rate).allow_burst(burst),
        }
    }

    /// Whether `ip` may make another request now.
    pub async fn check(&self, ip: IpAddr) -> bool {
        let limiter = {
            let mut clients = self.clients.lock().await;
            if clients.len() >= MAX_TRACKED_CLIENTS && !clients.contains_key(&ip) {
                evict_idle(&mut clients);
            }
            let entry = clients.entry(ip).or_insert_with(|| ClientEntry {
                limiter: Arc::new(RateLimiter::direct(self.quota)),
                last_seen: Instant::now(),
            });
            entry.last_seen = Instant::now();
            Arc::clone(&entry.limiter)
        };
        limiter.check().is_ok()
    }
}

/// Drop idle clients; if that is not enough, drop the least recently seen.
fn evict_idle(clients: &mut HashMap<IpAddr, ClientEntry>) {
    let now = Instant::now();
    clients.retain(|_, entry| now.duration_since(entry.last_seen) < CLIENT_IDLE_TTL);

    if clients.len() >= MAX_TRACKED_CLIENTS {
        let mut by_age: Vec<(IpAddr, Instant)> = clients.iter().map(|(ip, e)| (*ip, e.last_seen)).collect();
        by_age.sort_by_key(|(_, seen)| *seen);
        let excess = clients.len() + 1 - MAX_TRACKED_CLIENTS;
        for (ip, _) in by_age.into_iter().take(excess) {
            clients.remove(&ip);
        }
        warn!("Rate limiter tracking too many clients, evicted {}", excess);
    }
}

/// Reject requests over the per-client quota with 429.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiterCache>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if let Some(ip) = client_ip(&request) {
        if !limiter.check(ip).await {
            warn!(ip = %ip, "Rate limit exceeded");
            metrics::record_rate_limit_hit(&metrics::route_label(&request));
            let mut response = ApiError::RateLimited.into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
            return response;
        }
    }

    next.run(request).await
}

/// First address in `X-Forwarded-For`, then `X-Real-IP`, then the peer.
fn client_ip(request: &Request<Body>) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

/// CORS for the review UI. Credentials are only allowed with explicit origins.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let max_age = Duration::from_secs(600);

    if origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_origin(Any)
            .max_age(max_age);
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::HeaderName::from_static(REQUEST_ID_HEADER)])
        .allow_credentials(true)
        .allow_origin(origins)
        .max_age(max_age)
}

const SECURITY_HEADERS: [(&str, &str); 6] = [
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "DENY"),
    ("strict-transport-security", "max-age=31536000; includeSubDomains"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("permissions-policy", "camera=(), geolocation=(), microphone=(), payment=()"),
];

/// Add the fixed security headers to every response.
pub async fn security_headers(request: Request<Body>, next: Next) -> Response<Body> {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request id, taken from the caller or generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Tag the request with an id and echo it on the response.
pub async fn request_id(mut request: Request<Body>, next: Next) -> Response<Body> {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(id.clone()));
    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Probe paths excluded from request logs.
const QUIET_PATHS: [&str; 4] = ["/health", "/healthz", "/ready", "/metrics"];

/// Log every completed request except probes.
pub async fn request_logging(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    if !QUIET_PATHS.contains(&uri.path()) {
        let request_id = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        info!(
            method = %method,
            uri = %uri,
            status = response.status().as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            request_id = %request_id,
            "Request completed"
        );
    }

    response
}
