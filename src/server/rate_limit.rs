// Per-client sliding window rate limiter
// The client map is bounded: a periodic sweep drops clients with no request
// inside the window, and when the map is full the least recently active
// client is evicted to make room.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::ApiError;
use crate::config::RateLimitConfig;

type ClientMap = HashMap<String, VecDeque<Instant>>;

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    max_clients: usize,
    clients: Mutex<ClientMap>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        RateLimiter {
            max_requests: config.max_requests,
            window: config.window(),
            max_clients: config.max_clients.max(1),
            clients: Mutex::new(HashMap::new()),
        }
    }

    // Records the request and returns false when the client is over its limit
    pub fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now())
    }

    pub fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut clients = self.clients.lock();

        if !clients.contains_key(client) && clients.len() >= self.max_clients {
            self.sweep_locked(&mut clients, now);
            if clients.len() >= self.max_clients {
                evict_least_recent(&mut clients);
            }
        }

        let timestamps = clients.entry(client.to_string()).or_default();
        while let Some(&oldest) = timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() >= self.max_requests {
            return false;
        }
        timestamps.push_back(now);
        true
    }

    // Returns the number of clients removed
    pub fn sweep(&self) -> usize {
        let mut clients = self.clients.lock();
        self.sweep_locked(&mut clients, Instant::now())
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().len()
    }

    fn sweep_locked(&self, clients: &mut ClientMap, now: Instant) -> usize {
        let before = clients.len();
        clients.retain(|_, timestamps| {
            timestamps
                .back()
                .is_some_and(|&newest| now.duration_since(newest) < self.window)
        });
        before - clients.len()
    }

    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = limiter.sweep();
                        if removed > 0 {
                            debug!("Rate limiter swept {} idle clients", removed);
                        }
                    }
                }
            }
        });
    }
}

fn evict_least_recent(clients: &mut ClientMap) {
    let oldest = clients
        .iter()
        .min_by_key(|(_, timestamps)| timestamps.back().copied())
        .map(|(client, _)| client.clone());
    if let Some(client) = oldest {
        clients.remove(&client);
    }
}

// Client address as seen behind proxies: X-Forwarded-For, X-Real-IP, peer
pub fn client_address(request: &Request) -> String {
    let headers = request.headers();
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next().map(str::trim).filter(|s| !s.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return real_ip.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn enforce_rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_address(&request);
    if !limiter.check(&client) {
        warn!("Rate limit exceeded for {}", client);
        return ApiError::RateLimited.into_response();
    }
    next.run(request).await
}
