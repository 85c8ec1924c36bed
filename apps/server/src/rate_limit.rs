use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::ApiResponse;

/// Route groups with their own request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Read-only availability endpoints.
    Public,
    /// Booking submission.
    Booking,
    Admin,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum requests allowed within the sliding window.
    pub max_requests: usize,
    pub window: Duration,
}

#[derive(Debug)]
struct TierState {
    config: RateLimitConfig,
    hits: DashMap<IpAddr, VecDeque<Instant>>,
}

/// Per-IP sliding-window limiter. Tiers without a config are unlimited.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    tiers: Arc<DashMap<Tier, TierState>>,
}

impl RateLimiter {
    pub fn new(configs: impl IntoIterator<Item = (Tier, RateLimitConfig)>) -> Self {
        let tiers = DashMap::new();
        for (tier, config) in configs {
            tiers.insert(
                tier,
                TierState {
                    config,
                    hits: DashMap::new(),
                },
            );
        }
        Self {
            tiers: Arc::new(tiers),
        }
    }

    /// `Err(retry_after_secs)` when `ip` has used up its budget for `tier`.
    pub fn check(&self, tier: Tier, ip: IpAddr) -> Result<(), u64> {
        let Some(state) = self.tiers.get(&tier) else {
            return Ok(());
        };
        let now = Instant::now();
        let window = state.config.window;

        let mut hits = state.hits.entry(ip).or_default();
        while hits.front().is_some_and(|t| now.duration_since(*t) >= window) {
            hits.pop_front();
        }

        if hits.len() >= state.config.max_requests {
            let retry_after = hits
                .front()
                .map(|oldest| (*oldest + window).saturating_duration_since(now).as_secs())
                .unwrap_or(0)
                .max(1);
            return Err(retry_after);
        }

        hits.push_back(now);
        Ok(())
    }

    /// Drop IPs with no hits in the last two windows.
    pub fn cleanup(&self) {
        let now = Instant::now();
        for state in self.tiers.iter() {
            let cutoff = state.config.window * 2;
            state.hits.retain(|_ip, hits| {
                hits.retain(|t| now.duration_since(*t) < cutoff);
                !hits.is_empty()
            });
        }
    }
}

/// Client IP from `X-Forwarded-For` (reverse proxy) or the socket.
pub fn extract_client_ip(req: &Request) -> IpAddr {
    let forwarded = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|ip| ip.trim().parse::<IpAddr>().ok());
    if let Some(ip) = forwarded {
        return ip;
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn too_many_requests(retry_after: u64) -> Response {
    let body = ApiResponse::<()>::error(format!(
        "Muitas requisições. Tente novamente em {} segundos.",
        retry_after
    ));
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, retry_after.to_string())],
        Json(body),
    )
        .into_response()
}

/// Middleware; mount with `from_fn_with_state((limiter, tier), rate_limit)`.
pub async fn rate_limit(
    State((limiter, tier)): State<(RateLimiter, Tier)>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = extract_client_ip(&req);
    limiter.check(tier, ip).map_err(|retry_after| {
        tracing::warn!("Rate limited {} on {:?} tier", ip, tier);
        too_many_requests(retry_after)
    })?;
    Ok(next.run(req).await)
}
