use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use dashmap::DashMap;

use crate::error::AppError;

#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub limit: u32,
    pub period: Duration,
}

impl Window {
    pub const fn per_minute(limit: u32) -> Self {
        Self {
            limit,
            period: Duration::from_secs(60),
        }
    }

    pub const fn per_hour(limit: u32) -> Self {
        Self {
            limit,
            period: Duration::from_secs(60 * 60),
        }
    }
}

/// Sliding-window limiter keyed by caller. A hit is recorded only when every
/// window still has room. Keys whose hits have all aged out are swept at most
/// once per retention period.
pub struct RateLimiter {
    windows: Vec<Window>,
    retention: Duration,
    hits: DashMap<String, VecDeque<Instant>>,
    next_sweep: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(windows: Vec<Window>) -> Self {
        let retention = windows
            .iter()
            .map(|w| w.period)
            .max()
            .unwrap_or_default();
        Self {
            windows,
            retention,
            hits: DashMap::new(),
            next_sweep: Mutex::new(Instant::now() + retention),
        }
    }

    pub fn check(&self, key: &str) -> Result<(), AppError> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), AppError> {
        self.sweep_if_due(now);

        let mut hits = self.hits.entry(key.to_string()).or_default();

        while let Some(oldest) = hits.front() {
            if now.saturating_duration_since(*oldest) >= self.retention {
                hits.pop_front();
            } else {
                break;
            }
        }

        for window in &self.windows {
            let in_window: Vec<&Instant> = hits
                .iter()
                .filter(|t| now.saturating_duration_since(**t) < window.period)
                .collect();
            if in_window.len() >= window.limit as usize {
                let frees_at = *in_window[0] + window.period;
                let wait = frees_at.saturating_duration_since(now);
                let retry_after = (wait.as_secs() + u64::from(wait.subsec_nanos() > 0)).max(1);
                tracing::warn!(%key, limit = window.limit, period = ?window.period, "rate limit exceeded");
                return Err(AppError::RateLimited { retry_after });
            }
        }

        hits.push_back(now);
        Ok(())
    }

    // Must not run while an entry guard is held.
    fn sweep_if_due(&self, now: Instant) {
        {
            let Ok(mut next) = self.next_sweep.lock() else {
                return;
            };
            if now < *next {
                return;
            }
            *next = now + self.retention;
        }
        let before = self.hits.len();
        self.hits.retain(|_, q| {
            q.back()
                .is_some_and(|t| now.saturating_duration_since(*t) < self.retention)
        });
        tracing::debug!(before, after = self.hits.len(), "rate limiter swept");
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.hits.len()
    }
}

/// Per-route limiters.
pub struct RateLimits {
    pub generate: RateLimiter,
    pub save: RateLimiter,
    pub list: RateLimiter,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            generate: RateLimiter::new(vec![Window::per_hour(20)]),
            save: RateLimiter::new(vec![Window::per_minute(5), Window::per_hour(20)]),
            list: RateLimiter::new(vec![Window::per_minute(30)]),
        }
    }
}

/// Key for callers without a verified identity: the first `X-Forwarded-For`
/// hop, else a shared bucket.
pub fn anonymous_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|ip| format!("ip:{ip}"))
        .unwrap_or_else(|| "anonymous".to_string())
}
