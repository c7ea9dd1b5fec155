//! Per-client token buckets.
//!
//! A bucket holds `capacity` tokens and refills `capacity` tokens per window,
//! so a client may burst the whole quota and then recovers linearly.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Upper bound on tracked clients. Idle buckets go first, then the least
/// recently seen one.
const DEFAULT_MAX_CLIENTS: usize = 10_000;

#[derive(Debug)]
struct TokenBucket {
    capacity: u32,
    window_ns: u128,
    tokens: u32,
    last: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, window: Duration, now: Instant) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            window_ns: window.as_nanos().max(1),
            tokens: capacity,
            last: now,
            last_seen: now,
        }
    }

    fn allow(&mut self, now: Instant) -> bool {
        self.refill(now);
        self.last_seen = now;

        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }

    /// `last` only advances by the time the granted tokens cost, so a
    /// partial token carries over to the next refill.
    fn refill(&mut self, now: Instant) {
        let capacity = u128::from(self.capacity);
        let elapsed = now.saturating_duration_since(self.last).as_nanos();
        let add = elapsed * capacity / self.window_ns;
        if add == 0 {
            return;
        }

        let total = u128::from(self.tokens) + add;
        if total >= capacity {
            self.tokens = self.capacity;
            self.last = now;
        } else {
            self.tokens = total as u32;
            let spent = add * self.window_ns / capacity;
            self.last = u64::try_from(spent).map_or(now, |ns| self.last + Duration::from_nanos(ns));
        }
    }
}

pub struct ClientRateLimiter {
    capacity: u32,
    window: Duration,
    max_clients: usize,
    buckets: DashMap<String, TokenBucket>,
}

impl ClientRateLimiter {
    pub fn new(capacity: u32, window: Duration) -> Self {
        Self::with_max_clients(capacity, window, DEFAULT_MAX_CLIENTS)
    }

    pub fn with_max_clients(capacity: u32, window: Duration, max_clients: usize) -> Self {
        Self {
            capacity,
            window,
            max_clients: max_clients.max(1),
            buckets: DashMap::new(),
        }
    }

    pub fn allow(&self, client: &str) -> bool {
        self.allow_at(client, Instant::now())
    }

    pub fn allow_at(&self, client: &str, now: Instant) -> bool {
        if !self.buckets.contains_key(client) && self.buckets.len() >= self.max_clients {
            self.sweep(now);
            if self.buckets.len() >= self.max_clients {
                self.evict_least_recent();
            }
        }

        let mut bucket = self
            .buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, self.window, now));
        bucket.allow(now)
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }

    /// Drop buckets idle for a full window; those are back at capacity anyway.
    fn sweep(&self, now: Instant) {
        let window = self.window;
        self.buckets
            .retain(|_, b| now.saturating_duration_since(b.last_seen) < window);
        tracing::debug!(clients = self.buckets.len(), "rate limiter swept idle clients");
    }

    fn evict_least_recent(&self) {
        let oldest = self
            .buckets
            .iter()
            .min_by_key(|b| b.value().last_seen)
            .map(|b| b.key().clone());
        if let Some(key) = oldest {
            self.buckets.remove(&key);
            tracing::debug!(client = %key, "rate limiter evicted least recent client");
        }
    }
}
