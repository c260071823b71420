//! Login rate limiter.
//!
//! Tracks failed attempts per client IP in a sliding window and locks the
//! IP out after the threshold. Timestamps outside the window are pruned on
//! each failure record.

use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Default)]
struct AttemptRecord {
    timestamps: Vec<Instant>,
    locked_until: Option<Instant>,
}

pub struct LoginRateLimiter {
    attempts: DashMap<String, AttemptRecord>,
    max_failures: usize,
    lockout: Duration,
    window: Duration,
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::with_limits(5, 300, 600)
    }
}

impl LoginRateLimiter {
    pub fn with_limits(max_failures: usize, lockout_seconds: u64, window_seconds: u64) -> Self {
        Self {
            attempts: DashMap::new(),
            max_failures,
            lockout: Duration::from_secs(lockout_seconds),
            window: Duration::from_secs(window_seconds),
        }
    }

    pub fn is_blocked(&self, ip: &str) -> bool {
        let Some(record) = self.attempts.get(ip) else {
            return false;
        };

        match record.locked_until {
            Some(until) if until > Instant::now() => true,
            Some(_) => {
                // Lockout expired
                drop(record);
                self.attempts.remove(ip);
                false
            },
            None => false,
        }
    }

    /// Seconds remaining in lockout. Zero when not locked.
    pub fn remaining_seconds(&self, ip: &str) -> u64 {
        let Some(record) = self.attempts.get(ip) else {
            return 0;
        };

        match record.locked_until {
            Some(until) if until > Instant::now() => {
                until.saturating_duration_since(Instant::now()).as_secs() + 1
            },
            _ => 0,
        }
    }

    pub fn record_failure(&self, ip: &str) {
        let now = Instant::now();
        let mut record = self.attempts.entry(ip.to_string()).or_default();

        let cutoff = now.checked_sub(self.window);
        record
            .timestamps
            .retain(|t| cutoff.map_or(true, |c| *t > c));
        record.timestamps.push(now);

        if record.timestamps.len() >= self.max_failures {
            record.locked_until = Some(now + self.lockout);
        }
    }

    /// Clear attempts on successful login.
    pub fn record_success(&self, ip: &str) {
        self.attempts.remove(ip);
    }

    /// Remove expired lockout records. Returns the number removed.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.attempts.len();
        self.attempts
            .retain(|_, record| !matches!(record.locked_until, Some(until) if until <= now));
        before - self.attempts.len()
    }
}
