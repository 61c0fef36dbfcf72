use std::collections::HashMap;
use std::net::IpAddr;

use crate::session::{RateWindow, Session};

/// Sliding fixed-window limiter over per-session counters, keyed by
/// `action:ip`. Defaults: 5 attempts per 900 seconds.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    pub window_secs: i64,
    pub max_attempts: u32,
}

impl RateLimiter {
    pub fn new(window_secs: i64, max_attempts: u32) -> Self {
        Self {
            window_secs,
            max_attempts,
        }
    }

    fn key(action: &str, ip: IpAddr) -> String {
        format!("{action}:{ip}")
    }

    /// Check whether an attempt is allowed. Returns remaining seconds until
    /// the window resets when blocked. An expired window resets implicitly.
    pub fn check(&self, session: &Session, action: &str, ip: IpAddr, now: i64) -> Result<(), i64> {
        let key = Self::key(action, ip);
        session.with_rate_limits(|windows| self.check_inner(windows, &key, now))
    }

    fn check_inner(
        &self,
        windows: &mut HashMap<String, RateWindow>,
        key: &str,
        now: i64,
    ) -> Result<(), i64> {
        let Some(window) = windows.get(key) else {
            return Ok(());
        };
        if now - window.window_start > self.window_secs {
            windows.remove(key);
            return Ok(());
        }
        if window.count >= self.max_attempts {
            return Err(self.window_secs - (now - window.window_start));
        }
        Ok(())
    }

    /// Record an attempt, opening a new window if the old one expired.
    pub fn hit(&self, session: &Session, action: &str, ip: IpAddr, now: i64) {
        let key = Self::key(action, ip);
        session.with_rate_limits(|windows| {
            let window = windows.entry(key).or_insert(RateWindow {
                count: 0,
                window_start: now,
            });
            if now - window.window_start > self.window_secs {
                window.count = 1;
                window.window_start = now;
            } else {
                window.count += 1;
            }
        });
    }

    /// Clear the counter for an action, e.g. after a successful login.
    pub fn reset(&self, session: &Session, action: &str, ip: IpAddr) {
        let key = Self::key(action, ip);
        session.with_rate_limits(|windows| {
            windows.remove(&key);
        });
    }
}
