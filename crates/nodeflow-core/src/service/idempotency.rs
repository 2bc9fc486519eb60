//! In-process duplicate-run suppression.
//!
//! Keys map to a run status plus an expiry deadline. Lookups treat expired
//! entries as absent, so an entry disappears after its TTL even if nobody
//! calls [`IdempotencyService::sweep_expired`]. Nothing is persisted: a
//! process restart forgets every key.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdempotencyStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct IdempotencyEntry {
    status: IdempotencyStatus,
    expires_at: Instant,
}

impl IdempotencyEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug)]
pub struct IdempotencyService {
    entries: DashMap<String, IdempotencyEntry>,
    ttl: Duration,
}

impl IdempotencyService {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Claim `key` for a new run.
    ///
    /// Returns `false` when a live PROCESSING or COMPLETED entry exists. A
    /// FAILED or expired entry is replaced and the claim succeeds.
    pub fn try_begin(&self, key: &str) -> bool {
        self.try_begin_at(key, Instant::now())
    }

    pub fn try_begin_at(&self, key: &str, now: Instant) -> bool {
        let fresh = IdempotencyEntry {
            status: IdempotencyStatus::Processing,
            expires_at: now + self.ttl,
        };
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let current = *occupied.get();
                if current.is_live(now) && current.status != IdempotencyStatus::Failed {
                    tracing::debug!(key, status = ?current.status, "duplicate run suppressed");
                    return false;
                }
                occupied.insert(fresh);
                true
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh);
                true
            }
        }
    }

    pub fn mark_completed(&self, key: &str) {
        self.set_status_at(key, IdempotencyStatus::Completed, Instant::now());
    }

    pub fn mark_failed(&self, key: &str) {
        self.set_status_at(key, IdempotencyStatus::Failed, Instant::now());
    }

    /// Record `status` for `key`, restarting its TTL.
    pub fn set_status_at(&self, key: &str, status: IdempotencyStatus, now: Instant) {
        self.entries.insert(
            key.to_string(),
            IdempotencyEntry {
                status,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Live status of `key`, if any.
    pub fn status(&self, key: &str) -> Option<IdempotencyStatus> {
        self.status_at(key, Instant::now())
    }

    pub fn status_at(&self, key: &str, now: Instant) -> Option<IdempotencyStatus> {
        self.entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.status)
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(Instant::now())
    }

    pub fn sweep_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "swept expired idempotency keys");
        }
        removed
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
