// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Observability counters for the exchange and observation layers.
//!
//! All methods use atomic operations (Relaxed ordering) for lock-free updates;
//! counters are cumulative and never reset.

use std::sync::atomic::{AtomicU64, Ordering};

/// Plain copy of every counter at one point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub resets_sent: u64,
    pub pings_answered: u64,
    pub unexpected_responses: u64,
    pub empty_acks_sent: u64,
    pub observations_started: u64,
    pub observations_stopped: u64,
    pub notifications_enqueued: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub shutdown_notices_sent: u64,
    pub enqueue_failures: u64,
}

/// Shared counters, usually held behind an `Arc`.
#[derive(Debug, Default)]
pub struct CoreMetrics {
    resets_sent: AtomicU64,
    pings_answered: AtomicU64,
    unexpected_responses: AtomicU64,
    empty_acks_sent: AtomicU64,
    observations_started: AtomicU64,
    observations_stopped: AtomicU64,
    notifications_enqueued: AtomicU64,
    notifications_sent: AtomicU64,
    notifications_failed: AtomicU64,
    shutdown_notices_sent: AtomicU64,
    enqueue_failures: AtomicU64,
}

impl CoreMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_reset_sent(&self) {
        self.resets_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_ping_answered(&self) {
        self.pings_answered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_unexpected_response(&self) {
        self.unexpected_responses.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_empty_ack_sent(&self) {
        self.empty_acks_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_observation_started(&self) {
        self.observations_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record `count` observations removed in one transition.
    #[inline]
    pub fn record_observations_stopped(&self, count: u64) {
        self.observations_stopped.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_notification_enqueued(&self) {
        self.notifications_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_notification_failed(&self) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_shutdown_notice_sent(&self) {
        self.shutdown_notices_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_enqueue_failure(&self) {
        self.enqueue_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn resets_sent(&self) -> u64 {
        self.resets_sent.load(Ordering::Relaxed)
    }

    pub fn notifications_sent(&self) -> u64 {
        self.notifications_sent.load(Ordering::Relaxed)
    }

    pub fn notifications_failed(&self) -> u64 {
        self.notifications_failed.load(Ordering::Relaxed)
    }

    /// Load all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            resets_sent: self.resets_sent.load(Ordering::Relaxed),
            pings_answered: self.pings_answered.load(Ordering::Relaxed),
            unexpected_responses: self.unexpected_responses.load(Ordering::Relaxed),
            empty_acks_sent: self.empty_acks_sent.load(Ordering::Relaxed),
            observations_started: self.observations_started.load(Ordering::Relaxed),
            observations_stopped: self.observations_stopped.load(Ordering::Relaxed),
            notifications_enqueued: self.notifications_enqueued.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            shutdown_notices_sent: self.shutdown_notices_sent.load(Ordering::Relaxed),
            enqueue_failures: self.enqueue_failures.load(Ordering::Relaxed),
        }
    }
}
