// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Client-side exchange tracking.
//
// An exchange is the (remote endpoint, token) pair of a request we sent and
// for which a response is still awaited. Observe exchanges stay open across
// any number of update notifications; the first non-notification response
// closes them.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::message::{RemoteEndpoint, Token};

/// Outstanding exchanges grouped by endpoint, with their total count.
#[derive(Debug, Default)]
struct Exchanges {
    by_endpoint: HashMap<RemoteEndpoint, HashSet<Token>>,
    count: usize,
}

impl Exchanges {
    fn contains(&self, remote: &RemoteEndpoint, token: &Token) -> bool {
        self.by_endpoint
            .get(remote)
            .is_some_and(|tokens| tokens.contains(token))
    }

    fn insert(&mut self, remote: RemoteEndpoint, token: Token) -> bool {
        let inserted = self.by_endpoint.entry(remote).or_default().insert(token);
        if inserted {
            self.count += 1;
        }
        inserted
    }

    /// Remove one pair, pruning the endpoint once it has no tokens left.
    fn remove(&mut self, remote: &RemoteEndpoint, token: &Token) -> bool {
        let Some(tokens) = self.by_endpoint.get_mut(remote) else {
            return false;
        };
        let removed = tokens.remove(token);
        if tokens.is_empty() {
            self.by_endpoint.remove(remote);
        }
        if removed {
            self.count -= 1;
        }
        removed
    }
}

/// Set of outstanding (endpoint, token) pairs under one reader/writer lock.
#[derive(Debug, Default)]
pub struct ExchangeTracker {
    ongoing: RwLock<Exchanges>,
}

impl ExchangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a request with `token` was sent to `remote`.
    ///
    /// Keys are the pair: the same token may be in flight to several endpoints.
    pub fn register_outbound_request(&self, remote: RemoteEndpoint, token: Token) {
        let mut ongoing = self.ongoing.write();
        ongoing.insert(remote, token);
        log::debug!(
            "[exchange] added exchange with {} token={} (now: {})",
            remote,
            token,
            ongoing.count
        );
    }

    /// Whether a response from `remote` carrying `token` is awaited.
    pub fn is_response_expected(&self, remote: &RemoteEndpoint, token: &Token) -> bool {
        self.ongoing.read().contains(remote, token)
    }

    /// React to an inbound response.
    ///
    /// Returns `false` if the pair is not tracked. Otherwise returns `true`;
    /// the exchange is closed unless the response is an update notification.
    pub fn consume_if_terminal(
        &self,
        remote: &RemoteEndpoint,
        token: &Token,
        is_notification: bool,
    ) -> bool {
        if is_notification {
            return self.is_response_expected(remote, token);
        }
        self.remove(remote, token)
    }

    /// Remove an exchange. Idempotent; returns whether something was removed.
    pub fn remove(&self, remote: &RemoteEndpoint, token: &Token) -> bool {
        if !self.is_response_expected(remote, token) {
            return false;
        }

        // Re-validate: another writer may have removed it since the read.
        let mut ongoing = self.ongoing.write();
        let removed = ongoing.remove(remote, token);
        if removed {
            log::debug!(
                "[exchange] removed exchange with {} token={} (remaining: {})",
                remote,
                token,
                ongoing.count
            );
        }
        removed
    }

    /// Move an exchange to the peer's new address.
    ///
    /// Both steps happen under one write lock, so no reader ever sees the
    /// exchange under both keys or under neither.
    pub fn rekey_on_endpoint_change(
        &self,
        previous: RemoteEndpoint,
        current: RemoteEndpoint,
        token: Token,
    ) {
        let mut ongoing = self.ongoing.write();
        ongoing.remove(&previous, &token);
        ongoing.insert(current, token);
        log::debug!(
            "[exchange] moved exchange token={} from {} to {}",
            token,
            previous,
            current
        );
    }

    /// Tokens currently awaited from `remote`.
    pub fn tokens_for(&self, remote: &RemoteEndpoint) -> Vec<Token> {
        self.ongoing
            .read()
            .by_endpoint
            .get(remote)
            .map(|tokens| tokens.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of outstanding exchanges across all endpoints.
    pub fn len(&self) -> usize {
        self.ongoing.read().count
    }

    pub fn is_empty(&self) -> bool {
        self.ongoing.read().count == 0
    }
}
