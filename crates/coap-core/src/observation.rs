// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Server-side observation registry.
//!
//! Three indexes describe the same set of active observations:
//!
//! ```text
//! forward   (endpoint, token) -> resource
//! reverse   resource          -> {(endpoint, token)}, observe sequence
//! formats   (endpoint, token) -> negotiated content format
//! ```
//!
//! All three live behind a single `RwLock` and every transition mutates them
//! together under the write guard, so no reader ever observes one index
//! without its counterparts. Lookups and fan-out snapshots share the read
//! guard.
//!
//! Resources are keyed by identity, not by URI path: two resource objects
//! serving the same path (an old one and its replacement) have separate
//! observer sets.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::message::{ContentFormat, RemoteEndpoint, Token, MAX_OBSERVE_SEQUENCE};
use crate::resource::ObservableResource;

/// Identifies one observer: the remote endpoint and the token it used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservationKey {
    pub remote: RemoteEndpoint,
    pub token: Token,
}

impl ObservationKey {
    pub fn new(remote: RemoteEndpoint, token: Token) -> Self {
        Self { remote, token }
    }
}

impl fmt::Display for ObservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (token {})", self.remote, self.token)
    }
}

/// One active subscription.
#[derive(Clone)]
pub struct Observation {
    pub key: ObservationKey,
    pub resource: Arc<dyn ObservableResource>,
    pub content_format: ContentFormat,
}

impl fmt::Debug for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observation")
            .field("key", &self.key)
            .field("resource", &self.resource.uri_path())
            .field("content_format", &self.content_format)
            .finish()
    }
}

/// Observer entry captured for a fan-out round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverEntry {
    pub key: ObservationKey,
    pub content_format: ContentFormat,
}

/// Hashes and compares a resource by the address of its shared allocation.
struct ResourceKey(Arc<dyn ObservableResource>);

impl ResourceKey {
    fn of(resource: &Arc<dyn ObservableResource>) -> Self {
        Self(Arc::clone(resource))
    }

    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }
}

impl PartialEq for ResourceKey {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for ResourceKey {}

impl Hash for ResourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

/// Reverse index entry: the observers of one resource.
#[derive(Default)]
struct ResourceObservers {
    keys: HashSet<ObservationKey>,
    /// Observe value of the next update round (RFC 7641 Sec.4.4), 24 bits.
    observe_sequence: AtomicU32,
}

#[derive(Default)]
struct Indexes {
    forward: HashMap<ObservationKey, Arc<dyn ObservableResource>>,
    reverse: HashMap<ResourceKey, ResourceObservers>,
    formats: HashMap<ObservationKey, ContentFormat>,
}

impl Indexes {
    /// Remove `key` from all three indexes.
    fn remove(&mut self, key: &ObservationKey) -> Option<Observation> {
        let resource = self.forward.remove(key)?;
        let resource_key = ResourceKey::of(&resource);
        if let Some(observers) = self.reverse.get_mut(&resource_key) {
            observers.keys.remove(key);
            if observers.keys.is_empty() {
                self.reverse.remove(&resource_key);
            }
        }
        let content_format = self.formats.remove(key);
        debug_assert!(
            content_format.is_some(),
            "format index has no entry for {}",
            key
        );
        let content_format = content_format.unwrap_or_else(|| {
            log::error!("[observe] format index has no entry for {}", key);
            ContentFormat::TEXT_PLAIN_UTF8
        });
        Some(Observation {
            key: *key,
            resource,
            content_format,
        })
    }

    fn insert(
        &mut self,
        key: ObservationKey,
        resource: Arc<dyn ObservableResource>,
        content_format: ContentFormat,
    ) {
        self.reverse
            .entry(ResourceKey::of(&resource))
            .or_default()
            .keys
            .insert(key);
        self.formats.insert(key, content_format);
        self.forward.insert(key, resource);
    }
}

/// Tri-index registry of active observations.
#[derive(Default)]
pub struct ObservationRegistry {
    indexes: RwLock<Indexes>,
}

impl ObservationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observation, replacing any existing one for the same
    /// (endpoint, token). Returns the replaced observation.
    pub fn start_observation(
        &self,
        remote: RemoteEndpoint,
        token: Token,
        resource: Arc<dyn ObservableResource>,
        content_format: ContentFormat,
    ) -> Option<Observation> {
        let key = ObservationKey::new(remote, token);
        let mut indexes = self.indexes.write();
        let replaced = indexes.remove(&key);
        log::info!(
            "[observe] client {} is now observing \"{}\" (token {}, format {})",
            remote,
            resource.uri_path(),
            token,
            content_format
        );
        indexes.insert(key, resource, content_format);
        replaced
    }

    /// Remove the observation of (`remote`, `token`), if any.
    ///
    /// The existence check runs under the read guard so the common "nothing
    /// to stop" path never takes the write guard. The removal re-validates
    /// under the write guard; a concurrent stop of the same pair yields
    /// exactly one `Some`.
    pub fn stop_observation(&self, remote: &RemoteEndpoint, token: &Token) -> Option<Observation> {
        let key = ObservationKey::new(*remote, *token);
        if !self.indexes.read().forward.contains_key(&key) {
            return None;
        }

        let removed = self.indexes.write().remove(&key)?;
        log::info!(
            "[observe] client {} is no longer observing \"{}\" (token was {})",
            remote,
            removed.resource.uri_path(),
            token
        );
        Some(removed)
    }

    /// Remove every observation of `resource` in one transition.
    pub fn shutdown_resource(&self, resource: &Arc<dyn ObservableResource>) -> Vec<Observation> {
        let mut indexes = self.indexes.write();
        let keys: Vec<ObservationKey> = indexes
            .reverse
            .get(&ResourceKey::of(resource))
            .map(|observers| observers.keys.iter().copied().collect())
            .unwrap_or_default();

        let removed: Vec<Observation> = keys.iter().filter_map(|k| indexes.remove(k)).collect();
        drop(indexes);

        for obs in &removed {
            log::info!(
                "[observe] client {} is no longer observing \"{}\" (resource shut down)",
                obs.key.remote,
                resource.uri_path()
            );
        }
        removed
    }

    /// Observers of `resource`, captured under one read guard.
    pub fn snapshot(&self, resource: &Arc<dyn ObservableResource>) -> Vec<ObserverEntry> {
        let indexes = self.indexes.read();
        let Some(observers) = indexes.reverse.get(&ResourceKey::of(resource)) else {
            return Vec::new();
        };
        observers
            .keys
            .iter()
            .filter_map(|key| {
                let content_format = indexes.formats.get(key);
                debug_assert!(
                    content_format.is_some(),
                    "format index has no entry for {}",
                    key
                );
                content_format.map(|&content_format| ObserverEntry {
                    key: *key,
                    content_format,
                })
            })
            .collect()
    }

    /// Take the observe value for the next update round of `resource`.
    ///
    /// The sequence lives as long as the resource has observers and wraps at
    /// 24 bits. Returns `None` when nobody observes the resource.
    pub fn next_observe_sequence(&self, resource: &Arc<dyn ObservableResource>) -> Option<u32> {
        self.indexes
            .read()
            .reverse
            .get(&ResourceKey::of(resource))
            .map(|observers| {
                // 2^32 is a multiple of 2^24, so masking wraps cleanly.
                observers.observe_sequence.fetch_add(1, Ordering::Relaxed) & MAX_OBSERVE_SEQUENCE
            })
    }

    pub fn resource_of(
        &self,
        remote: &RemoteEndpoint,
        token: &Token,
    ) -> Option<Arc<dyn ObservableResource>> {
        self.indexes
            .read()
            .forward
            .get(&ObservationKey::new(*remote, *token))
            .cloned()
    }

    pub fn content_format_of(&self, remote: &RemoteEndpoint, token: &Token) -> Option<ContentFormat> {
        self.indexes
            .read()
            .formats
            .get(&ObservationKey::new(*remote, *token))
            .copied()
    }

    pub fn is_observing(&self, remote: &RemoteEndpoint, token: &Token) -> bool {
        self.indexes
            .read()
            .forward
            .contains_key(&ObservationKey::new(*remote, *token))
    }

    /// Number of active observations of `resource`.
    pub fn observer_count(&self, resource: &Arc<dyn ObservableResource>) -> usize {
        self.indexes
            .read()
            .reverse
            .get(&ResourceKey::of(resource))
            .map_or(0, |observers| observers.keys.len())
    }

    /// Total number of active observations.
    pub fn len(&self) -> usize {
        self.indexes.read().forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.read().forward.is_empty()
    }

    /// Verify that the three indexes describe the same set of observations.
    pub fn check_consistency(&self) -> bool {
        let indexes = self.indexes.read();

        if indexes.forward.len() != indexes.formats.len() {
            return false;
        }
        let reverse_total: usize = indexes.reverse.values().map(|o| o.keys.len()).sum();
        if reverse_total != indexes.forward.len() {
            return false;
        }
        if indexes.reverse.values().any(|o| o.keys.is_empty()) {
            return false;
        }
        indexes.forward.iter().all(|(key, resource)| {
            indexes.formats.contains_key(key)
                && indexes
                    .reverse
                    .get(&ResourceKey::of(resource))
                    .is_some_and(|observers| observers.keys.contains(key))
        })
    }
}

impl fmt::Debug for ObservationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservationRegistry")
            .field("observations", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::StaticResource;

    fn key(port: u16) -> ObservationKey {
        ObservationKey::new(RemoteEndpoint::from(([127, 0, 0, 1], port)), Token::from_u64(1))
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "format index has no entry")]
    fn test_missing_format_entry_is_loud() {
        let resource: Arc<dyn ObservableResource> = StaticResource::new("/temp", Vec::new(), false);
        let mut indexes = Indexes::default();
        indexes.insert(key(1), resource, ContentFormat::APP_JSON);
        indexes.formats.remove(&key(1));
        indexes.remove(&key(1));
    }

    #[test]
    fn test_resource_key_is_identity() {
        let a: Arc<dyn ObservableResource> = StaticResource::new("/temp", Vec::new(), false);
        let b: Arc<dyn ObservableResource> = StaticResource::new("/temp", Vec::new(), false);
        assert!(ResourceKey::of(&a) == ResourceKey::of(&Arc::clone(&a)));
        assert!(ResourceKey::of(&a) != ResourceKey::of(&b));
    }
}
