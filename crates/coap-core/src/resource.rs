// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Observable resource abstraction.
//
// Resources are owned by the application and shared with the core through
// `Arc<dyn ObservableResource>`. They announce lifecycle changes to an explicit
// list of listeners instead of a process-wide broadcast.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::config::CoreConfig;
use crate::message::{ContentFormat, RemoteEndpoint};

// ---------------------------------------------------------------------------
// Representation
// ---------------------------------------------------------------------------

/// A resource's content serialized for one content format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Representation {
    pub content: Vec<u8>,
    pub content_format: ContentFormat,
    pub etag: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Events and listeners
// ---------------------------------------------------------------------------

/// Lifecycle events raised by an observable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceEvent {
    /// Content changed; observers should be notified.
    Updated,
    /// The resource is being removed; all observations end.
    ShuttingDown,
}

/// Receives lifecycle events from the resources it subscribed to.
pub trait ResourceListener: Send + Sync {
    fn on_resource_event(&self, resource: &Arc<dyn ObservableResource>, event: ResourceEvent);
}

/// Subscription list embedded in every observable resource.
///
/// Listeners are held weakly: a resource never keeps its observers' handler
/// alive. Dead entries are pruned on the next notification.
#[derive(Default)]
pub struct ListenerSet {
    listeners: RwLock<Vec<Weak<dyn ResourceListener>>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a listener. Returns `false` if it was already subscribed.
    pub fn subscribe(&self, listener: Weak<dyn ResourceListener>) -> bool {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| Weak::ptr_eq(l, &listener)) {
            return false;
        }
        listeners.push(listener);
        true
    }

    /// Remove a listener. Returns `true` if it was subscribed.
    pub fn unsubscribe(&self, listener: &Weak<dyn ResourceListener>) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !Weak::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Live listeners, pruning the ones that have been dropped.
    pub fn snapshot(&self) -> Vec<Arc<dyn ResourceListener>> {
        let mut live = Vec::new();
        let mut dead = false;
        for l in self.listeners.read().iter() {
            match l.upgrade() {
                Some(listener) => live.push(listener),
                None => dead = true,
            }
        }
        if dead {
            self.listeners.write().retain(|l| l.strong_count() > 0);
        }
        live
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listeners", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Resource trait
// ---------------------------------------------------------------------------

/// A server resource that clients can observe.
pub trait ObservableResource: Send + Sync {
    /// Path the resource is registered under (e.g. "/temp").
    fn uri_path(&self) -> &str;

    /// Current content serialized for `content_format`.
    fn representation(&self, content_format: ContentFormat) -> Representation;

    /// Whether update notifications to `remote` should be sent confirmable.
    fn is_update_notification_confirmable(&self, remote: &RemoteEndpoint) -> bool;

    /// The resource's subscription list.
    fn listeners(&self) -> &ListenerSet;
}

/// Deliver `event` to every live listener of `resource`.
///
/// The listener list lock is released before any listener runs.
pub fn notify_listeners(resource: &Arc<dyn ObservableResource>, event: ResourceEvent) {
    let listeners = resource.listeners().snapshot();
    log::debug!(
        "[resource] {:?} on \"{}\" ({} listeners)",
        event,
        resource.uri_path(),
        listeners.len()
    );
    for listener in listeners {
        listener.on_resource_event(resource, event);
    }
}

// ---------------------------------------------------------------------------
// Static resource
// ---------------------------------------------------------------------------

/// Byte-content resource whose representation is the same for every format.
///
/// The entity tag is derived from a version counter bumped on every update.
pub struct StaticResource {
    path: String,
    content: RwLock<Vec<u8>>,
    version: AtomicU64,
    confirmable_default: bool,
    confirmable_overrides: RwLock<HashMap<RemoteEndpoint, bool>>,
    listeners: ListenerSet,
}

impl StaticResource {
    pub fn new(path: impl Into<String>, content: Vec<u8>, confirmable_default: bool) -> Arc<Self> {
        Arc::new(Self {
            path: path.into(),
            content: RwLock::new(content),
            version: AtomicU64::new(1),
            confirmable_default,
            confirmable_overrides: RwLock::new(HashMap::new()),
            listeners: ListenerSet::new(),
        })
    }

    /// Create a resource whose default reliability comes from `config`.
    pub fn with_config(path: impl Into<String>, content: Vec<u8>, config: &CoreConfig) -> Arc<Self> {
        Self::new(path, content, config.confirmable_notifications_default)
    }

    /// Override notification reliability for one endpoint.
    pub fn set_confirmable_for(&self, remote: RemoteEndpoint, confirmable: bool) {
        self.confirmable_overrides.write().insert(remote, confirmable);
    }

    /// Replace the content and notify listeners with `Updated`.
    pub fn set_content(self: &Arc<Self>, content: Vec<u8>) {
        *self.content.write() = content;
        self.version.fetch_add(1, Ordering::Relaxed);
        let resource: Arc<dyn ObservableResource> = self.clone();
        notify_listeners(&resource, ResourceEvent::Updated);
    }

    /// Notify listeners with `ShuttingDown`.
    pub fn shutdown(self: &Arc<Self>) {
        let resource: Arc<dyn ObservableResource> = self.clone();
        notify_listeners(&resource, ResourceEvent::ShuttingDown);
    }

    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Relaxed)
    }
}

impl ObservableResource for StaticResource {
    fn uri_path(&self) -> &str {
        &self.path
    }

    fn representation(&self, content_format: ContentFormat) -> Representation {
        let version = self.version();
        let be = version.to_be_bytes();
        let skip = be.iter().take_while(|&&b| b == 0).count().min(be.len() - 1);
        Representation {
            content: self.content.read().clone(),
            content_format,
            etag: be[skip..].to_vec(),
        }
    }

    fn is_update_notification_confirmable(&self, remote: &RemoteEndpoint) -> bool {
        self.confirmable_overrides
            .read()
            .get(remote)
            .copied()
            .unwrap_or(self.confirmable_default)
    }

    fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }
}

impl fmt::Debug for StaticResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticResource")
            .field("path", &self.path)
            .field("version", &self.version())
            .finish()
    }
}
