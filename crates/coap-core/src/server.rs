// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Server-side observation handling and notification fan-out.
//
// Glues the pipeline filters, collaborator events and resource events to the
// observation registry, and turns resource events into delivery tasks.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::delivery::{DeliveryQueue, DeliveryTask};
use crate::handler::{CoapHandler, CoreEvent};
use crate::message::{CoapMessage, ContentFormat, MessageType, RemoteEndpoint, Token};
use crate::metrics::CoreMetrics;
use crate::observation::{Observation, ObservationRegistry};
use crate::resource::{ObservableResource, Representation, ResourceEvent, ResourceListener};

/// Observe value that registers an observer (RFC 7641 Sec.2).
const OBSERVE_REGISTER: u32 = 0;

/// Server role: owns the observation registry and dispatches notifications.
pub struct ServerObservationHandler {
    registry: ObservationRegistry,
    queue: DeliveryQueue,
    metrics: Arc<CoreMetrics>,
    self_ref: Weak<ServerObservationHandler>,
}

impl ServerObservationHandler {
    /// Create a handler that enqueues its delivery tasks on `queue`.
    pub fn new(queue: DeliveryQueue, metrics: Arc<CoreMetrics>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            registry: ObservationRegistry::new(),
            queue,
            metrics,
            self_ref: self_ref.clone(),
        })
    }

    pub fn registry(&self) -> &ObservationRegistry {
        &self.registry
    }

    /// Subscribe to `resource`'s lifecycle events.
    pub fn register_resource(&self, resource: &Arc<dyn ObservableResource>) -> bool {
        let listener: Weak<dyn ResourceListener> = self.self_ref.clone();
        let added = resource.listeners().subscribe(listener);
        if added {
            log::debug!("[observe] listening to \"{}\"", resource.uri_path());
        }
        added
    }

    /// Stop listening to `resource`. Its existing observations are kept.
    pub fn unregister_resource(&self, resource: &Arc<dyn ObservableResource>) -> bool {
        let listener: Weak<dyn ResourceListener> = self.self_ref.clone();
        resource.listeners().unsubscribe(&listener)
    }

    pub fn start_observation(
        &self,
        remote: RemoteEndpoint,
        token: Token,
        resource: Arc<dyn ObservableResource>,
        content_format: ContentFormat,
    ) {
        let replaced = self
            .registry
            .start_observation(remote, token, resource, content_format);
        self.metrics.record_observation_started();
        if replaced.is_some() {
            self.metrics.record_observations_stopped(1);
        }
    }

    /// Stop the observation of (`remote`, `token`). Idempotent.
    pub fn stop_observation(&self, remote: &RemoteEndpoint, token: &Token) -> Option<Observation> {
        let removed = self.registry.stop_observation(remote, token);
        if removed.is_some() {
            self.metrics.record_observations_stopped(1);
        }
        removed
    }

    fn enqueue(&self, task: DeliveryTask) {
        let remote = task.remote();
        match self.queue.submit(task) {
            Ok(()) => self.metrics.record_notification_enqueued(),
            Err(e) => {
                self.metrics.record_enqueue_failure();
                log::warn!("[observe] could not enqueue notification for {}: {}", remote, e);
            }
        }
    }

    /// One fan-out round for an `Updated` event.
    fn send_update_notifications(&self, resource: &Arc<dyn ObservableResource>) {
        let observers = self.registry.snapshot(resource);
        if observers.is_empty() {
            return;
        }
        // Every observer of the round carries the same observe value.
        let Some(observe_sequence) = self.registry.next_observe_sequence(resource) else {
            return;
        };

        // One representation per format for the whole round.
        let mut representations: HashMap<ContentFormat, Arc<Representation>> = HashMap::new();

        for entry in observers {
            let representation = Arc::clone(
                representations
                    .entry(entry.content_format)
                    .or_insert_with(|| Arc::new(resource.representation(entry.content_format))),
            );

            let message_type = if resource.is_update_notification_confirmable(&entry.key.remote) {
                MessageType::Con
            } else {
                MessageType::Non
            };

            self.enqueue(DeliveryTask::Update {
                remote: entry.key.remote,
                token: entry.key.token,
                representation,
                message_type,
                observe_sequence,
            });
        }
    }

    /// Remove every observer of a resource that is going away and tell each.
    ///
    /// The subscription itself is left in place: a concurrent
    /// `ResourceRegistered` for the same resource must not be undone here.
    fn send_shutdown_notifications(&self, resource: &Arc<dyn ObservableResource>) {
        let path = resource.uri_path();

        // Removal completes before any task is enqueued.
        let removed = self.registry.shutdown_resource(resource);
        self.metrics.record_observations_stopped(removed.len() as u64);

        for obs in removed {
            self.enqueue(DeliveryTask::Shutdown {
                remote: obs.key.remote,
                token: obs.key.token,
                resource_path: path.to_string(),
            });
        }
    }
}

impl ResourceListener for ServerObservationHandler {
    fn on_resource_event(&self, resource: &Arc<dyn ObservableResource>, event: ResourceEvent) {
        match event {
            ResourceEvent::Updated => self.send_update_notifications(resource),
            ResourceEvent::ShuttingDown => self.send_shutdown_notifications(resource),
        }
    }
}

impl CoapHandler for ServerObservationHandler {
    fn handle_inbound(&self, message: &CoapMessage, remote: RemoteEndpoint) -> bool {
        // A registration is followed by ObserverAccepted, which rebinds the
        // token; every other request reusing the token ends the observation.
        if message.is_request() && message.observe != Some(OBSERVE_REGISTER) {
            self.stop_observation(&remote, &message.token);
        }
        true
    }

    fn handle_outbound(&self, message: &CoapMessage, remote: RemoteEndpoint) -> bool {
        if message.is_response() && !message.is_update_notification() {
            self.stop_observation(&remote, &message.token);
        }
        true
    }

    fn handle_event(&self, event: &CoreEvent) {
        match event {
            CoreEvent::ResourceRegistered { resource } => {
                self.register_resource(resource);
            }
            CoreEvent::ObserverAccepted {
                remote,
                token,
                resource,
                content_format,
            } => self.start_observation(*remote, *token, Arc::clone(resource), *content_format),
            CoreEvent::ResetReceived { remote, token } => {
                self.stop_observation(remote, token);
            }
            CoreEvent::RemoteSocketChanged { .. } => {}
        }
    }
}

impl fmt::Debug for ServerObservationHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerObservationHandler")
            .field("registry", &self.registry)
            .field("pending_tasks", &self.queue.pending())
            .finish()
    }
}
