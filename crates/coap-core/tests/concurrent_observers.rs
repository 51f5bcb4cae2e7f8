// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Concurrency tests for the observation registry and exchange tracker.
//!
//! Several threads start, stop and re-key entries while resources update
//! and shut down; the indexes must agree once the threads are joined.

use std::sync::Arc;
use std::thread;

use coap_core::{
    notify_listeners, CoapHandler, CoapMessage, ContentFormat, CoreConfig, CoreEvent,
    CoreMetrics, ClientInboundReliability, DeliveryQueue, MessageCode, MessageType,
    ObservableResource, OutboundSink, RemoteEndpoint, ResourceEvent, ServerObservationHandler,
    StaticResource, Token,
};

const THREADS: usize = 8;
const OPS_PER_THREAD: usize = 2_000;

fn addr(port: u16) -> RemoteEndpoint {
    RemoteEndpoint::from(([127, 0, 0, 1], port))
}

struct NullSink;

impl OutboundSink for NullSink {
    fn send(&self, _remote: RemoteEndpoint, _message: CoapMessage) -> coap_core::Result<()> {
        Ok(())
    }
}

#[test]
fn test_registry_stays_consistent_under_contention() {
    let (queue, rx) = DeliveryQueue::unbounded();
    let handler = ServerObservationHandler::new(queue, Arc::new(CoreMetrics::new()));

    let resources: Vec<Arc<StaticResource>> = (0..4)
        .map(|i| StaticResource::new(format!("/sensor/{}", i), vec![i as u8], false))
        .collect();
    for r in &resources {
        let resource: Arc<dyn ObservableResource> = r.clone();
        handler.register_resource(&resource);
    }

    let mut threads = Vec::new();
    for t in 0..THREADS {
        let handler = Arc::clone(&handler);
        let resources = resources.clone();
        threads.push(thread::spawn(move || {
            let mut rng = fastrand::Rng::with_seed(t as u64);
            for _ in 0..OPS_PER_THREAD {
                let remote = addr(rng.u16(1..6));
                let token = Token::from_u64(rng.u64(1..5));
                let r = &resources[rng.usize(..resources.len())];
                match rng.u8(0..10) {
                    0..=4 => {
                        let resource: Arc<dyn ObservableResource> = r.clone();
                        handler.start_observation(remote, token, resource, ContentFormat::APP_CBOR);
                    }
                    5..=7 => {
                        handler.stop_observation(&remote, &token);
                    }
                    8 => r.set_content(vec![rng.u8(..)]),
                    _ => {
                        let resource: Arc<dyn ObservableResource> = r.clone();
                        notify_listeners(&resource, ResourceEvent::ShuttingDown);
                        handler.register_resource(&resource);
                    }
                }
            }
        }));
    }
    for th in threads {
        th.join().expect("worker thread");
    }

    let registry = handler.registry();
    assert!(registry.check_consistency());
    let total: usize = resources
        .iter()
        .map(|r| {
            let resource: Arc<dyn ObservableResource> = r.clone();
            registry.observer_count(&resource)
        })
        .sum();
    assert_eq!(total, registry.len());

    // Shutdown cascades racing re-registrations leave every subscription in place.
    for r in &resources {
        assert_eq!(r.listeners().len(), 1);
    }

    // Every queued task names a pair that was observed at some point.
    for task in rx.try_iter() {
        assert!((1..6).contains(&task.remote().port()));
        assert!(!task.token().is_empty());
    }
}

#[test]
fn test_tracker_under_concurrent_traffic() {
    let handler = Arc::new(ClientInboundReliability::new(
        &CoreConfig::default(),
        Arc::new(NullSink),
        Arc::new(CoreMetrics::new()),
    ));

    let mut threads = Vec::new();
    for t in 0..THREADS {
        let handler = Arc::clone(&handler);
        threads.push(thread::spawn(move || {
            // Each thread owns its own port range, so its exchanges are private.
            let base = 1000 + (t as u16) * 10;
            for i in 0..OPS_PER_THREAD as u64 {
                let remote = addr(base + (i % 3) as u16);
                let token = Token::from_u64(i + 1);
                let request = CoapMessage::request(MessageType::Con, MessageCode::GET, token);
                assert!(handler.handle_outbound(&request, remote));

                if i % 5 == 0 {
                    let moved = addr(base + 5);
                    handler.handle_event(&CoreEvent::RemoteSocketChanged {
                        previous: remote,
                        current: moved,
                        token,
                    });
                    let response = CoapMessage::response(MessageType::Non, MessageCode::CONTENT, token)
                        .with_message_id(i as u16);
                    assert!(handler.handle_inbound(&response, moved));
                } else {
                    let response = CoapMessage::response(MessageType::Con, MessageCode::CONTENT, token)
                        .with_message_id(i as u16);
                    assert!(handler.handle_inbound(&response, remote));
                    // Duplicate after the exchange closed.
                    assert!(!handler.handle_inbound(&response, remote));
                }
            }
        }));
    }
    for th in threads {
        th.join().expect("worker thread");
    }

    assert!(handler.tracker().is_empty());
}
