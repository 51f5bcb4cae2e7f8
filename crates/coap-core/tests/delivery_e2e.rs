// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! End-to-end tests for notification delivery.
//!
//! A `ServerObservationHandler` feeds a real `DeliveryPool`; outbound
//! messages are captured through a `ChannelSink` or a sink that fails for
//! selected endpoints.
//!
//! # Running
//!
//! ```bash
//! cargo test -p coap-core --test delivery_e2e
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use coap_core::{
    notify_listeners, ChannelSink, CoapError, CoapMessage, ContentFormat, CoreConfig, CoreMetrics,
    DeliveryPool, MessageCode, MessageType, ObservableResource, OutboundSink, RemoteEndpoint,
    ResourceEvent, ServerObservationHandler, StaticResource, Token,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn addr(port: u16) -> RemoteEndpoint {
    RemoteEndpoint::from(([192, 168, 1, 10], port))
}

/// Forwards to a `ChannelSink` except for one unreachable endpoint.
struct PartiallyFailingSink {
    inner: ChannelSink,
    unreachable: RemoteEndpoint,
}

impl OutboundSink for PartiallyFailingSink {
    fn send(&self, remote: RemoteEndpoint, message: CoapMessage) -> Result<(), CoapError> {
        if remote == self.unreachable {
            return Err(CoapError::SendFailed {
                remote,
                reason: "host unreachable".into(),
            });
        }
        self.inner.send(remote, message)
    }
}

fn config(workers: usize) -> CoreConfig {
    CoreConfig {
        delivery_workers: workers,
        delivery_queue_capacity: 64,
        ..CoreConfig::default()
    }
}

#[test]
fn test_update_reaches_every_observer() {
    let (sink, rx) = ChannelSink::unbounded();
    let metrics = Arc::new(CoreMetrics::new());
    let mut pool =
        DeliveryPool::spawn(&config(4), Arc::new(sink), Arc::clone(&metrics)).expect("spawn pool");
    let handler = ServerObservationHandler::new(pool.queue(), Arc::clone(&metrics));

    let temp = StaticResource::new("/temp", b"21.0".to_vec(), false);
    let resource: Arc<dyn ObservableResource> = temp.clone();
    handler.register_resource(&resource);

    let observers: Vec<(RemoteEndpoint, Token)> = (1..=8u16)
        .map(|i| (addr(5000 + i), Token::from_u64(u64::from(i))))
        .collect();
    for (remote, token) in &observers {
        handler.start_observation(
            *remote,
            *token,
            Arc::clone(&resource),
            ContentFormat::TEXT_PLAIN_UTF8,
        );
    }

    temp.set_content(b"22.5".to_vec());

    let mut seen = HashSet::new();
    for _ in 0..observers.len() {
        let (remote, msg) = rx.recv_timeout(RECV_TIMEOUT).expect("notification");
        assert_eq!(msg.code, MessageCode::CONTENT);
        assert_eq!(msg.message_type, MessageType::Non);
        assert_eq!(msg.content, b"22.5".to_vec());
        assert!(msg.is_update_notification());
        seen.insert((remote, msg.token));
    }
    let expected: HashSet<_> = observers.iter().copied().collect();
    assert_eq!(seen, expected);

    pool.shutdown();
    assert_eq!(metrics.notifications_sent(), observers.len() as u64);
}

#[test]
fn test_failed_delivery_does_not_affect_others() {
    let (inner, rx) = ChannelSink::unbounded();
    let sink = PartiallyFailingSink {
        inner,
        unreachable: addr(2),
    };
    let metrics = Arc::new(CoreMetrics::new());
    let mut pool =
        DeliveryPool::spawn(&config(2), Arc::new(sink), Arc::clone(&metrics)).expect("spawn pool");
    let handler = ServerObservationHandler::new(pool.queue(), Arc::clone(&metrics));

    let led = StaticResource::new("/led", b"off".to_vec(), true);
    let resource: Arc<dyn ObservableResource> = led.clone();
    handler.register_resource(&resource);
    for port in 1..=3u16 {
        handler.start_observation(
            addr(port),
            Token::from_u64(0x10 + u64::from(port)),
            Arc::clone(&resource),
            ContentFormat::TEXT_PLAIN_UTF8,
        );
    }

    led.set_content(b"on".to_vec());

    let mut delivered = Vec::new();
    for _ in 0..2 {
        let (remote, msg) = rx.recv_timeout(RECV_TIMEOUT).expect("notification");
        assert_eq!(msg.message_type, MessageType::Con);
        delivered.push(remote);
    }
    delivered.sort_by_key(|r| r.port());
    assert_eq!(delivered, vec![addr(1), addr(3)]);

    pool.shutdown();
    assert!(rx.try_recv().is_err());
    assert_eq!(metrics.notifications_sent(), 2);
    assert_eq!(metrics.notifications_failed(), 1);

    // The failed observer is still registered; the next round retries it.
    assert!(handler
        .registry()
        .is_observing(&addr(2), &Token::from_u64(0x12)));
}

#[test]
fn test_shutdown_notices_are_delivered() {
    let (sink, rx) = ChannelSink::unbounded();
    let metrics = Arc::new(CoreMetrics::new());
    let mut pool =
        DeliveryPool::spawn(&config(1), Arc::new(sink), Arc::clone(&metrics)).expect("spawn pool");
    let handler = ServerObservationHandler::new(pool.queue(), Arc::clone(&metrics));

    let temp = StaticResource::new("/temp", b"21.0".to_vec(), false);
    let resource: Arc<dyn ObservableResource> = temp.clone();
    handler.register_resource(&resource);
    handler.start_observation(
        addr(1),
        Token::from_u64(0xA),
        Arc::clone(&resource),
        ContentFormat::APP_JSON,
    );

    notify_listeners(&resource, ResourceEvent::ShuttingDown);
    assert!(handler.registry().is_empty());

    let (remote, msg) = rx.recv_timeout(RECV_TIMEOUT).expect("shutdown notice");
    assert_eq!(remote, addr(1));
    assert_eq!(msg.code, MessageCode::NOT_FOUND);
    assert_eq!(msg.message_type, MessageType::Non);
    assert_eq!(msg.token, Token::from_u64(0xA));
    assert_eq!(
        String::from_utf8(msg.content).expect("utf-8"),
        "Resource \"/temp\" is no longer available."
    );

    // Updates after shutdown reach nobody.
    temp.set_content(b"23.0".to_vec());
    pool.shutdown();
    assert!(rx.try_recv().is_err());
    assert_eq!(metrics.snapshot().shutdown_notices_sent, 1);
}

#[test]
fn test_pool_rejects_invalid_config() {
    let (sink, _rx) = ChannelSink::unbounded();
    let result = DeliveryPool::spawn(
        &config(0),
        Arc::new(sink),
        Arc::new(CoreMetrics::new()),
    );
    assert!(matches!(result, Err(CoapError::Config(_))));
}

#[test]
fn test_pool_drains_queue_on_shutdown() {
    let (sink, rx) = ChannelSink::unbounded();
    let metrics = Arc::new(CoreMetrics::new());
    let mut pool =
        DeliveryPool::spawn(&config(1), Arc::new(sink), Arc::clone(&metrics)).expect("spawn pool");
    let handler = ServerObservationHandler::new(pool.queue(), Arc::clone(&metrics));

    let temp = StaticResource::new("/temp", Vec::new(), false);
    let resource: Arc<dyn ObservableResource> = temp.clone();
    handler.register_resource(&resource);
    handler.start_observation(
        addr(1),
        Token::from_u64(1),
        Arc::clone(&resource),
        ContentFormat::APP_OCTET_STREAM,
    );

    for i in 0..20u8 {
        temp.set_content(vec![i]);
    }
    pool.shutdown();

    let received: Vec<_> = rx.try_iter().collect();
    assert_eq!(received.len(), 20);
    assert_eq!(metrics.snapshot().notifications_enqueued, 20);
}
