// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Asynchronous notification delivery.
//!
//! The dispatcher never transmits anything itself: each fan-out round turns
//! into a list of [`DeliveryTask`]s pushed onto a [`DeliveryQueue`]. A
//! [`DeliveryPool`] drains the queue on dedicated threads, builds the concrete
//! outbound message and hands it to the [`OutboundSink`].
//!
//! ```text
//! ServerObservationHandler --(DeliveryTask)--> DeliveryQueue
//!                                                   |
//!                               +-------------------+-------------------+
//!                               v                   v                   v
//!                        coap-delivery-0     coap-delivery-1     coap-delivery-N
//!                               |                   |                   |
//!                               +---------> OutboundSink::send <--------+
//! ```
//!
//! Tasks capture everything they need (endpoint, token, representation) at
//! enqueue time; they never consult the registry. Failures are logged and
//! counted, never retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use crate::config::CoreConfig;
use crate::error::CoapError;
use crate::message::{CoapMessage, ContentFormat, MessageCode, MessageType, RemoteEndpoint, Token};
use crate::metrics::CoreMetrics;
use crate::resource::Representation;
use crate::transport::OutboundSink;

/// How long an idle worker waits before re-checking the running flag.
const WORKER_POLL_INTERVAL_MS: u64 = 100;

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// A unit of outbound work produced by a fan-out round.
#[derive(Debug, Clone)]
pub enum DeliveryTask {
    /// Send the current representation to one observer.
    Update {
        remote: RemoteEndpoint,
        token: Token,
        /// Shared by every observer of the round that negotiated this format.
        representation: Arc<Representation>,
        message_type: MessageType,
        observe_sequence: u32,
    },
    /// Tell one observer that the resource is gone.
    Shutdown {
        remote: RemoteEndpoint,
        token: Token,
        resource_path: String,
    },
}

impl DeliveryTask {
    pub fn remote(&self) -> RemoteEndpoint {
        match self {
            Self::Update { remote, .. } | Self::Shutdown { remote, .. } => *remote,
        }
    }

    pub fn token(&self) -> Token {
        match self {
            Self::Update { token, .. } | Self::Shutdown { token, .. } => *token,
        }
    }

    /// Build the outbound message this task transmits.
    pub fn build_message(&self) -> CoapMessage {
        match self {
            Self::Update {
                token,
                representation,
                message_type,
                observe_sequence,
                ..
            } => {
                let mut msg = CoapMessage::response(*message_type, MessageCode::CONTENT, *token)
                    .with_observe(*observe_sequence);
                msg.etag = Some(representation.etag.clone());
                msg.set_content(representation.content.clone(), representation.content_format);
                msg
            }
            Self::Shutdown {
                token,
                resource_path,
                ..
            } => {
                let mut msg =
                    CoapMessage::response(MessageType::Non, MessageCode::NOT_FOUND, *token);
                let text = format!("Resource \"{}\" is no longer available.", resource_path);
                msg.set_content(text.into_bytes(), ContentFormat::TEXT_PLAIN_UTF8);
                msg
            }
        }
    }

    /// Build the message, submit it and report the outcome.
    pub fn run(self, sink: &dyn OutboundSink, metrics: &CoreMetrics) {
        let remote = self.remote();
        let token = self.token();
        let message = self.build_message();

        match (&self, sink.send(remote, message)) {
            (Self::Update { .. }, Ok(())) => {
                metrics.record_notification_sent();
                log::info!(
                    "[delivery] sent update notification to {} (token {})",
                    remote,
                    token
                );
            }
            (Self::Shutdown { .. }, Ok(())) => {
                metrics.record_shutdown_notice_sent();
                log::info!("[delivery] sent NOT_FOUND to {} (token {})", remote, token);
            }
            (Self::Update { .. }, Err(e)) => {
                metrics.record_notification_failed();
                log::error!(
                    "[delivery] update notification to {} (token {}) failed: {}",
                    remote,
                    token,
                    e
                );
            }
            (Self::Shutdown { .. }, Err(e)) => {
                metrics.record_notification_failed();
                log::error!(
                    "[delivery] shutdown notification to {} (token {}) failed: {}",
                    remote,
                    token,
                    e
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

/// Sending half of the delivery task channel, handed to the dispatcher.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    tx: Sender<DeliveryTask>,
}

impl DeliveryQueue {
    /// Bounded queue plus its receiving half.
    pub fn bounded(capacity: usize) -> (Self, Receiver<DeliveryTask>) {
        let (tx, rx) = channel::bounded(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Unbounded queue plus its receiving half.
    pub fn unbounded() -> (Self, Receiver<DeliveryTask>) {
        let (tx, rx) = channel::unbounded();
        (Self { tx }, rx)
    }

    /// Enqueue a task, waiting for room if the queue is full.
    pub fn submit(&self, task: DeliveryTask) -> Result<(), CoapError> {
        self.tx.send(task).map_err(|_| CoapError::QueueClosed)
    }

    /// Tasks waiting to be picked up.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }
}

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// Fixed set of worker threads executing delivery tasks.
pub struct DeliveryPool {
    queue: DeliveryQueue,
    running: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl DeliveryPool {
    /// Spawn `config.delivery_workers` threads sending through `sink`.
    pub fn spawn(
        config: &CoreConfig,
        sink: Arc<dyn OutboundSink>,
        metrics: Arc<CoreMetrics>,
    ) -> Result<Self, CoapError> {
        config.validate()?;

        let (queue, rx) = DeliveryQueue::bounded(config.delivery_queue_capacity);
        let running = Arc::new(AtomicBool::new(true));

        let mut workers = Vec::with_capacity(config.delivery_workers);
        for i in 0..config.delivery_workers {
            let rx = rx.clone();
            let sink = Arc::clone(&sink);
            let metrics = Arc::clone(&metrics);
            let running = Arc::clone(&running);
            let handle = std::thread::Builder::new()
                .name(format!("coap-delivery-{}", i))
                .spawn(move || worker_loop(&rx, sink.as_ref(), &metrics, &running))?;
            workers.push(handle);
        }
        log::debug!("[delivery] started {} workers", workers.len());

        Ok(Self {
            queue,
            running,
            workers,
        })
    }

    /// Queue handle for the dispatcher.
    pub fn queue(&self) -> DeliveryQueue {
        self.queue.clone()
    }

    /// Stop the workers after they drain what is already queued.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Release);
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("[delivery] worker panicked");
            }
        }
    }
}

impl Drop for DeliveryPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    rx: &Receiver<DeliveryTask>,
    sink: &dyn OutboundSink,
    metrics: &CoreMetrics,
    running: &AtomicBool,
) {
    loop {
        match rx.recv_timeout(Duration::from_millis(WORKER_POLL_INTERVAL_MS)) {
            Ok(task) => task.run(sink, metrics),
            Err(RecvTimeoutError::Timeout) => {
                if !running.load(Ordering::Acquire) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }

    // Stopped: flush what was enqueued before shutdown.
    for task in rx.try_iter() {
        task.run(sink, metrics);
    }
}
