// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CoAP exchange correlation and observe notification dispatch.
//!
//! The core sits between the message codec and the application of a CoAP
//! stack. It decides which inbound responses are expected, answers
//! unsolicited confirmable traffic and pings with resets, keeps track of
//! which remote peers observe which resources, and fans out update and
//! shutdown notifications.
//!
//! # Architecture
//!
//! ```text
//!   codec (inbound)                                    codec (outbound)
//!        |                                                   ^
//!        v                                                   |
//! +------------------------------ HandlerPipeline ------------------------+
//! |  ClientInboundReliability          ServerObservationHandler           |
//! |   ExchangeTracker                   ObservationRegistry               |
//! |   RST / empty ACK ---+              (forward | reverse | formats)     |
//! +----------------------|-----------------------^-----------+------------+
//!                        |                       |           |
//!                        |        ResourceEvent (Updated,    | DeliveryTask
//!                        |         ShuttingDown)             v
//!                        |                       |     DeliveryQueue
//!                        |              ObservableResource   |
//!                        v                             DeliveryPool
//!                   OutboundSink <---------------------------+
//! ```
//!
//! # Key Types
//!
//! | Type | Role |
//! |------|------|
//! | [`ExchangeTracker`] | Outstanding (endpoint, token) pairs on the client side |
//! | [`ClientInboundReliability`] | Reset/ping responder and exchange bookkeeping |
//! | [`ObservationRegistry`] | Tri-index registry of active observations |
//! | [`ServerObservationHandler`] | Observe lifecycle and notification fan-out |
//! | [`DeliveryPool`] | Worker threads transmitting notifications |
//! | [`HandlerPipeline`] | Ordered chain of handlers |
//!
//! Encoding, sockets and outbound retransmission are provided by the
//! surrounding stack through [`CoapMessage`] and [`OutboundSink`].

pub mod config;
pub mod delivery;
pub mod error;
pub mod exchange;
pub mod handler;
pub mod inbound;
pub mod message;
pub mod metrics;
pub mod observation;
pub mod pipeline;
pub mod resource;
pub mod server;
pub mod transport;

// Re-exports for convenience.
pub use config::{ConfigError, CoreConfig};
pub use delivery::{DeliveryPool, DeliveryQueue, DeliveryTask};
pub use error::{CoapError, Result};
pub use exchange::ExchangeTracker;
pub use handler::{CoapHandler, CoreEvent};
pub use inbound::ClientInboundReliability;
pub use message::{
    CoapMessage, ContentFormat, MessageCode, MessageType, RemoteEndpoint, Token,
    MAX_OBSERVE_SEQUENCE, MAX_TOKEN_LENGTH,
};
pub use metrics::{CoreMetrics, MetricsSnapshot};
pub use observation::{Observation, ObservationKey, ObservationRegistry, ObserverEntry};
pub use pipeline::HandlerPipeline;
pub use resource::{
    notify_listeners, ListenerSet, ObservableResource, Representation, ResourceEvent,
    ResourceListener, StaticResource,
};
pub use server::ServerObservationHandler;
pub use transport::{ChannelSink, OutboundSink};
