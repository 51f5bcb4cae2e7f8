// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Outbound submission boundary.
//
// The core never touches sockets. Everything it emits (resets, empty ACKs,
// notifications) is handed to an `OutboundSink`, which encodes and transmits
// it or queues it for the datagram layer.

use crossbeam::channel::{self, Receiver, Sender, TrySendError};

use crate::error::CoapError;
use crate::message::{CoapMessage, RemoteEndpoint};

// ---------------------------------------------------------------------------
// Sink trait
// ---------------------------------------------------------------------------

/// Abstraction over the lower layer that transmits outbound messages.
///
/// `send` returning `Ok` means the message was accepted for transmission;
/// `Err` carries the failure cause. Implementations must not call back into
/// the handler that invoked them.
pub trait OutboundSink: Send + Sync {
    fn send(&self, remote: RemoteEndpoint, message: CoapMessage) -> Result<(), CoapError>;
}

// ---------------------------------------------------------------------------
// Channel sink
// ---------------------------------------------------------------------------

/// Sink that pushes `(remote, message)` pairs onto a bounded crossbeam channel.
///
/// The receiving half is typically drained by the datagram writer thread.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<(RemoteEndpoint, CoapMessage)>,
}

impl ChannelSink {
    /// Create a sink and the receiver it feeds.
    pub fn bounded(capacity: usize) -> (Self, Receiver<(RemoteEndpoint, CoapMessage)>) {
        let (tx, rx) = channel::bounded(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Create a sink over an unbounded channel.
    pub fn unbounded() -> (Self, Receiver<(RemoteEndpoint, CoapMessage)>) {
        let (tx, rx) = channel::unbounded();
        (Self { tx }, rx)
    }
}

impl OutboundSink for ChannelSink {
    fn send(&self, remote: RemoteEndpoint, message: CoapMessage) -> Result<(), CoapError> {
        match self.tx.try_send((remote, message)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(CoapError::SendFailed {
                remote,
                reason: "outbound queue full".into(),
            }),
            Err(TrySendError::Disconnected(_)) => Err(CoapError::SendFailed {
                remote,
                reason: "outbound queue disconnected".into(),
            }),
        }
    }
}
