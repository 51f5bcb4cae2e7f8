// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types shared across the crate.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the exchange and observation layers.
///
/// None of these escape a notification fan-out: per-observer failures are
/// logged and counted, then the loop moves on to the next observer.
#[derive(Debug, Error)]
pub enum CoapError {
    /// Token exceeds [`MAX_TOKEN_LENGTH`](crate::message::MAX_TOKEN_LENGTH) bytes.
    #[error("invalid token length {len} (max 8 bytes)")]
    InvalidToken { len: usize },

    /// The outbound sink could not hand the message to the transport.
    #[error("failed to send message to {remote}: {reason}")]
    SendFailed { remote: SocketAddr, reason: String },

    /// The delivery queue has been shut down.
    #[error("delivery queue closed")]
    QueueClosed,

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CoapError>;
