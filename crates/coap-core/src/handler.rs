// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Handler trait and the collaborator events delivered to handlers.

use std::fmt;
use std::sync::Arc;

use crate::message::{CoapMessage, ContentFormat, RemoteEndpoint, Token};
use crate::resource::ObservableResource;

/// Events raised by the surrounding stack and delivered to every handler.
#[derive(Clone)]
pub enum CoreEvent {
    /// A resource became available; observation handlers subscribe to it.
    ResourceRegistered {
        resource: Arc<dyn ObservableResource>,
    },
    /// The server accepted an observe request.
    ObserverAccepted {
        remote: RemoteEndpoint,
        token: Token,
        resource: Arc<dyn ObservableResource>,
        content_format: ContentFormat,
    },
    /// A RST referencing an exchange with `token` arrived from `remote`.
    ResetReceived { remote: RemoteEndpoint, token: Token },
    /// The lower layer detected that a peer's address changed.
    RemoteSocketChanged {
        previous: RemoteEndpoint,
        current: RemoteEndpoint,
        token: Token,
    },
}

impl fmt::Debug for CoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResourceRegistered { resource } => f
                .debug_struct("ResourceRegistered")
                .field("path", &resource.uri_path())
                .finish(),
            Self::ObserverAccepted {
                remote,
                token,
                resource,
                content_format,
            } => f
                .debug_struct("ObserverAccepted")
                .field("remote", remote)
                .field("token", token)
                .field("path", &resource.uri_path())
                .field("content_format", content_format)
                .finish(),
            Self::ResetReceived { remote, token } => f
                .debug_struct("ResetReceived")
                .field("remote", remote)
                .field("token", token)
                .finish(),
            Self::RemoteSocketChanged {
                previous,
                current,
                token,
            } => f
                .debug_struct("RemoteSocketChanged")
                .field("previous", previous)
                .field("current", current)
                .field("token", token)
                .finish(),
        }
    }
}

/// A stage of the message pipeline.
///
/// The filter hooks return whether the message should keep propagating:
/// `false` means this handler fully handled and absorbed it.
pub trait CoapHandler: Send + Sync {
    /// Inspect an inbound message received from `remote`.
    fn handle_inbound(&self, _message: &CoapMessage, _remote: RemoteEndpoint) -> bool {
        true
    }

    /// Inspect an outbound message addressed to `remote`.
    fn handle_outbound(&self, _message: &CoapMessage, _remote: RemoteEndpoint) -> bool {
        true
    }

    /// React to a collaborator event. Handlers ignore events they don't use.
    fn handle_event(&self, _event: &CoreEvent) {}
}
