// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Ordered chain of handlers between the codec and the application.
//
// Inbound messages travel head -> tail, outbound messages tail -> head. A
// handler returning `false` absorbs the message and later stages never see
// it. Events reach every handler.

use std::sync::Arc;

use crate::handler::{CoapHandler, CoreEvent};
use crate::message::{CoapMessage, RemoteEndpoint};

/// Handlers in pipeline order (head first).
#[derive(Default, Clone)]
pub struct HandlerPipeline {
    handlers: Vec<Arc<dyn CoapHandler>>,
}

impl HandlerPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler at the tail (closest to the application).
    pub fn with_handler(mut self, handler: Arc<dyn CoapHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn push(&mut self, handler: Arc<dyn CoapHandler>) {
        self.handlers.push(handler);
    }

    /// Run an inbound message through the chain.
    ///
    /// Returns `true` if it reached the application.
    pub fn inbound(&self, message: &CoapMessage, remote: RemoteEndpoint) -> bool {
        for handler in &self.handlers {
            if !handler.handle_inbound(message, remote) {
                return false;
            }
        }
        true
    }

    /// Run an outbound message through the chain.
    ///
    /// Returns `true` if it should be handed to the transport.
    pub fn outbound(&self, message: &CoapMessage, remote: RemoteEndpoint) -> bool {
        for handler in self.handlers.iter().rev() {
            if !handler.handle_outbound(message, remote) {
                return false;
            }
        }
        true
    }

    /// Deliver a collaborator event to every handler.
    pub fn dispatch_event(&self, event: &CoreEvent) {
        log::debug!("[pipeline] event {:?}", event);
        for handler in &self.handlers {
            handler.handle_event(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
