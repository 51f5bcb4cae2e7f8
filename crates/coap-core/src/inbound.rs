// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// Client-side inbound reliability.
//
// Filters inbound traffic against the exchange tracker:
//
//   response, no exchange, CON  -> RST (same message id), absorbed
//   response, no exchange, NON  -> absorbed
//   response, exchange open     -> exchange closed unless notification,
//                                  empty ACK if CON, propagated
//   ping (CON, empty code)      -> RST (same message id), absorbed
//   anything else               -> propagated
//
// Outbound requests open exchanges; endpoint migration re-keys them.

use std::sync::Arc;

use crate::config::CoreConfig;
use crate::exchange::ExchangeTracker;
use crate::handler::{CoapHandler, CoreEvent};
use crate::message::{CoapMessage, RemoteEndpoint};
use crate::metrics::CoreMetrics;
use crate::transport::OutboundSink;

/// Exchange tracking plus the reset/ping responder for the client role.
pub struct ClientInboundReliability {
    tracker: ExchangeTracker,
    sink: Arc<dyn OutboundSink>,
    metrics: Arc<CoreMetrics>,
    ack_confirmable_responses: bool,
}

impl ClientInboundReliability {
    pub fn new(config: &CoreConfig, sink: Arc<dyn OutboundSink>, metrics: Arc<CoreMetrics>) -> Self {
        Self {
            tracker: ExchangeTracker::new(),
            sink,
            metrics,
            ack_confirmable_responses: config.ack_confirmable_responses,
        }
    }

    /// The exchanges this handler is waiting on.
    pub fn tracker(&self) -> &ExchangeTracker {
        &self.tracker
    }

    fn handle_inbound_response(&self, response: &CoapMessage, remote: RemoteEndpoint) -> bool {
        let token = response.token;

        // Notifications leave the exchange open; anything else closes it.
        if !self
            .tracker
            .consume_if_terminal(&remote, &token, response.is_update_notification())
        {
            self.metrics.record_unexpected_response();
            if response.is_confirmable() {
                self.send_reset(response.message_id, remote);
            }
            log::debug!(
                "[exchange] discarded unexpected response from {} (token {})",
                remote,
                token
            );
            return false;
        }

        if response.is_confirmable() && self.ack_confirmable_responses {
            self.send_empty_ack(response.message_id, remote);
        }
        true
    }

    fn send_reset(&self, message_id: Option<u16>, remote: RemoteEndpoint) {
        let Some(message_id) = message_id else {
            log::warn!("[exchange] cannot reset message from {} without message id", remote);
            return;
        };
        match self.sink.send(remote, CoapMessage::reset(message_id)) {
            Ok(()) => {
                self.metrics.record_reset_sent();
                log::debug!("[exchange] sent RST to {} (message id {})", remote, message_id);
            }
            Err(e) => log::warn!("[exchange] failed to send RST to {}: {}", remote, e),
        }
    }

    fn send_empty_ack(&self, message_id: Option<u16>, remote: RemoteEndpoint) {
        let Some(message_id) = message_id else {
            log::warn!("[exchange] cannot ACK message from {} without message id", remote);
            return;
        };
        match self.sink.send(remote, CoapMessage::empty_ack(message_id)) {
            Ok(()) => self.metrics.record_empty_ack_sent(),
            Err(e) => log::warn!("[exchange] failed to send empty ACK to {}: {}", remote, e),
        }
    }
}

impl CoapHandler for ClientInboundReliability {
    fn handle_inbound(&self, message: &CoapMessage, remote: RemoteEndpoint) -> bool {
        log::debug!("[exchange] inbound {} from {}", message, remote);

        if message.is_response() {
            self.handle_inbound_response(message, remote)
        } else if message.is_ping() {
            log::debug!(
                "[exchange] received PING from {} (message id {:?})",
                remote,
                message.message_id
            );
            self.metrics.record_ping_answered();
            self.send_reset(message.message_id, remote);
            false
        } else {
            true
        }
    }

    fn handle_outbound(&self, message: &CoapMessage, remote: RemoteEndpoint) -> bool {
        if message.is_request() {
            self.tracker.register_outbound_request(remote, message.token);
        }
        true
    }

    fn handle_event(&self, event: &CoreEvent) {
        match event {
            CoreEvent::RemoteSocketChanged {
                previous,
                current,
                token,
            } => self
                .tracker
                .rekey_on_endpoint_change(*previous, *current, *token),
            CoreEvent::ResetReceived { remote, token } => {
                self.tracker.remove(remote, token);
            }
            _ => {}
        }
    }
}
