// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

// In-memory CoAP message model.
//
// Byte-level encoding lives in the codec layer; this module only exposes the
// fields the exchange and observation layers read and write (type, code,
// message id, token, etag, content format, observe marker, payload).

use std::fmt;
use std::net::SocketAddr;

use crate::error::CoapError;

/// Transport address of a remote peer.
pub type RemoteEndpoint = SocketAddr;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum token length in bytes (RFC 7252 Sec.3).
pub const MAX_TOKEN_LENGTH: usize = 8;

/// Largest observe sequence number before wrapping (24 bits, RFC 7641 Sec.4.4).
pub const MAX_OBSERVE_SEQUENCE: u32 = 0x00FF_FFFF;

// Message types
pub const TYPE_CON: u8 = 0;
pub const TYPE_NON: u8 = 1;
pub const TYPE_ACK: u8 = 2;
pub const TYPE_RST: u8 = 3;

// ---------------------------------------------------------------------------
// Message type
// ---------------------------------------------------------------------------

/// Reliability mode of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Confirmable: the receiver must ACK or RST.
    Con = TYPE_CON,
    /// Non-confirmable.
    Non = TYPE_NON,
    /// Acknowledgement.
    Ack = TYPE_ACK,
    /// Reset: "I have no context for this message".
    Rst = TYPE_RST,
}

impl MessageType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            TYPE_CON => Some(Self::Con),
            TYPE_NON => Some(Self::Non),
            TYPE_ACK => Some(Self::Ack),
            TYPE_RST => Some(Self::Rst),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Con => "CON",
            Self::Non => "NON",
            Self::Ack => "ACK",
            Self::Rst => "RST",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Message code
// ---------------------------------------------------------------------------

/// Message code in `class.detail` form (3 bit class, 5 bit detail).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageCode(u8);

impl MessageCode {
    pub const EMPTY: Self = Self::new(0, 0);

    pub const GET: Self = Self::new(0, 1);
    pub const POST: Self = Self::new(0, 2);
    pub const PUT: Self = Self::new(0, 3);
    pub const DELETE: Self = Self::new(0, 4);

    pub const CREATED: Self = Self::new(2, 1);
    pub const DELETED: Self = Self::new(2, 2);
    pub const VALID: Self = Self::new(2, 3);
    pub const CHANGED: Self = Self::new(2, 4);
    pub const CONTENT: Self = Self::new(2, 5);

    pub const BAD_REQUEST: Self = Self::new(4, 0);
    pub const NOT_FOUND: Self = Self::new(4, 4);
    pub const METHOD_NOT_ALLOWED: Self = Self::new(4, 5);
    pub const NOT_ACCEPTABLE: Self = Self::new(4, 6);

    pub const INTERNAL_SERVER_ERROR: Self = Self::new(5, 0);
    pub const SERVICE_UNAVAILABLE: Self = Self::new(5, 3);

    /// Build a code from its class (0..=7) and detail (0..=31).
    pub const fn new(class: u8, detail: u8) -> Self {
        Self(((class & 0x07) << 5) | (detail & 0x1F))
    }

    pub const fn from_u8(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }

    pub const fn class(self) -> u8 {
        self.0 >> 5
    }

    pub const fn detail(self) -> u8 {
        self.0 & 0x1F
    }

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    /// Request codes are class 0 with a non-zero detail.
    pub fn is_request(self) -> bool {
        self.class() == 0 && self.detail() != 0
    }

    /// Response codes are classes 2 through 5.
    pub fn is_response(self) -> bool {
        (2..=5).contains(&self.class())
    }

    pub fn is_success(self) -> bool {
        self.class() == 2
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.class(), self.detail())
    }
}

// ---------------------------------------------------------------------------
// Token
// ---------------------------------------------------------------------------

/// Requester-chosen correlator (0 to 8 bytes). Equality is byte-exact.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Token {
    bytes: [u8; MAX_TOKEN_LENGTH],
    len: u8,
}

impl Token {
    /// Build a token from raw bytes.
    pub fn new(bytes: &[u8]) -> Result<Self, CoapError> {
        if bytes.len() > MAX_TOKEN_LENGTH {
            return Err(CoapError::InvalidToken { len: bytes.len() });
        }
        let mut buf = [0u8; MAX_TOKEN_LENGTH];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            bytes: buf,
            len: bytes.len() as u8,
        })
    }

    /// The zero-length token.
    pub const fn empty() -> Self {
        Self {
            bytes: [0u8; MAX_TOKEN_LENGTH],
            len: 0,
        }
    }

    /// Big-endian encoding of `value` with leading zero bytes stripped.
    pub fn from_u64(value: u64) -> Self {
        let be = value.to_be_bytes();
        let skip = be.iter().take_while(|&&b| b == 0).count();
        let mut buf = [0u8; MAX_TOKEN_LENGTH];
        let len = MAX_TOKEN_LENGTH - skip;
        buf[..len].copy_from_slice(&be[skip..]);
        Self {
            bytes: buf,
            len: len as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl TryFrom<&[u8]> for Token {
    type Error = CoapError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::new(bytes)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("<empty>");
        }
        f.write_str("0x")?;
        for b in self.as_bytes() {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self)
    }
}

// ---------------------------------------------------------------------------
// Content format
// ---------------------------------------------------------------------------

/// Numeric content-format identifier (RFC 7252 Sec.12.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentFormat(pub u32);

impl ContentFormat {
    pub const TEXT_PLAIN_UTF8: Self = Self(0);
    pub const APP_LINK_FORMAT: Self = Self(40);
    pub const APP_XML: Self = Self(41);
    pub const APP_OCTET_STREAM: Self = Self(42);
    pub const APP_EXI: Self = Self(47);
    pub const APP_JSON: Self = Self(50);
    pub const APP_CBOR: Self = Self(60);

    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ContentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A decoded CoAP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoapMessage {
    pub message_type: MessageType,
    pub code: MessageCode,
    /// `None` until the outbound layer assigns one.
    pub message_id: Option<u16>,
    pub token: Token,
    pub etag: Option<Vec<u8>>,
    pub content_format: Option<ContentFormat>,
    /// Observe option value; on a response its presence marks an update
    /// notification.
    pub observe: Option<u32>,
    pub content: Vec<u8>,
}

impl CoapMessage {
    fn bare(message_type: MessageType, code: MessageCode) -> Self {
        Self {
            message_type,
            code,
            message_id: None,
            token: Token::empty(),
            etag: None,
            content_format: None,
            observe: None,
            content: Vec::new(),
        }
    }

    /// A request with the given method code and token.
    pub fn request(message_type: MessageType, code: MessageCode, token: Token) -> Self {
        debug_assert!(code.is_request(), "{} is not a request code", code);
        Self {
            token,
            ..Self::bare(message_type, code)
        }
    }

    /// A response with the given status code and token.
    pub fn response(message_type: MessageType, code: MessageCode, token: Token) -> Self {
        debug_assert!(code.is_response(), "{} is not a response code", code);
        Self {
            token,
            ..Self::bare(message_type, code)
        }
    }

    /// Empty RST answering the message with `message_id`.
    pub fn reset(message_id: u16) -> Self {
        Self {
            message_id: Some(message_id),
            ..Self::bare(MessageType::Rst, MessageCode::EMPTY)
        }
    }

    /// Empty ACK for the confirmable message with `message_id`.
    pub fn empty_ack(message_id: u16) -> Self {
        Self {
            message_id: Some(message_id),
            ..Self::bare(MessageType::Ack, MessageCode::EMPTY)
        }
    }

    /// Empty CON used as a liveness probe.
    pub fn ping(message_id: u16) -> Self {
        Self {
            message_id: Some(message_id),
            ..Self::bare(MessageType::Con, MessageCode::EMPTY)
        }
    }

    pub fn with_message_id(mut self, message_id: u16) -> Self {
        self.message_id = Some(message_id);
        self
    }

    pub fn with_observe(mut self, sequence: u32) -> Self {
        self.observe = Some(sequence & MAX_OBSERVE_SEQUENCE);
        self
    }

    pub fn set_content(&mut self, content: Vec<u8>, format: ContentFormat) {
        self.content = content;
        self.content_format = Some(format);
    }

    pub fn is_request(&self) -> bool {
        self.code.is_request()
    }

    pub fn is_response(&self) -> bool {
        self.code.is_response()
    }

    pub fn is_confirmable(&self) -> bool {
        self.message_type == MessageType::Con
    }

    /// A content-less CON message (CoAP ping).
    pub fn is_ping(&self) -> bool {
        self.message_type == MessageType::Con && self.code.is_empty()
    }

    /// A response carrying the observe marker.
    pub fn is_update_notification(&self) -> bool {
        self.is_response() && self.observe.is_some()
    }
}

impl fmt::Display for CoapMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}", self.message_type, self.code)?;
        match self.message_id {
            Some(id) => write!(f, " mid={}", id)?,
            None => f.write_str(" mid=?")?,
        }
        write!(f, " token={}", self.token)?;
        if let Some(seq) = self.observe {
            write!(f, " observe={}", seq)?;
        }
        write!(f, " {}B]", self.content.len())
    }
}
