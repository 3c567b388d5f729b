// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::fmt;

/// Every fault THE CORE can raise. All faults are reported synchronously from
/// the operation that triggers them; there is no retry and no automatic
/// disconnection.
#[derive(Debug)]
pub enum Error {
    /// The serializer was asked to encode/decode something the schema
    /// forbids: a null where the field is non-nullable, a missing override
    /// on a user type, or a value outside the type's valid range (e.g. a
    /// `char` outside the Basic Multilingual Plane).
    SchemaViolation(String),

    /// The input stream ended in the middle of a value.
    TruncatedInput,

    /// A sequence's length would exceed 65,535 elements.
    SequenceTooLong { len: usize },

    /// The header byte decoded to an unknown interface ordinal, an unknown
    /// method index, or a response call-id that is not in the pending table.
    ProtocolViolation(String),

    /// A call frame targets an ordinal with no registered handler.
    UnknownHandler { ordinal: u8 },

    /// The call-id allocator could not find a free 7-bit id: 127 calls are
    /// already outstanding.
    CallIdExhausted,

    /// Two interfaces were registered under the same ordinal.
    DuplicateOrdinal { ordinal: u8 },

    /// A handler was registered for an ordinal that already has a binding.
    DuplicateHandler { ordinal: u8 },

    /// A future's result/error was read before `is_complete()`.
    NotReady,

    /// An enum's underlying representation is not a serializable primitive.
    /// `define_wire_enum!` enforces this at compile time via its `$repr:
    /// Decode` bound, so this variant is never actually constructed by
    /// `rpc_core` itself — it's named for parity with the error taxonomy.
    /// A bad discriminant *value* (as opposed to a bad *type*) is a
    /// `SchemaViolation`, matching every other unmapped-value case in the
    /// codec.
    InvalidEnumUnderlyingType,

    /// The handler body surfaced an unrecoverable fault; propagated to the
    /// caller of `receive_data`.
    HandlerException(String),

    /// Errors returned by I/O failures in an external transport adapter.
    Io(std::io::Error),
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SchemaViolation(msg) => write!(f, "schema violation: {msg}"),
            Self::TruncatedInput => write!(f, "truncated input"),
            Self::SequenceTooLong { len } => {
                write!(f, "sequence of length {len} exceeds the maximum of 65535")
            }
            Self::ProtocolViolation(msg) => write!(f, "protocol violation: {msg}"),
            Self::UnknownHandler { ordinal } => {
                write!(f, "no handler registered for interface ordinal {ordinal}")
            }
            Self::CallIdExhausted => write!(f, "no free call-id: 127 calls outstanding"),
            Self::DuplicateOrdinal { ordinal } => {
                write!(f, "duplicate interface ordinal {ordinal}")
            }
            Self::DuplicateHandler { ordinal } => {
                write!(f, "a handler is already bound to ordinal {ordinal}")
            }
            Self::NotReady => write!(f, "future is not yet complete"),
            Self::InvalidEnumUnderlyingType => {
                write!(f, "enum underlying type is not a serializable primitive")
            }
            Self::HandlerException(msg) => write!(f, "handler exception: {msg}"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
