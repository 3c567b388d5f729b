// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The core of a bidirectional, length-prefixed, interface-oriented RPC
//! framework: a binary codec, an interface registry, deferred-result
//! future objects, compile-time proxy/dispatch generation, and the
//! endpoint that ties them together.
//!
//! This crate covers three tightly coupled subsystems — the endpoint, the
//! binary serializer, and the future model. It does not cover TCP/TLS
//! transport, session-object design, server multiplexing, or
//! reflection-based interface discovery; [`transport`] supplies a minimal
//! reference framer for the demo binary to build on, not a production
//! transport stack.

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod future;
pub mod macros;
pub mod registry;
pub mod transport;

pub use codec::{Decimal, Decode, Encode, Ticks100ns, Timestamp, WireChar};
pub use endpoint::{Endpoint, ErasedReturn, HandlerCallContext, HandlerFn, OutboundCall};
pub use error::Error;
pub use future::{ErrorFuture, ErrorFutureTyped, RpcReturn, TypedFuture, UnitFuture};
pub use registry::{
    InterfaceDescriptor, MethodDescriptor, ParameterDescriptor, Registry, RegistryBuilder,
    ReturnShape,
};
