// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! The RPC endpoint: a bidirectional message codec, call-id allocator, and
//! future-correlation table. One `Endpoint<C>` hosts both the proxy callers
//! and the handler callees for one message stream.
//!
//! `Endpoint<C>` is generic over an opaque per-peer context type `C` — the
//! "session object" threaded through every handler invocation — and is
//! deliberately `!Sync`: its pending-future table, handler table, and
//! call-id counter are mutated only from the thread that owns it.

use std::collections::HashMap;

use log::trace;

use crate::codec::wire;
use crate::error::Error;
use crate::future::RpcReturn;
use crate::registry::{Registry, ReturnShape};

/// Type-erased view of a completed `RpcReturn` value, used to serialize a
/// handler's result onto the wire without the endpoint knowing its concrete
/// type.
pub trait ErasedReturn {
    fn write_payload(&self, buf: &mut Vec<u8>) -> Result<(), Error>;
}

impl<T: RpcReturn> ErasedReturn for T {
    fn write_payload(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        RpcReturn::write_payload(self, buf)
    }
}

/// Type-erased view of a pending future, used by the call-correlation
/// table to complete a caller's future without knowing its concrete type.
trait PendingEntry {
    fn complete_from(&self, reader: &mut &[u8]) -> Result<(), Error>;
}

impl<T: RpcReturn> PendingEntry for T {
    fn complete_from(&self, reader: &mut &[u8]) -> Result<(), Error> {
        RpcReturn::complete_from(self, reader)
    }
}

/// Everything a handler dispatch closure needs besides the raw argument
/// bytes: the call's identity and the application-supplied session object.
pub struct HandlerCallContext<'a, C> {
    pub interface_ordinal: u8,
    pub method_index: u8,
    pub call_id: Option<u8>,
    pub context: &'a mut C,
}

/// A registered handler binding: given the call context and a reader
/// positioned just after the call-id (if any), decodes arguments, invokes
/// the application's handler, and returns its result for the endpoint to
/// serialize (if the method has a return shape at all).
pub type HandlerFn<C> =
    dyn Fn(&mut HandlerCallContext<'_, C>, &mut &[u8]) -> Result<Box<dyn ErasedReturn>, Error>;

/// Fired immediately before/after a handler body runs, in addition to the
/// endpoint's own `trace!`-level logging of the same event.
pub type HandlerHook<C> = Box<dyn FnMut(&HandlerCallContext<'_, C>)>;

/// A bidirectional RPC peer: message framer, dispatcher, call-id allocator,
/// and pending-future table, all scoped to one message stream.
pub struct Endpoint<C> {
    registry: Registry,
    handlers: HashMap<u8, Box<HandlerFn<C>>>,
    pending: HashMap<u8, Box<dyn PendingEntry>>,
    next_call_id: u8,
    on_data_out: Box<dyn FnMut(&[u8])>,
    on_before_handler_call: Option<HandlerHook<C>>,
    on_after_handler_call: Option<HandlerHook<C>>,
}

impl<C> Endpoint<C> {
    pub fn new(registry: Registry, on_data_out: impl FnMut(&[u8]) + 'static) -> Self {
        Endpoint {
            registry,
            handlers: HashMap::new(),
            pending: HashMap::new(),
            next_call_id: 0,
            on_data_out: Box::new(on_data_out),
            on_before_handler_call: None,
            on_after_handler_call: None,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn on_before_handler_call(&mut self, hook: impl FnMut(&HandlerCallContext<'_, C>) + 'static) {
        self.on_before_handler_call = Some(Box::new(hook));
    }

    pub fn on_after_handler_call(&mut self, hook: impl FnMut(&HandlerCallContext<'_, C>) + 'static) {
        self.on_after_handler_call = Some(Box::new(hook));
    }

    /// Binds `handler` to `ordinal`. Fails if a handler is already bound
    /// there — the endpoint never silently replaces a binding.
    pub fn register_handler(
        &mut self,
        ordinal: u8,
        handler: Box<HandlerFn<C>>,
    ) -> Result<(), Error> {
        if self.handlers.contains_key(&ordinal) {
            return Err(Error::DuplicateHandler { ordinal });
        }
        self.handlers.insert(ordinal, handler);
        Ok(())
    }

    /// Unbinds whatever handler is registered for `ordinal`, if any. Not
    /// thread-safe with concurrent dispatch — callers should quiesce the
    /// endpoint before reconfiguring handler bindings.
    pub fn remove_handler(&mut self, ordinal: u8) {
        self.handlers.remove(&ordinal);
    }

    /// Single-attempt call-id allocation: increment, wrap 128.. back to 1,
    /// and fail outright on a collision rather than scanning for another
    /// free slot.
    fn allocate_call_id(&mut self) -> Result<u8, Error> {
        self.next_call_id = self.next_call_id.wrapping_add(1);
        if self.next_call_id >= 128 {
            self.next_call_id = 1;
        }
        if self.pending.contains_key(&self.next_call_id) {
            return Err(Error::CallIdExhausted);
        }
        Ok(self.next_call_id)
    }

    /// Starts an outbound call: writes the header byte (bit 7 clear,
    /// ordinal in bits 6..0) and the method index, and — if `R` occupies a
    /// call-id — allocates one and writes it too.
    pub fn begin_call<R: RpcReturn + 'static>(
        &mut self,
        interface_ordinal: u8,
        method_index: u8,
    ) -> Result<OutboundCall<R>, Error> {
        let mut buf = vec![interface_ordinal & 0x7f, method_index];
        let call_id = if R::occupies_call_id() {
            let id = self.allocate_call_id()?;
            buf.push(id);
            Some(id)
        } else {
            None
        };
        Ok(OutboundCall {
            buf,
            call_id,
            _return: std::marker::PhantomData::<R>,
        })
    }

    /// Flushes the accumulated call buffer via `on_data_out` and returns
    /// the future the caller will observe completion through (or `()` for
    /// a method with no return shape).
    pub fn complete_call<R: RpcReturn + 'static>(&mut self, call: OutboundCall<R>) -> R {
        let result = R::pending();
        if let Some(id) = call.call_id {
            self.pending.insert(id, Box::new(result.clone()));
        }
        (self.on_data_out)(&call.buf);
        result
    }

    /// Consumes exactly one framed inbound message: a call dispatch if bit
    /// 7 of the header is clear, a response dispatch otherwise.
    pub fn receive_data(&mut self, buf: &[u8], context: &mut C) -> Result<(), Error> {
        let mut reader = buf;
        let header = wire::take_u8(&mut reader)?;
        if header & 0x80 == 0 {
            self.dispatch_call(header & 0x7f, &mut reader, context)
        } else {
            self.dispatch_response(header & 0x7f, &mut reader)
        }
    }

    fn dispatch_call(
        &mut self,
        ordinal: u8,
        reader: &mut &[u8],
        context: &mut C,
    ) -> Result<(), Error> {
        let method_index = wire::take_u8(reader)?;

        if !self.handlers.contains_key(&ordinal) {
            return Err(Error::UnknownHandler { ordinal });
        }
        let return_shape = self
            .registry
            .method(ordinal, method_index)
            .map(|m| m.return_shape)
            .ok_or_else(|| {
                Error::ProtocolViolation(format!(
                    "unknown method index {method_index} on interface {ordinal}"
                ))
            })?;

        let call_id = if return_shape != ReturnShape::None {
            Some(wire::take_u8(reader)?)
        } else {
            None
        };

        let mut call_context = HandlerCallContext {
            interface_ordinal: ordinal,
            method_index,
            call_id,
            context,
        };

        trace!(
            "dispatching interface={ordinal} method={method_index} call_id={call_id:?}"
        );
        if let Some(hook) = &mut self.on_before_handler_call {
            hook(&call_context);
        }

        let handler = self
            .handlers
            .get(&ordinal)
            .expect("presence checked above");
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            handler(&mut call_context, reader)
        }))
        .unwrap_or_else(|payload| Err(Error::HandlerException(panic_payload_message(payload))))?;

        if let Some(hook) = &mut self.on_after_handler_call {
            hook(&call_context);
        }

        if let Some(id) = call_id {
            let mut response = vec![0x80 | id];
            result.write_payload(&mut response)?;
            (self.on_data_out)(&response);
        }
        Ok(())
    }

    fn dispatch_response(&mut self, call_id: u8, reader: &mut &[u8]) -> Result<(), Error> {
        if call_id == 0 {
            return Err(Error::ProtocolViolation(
                "response call-id 0 is invalid".into(),
            ));
        }
        let entry = self.pending.remove(&call_id).ok_or_else(|| {
            Error::ProtocolViolation(format!("unknown call-id {call_id}"))
        })?;
        trace!("completing call_id={call_id}");
        entry.complete_from(reader)
    }

    /// Number of calls awaiting a response. Exposed for tests pinning the
    /// call-id wrap scenario.
    pub fn pending_call_count(&self) -> usize {
        self.pending.len()
    }
}

/// Reduces a caught panic payload to a message, for `Error::HandlerException`.
/// A handler body that panics (the Rust stand-in for an unrecoverable fault
/// thrown from application code) never takes the endpoint down with it;
/// the fault is surfaced to the caller of `receive_data` instead.
fn panic_payload_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// An in-flight outbound call: the accumulated header/arguments buffer and
/// the call-id (if any) reserved for its response.
pub struct OutboundCall<R> {
    buf: Vec<u8>,
    call_id: Option<u8>,
    _return: std::marker::PhantomData<R>,
}

impl<R> OutboundCall<R> {
    /// Appends one argument's wire encoding, in declaration order.
    pub fn push_arg<T: crate::codec::Encode>(&mut self, value: &T) -> Result<(), Error> {
        value.encode(&mut self.buf)
    }

    pub fn call_id(&self) -> Option<u8> {
        self.call_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::{ErrorFuture, TypedFuture};
    use crate::registry::{InterfaceDescriptor, MethodDescriptor, ParameterDescriptor};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn test_interface_registry() -> Registry {
        Registry::builder()
            .interface(InterfaceDescriptor {
                ordinal: 1,
                name: "Test",
                methods: vec![MethodDescriptor {
                    index: 0,
                    name: "Test",
                    parameters: vec![ParameterDescriptor {
                        name: "i",
                        type_name: "i32",
                        nullable: false,
                    }],
                    return_shape: ReturnShape::None,
                }],
            })
            .unwrap()
            .interface(InterfaceDescriptor {
                ordinal: 2,
                name: "Checker",
                methods: vec![MethodDescriptor {
                    index: 0,
                    name: "IsOk",
                    parameters: vec![ParameterDescriptor {
                        name: "a",
                        type_name: "bool",
                        nullable: false,
                    }],
                    return_shape: ReturnShape::FutureTyped,
                }],
            })
            .unwrap()
            .build()
    }

    #[test]
    fn fire_and_forget_produces_exact_bytes() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let sent2 = Rc::clone(&sent);
        let mut endpoint: Endpoint<()> =
            Endpoint::new(test_interface_registry(), move |buf| {
                sent2.borrow_mut().extend_from_slice(buf)
            });
        let mut call = endpoint.begin_call::<()>(1, 0).unwrap();
        call.push_arg(&42i32).unwrap();
        endpoint.complete_call(call);
        assert_eq!(&*sent.borrow(), &[0x01, 0x00, 0x2A, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn future_bool_roundtrips_through_dispatch() {
        let sent = Rc::new(RefCell::new(Vec::new()));
        let sent2 = Rc::clone(&sent);
        let mut endpoint: Endpoint<()> =
            Endpoint::new(test_interface_registry(), move |buf| {
                sent2.borrow_mut().extend_from_slice(buf)
            });
        let mut call = endpoint.begin_call::<TypedFuture<bool>>(2, 0).unwrap();
        call.push_arg(&true).unwrap();
        let future = endpoint.complete_call(call);
        assert_eq!(&*sent.borrow(), &[0x02, 0x00, 0x01, 0x01]);

        let fired = Rc::new(RefCell::new(None));
        let fired2 = Rc::clone(&fired);
        future.on_complete(move |v| *fired2.borrow_mut() = Some(*v));

        let response = [0x81u8, 0x01, 0x01];
        endpoint.receive_data(&response, &mut ()).unwrap();
        assert_eq!(*fired.borrow(), Some(true));
    }

    #[test]
    fn call_id_collision_fails_exhausted() {
        let mut endpoint: Endpoint<()> = Endpoint::new(test_interface_registry(), |_| {});
        // Drive next_call_id to 127 so the next allocation wraps to 1, then
        // hold id 1 outstanding so the wrapped allocation collides.
        endpoint.next_call_id = 127;
        endpoint.pending.insert(1, Box::new(ErrorFuture::pending()));
        let id = endpoint.allocate_call_id();
        assert!(matches!(id, Err(Error::CallIdExhausted)));
    }

    #[test]
    fn remove_handler_allows_rebinding_and_restores_unknown_handler() {
        let mut endpoint: Endpoint<()> = Endpoint::new(test_interface_registry(), |_| {});
        endpoint
            .register_handler(1, Box::new(|_ctx, _reader| Ok(Box::new(()))))
            .unwrap();
        assert!(matches!(
            endpoint.register_handler(1, Box::new(|_ctx, _reader| Ok(Box::new(())))),
            Err(Error::DuplicateHandler { ordinal: 1 })
        ));
        endpoint.remove_handler(1);
        assert!(endpoint
            .register_handler(1, Box::new(|_ctx, _reader| Ok(Box::new(()))))
            .is_ok());
        endpoint.remove_handler(1);
        let err = endpoint.receive_data(&[0x01, 0x00], &mut ()).unwrap_err();
        assert!(matches!(err, Error::UnknownHandler { ordinal: 1 }));
    }

    #[test]
    fn unknown_handler_is_reported() {
        let mut endpoint: Endpoint<()> = Endpoint::new(test_interface_registry(), |_| {});
        let err = endpoint
            .receive_data(&[0x7F, 0x00], &mut ())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownHandler { ordinal: 127 }));
    }

    #[test]
    fn unknown_method_index_is_a_protocol_violation() {
        let mut endpoint: Endpoint<()> = Endpoint::new(test_interface_registry(), |_| {});
        endpoint
            .register_handler(1, Box::new(|_ctx, _reader| Ok(Box::new(()))))
            .unwrap();
        let err = endpoint
            .receive_data(&[0x01, 0x09], &mut ())
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }

    #[test]
    fn response_for_unknown_call_id_is_a_protocol_violation() {
        let mut endpoint: Endpoint<()> = Endpoint::new(test_interface_registry(), |_| {});
        let err = endpoint.receive_data(&[0x81, 0x01], &mut ()).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }

    #[test]
    fn response_call_id_zero_is_a_protocol_violation() {
        let mut endpoint: Endpoint<()> = Endpoint::new(test_interface_registry(), |_| {});
        let err = endpoint.receive_data(&[0x80], &mut ()).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation(_)));
    }

    #[test]
    fn truncated_frame_is_reported_and_table_is_unchanged() {
        let mut endpoint: Endpoint<()> = Endpoint::new(test_interface_registry(), |_| {});
        endpoint
            .register_handler(
                1,
                Box::new(|_ctx, reader| {
                    let _: i32 = crate::codec::Decode::decode(reader)?;
                    Ok(Box::new(()))
                }),
            )
            .unwrap();
        let before = endpoint.pending_call_count();
        let err = endpoint.receive_data(&[0x01, 0x00], &mut ()).unwrap_err();
        assert!(matches!(err, Error::TruncatedInput));
        assert_eq!(endpoint.pending_call_count(), before);
    }

    #[test]
    fn handler_panic_is_reported_as_handler_exception_not_a_crash() {
        let mut endpoint: Endpoint<()> = Endpoint::new(test_interface_registry(), |_| {});
        endpoint
            .register_handler(
                1,
                Box::new(|_ctx, _reader| panic!("handler fell over")),
            )
            .unwrap();
        let err = endpoint.receive_data(&[0x01, 0x00], &mut ()).unwrap_err();
        match err {
            Error::HandlerException(msg) => assert!(msg.contains("handler fell over")),
            other => panic!("expected HandlerException, got {other:?}"),
        }
    }
}
