// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

//! A runnable demonstration of `rpc_core`'s wire format: a toy `Echo`
//! interface plus a length-prefixed TCP adapter wiring an `Endpoint` to a
//! real socket. This crate is ambient scaffolding, not THE CORE — its
//! transport and session object are deliberately minimal, left-to-the-
//! implementer collaborators rather than part of the core library.

use std::cell::RefCell;
use std::net::TcpStream;
use std::rc::Rc;

use log::warn;

use rpc_core::future::TypedFuture;
use rpc_core::{define_interface, transport, Endpoint, Registry};

define_interface! {
    pub mod echo_iface {
        ordinal = 1;
        name = "Echo";
        methods {
            0 => fn ping(seq: u32) -> ();
            1 => fn echo(message: String) -> TypedFuture<String>;
        }
    }
}

/// The opaque per-peer context threaded through dispatch on the server
/// side — an opaque per-peer session object owned by the application,
/// not the library.
#[derive(Default)]
pub struct Session {
    pub pings_seen: u32,
}

pub fn registry() -> Registry {
    Registry::builder()
        .interface(echo_iface::descriptor())
        .expect("Echo is this demo's only interface; its ordinal is fixed")
        .build()
}

/// Wires an `Endpoint<C>`'s outbound bytes onto `stream` via the 3-byte
/// record-mark framer. `on_data_out` cannot itself return a `Result`, so
/// a write failure is logged rather than propagated — the next read off
/// `stream` will surface the same broken connection.
pub fn attach_endpoint<C>(registry: Registry, stream: &TcpStream) -> std::io::Result<Endpoint<C>> {
    let write_half = Rc::new(RefCell::new(stream.try_clone()?));
    Ok(Endpoint::new(registry, move |buf: &[u8]| {
        let mut stream = write_half.borrow_mut();
        if let Err(e) = transport::write_frame(&mut *stream, buf, false) {
            warn!("failed to write outbound frame: {e}");
        }
    }))
}

/// Blocks reading framed messages off `stream`, feeding each one to
/// `endpoint.receive_data`, until a clean EOF or the peer's close flag.
/// A protocol-level fault is logged and the loop continues — one
/// malformed frame doesn't tear down the connection; an I/O fault does.
pub fn serve_frames<C>(
    endpoint: &mut Endpoint<C>,
    stream: &mut TcpStream,
    context: &mut C,
) -> std::io::Result<()> {
    loop {
        match transport::read_frame(stream)? {
            None => return Ok(()),
            Some((payload, close)) => {
                if let Err(e) = endpoint.receive_data(&payload, context) {
                    warn!("dropping malformed frame: {e}");
                }
                if close {
                    return Ok(());
                }
            }
        }
    }
}

/// Reads exactly one framed response and hands it to `endpoint`, for the
/// client side's one-call-then-block usage. The client never dispatches
/// a call frame of its own, so the context passed through is never
/// actually consulted.
pub fn recv_one_response<C>(
    endpoint: &mut Endpoint<C>,
    stream: &mut TcpStream,
    context: &mut C,
) -> std::io::Result<()> {
    if let Some((payload, _close)) = transport::read_frame(stream)? {
        if let Err(e) = endpoint.receive_data(&payload, context) {
            warn!("dropping malformed response frame: {e}");
        }
    }
    Ok(())
}
