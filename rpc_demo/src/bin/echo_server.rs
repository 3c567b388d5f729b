// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::net::TcpListener;

use clap::Parser;
use log::{debug, info, warn};

use rpc_demo::{echo_iface, registry, Session};

#[derive(Parser)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 7070)]
    port: u16,
}

struct EchoHandler;

impl echo_iface::Handler<Session> for EchoHandler {
    fn ping(&mut self, context: &mut Session, seq: u32) {
        context.pings_seen += 1;
        debug!("ping #{seq} received ({} total)", context.pings_seen);
    }

    fn echo(
        &mut self,
        _context: &mut Session,
        message: String,
    ) -> rpc_core::future::TypedFuture<String> {
        rpc_core::future::TypedFuture::ready(message)
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();
    let args = Cli::parse();

    let listener = TcpListener::bind(("0.0.0.0", args.port))?;
    info!("echo_server listening on port {}", args.port);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("error accepting connection: {e}");
                continue;
            }
        };

        let mut endpoint = rpc_demo::attach_endpoint(registry(), &stream)?;
        echo_iface::register(&mut endpoint, EchoHandler)
            .expect("Echo is bound exactly once per freshly constructed endpoint");

        let mut session = Session::default();
        let mut stream = stream;
        if let Err(e) = rpc_demo::serve_frames(&mut endpoint, &mut stream, &mut session) {
            warn!("connection ended: {e}");
        }
    }

    Ok(())
}
