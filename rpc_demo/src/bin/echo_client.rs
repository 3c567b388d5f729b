// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::net::TcpStream;

use clap::Parser;
use log::info;

use rpc_demo::{echo_iface, registry};

#[derive(Parser)]
struct Cli {
    #[arg(long, default_value = "localhost")]
    hostname: String,

    #[arg(long, default_value_t = 7070)]
    port: u16,

    /// Message to echo. A ping (no reply expected) is sent first regardless.
    #[arg(default_value = "hello from echo_client")]
    message: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Cli::parse();

    let stream = TcpStream::connect((args.hostname.as_str(), args.port))?;
    let mut endpoint = rpc_demo::attach_endpoint::<()>(registry(), &stream)?;
    let mut stream = stream;

    // Fire-and-forget: occupies no call-id, produces no response.
    echo_iface::Proxy::ping(&mut endpoint, 1)?;

    // A call with a return value: blocks on exactly one response frame.
    let future = echo_iface::Proxy::echo(&mut endpoint, args.message.clone())?;
    rpc_demo::recv_one_response(&mut endpoint, &mut stream, &mut ())?;

    let reply = future.result()?;
    info!("server echoed back: {reply}");
    println!("{reply}");

    Ok(())
}
