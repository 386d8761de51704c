//! Receiver CLI: `receiver <server-ip> <server-port> [<output-prefix>]`.
//!
//! Writes the reassembled file to `<prefix>received_data.txt`, or
//! `received_data.txt` when no prefix is given. Works against either
//! sender variant — the wire format and reassembly logic don't depend
//! on which congestion-control strategy the sender is running.

use rudp::receiver::ReceiverEngine;
use std::fs::File;
use std::net::{SocketAddr, UdpSocket};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(thiserror::Error, Debug)]
enum AppError {
    #[error("usage: receiver <server-ip> <server-port> [<output-prefix>]")]
    Usage,
    #[error("invalid server address: {0}")]
    InvalidAddr(std::net::AddrParseError),
    #[error("failed to bind local socket: {0}")]
    BindFailure(std::io::Error),
    #[error("failed to open output file {path}: {source}")]
    OutputOpen {
        path: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Transport(#[from] rudp::RudpError),
}

struct Args {
    server_addr: SocketAddr,
    output_path: String,
}

fn parse_args() -> Result<Args, AppError> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        return Err(AppError::Usage);
    }
    let ip = &args[1];
    let port = &args[2];
    let server_addr: SocketAddr = format!("{ip}:{port}")
        .parse()
        .map_err(AppError::InvalidAddr)?;
    let output_path = match args.get(3) {
        Some(prefix) => format!("{prefix}received_data.txt"),
        None => "received_data.txt".to_string(),
    };
    Ok(Args {
        server_addr,
        output_path,
    })
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run() {
        Ok(()) => {
            info!("transfer completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "receiver exiting with failure");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), AppError> {
    let args = parse_args()?;
    let socket = UdpSocket::bind("0.0.0.0:0").map_err(AppError::BindFailure)?;
    let mut output = File::create(&args.output_path).map_err(|source| AppError::OutputOpen {
        path: args.output_path.clone(),
        source,
    })?;

    let mut engine = ReceiverEngine::new();
    engine.run(&socket, args.server_addr, &mut output)?;
    Ok(())
}
