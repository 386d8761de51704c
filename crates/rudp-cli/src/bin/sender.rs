//! Sender CLI: `sender <bind-ip> <bind-port> [<window-bytes>]`.
//!
//! Presence of the third argument selects Variant A (Selective Repeat,
//! fixed byte window); its absence selects Variant B (Reno + SACK).
//! Reads the file to send from `data.txt` in the current directory.

use rudp::sender::{RenoSender, SelectiveRepeatSender};
use std::net::{SocketAddr, UdpSocket};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(thiserror::Error, Debug)]
enum AppError {
    #[error("usage: sender <bind-ip> <bind-port> [<window-bytes>]")]
    Usage,
    #[error("invalid bind address: {0}")]
    InvalidAddr(std::net::AddrParseError),
    #[error("invalid window-bytes argument: {0}")]
    InvalidWindow(std::num::ParseIntError),
    #[error("failed to read data.txt: {0}")]
    MissingInput(std::io::Error),
    #[error("failed to bind socket to {addr}: {source}")]
    BindFailure {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error(transparent)]
    Transport(#[from] rudp::RudpError),
}

struct Args {
    bind_addr: SocketAddr,
    window_bytes: Option<u32>,
}

fn parse_args() -> Result<Args, AppError> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        return Err(AppError::Usage);
    }
    let ip = &args[1];
    let port = &args[2];
    let bind_addr: SocketAddr = format!("{ip}:{port}").parse().map_err(AppError::InvalidAddr)?;
    let window_bytes = match args.get(3) {
        Some(raw) => Some(raw.parse::<u32>().map_err(AppError::InvalidWindow)?),
        None => None,
    };
    Ok(Args { bind_addr, window_bytes })
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run().await {
        Ok(()) => {
            info!("transfer completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "sender exiting with failure");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), AppError> {
    let args = parse_args()?;
    let file_data = std::fs::read("data.txt").map_err(AppError::MissingInput)?;

    match args.window_bytes {
        Some(sws) => {
            info!(window_bytes = sws, "running Variant A (Selective Repeat)");
            let socket = UdpSocket::bind(args.bind_addr).map_err(|source| AppError::BindFailure {
                addr: args.bind_addr,
                source,
            })?;
            tokio::task::spawn_blocking(move || {
                let sender = SelectiveRepeatSender::new(sws)?;
                sender.run(&socket, &file_data)
            })
            .await
            .expect("sender task panicked")?;
        }
        None => {
            info!("running Variant B (Reno + SACK)");
            let socket =
                tokio::net::UdpSocket::bind(args.bind_addr)
                    .await
                    .map_err(|source| AppError::BindFailure {
                        addr: args.bind_addr,
                        source,
                    })?;
            let sender = RenoSender::new();
            sender
                .run(std::sync::Arc::new(socket), bytes::Bytes::from(file_data))
                .await?;
        }
    }
    Ok(())
}
