// SPDX-License-Identifier: MIT

//! `fleetctl`: thin stdin/stdout client over a running `fleetd`'s
//! file-drop transport. Argument parsing and process exit live here;
//! everything else is in the library so it can be driven in tests
//! without touching a real filesystem-backed daemon.

use clap::Parser;
use fleet_cli::{DaemonClient, ExitError};
use std::path::PathBuf;
use std::time::Duration;

/// Forward protocol commands from stdin to a running fleetd.
#[derive(Parser, Debug)]
#[command(name = "fleetctl", version)]
struct Cli {
    /// Controller's inbox directory (mirrors `transport.file.inbox`).
    #[arg(long, env = "FLEET_TRANSPORT_FILE_INBOX")]
    inbox: PathBuf,

    /// Controller's outbox directory (mirrors `transport.file.outbox`).
    #[arg(long, env = "FLEET_TRANSPORT_FILE_OUTBOX")]
    outbox: PathBuf,

    /// How long to wait for a reply before reporting the controller unreachable.
    #[arg(long, default_value_t = 10_000)]
    reply_timeout_ms: u64,

    /// How often to poll the outbox while waiting for a reply.
    #[arg(long, default_value_t = 100)]
    poll_interval_ms: u64,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = DaemonClient::new(cli.inbox, cli.outbox).with_timeouts(
        Duration::from_millis(cli.poll_interval_ms),
        Duration::from_millis(cli.reply_timeout_ms),
    );

    let stdin = tokio::io::stdin();
    let code = match fleet_cli::run(&client, stdin, std::io::stdout()).await {
        Ok(code) => code,
        Err(e) => {
            report(&e);
            e.code
        }
    };
    std::process::exit(code);
}

fn report(e: &ExitError) {
    eprintln!("fleetctl: {e}");
}
