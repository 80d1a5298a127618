// SPDX-License-Identifier: MIT

//! `fleetd`: the controller binary. Loads configuration, recovers state
//! from the journal and latest snapshot, wires up the configured
//! transport and workspace manager, and runs the reconciliation loop
//! until the transport's inbound stream closes.

use clap::Parser;
use fleet_core::{Options, SystemClock, TransportKind};
use fleet_daemon::transport::{FileDropTransport, TransportAdapter};
use fleet_daemon::workspace_manager::{LocalWorkspaceManager, WorkspaceManager};
use fleet_daemon::{storage, Controller};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "fleetd", version)]
struct Cli {
    /// Path to the `fleet.toml` configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Repository checked out at `workspace.root`'s parent, used as the
    /// source for `git worktree add`/tree copies when launching instances.
    #[arg(long)]
    repo_root: PathBuf,

    /// Where to read/write the periodic state snapshot. Defaults to
    /// `journal.path` with a `.snapshot` extension.
    #[arg(long)]
    snapshot_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let opts = match fleet_daemon::config::load(cli.config.as_deref()) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("fleetd: configuration error: {}", e.message);
            std::process::exit(2);
        }
    };

    let snapshot_path = cli.snapshot_path.unwrap_or_else(|| opts.journal_path.with_extension("snapshot"));

    if let Err(e) = run(opts, cli.repo_root, snapshot_path).await {
        error!(error = %e, "fleetd exiting after a fatal error");
        std::process::exit(1);
    }
}

async fn run(opts: Options, repo_root: PathBuf, snapshot_path: PathBuf) -> Result<(), String> {
    let recovered = storage::recover(&opts.journal_path, &snapshot_path)
        .map_err(|e| format!("recovering controller state: {e}"))?;
    info!(
        instances = recovered.state.instances.len(),
        tasks = recovered.state.tasks.len(),
        unapplied = recovered.unapplied.len(),
        "recovered controller state"
    );

    let workspace_manager: Arc<dyn WorkspaceManager> = Arc::new(LocalWorkspaceManager { repo_root });
    let transport: Arc<dyn TransportAdapter> = build_transport(&opts)?;

    let mut controller =
        Controller::from_recovery(recovered, opts, SystemClock, workspace_manager, transport, snapshot_path);

    info!("fleetd starting reconciliation loop");
    controller.run().await;
    Ok(())
}

fn build_transport(opts: &Options) -> Result<Arc<dyn TransportAdapter>, String> {
    match opts.transport_kind {
        TransportKind::File => {
            let inbox = opts
                .transport_file_inbox
                .clone()
                .ok_or_else(|| "transport.file.inbox is required when transport.kind=file".to_string())?;
            let outbox = opts
                .transport_file_outbox
                .clone()
                .ok_or_else(|| "transport.file.outbox is required when transport.kind=file".to_string())?;
            let events = opts
                .transport_file_events
                .clone()
                .ok_or_else(|| "transport.file.events is required when transport.kind=file".to_string())?;
            Ok(Arc::new(FileDropTransport::spawn(inbox, outbox, events)))
        }
        TransportKind::PubSub => {
            Err("transport.kind=pubsub requires an embedding process to hand it a PubSubProducer; \
                 fleetd's stock main only wires the file-drop transport"
                .to_string())
        }
    }
}
