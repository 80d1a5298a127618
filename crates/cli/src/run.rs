// SPDX-License-Identifier: MIT

//! The `fleetctl` run loop (§6): read protocol lines from stdin one at a
//! time, forward each to the controller, echo its reply to stdout, and
//! fold the outcomes into the single aggregate exit code `main` reports.

use crate::client::{ClientError, DaemonClient};
use crate::exit_error::ExitError;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// `0`..`4` per §6; `main` passes this straight to `std::process::exit`.
pub type ExitCode = i32;

/// Drive one `fleetctl` session: every non-blank, non-comment line read
/// from `input` is validated locally (a line that won't even parse is a
/// usage error, exit `2`, and aborts the whole run), then forwarded to
/// `client`. A `PARTIAL`/`OK` reply keeps the aggregate at its current
/// worst; an `ERR` reply or a controller timeout raises it.
pub async fn run<R>(
    client: &DaemonClient,
    input: R,
    mut out: impl std::io::Write,
) -> Result<ExitCode, ExitError>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    let mut worst: ExitCode = 0;

    while let Some(raw) = lines.next_line().await.map_err(|e| ExitError::internal(e.to_string()))? {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Err(e) = fleet_protocol::decode(line, "fleetctl") {
            return Err(ExitError::usage(e.to_string()));
        }

        let token = nanoid::nanoid!();
        match client.send(&token, line).await {
            Ok(reply) => {
                writeln!(out, "{reply}").map_err(|e| ExitError::internal(e.to_string()))?;
                worst = worst.max(reply_severity(&reply));
            }
            Err(ClientError::Timeout) => {
                writeln!(out, "ERR {token} unavailable \"controller did not reply in time\"")
                    .map_err(|e| ExitError::internal(e.to_string()))?;
                worst = worst.max(3);
            }
            Err(ClientError::Io(e)) => return Err(ExitError::unreachable(e.to_string())),
        }
    }

    Ok(worst)
}

fn reply_severity(reply: &str) -> ExitCode {
    match reply.split_whitespace().next() {
        Some("OK") | Some("PARTIAL") => 0,
        _ => 1,
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
