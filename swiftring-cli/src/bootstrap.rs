use crate::generate::{load_ring, write_script, RingArgs};

use anyhow::{Context, Result};
use clap::Args;
use prettytable::{format, Cell, Row, Table};
use std::path::Path;
use std::sync::Arc;
use swiftring_core::distribution::local_addresses;
use swiftring_core::{
    Distributor, NodeReport, RingError, RingType, RsyncTransport, SshExecutor,
    DEFAULT_SCRIPT_NAME,
};
use tokio::process::Command;
use tracing::info;

#[derive(Debug, Args)]
pub(crate) struct Bootstrap {
    #[command(flatten)]
    ring: RingArgs,
    #[arg(long, value_parser = ["json"], help = "Output format: json (default: table)")]
    output: Option<String>,
}

/// Generates the script in a staging directory, runs it there to build the
/// rings, then copies the staging directory content to `--outdir` on every node.
pub(crate) async fn handle(cmd: Bootstrap, ssh: SshExecutor) -> Result<()> {
    let ring = load_ring(&cmd.ring.config)?;

    let staging = tempfile::Builder::new()
        .prefix("swiftring-")
        .tempdir()
        .context("Failed to create the staging directory")?;
    let script = write_script(&ring, &cmd.ring, ssh.clone(), staging.path(), DEFAULT_SCRIPT_NAME).await?;
    run_build_script(&script, staging.path()).await?;
    verify_builders(&script, staging.path())?;

    let distributor = Distributor::new(
        Arc::new(RsyncTransport::new(ssh)),
        local_addresses().await,
    );
    let reports = distributor
        .distribute(staging.path(), &cmd.ring.outdir, &ring.nodes())
        .await;
    print_reports(&reports, cmd.output.as_deref())?;

    let failed = reports.iter().filter(|report| !report.is_success()).count();
    if failed > 0 {
        anyhow::bail!("Distribution failed for {} of {} nodes", failed, reports.len());
    }
    info!(target = "bootstrap", nodes = reports.len(), outdir = %cmd.ring.outdir.display(), "rings distributed");
    Ok(())
}

/// Runs the script under `bash -e`, the first failing command fails the build.
async fn run_build_script(script: &Path, working_dir: &Path) -> Result<(), RingError> {
    info!(target = "bootstrap", script = %script.display(), "running ring builder script");
    let output = Command::new("bash")
        .arg("-e")
        .arg(script)
        .current_dir(working_dir)
        .output()
        .await
        .map_err(|err| RingError::BuildScriptFailed {
            path: script.to_path_buf(),
            detail: err.to_string(),
        })?;

    if !output.status.success() {
        return Err(RingError::BuildScriptFailed {
            path: script.to_path_buf(),
            detail: format!(
                "exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}

/// Every ring must have its builder file before anything is distributed.
fn verify_builders(script: &Path, staging_dir: &Path) -> Result<(), RingError> {
    let missing: Vec<String> = RingType::ALL
        .iter()
        .map(|ring_type| ring_type.builder_file())
        .filter(|file| !staging_dir.join(file).is_file())
        .collect();
    if !missing.is_empty() {
        return Err(RingError::BuildScriptFailed {
            path: script.to_path_buf(),
            detail: format!("missing builder files: {}", missing.join(", ")),
        });
    }
    Ok(())
}

fn print_reports(reports: &[NodeReport], output: Option<&str>) -> Result<()> {
    if matches!(output, Some("json")) {
        let serializable: Vec<serde_json::Value> = reports
            .iter()
            .map(|report| match &report.outcome {
                Ok(delivery) => serde_json::json!({
                    "node": report.node,
                    "status": "ok",
                    "delivery": delivery.to_string(),
                }),
                Err(err) => serde_json::json!({
                    "node": report.node,
                    "status": "failed",
                    "error": err.to_string(),
                }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&serializable)?);
    } else {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.add_row(Row::new(vec![
            Cell::new("NODE"),
            Cell::new("STATUS"),
            Cell::new("DETAIL"),
        ]));
        for report in reports {
            let (status, detail) = match &report.outcome {
                Ok(delivery) => ("ok".to_string(), delivery.to_string()),
                Err(err) => ("failed".to_string(), err.to_string()),
            };
            table.add_row(Row::new(vec![
                Cell::new(&report.node),
                Cell::new(&status),
                Cell::new(&detail),
            ]));
        }
        table.printstd();
    }
    Ok(())
}
