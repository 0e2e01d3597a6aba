use crate::errors::{Result, RingError};
use crate::remote::SshExecutor;

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// How the artifacts reached a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The node is this host, files were copied on the local filesystem
    Local,
    /// Files were pushed over the network
    Remote,
}

impl fmt::Display for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delivery::Local => f.write_str("local"),
            Delivery::Remote => f.write_str("remote"),
        }
    }
}

/// Outcome of the distribution to a single node.
#[derive(Debug)]
pub struct NodeReport {
    pub node: String,
    pub outcome: Result<Delivery>,
}

impl NodeReport {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Copies the content of a local directory into a directory of a remote node.
#[async_trait]
pub trait ArtifactTransport: Send + Sync + 'static {
    async fn push(&self, source_dir: &Path, node: &str, target_dir: &Path) -> Result<()>;
}

/// `rsync` over ssh, the target directory is created when missing.
#[derive(Debug, Clone, Default)]
pub struct RsyncTransport {
    ssh: SshExecutor,
}

impl RsyncTransport {
    pub fn new(ssh: SshExecutor) -> Self {
        RsyncTransport { ssh }
    }

    fn destination(&self, node: &str, target_dir: &Path) -> String {
        match self.ssh.user() {
            Some(user) => format!("{}@{}:{}/", user, node, target_dir.display()),
            None => format!("{}:{}/", node, target_dir.display()),
        }
    }

    /// Arguments of the rsync invocation pushing `source_dir` to `node`.
    pub fn rsync_args(&self, source_dir: &Path, node: &str, target_dir: &Path) -> Vec<String> {
        let remote_shell = std::iter::once("ssh".to_string())
            .chain(self.ssh.ssh_args().iter().map(|arg| rsync_quote(arg)))
            .collect::<Vec<_>>()
            .join(" ");
        vec![
            "-az".to_string(),
            // the destination path reaches the remote rsync unsplit
            "--protect-args".to_string(),
            "-e".to_string(),
            remote_shell,
            "--rsync-path".to_string(),
            format!("mkdir -p {} && rsync", shell_quote(&target_dir.display().to_string())),
            // the trailing slash copies the directory content, not the directory
            format!("{}/", source_dir.display()),
            self.destination(node, target_dir),
        ]
    }
}

#[async_trait]
impl ArtifactTransport for RsyncTransport {
    async fn push(&self, source_dir: &Path, node: &str, target_dir: &Path) -> Result<()> {
        let mut cmd = Command::new("rsync");
        cmd.args(self.rsync_args(source_dir, node, target_dir));

        let output = cmd.output().await.map_err(|err| RingError::DistributionFailed {
            node: node.to_string(),
            detail: format!("failed to start rsync: {}", err),
        })?;
        if !output.status.success() {
            return Err(RingError::DistributionFailed {
                node: node.to_string(),
                detail: format!(
                    "rsync exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(())
    }
}

// POSIX shell quoting, for the command run by the remote shell.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

// rsync splits the `-e` command on spaces and honours quotes, not backslashes.
fn rsync_quote(value: &str) -> String {
    if !value.contains(' ') {
        value.to_string()
    } else if value.contains('\'') {
        format!("\"{}\"", value)
    } else {
        format!("'{}'", value)
    }
}

/// Delivers the generated artifacts to every node of the cluster.
pub struct Distributor {
    transport: Arc<dyn ArtifactTransport>,
    local_addresses: BTreeSet<String>,
}

impl Distributor {
    pub fn new(transport: Arc<dyn ArtifactTransport>, local_addresses: BTreeSet<String>) -> Self {
        Distributor {
            transport,
            local_addresses,
        }
    }

    pub fn is_local(&self, node: &str) -> bool {
        self.local_addresses.contains(node)
    }

    /// Every node is attempted; a failed node never prevents delivery to the others.
    pub async fn distribute(
        &self,
        source_dir: &Path,
        target_dir: &Path,
        nodes: &BTreeSet<String>,
    ) -> Vec<NodeReport> {
        let deliveries = nodes.iter().map(|node| async move {
            let outcome = if self.is_local(node) {
                copy_dir_contents(source_dir, target_dir)
                    .await
                    .map(|_| Delivery::Local)
                    .map_err(|err| RingError::DistributionFailed {
                        node: node.clone(),
                        detail: err.to_string(),
                    })
            } else {
                self.transport
                    .push(source_dir, node, target_dir)
                    .await
                    .map(|_| Delivery::Remote)
            };
            match &outcome {
                Ok(delivery) => {
                    info!(target = "distribution", node = %node, delivery = %delivery, "artifacts delivered")
                }
                Err(err) => warn!(target = "distribution", node = %node, error = %err, "artifact delivery failed"),
            }
            NodeReport {
                node: node.clone(),
                outcome,
            }
        });
        join_all(deliveries).await
    }
}

/// Copies the tree under `source_dir` into `target_dir`, the local
/// counterpart of `rsync -a <source_dir>/ <target_dir>/`. Returns the copied
/// files, sorted.
pub async fn copy_dir_contents(source_dir: &Path, target_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut copied = Vec::new();
    let mut pending = vec![(source_dir.to_path_buf(), target_dir.to_path_buf())];
    while let Some((from, to)) = pending.pop() {
        tokio::fs::create_dir_all(&to).await?;
        let mut entries = tokio::fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let target = to.join(entry.file_name());
            if file_type.is_dir() {
                pending.push((entry.path(), target));
            } else if file_type.is_file() {
                tokio::fs::copy(entry.path(), &target).await?;
                copied.push(target);
            }
        }
    }
    copied.sort();
    Ok(copied)
}

/// Addresses under which this host may appear in the topology: loopback,
/// the hostname and the address of every network interface.
///
/// Interface addresses come from `hostname -I` (GNU/Linux), or from the
/// `inet`/`inet6` lines of `ifconfig -a` where `-I` is not supported. A host
/// offering neither is only recognised by loopback or hostname, its nodes are
/// then pushed through the transport like any remote node.
pub async fn local_addresses() -> BTreeSet<String> {
    let mut addresses: BTreeSet<String> = ["127.0.0.1", "::1", "localhost"]
        .iter()
        .map(|addr| addr.to_string())
        .collect();

    if let Some(hostname) = command_stdout("hostname", &[]).await {
        addresses.extend(hostname.split_whitespace().map(str::to_string));
    }

    let interfaces = match command_stdout("hostname", &["-I"]).await {
        Some(output) if !output.trim().is_empty() => {
            output.split_whitespace().map(str::to_string).collect()
        }
        _ => match command_stdout("ifconfig", &["-a"]).await {
            Some(output) => parse_ifconfig_addresses(&output),
            None => Vec::new(),
        },
    };
    if interfaces.is_empty() {
        warn!(target = "distribution", "no interface address found, local nodes are matched by hostname only");
    }
    addresses.extend(interfaces);
    addresses
}

/// Addresses of the `inet` and `inet6` lines of an `ifconfig` listing, in both
/// the BSD (`inet 10.0.0.1 netmask`) and the net-tools (`inet addr:10.0.0.1`)
/// layouts. IPv6 scope suffixes (`%en0`) are dropped.
pub fn parse_ifconfig_addresses(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let mut tokens = line.split_whitespace();
            match tokens.next()? {
                "inet" | "inet6" => {}
                _ => return None,
            }
            let mut address = tokens.next()?;
            if let Some(rest) = address.strip_prefix("addr:") {
                address = rest;
            }
            let address = address.split('%').next()?;
            let address = address.split('/').next()?;
            (!address.is_empty()).then(|| address.to_string())
        })
        .collect()
}

async fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    match Command::new(program).args(args).output().await {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            debug!(target = "distribution", program, args = ?args, status = %output.status, "address lookup failed");
            None
        }
        Err(err) => {
            debug!(target = "distribution", program, args = ?args, error = %err, "unable to run address lookup");
            None
        }
    }
}
