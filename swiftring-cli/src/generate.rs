use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use swiftring_core::{
    CommandGenerator, DiskMetadataResolver, MetadataSource, MetadataSourceKind, RingDefinition,
    ScriptEmitter, SshExecutor, DEFAULT_SCRIPT_NAME,
};
use tracing::info;

/// Arguments shared by every command that generates rings.
#[derive(Debug, Args)]
pub(crate) struct RingArgs {
    #[arg(long, help = "Path to the YAML ring definition")]
    pub(crate) config: PathBuf,
    #[arg(long, help = "Directory receiving the ring files")]
    pub(crate) outdir: PathBuf,
    #[arg(long, help = "Metadata tag used for every device instead of its serial")]
    pub(crate) meta: Option<String>,
    #[arg(long, help = "Disk metadata source: inventory or direct-tool (default: from the ring definition)")]
    pub(crate) metadata_source: Option<MetadataSourceKind>,
    #[arg(long, default_value_t = false, help = "Do not append the rebalance commands")]
    pub(crate) skip_rebalance: bool,
}

#[derive(Debug, Args)]
pub(crate) struct Generate {
    #[command(flatten)]
    ring: RingArgs,
    #[arg(long, default_value = DEFAULT_SCRIPT_NAME, help = "File name of the generated script")]
    name: String,
}

pub(crate) async fn handle(cmd: Generate, ssh: SshExecutor) -> Result<()> {
    let ring = load_ring(&cmd.ring.config)?;
    let script = write_script(&ring, &cmd.ring, ssh, &cmd.ring.outdir, &cmd.name).await?;
    println!("{}", script.display());
    Ok(())
}

pub(crate) fn load_ring(config: &Path) -> Result<RingDefinition> {
    RingDefinition::load(config)
        .with_context(|| format!("Failed to load ring definition {}", config.display()))
}

/// Resolves every disk of the ring definition and writes the builder script
/// into `script_dir`; the commands operate on builder files of the same directory.
pub(crate) async fn write_script(
    ring: &RingDefinition,
    args: &RingArgs,
    ssh: SshExecutor,
    script_dir: &Path,
    file_name: &str,
) -> Result<PathBuf> {
    let source_kind = args.metadata_source.unwrap_or(ring.metadata_source());
    info!(
        target = "bootstrap",
        nodes = ring.nodes().len(),
        disks = ring.placements().len(),
        source = %source_kind,
        "resolving disk metadata"
    );

    let resolver = DiskMetadataResolver::new(MetadataSource::new(source_kind, Arc::new(ssh)));
    let generator = CommandGenerator::new(Arc::new(resolver));
    let commands = generator
        .generate(ring, script_dir, !args.skip_rebalance, args.meta.as_deref())
        .await
        .context("Failed to generate ring commands")?;

    let script = ScriptEmitter::default()
        .emit(&commands, script_dir, file_name)
        .context("Failed to write ring builder script")?;
    Ok(script)
}
