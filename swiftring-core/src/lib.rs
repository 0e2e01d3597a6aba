mod errors;
pub use errors::{Result, RingError};

// Validated ring definition (zones -> nodes -> disks)
pub mod topology;
pub use topology::{DiskPlacement, LoadConfiguration, NodeDefinition, RingDefinition, RingType};

// Remote command execution against cluster nodes
pub mod remote;
pub use remote::{CommandOutput, RemoteExecutor, SshExecutor};

// Disk capacity / identifier discovery
pub mod resolver;
pub use resolver::{
    DiskInventory, DiskMetadata, DiskMetadataResolver, MetadataSource, MetadataSourceKind,
};

mod generator;
pub use generator::CommandGenerator;

mod emitter;
pub use emitter::{ScriptEmitter, DEFAULT_SCRIPT_NAME, SHEBANG};

pub mod distribution;
pub use distribution::{ArtifactTransport, Delivery, Distributor, NodeReport, RsyncTransport};

// Unit tests
#[cfg(test)]
mod topology_test;
