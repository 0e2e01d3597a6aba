use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RingError>;

#[derive(Debug, Error)]
pub enum RingError {
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("unable to read configuration {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unable to parse configuration: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),

    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("disk {device} not found on {host}")]
    DiskNotFound { host: String, device: String },

    #[error("unable to parse metadata of {device} on {host}: {reason}")]
    MetadataParseError {
        host: String,
        device: String,
        reason: String,
    },

    #[error("command [{command}] failed on {host}: {detail}")]
    RemoteCommandError {
        host: String,
        command: String,
        detail: String,
    },

    #[error("unable to write script {}: {source}", path.display())]
    ScriptWriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("build script {} failed: {detail}", path.display())]
    BuildScriptFailed { path: PathBuf, detail: String },

    #[error("distribution to {node} failed: {detail}")]
    DistributionFailed { node: String, detail: String },

    #[error("unable to perform operation: {0}")]
    Unrecoverable(String),
}

impl RingError {
    pub(crate) fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RingError::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn metadata_parse(host: &str, device: &str, reason: impl Into<String>) -> Self {
        RingError::MetadataParseError {
            host: host.to_string(),
            device: device.to_string(),
            reason: reason.into(),
        }
    }
}
