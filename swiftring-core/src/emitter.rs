use crate::errors::{Result, RingError};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SHEBANG: &str = "#!/bin/bash";
pub const DEFAULT_SCRIPT_NAME: &str = "ring_builder.sh";

/// Writes generated commands as an executable shell script.
#[derive(Debug, Clone)]
pub struct ScriptEmitter {
    shebang: String,
}

impl Default for ScriptEmitter {
    fn default() -> Self {
        ScriptEmitter {
            shebang: SHEBANG.to_string(),
        }
    }
}

impl ScriptEmitter {
    pub fn render(&self, commands: &[String]) -> String {
        let mut script = String::with_capacity(
            self.shebang.len() + 1 + commands.iter().map(|cmd| cmd.len() + 1).sum::<usize>(),
        );
        script.push_str(&self.shebang);
        script.push('\n');
        for command in commands {
            script.push_str(command);
            script.push('\n');
        }
        script
    }

    /// Writes the script to `output_dir/file_name`, replacing any previous
    /// content, and returns its absolute path.
    pub fn emit(&self, commands: &[String], output_dir: &Path, file_name: &str) -> Result<PathBuf> {
        let path = output_dir.join(file_name);
        let write_error = |source| RingError::ScriptWriteError {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(output_dir).map_err(write_error)?;
        fs::write(&path, self.render(commands)).map_err(write_error)?;
        make_executable(&path).map_err(write_error)?;
        let path = fs::canonicalize(&path).map_err(write_error)?;

        info!(target = "emitter", path = %path.display(), commands = commands.len(), "wrote ring builder script");
        Ok(path)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
