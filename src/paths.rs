//! Centralized path resolution for infragraph
//!
//! # Environment Variables
//!
//! - `INFRAGRAPH_CONFIG_DIR` - Override config directory
//! - `INFRAGRAPH_OUT_DIR` - Override synthesis output directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `INFRAGRAPH_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/infragraph` (if set)
//! 3. Platform default:
//!    - Windows: `%APPDATA%\infragraph`
//!    - macOS/Linux: `~/.config/infragraph`
//!
//! For out_dir():
//! 1. Explicit `--out` argument
//! 2. `INFRAGRAPH_OUT_DIR` environment variable
//! 3. `./infragraph.out`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "INFRAGRAPH_CONFIG_DIR";

/// Environment variable for output directory override
pub const ENV_OUT_DIR: &str = "INFRAGRAPH_OUT_DIR";

/// Default synthesis output directory, relative to the working directory
pub const DEFAULT_OUT_DIR: &str = "infragraph.out";

/// File name of the synthesized document inside the stack directory
pub const DOCUMENT_FILE: &str = "main.tf.json";

/// Get the infragraph config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("infragraph");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(app_data) = dirs::config_dir() {
            let path = app_data.join("infragraph");
            log::debug!("Using Windows config dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("infragraph");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Default location of the stack config file
pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("stack.toml"))
}

/// Resolve the synthesis output directory
pub fn out_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return expand(&dir.to_string_lossy());
    }
    if let Ok(dir) = std::env::var(ENV_OUT_DIR) {
        return expand(&dir);
    }
    PathBuf::from(DEFAULT_OUT_DIR)
}

/// Path of the document for a stack under an output directory
pub fn document_path(out_dir: &Path, stack: &str) -> PathBuf {
    out_dir.join(stack).join(DOCUMENT_FILE)
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
