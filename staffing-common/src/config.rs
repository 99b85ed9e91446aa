//! Configuration loading and root folder resolution
//!
//! Bootstrap settings live in an optional TOML file per module. Resolution
//! order for the root folder:
//! 1. Command-line argument (handled by the caller, see [`RootFolderResolver::with_cli_arg`])
//! 2. Environment variable (`STAFFING_ROOT_FOLDER`, then `STAFFING_ROOT`)
//! 3. TOML config file (`<config_dir>/staffing/<module>.toml`)
//! 4. OS-dependent compiled default
//!
//! A missing config file means compiled defaults. A malformed one is
//! returned as [`Error::Config`] by [`load_module_config`]; the server logs
//! it and carries on with defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Primary root folder environment variable
pub const ENV_ROOT_FOLDER: &str = "STAFFING_ROOT_FOLDER";
/// Alternative root folder environment variable
pub const ENV_ROOT: &str = "STAFFING_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "staffing.db";
/// Upload folder name inside the root folder
pub const UPLOADS_FOLDER_NAME: &str = "uploads";

/// Bootstrap configuration loaded from `<config_dir>/staffing/<module>.toml`
///
/// Every field is optional so that partial files remain valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database and uploads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// HTTP bind address (e.g. "127.0.0.1" or "0.0.0.0")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Override for the upload folder (defaults to `<root>/uploads`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploads_folder: Option<PathBuf>,

    /// Weekly hours above which a staff member counts as over-allocated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub over_allocation_threshold: Option<f64>,

    /// Maximum accepted upload request size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_upload_bytes: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Compiled-in defaults used when neither CLI, environment nor TOML say otherwise
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub port: u16,
    pub bind_address: String,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub over_allocation_threshold: f64,
    pub max_upload_bytes: usize,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was compiled for
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            port: 5780,
            bind_address: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            log_file: None,
            over_allocation_threshold: 40.0,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/staffing
        dirs::data_local_dir()
            .map(|d| d.join("staffing"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/staffing"))
    } else if cfg!(target_os = "macos") {
        // ~/Library/Application Support/staffing
        dirs::data_dir()
            .map(|d| d.join("staffing"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/staffing"))
    } else if cfg!(target_os = "windows") {
        // %LOCALAPPDATA%\staffing
        dirs::data_local_dir()
            .map(|d| d.join("staffing"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\staffing"))
    } else {
        PathBuf::from("./staffing_data")
    }
}

/// Path of the per-module config file, if the platform has a config directory
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("staffing").join(format!("{}.toml", module_name)))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Load the module's TOML config
///
/// A missing file yields defaults. An unreadable or malformed file is
/// returned as an error so the caller can report it once logging is up.
pub fn load_module_config(module_name: &str) -> Result<TomlConfig> {
    match config_file_path(module_name) {
        Some(path) if path.exists() => load_toml_config(&path),
        _ => Ok(TomlConfig::default()),
    }
}

/// Resolves the root folder following the documented priority order
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    /// Create a resolver from an already loaded TOML config
    pub fn from_config(module_name: &str, config: &TomlConfig) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: config.root_folder.clone(),
        }
    }

    /// Highest-priority override from the command line
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Resolve the root folder; never fails
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        for var in [ENV_ROOT_FOLDER, ENV_ROOT] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(path) = &self.toml_root {
            return path.clone();
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and derives the paths that live inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
    uploads_override: Option<PathBuf>,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self {
            root_folder,
            uploads_override: None,
        }
    }

    /// Use a custom upload folder instead of `<root>/uploads`
    pub fn with_uploads_folder(mut self, uploads: Option<PathBuf>) -> Self {
        self.uploads_override = uploads;
        self
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.uploads_override
            .clone()
            .unwrap_or_else(|| self.root_folder.join(UPLOADS_FOLDER_NAME))
    }

    /// Create the root and upload folders (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.uploads_path())?;
        Ok(())
    }
}
