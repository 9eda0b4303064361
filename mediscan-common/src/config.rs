//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. `MEDISCAN_ROOT_FOLDER` environment variable
//! 3. `root_folder` key in the TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or malformed config file is never fatal: compiled defaults are
//! used and the problem is reported through [`ConfigOrigin`].

use crate::diagnosis::{SeverityThresholds, SynthesizerConfig, UploadPolicy};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "MEDISCAN_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "mediscan.db";

/// Blob storage directory inside the root folder
pub const STORAGE_DIR_NAME: &str = "medical-images";

pub const DEFAULT_PORT: u16 = 5760;

/// Model version recorded on simulated predictions
pub const DEFAULT_MODEL_VERSION: &str = "DenseNet121-v1.0";

/// Logging section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive used when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[analysis]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub model_version: String,
    /// Reported accuracy of the model, as a percentage
    pub model_accuracy: f64,
    /// Delay before simulated scores are produced
    pub simulated_latency_ms: u64,
    /// Remote model server base URL; the simulated backend is used when unset
    pub model_server_url: Option<String>,
    /// Request timeout for the remote model server
    pub model_server_timeout_secs: u64,
    pub synthesizer: SynthesizerConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            model_accuracy: 94.0,
            simulated_latency_ms: 2000,
            model_server_url: None,
            model_server_timeout_secs: 30,
            synthesizer: SynthesizerConfig::default(),
        }
    }
}

/// Contents of `mediscan.toml`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub port: Option<u16>,
    pub logging: LoggingConfig,
    pub analysis: AnalysisConfig,
    pub severity: SeverityThresholds,
    pub upload: UploadPolicy,
}

impl TomlConfig {
    /// Parse a config file, failing on I/O or syntax errors
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the config file at `path` (or the default location), falling back
    /// to defaults when it is absent or invalid
    ///
    /// Nothing is logged here, since this runs before the tracing subscriber
    /// exists. Call [`ConfigOrigin::log`] once logging is up.
    pub fn load_or_default(path: Option<&Path>) -> (Self, ConfigOrigin) {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(p) => p,
            None => return (Self::default(), ConfigOrigin::NoConfigDir),
        };

        if !path.exists() {
            return (Self::default(), ConfigOrigin::Missing(path));
        }

        match Self::load(&path) {
            Ok(config) => (config, ConfigOrigin::File(path)),
            Err(e) => (
                Self::default(),
                ConfigOrigin::Invalid {
                    path,
                    error: e.to_string(),
                },
            ),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.analysis.synthesizer.validate()?;
        self.severity.validate()?;
        if self.upload.max_file_bytes == 0 {
            return Err(Error::Config("upload.max_file_bytes must be positive".to_string()));
        }
        if !(0.0..=100.0).contains(&self.analysis.model_accuracy) {
            return Err(Error::Config(format!(
                "analysis.model_accuracy must be a percentage (got {})",
                self.analysis.model_accuracy
            )));
        }
        Ok(())
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOrigin {
    File(PathBuf),
    Missing(PathBuf),
    Invalid { path: PathBuf, error: String },
    NoConfigDir,
}

impl ConfigOrigin {
    pub fn log(&self) {
        match self {
            ConfigOrigin::File(path) => info!("Loaded config from {}", path.display()),
            ConfigOrigin::Missing(path) => {
                info!("No config file at {}, using defaults", path.display())
            }
            ConfigOrigin::Invalid { path, error } => {
                warn!("Ignoring config file {}: {}", path.display(), error)
            }
            ConfigOrigin::NoConfigDir => {
                warn!("Could not determine config directory, using defaults")
            }
        }
    }
}

/// `<config_dir>/mediscan/mediscan.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mediscan").join("mediscan.toml"))
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mediscan"))
        .unwrap_or_else(|| PathBuf::from("./mediscan_data"))
}

/// Resolves the root folder for a service
///
/// # Examples
///
/// ```
/// use mediscan_common::config::RootFolderResolver;
/// use std::path::PathBuf;
///
/// let root = RootFolderResolver::new("mediscan-api")
///     .with_cli_arg(Some(PathBuf::from("/srv/mediscan")))
///     .resolve();
/// assert_eq!(root, PathBuf::from("/srv/mediscan"));
/// ```
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    pub fn with_toml_root(mut self, toml_root: Option<PathBuf>) -> Self {
        self.toml_root = toml_root;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!("{}: root folder from command line: {}", self.module_name, path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                info!("{}: root folder from {}: {}", self.module_name, ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            info!("{}: root folder from config file: {}", self.module_name, path.display());
            return path.clone();
        }

        let path = default_root_folder();
        info!("{}: using default root folder: {}", self.module_name, path.display());
        path
    }
}

/// Creates the root folder layout on first run
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder and blob storage directory if missing
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder: {}", self.root_folder.display());
        }
        std::fs::create_dir_all(&self.root_folder)?;
        std::fs::create_dir_all(self.storage_path())?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE_NAME)
    }

    pub fn storage_path(&self) -> PathBuf {
        self.root_folder.join(STORAGE_DIR_NAME)
    }
}
