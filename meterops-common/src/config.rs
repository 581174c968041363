//! Configuration loading and root folder resolution
//!
//! Resolution order for every setting:
//! 1. Command-line argument (highest priority, applied by the binary)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "METEROPS_ROOT_FOLDER";

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3000;

/// Default request body limit (10 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Service configuration as read from `config.toml`
///
/// Every key is optional in the file; missing keys take compiled defaults.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub host: String,
    pub port: u16,
    /// Folder holding the database; OS data dir when unset
    pub root_folder: Option<PathBuf>,
    /// Database file name, relative to the root folder
    pub database_file: String,
    pub log_level: String,
    /// Allowed CORS origins; empty or `*` allows any origin
    pub cors_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub auth: AuthConfig,
}

/// Bearer token verification settings
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Expected `aud` claim; unchecked when unset
    pub audience: Option<String>,
    /// Expected `iss` claim; unchecked when unset
    pub issuer: Option<String>,
    /// HMAC signing secret; loaded from the settings table when unset
    pub signing_secret: Option<String>,
}

/// Values given on the command line or through `METEROPS_*` variables
///
/// Each set field replaces the file value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    pub cors_origins: Option<Vec<String>>,
    pub max_body_bytes: Option<usize>,
    pub audience: Option<String>,
    pub issuer: Option<String>,
    pub signing_secret: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            root_folder: None,
            database_file: "meterops.db".to_string(),
            log_level: "info".to_string(),
            cors_origins: Vec::new(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            auth: AuthConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ServiceConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `explicit_path`, or from the platform config
    /// file when no path is given
    ///
    /// Returns the file actually read, if any. An explicit path that cannot
    /// be read is an error. A missing platform config file is not: compiled
    /// defaults are returned with `None`.
    pub fn load(explicit_path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit_path {
            Some(path) => path.to_path_buf(),
            None => match find_config_file() {
                Some(path) => path,
                None => return Ok((Self::default(), None)),
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        Ok((config, Some(path)))
    }

    /// Layer overrides on top of the file values, then re-validate
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(host) = overrides.host {
            self.host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(level) = overrides.log_level {
            self.log_level = level;
        }
        if let Some(origins) = overrides.cors_origins {
            self.cors_origins = origins
                .into_iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(limit) = overrides.max_body_bytes {
            self.max_body_bytes = limit;
        }
        if let Some(audience) = overrides.audience {
            self.auth.audience = Some(audience);
        }
        if let Some(issuer) = overrides.issuer {
            self.auth.issuer = Some(issuer);
        }
        if let Some(secret) = overrides.signing_secret {
            self.auth.signing_secret = Some(secret);
        }

        self.validate()
    }

    /// Reject values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.database_file.trim().is_empty() {
            return Err(Error::Config("database_file must not be empty".to_string()));
        }
        if self.max_body_bytes == 0 {
            return Err(Error::Config("max_body_bytes must be greater than 0".to_string()));
        }
        if let Some(secret) = &self.auth.signing_secret {
            if secret.len() < 16 {
                return Err(Error::Config(
                    "auth.signing_secret must be at least 16 characters".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// True when any origin may call the API
    pub fn cors_permissive(&self) -> bool {
        self.cors_origins.is_empty() || self.cors_origins.iter().any(|o| o == "*")
    }
}

/// Root folder resolution
///
/// Priority: command-line argument, `METEROPS_ROOT_FOLDER`, the config
/// file's `root_folder`, then the OS default.
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &ServiceConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Database file location inside the resolved root folder
pub fn database_path(root_folder: &Path, config: &ServiceConfig) -> PathBuf {
    root_folder.join(&config.database_file)
}

/// Locate the platform config file, if one exists
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("meterops").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/meterops/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/meterops (or /var/lib/meterops for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("meterops"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/meterops"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("meterops"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/meterops"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("meterops"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\meterops"))
    } else {
        PathBuf::from("./meterops_data")
    }
}
