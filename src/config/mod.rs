// ABOUTME: Playground configuration loaded from TOML with sensible defaults
// Covers the sandbox document, resource limits, the external transpiler and logging

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    /// Module name to URL table handed to the sandbox document
    pub import_map: BTreeMap<String, String>,
    pub sandbox: SandboxConfig,
    pub resources: ResourceConfig,
    pub transpiler: TranspilerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub mount_region: String,
    pub origin: String,
    pub url: String,
    pub frame_id: String,
    pub dark: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceConfig {
    /// Upper bound on the total size of live handle contents
    pub max_live_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranspilerConfig {
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: Option<PathBuf>,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        let import_map = [
            ("react", "https://esm.sh/react@18"),
            ("react-dom", "https://esm.sh/react-dom@18"),
            ("react-dom/client", "https://esm.sh/react-dom@18/client"),
        ]
        .into_iter()
        .map(|(name, url)| (name.to_string(), url.to_string()))
        .collect();

        Self {
            import_map,
            sandbox: SandboxConfig::default(),
            resources: ResourceConfig::default(),
            transpiler: TranspilerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            mount_region: "app".to_string(),
            origin: "null".to_string(),
            url: "about:srcdoc".to_string(),
            frame_id: "1".to_string(),
            dark: false,
        }
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            max_live_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Default for TranspilerConfig {
    fn default() -> Self {
        Self {
            program: "esbuild".to_string(),
            args: vec!["--loader=jsx".to_string(), "--jsx=transform".to_string()],
        }
    }
}

impl PlaygroundConfig {
    /// Default location: `<config dir>/playground-bridge/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("playground-bridge").join("config.toml"))
    }

    /// Load from the default location, falling back to defaults when no file exists
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sandbox.mount_region.trim().is_empty() {
            return Err(ConfigError::Invalid("sandbox.mount_region must not be empty".into()));
        }
        if self.sandbox.frame_id.trim().is_empty() {
            return Err(ConfigError::Invalid("sandbox.frame_id must not be empty".into()));
        }
        if self.transpiler.program.trim().is_empty() {
            return Err(ConfigError::Invalid("transpiler.program must not be empty".into()));
        }
        Ok(())
    }

    /// Directory for log files, `~/.playground-bridge/logs` unless configured
    pub fn log_directory(&self) -> PathBuf {
        self.logging.directory.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".playground-bridge").join("logs"))
                .unwrap_or_else(|| PathBuf::from(".playground-bridge/logs"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = PlaygroundConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sandbox.mount_region, "app");
        assert_eq!(config.import_map.len(), 3);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[sandbox]\ndark = true\nframe_id = \"main\"\n").unwrap();

        let config = PlaygroundConfig::load_from(&path).unwrap();
        assert!(config.sandbox.dark);
        assert_eq!(config.sandbox.frame_id, "main");
        assert_eq!(config.sandbox.mount_region, "app");
        assert_eq!(config.transpiler.program, "esbuild");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[sandbox]\nmount_region = \"  \"\n").unwrap();

        let err = PlaygroundConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "import_map = [").unwrap();

        let err = PlaygroundConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
