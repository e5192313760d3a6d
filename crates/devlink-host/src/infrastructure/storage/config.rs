//! TOML-based configuration persistence for the DevLink host.
//!
//! Reads and writes `HostConfig` to the platform-appropriate config file:
//! - Windows:  `%APPDATA%\DevLink\config.toml`
//! - Linux:    `~/.config/devlink/config.toml`
//! - macOS:    `~/Library/Application Support/DevLink/config.toml`
//!
//! # What is TOML? (for beginners)
//!
//! TOML (Tom's Obvious Minimal Language) is a configuration file format designed
//! to be easy to read and write.  Example:
//!
//! ```toml
//! [host]
//! name = "sim-pc"
//! log_level = "debug"
//!
//! [link]
//! checksum = "crc16-ccitt-false"
//! invalid_escape = "reject"
//! chunk_size = 200
//!
//! [storage]
//! data_dir = "D:/DevLinkData"
//! ```
//!
//! # Serde default values
//!
//! Every field has a serde default, so an empty or missing file is a valid
//! configuration and a file written by an older version keeps working when new
//! fields are added.

use std::path::{Path, PathBuf};

use devlink_core::protocol::messages::{Identity, IdentityName, MAX_FILE_DATA_CHUNK};
use devlink_core::protocol::{ChecksumKind, InvalidEscapePolicy, ProtocolError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// The platform data directory could not be determined and none is configured.
    #[error("could not determine platform data directory; set [storage] data_dir")]
    NoPlatformDataDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level host configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub link: LinkSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

/// How the host introduces itself to devices.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostSection {
    /// Name sent in `IdentifyRequest`; at most 15 ASCII characters.
    #[serde(default = "default_host_name")]
    pub name: String,
    /// Transport-specific address sent in `IdentifyRequest`.
    #[serde(default)]
    pub address: u32,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Per-link protocol settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkSection {
    /// Checksum algorithm the device firmware uses.
    #[serde(default)]
    pub checksum: ChecksumKind,
    /// What the frame decoder does with an invalid escape sequence.
    #[serde(default)]
    pub invalid_escape: InvalidEscapePolicy,
    /// Bytes requested per `FileDataRequest`.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u8,
}

/// Where device files are cached.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StorageSection {
    /// Overrides the per-user application data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

/// Simulator telemetry routing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TelemetrySection {
    /// Path of the TOML telemetry schema; telemetry routing is off when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<PathBuf>,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_host_name() -> String {
    "devlink-host".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_chunk_size() -> u8 {
    MAX_FILE_DATA_CHUNK as u8
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            name: default_host_name(),
            address: 0,
            log_level: default_log_level(),
        }
    }
}

impl Default for LinkSection {
    fn default() -> Self {
        Self {
            checksum: ChecksumKind::default(),
            invalid_escape: InvalidEscapePolicy::default(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl HostConfig {
    /// The identity record this host sends in `IdentifyRequest`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if the configured name does not fit the
    /// 16-byte identity field or is not ASCII.
    pub fn identity(&self) -> Result<Identity, ProtocolError> {
        Ok(Identity {
            name: IdentityName::new(&self.host.name)?,
            address: self.host.address,
        })
    }

    /// The application data directory: the configured override, else the
    /// platform default.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoPlatformDataDir`] when neither is available.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => platform_data_dir().ok_or(ConfigError::NoPlatformDataDir),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `HostConfig` from the default path (see [`load_config_from`]).
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<HostConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads `HostConfig` from `path`, returning `HostConfig::default()` if the
/// file does not yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<HostConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: HostConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HostConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to the default path.
///
/// # Errors
///
/// See [`save_config_to`].
pub fn save_config(config: &HostConfig) -> Result<(), ConfigError> {
    save_config_to(config, &config_file_path()?)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &HostConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config directory, including the `DevLink` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("DevLink"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("devlink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("DevLink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

/// Resolves the per-user application data directory.
fn platform_data_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %LOCALAPPDATA%: the cache is machine-local, it must not roam.
        std::env::var_os("LOCALAPPDATA").map(|p| PathBuf::from(p).join("DevLink"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_DATA_HOME")
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".local").join("share"))
            })?;
        Some(base.join("devlink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("DevLink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── HostConfig defaults ───────────────────────────────────────────────────

    #[test]
    fn test_host_config_default_link_settings() {
        // Arrange / Act
        let cfg = HostConfig::default();

        // Assert
        assert_eq!(cfg.link.checksum, ChecksumKind::Unchecked);
        assert_eq!(cfg.link.invalid_escape, InvalidEscapePolicy::PassThrough);
        assert_eq!(cfg.link.chunk_size, 245);
    }

    #[test]
    fn test_host_section_default_log_level_is_info() {
        let cfg = HostSection::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.name, "devlink-host");
    }

    #[test]
    fn test_default_identity_is_valid() {
        let identity = HostConfig::default().identity().expect("default name fits");
        assert_eq!(identity.name.as_str(), "devlink-host");
        assert_eq!(identity.address, 0);
    }

    #[test]
    fn test_identity_with_too_long_name_fails() {
        let mut cfg = HostConfig::default();
        cfg.host.name = "a-very-long-host-name".to_string();
        assert!(matches!(
            cfg.identity(),
            Err(ProtocolError::NameTooLong { .. })
        ));
    }

    #[test]
    fn test_data_dir_override_wins() {
        let mut cfg = HostConfig::default();
        cfg.storage.data_dir = Some(PathBuf::from("/srv/devlink"));
        assert_eq!(cfg.data_dir().unwrap(), PathBuf::from("/srv/devlink"));
    }

    // ── TOML round-trip ───────────────────────────────────────────────────────

    #[test]
    fn test_host_config_serializes_and_deserializes_round_trip() {
        // Arrange
        let mut cfg = HostConfig::default();
        cfg.link.checksum = ChecksumKind::Crc16CcittFalse;
        cfg.link.invalid_escape = InvalidEscapePolicy::Reject;
        cfg.link.chunk_size = 128;
        cfg.telemetry.schema = Some(PathBuf::from("schema.toml"));

        // Act
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: HostConfig = toml::from_str(&toml_str).expect("deserialize");

        // Assert
        assert_eq!(cfg, restored);
        assert!(toml_str.contains("crc16-ccitt-false"));
        assert!(toml_str.contains("reject"));
    }

    #[test]
    fn test_unset_optional_paths_are_omitted() {
        let toml_str = toml::to_string_pretty(&HostConfig::default()).expect("serialize");
        assert!(!toml_str.contains("data_dir"), "None data_dir must be omitted");
        assert!(!toml_str.contains("schema"), "None schema must be omitted");
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: HostConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, HostConfig::default());
    }

    #[test]
    fn test_deserialize_partial_link_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[link]
checksum = "crc16-ccitt-false"
"#;

        // Act
        let cfg: HostConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.link.checksum, ChecksumKind::Crc16CcittFalse);
        // Unspecified fields keep their defaults
        assert_eq!(cfg.link.chunk_size, 245);
        assert_eq!(cfg.host.log_level, "info");
    }

    #[test]
    fn test_deserialize_unknown_checksum_is_parse_error() {
        let result: Result<HostConfig, toml::de::Error> =
            toml::from_str("[link]\nchecksum = \"adler32\"\n");
        assert!(result.is_err());
    }

    // ── load/save against a temp directory ───────────────────────────────────

    #[test]
    fn test_load_config_from_returns_default_when_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.toml")).expect("absent file is fine");
        assert_eq!(cfg, HostConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip_via_temp_dir() {
        // Arrange – nested directory that does not exist yet
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = HostConfig::default();
        cfg.host.name = "cockpit".to_string();
        cfg.host.log_level = "debug".to_string();

        // Act
        save_config_to(&cfg, &path).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_load_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("config.toml"),
                "config file must be named config.toml, got {path:?}"
            );
        }
        // NoPlatformConfigDir in a stripped CI environment is also acceptable.
    }
}
