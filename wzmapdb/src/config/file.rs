//! Configuration file handling for ~/.wzmapdb/config.ini.
//!
//! Every setting has a default, so a missing file is not an error.
//!
//! ```ini
//! [tools]
//! maptools = /opt/maptools/maptools
//!
//! [release]
//! max_assets_per_release = 100
//!
//! [database]
//! max_maps_per_index_page = 3000
//!
//! [logging]
//! directory = logs
//! file = wzmapdb.log
//! ```

use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

/// Default cap on map archives per release.
pub const DEFAULT_MAX_ASSETS_PER_RELEASE: usize = 100;

/// Default cap on records per index page.
pub const DEFAULT_MAX_MAPS_PER_INDEX_PAGE: usize = 3000;

pub const DEFAULT_LOG_DIRECTORY: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "wzmapdb.log";

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// `[tools]`: explicit executable locations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSettings {
    pub git: Option<PathBuf>,
    pub gh: Option<PathBuf>,
    pub maptools: Option<PathBuf>,
    pub pngquant: Option<PathBuf>,
    pub optipng: Option<PathBuf>,
}

/// `[release]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSettings {
    pub max_assets_per_release: usize,
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self {
            max_assets_per_release: DEFAULT_MAX_ASSETS_PER_RELEASE,
        }
    }
}

/// `[database]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub max_maps_per_index_page: usize,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            max_maps_per_index_page: DEFAULT_MAX_MAPS_PER_INDEX_PAGE,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from(DEFAULT_LOG_DIRECTORY),
            file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub tools: ToolSettings,
    pub release: ReleaseSettings,
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load configuration from the default path (~/.wzmapdb/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(text)
            .map_err(|e| ConfigFileError::ReadError(ini::Error::Parse(e)))?;
        parse_ini(&ini)
    }
}

fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("tools")) {
        let path_of = |key: &str| {
            section
                .get(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(expand_tilde)
        };
        config.tools = ToolSettings {
            git: path_of("git"),
            gh: path_of("gh"),
            maptools: path_of("maptools"),
            pngquant: path_of("pngquant"),
            optipng: path_of("optipng"),
        };
    }

    if let Some(section) = ini.section(Some("release")) {
        if let Some(v) = section.get("max_assets_per_release") {
            config.release.max_assets_per_release =
                parse_positive("release", "max_assets_per_release", v)?;
        }
    }

    if let Some(section) = ini.section(Some("database")) {
        if let Some(v) = section.get("max_maps_per_index_page") {
            config.database.max_maps_per_index_page =
                parse_positive("database", "max_maps_per_index_page", v)?;
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("directory").map(str::trim) {
            if !v.is_empty() {
                config.logging.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("file").map(str::trim) {
            if !v.is_empty() {
                config.logging.file = v.to_string();
            }
        }
    }

    Ok(config)
}

fn parse_positive(section: &str, key: &str, value: &str) -> Result<usize, ConfigFileError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected a positive integer".to_string(),
        }),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

/// Get the configuration directory (~/.wzmapdb).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wzmapdb")
}

/// Get the path to the config file (~/.wzmapdb/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
