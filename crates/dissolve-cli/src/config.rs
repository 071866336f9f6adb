//! Configuration file management for dissolve.
//!
//! Provides a TOML-based config file at `~/.config/dissolve/config.toml` and
//! a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use dissolve_core::StepTemplateCatalog;
use dissolve_db::config::DbConfig;

/// Environment variable naming an alternative catalog file.
pub const CATALOG_ENV_VAR: &str = "DISSOLVE_CATALOG";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub schedule: ScheduleSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ScheduleSection {
    /// Catalog TOML to use instead of the built-in playbook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the dissolve config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/dissolve` or
/// `~/.config/dissolve`, also on macOS.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("dissolve");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("dissolve")
}

/// Return the path to the dissolve config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse a config file.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Load the config file at the default location.
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path())
}

/// Serialize and write a config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // The URL may carry a password.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct DissolveConfig {
    pub db_config: DbConfig,
    /// `None` selects the built-in catalog.
    pub catalog_path: Option<PathBuf>,
}

impl DissolveConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `DISSOLVE_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Catalog: `cli_catalog` > `DISSOLVE_CATALOG` > `schedule.catalog` > built-in
    ///
    /// A missing config file is not an error; an unreadable one is.
    pub fn resolve(cli_db_url: Option<&str>, cli_catalog: Option<&Path>) -> Result<Self> {
        let path = config_path();
        let file_config = if path.exists() {
            Some(load_config_from(&path)?)
        } else {
            None
        };

        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var(DbConfig::ENV_VAR) {
            url
        } else if let Some(ref cfg) = file_config {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };

        let catalog_path = if let Some(p) = cli_catalog {
            Some(p.to_path_buf())
        } else if let Ok(p) = std::env::var(CATALOG_ENV_VAR) {
            Some(PathBuf::from(p))
        } else {
            file_config.and_then(|cfg| cfg.schedule.catalog)
        };

        Ok(Self {
            db_config: DbConfig::new(db_url),
            catalog_path,
        })
    }

    /// Load the configured catalog, or the built-in one.
    pub fn load_catalog(&self) -> Result<StepTemplateCatalog> {
        match &self.catalog_path {
            Some(path) => StepTemplateCatalog::from_path(path),
            None => StepTemplateCatalog::builtin().context("built-in catalog is invalid"),
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
