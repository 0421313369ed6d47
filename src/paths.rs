use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Directory name used under the platform config/data roots.
pub const APP_DIR_NAME: &str = "keysheet";

/// Files whose presence in the working directory switches to portable mode.
const LOCAL_MARKERS: [&str; 3] = ["keysheet.json", "keysheet.log", "projects"];

/// Overrides for the default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (KEYSHEET_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| {
            std::env::var("KEYSHEET_CONFIG_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
        });

        Self { config_dir }
    }
}

/// Path to a configuration file.
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. KEYSHEET_CONFIG_DIR environment variable
/// 3. Working directory IF it already holds keysheet files
/// 4. Platform config directory from dirs-next
///
/// Platform paths:
/// - Linux: ~/.config/keysheet/{name}
/// - macOS: ~/Library/Application Support/keysheet/{name}
/// - Windows: %APPDATA%\keysheet\{name}
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    get_config_dir(config).join(name)
}

/// Path to a data file (logs, project store). Same priority as `config_file`,
/// ending in the platform data directory (~/.local/share/keysheet on Linux).
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    get_data_dir(config).join(name)
}

/// Root of the filesystem project store.
pub fn projects_dir(config: &PathConfig) -> PathBuf {
    data_file("projects", config)
}

/// Create config, data and projects directories if missing.
pub fn ensure_dirs(config: &PathConfig) -> Result<()> {
    let config_dir = get_config_dir(config);
    let projects = projects_dir(config);

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;
    }

    // projects_dir lives under data_dir, so this creates both
    if !projects.exists() {
        std::fs::create_dir_all(&projects).with_context(|| {
            format!("Failed to create projects directory: {}", projects.display())
        })?;
    }

    Ok(())
}

/// Check whether `dir` already holds keysheet files
pub fn has_local_config_files(dir: &Path) -> bool {
    LOCAL_MARKERS.iter().any(|f| dir.join(f).exists())
}

fn local_dir() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .filter(|dir| has_local_config_files(dir))
}

fn get_config_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Some(dir) = local_dir() {
        return dir;
    }
    if let Some(dir) = dirs_next::config_dir() {
        return dir.join(APP_DIR_NAME);
    }
    PathBuf::from(".")
}

fn get_data_dir(config: &PathConfig) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }
    if let Some(dir) = local_dir() {
        return dir;
    }
    if let Some(dir) = dirs_next::data_dir() {
        return dir.join(APP_DIR_NAME);
    }
    PathBuf::from(".")
}
