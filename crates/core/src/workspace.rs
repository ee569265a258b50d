use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use meridian_types::config::AppConfig;
use tracing::{debug, info};

/// Dotfolder name under `$HOME`.
const DOTFOLDER: &str = ".meridian";

const CONFIG_FILE: &str = "config.toml";

/// Resolve the root path: `$HOME/.meridian/`.
pub fn root_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(DOTFOLDER))
}

pub fn config_path() -> Result<PathBuf> {
    Ok(root_dir()?.join(CONFIG_FILE))
}

/// Create `$HOME/.meridian/config.toml` with defaults if it does not exist.
/// Idempotent. Returns the config path.
pub fn init_workspace() -> Result<PathBuf> {
    init_at(&root_dir()?)
}

fn init_at(root: &Path) -> Result<PathBuf> {
    if !root.exists() {
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create directory: {}", root.display()))?;
        info!("created directory: {}", root.display());
    }

    let config_path = root.join(CONFIG_FILE);
    if !config_path.exists() {
        save_config_to(&config_path, &AppConfig::default())?;
        info!("created default config: {}", config_path.display());
    }
    Ok(config_path)
}

/// Effective configuration.
///
/// Layers, later wins: defaults, `config.toml` (if present), `.env`,
/// `MERIDIAN_*` environment variables. The result is validated.
pub fn load_config() -> Result<AppConfig> {
    dotenvy::dotenv().ok();
    load_config_with(&config_path()?, |k| std::env::var(k).ok())
}

/// [`load_config`] with an explicit file and variable lookup.
pub fn load_config_with<F>(path: &Path, lookup: F) -> Result<AppConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match fs::read_to_string(path) {
        Ok(raw) => AppConfig::from_toml_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no config at {}, using defaults", path.display());
            AppConfig::default()
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    config.apply_env_overrides(lookup)?;
    config.validate()?;
    Ok(config)
}

/// Change one setting in `$HOME/.meridian/config.toml`, creating the file if
/// needed. Environment overrides are not written back.
pub fn set_config_value(key: &str, value: &str) -> Result<PathBuf> {
    let path = init_workspace()?;
    set_value_at(&path, key, value)?;
    Ok(path)
}

fn set_value_at(path: &Path, key: &str, value: &str) -> Result<AppConfig> {
    let mut config = load_config_with(path, |_| None)?;
    config.set(key, value)?;
    config.validate()?;
    save_config_to(path, &config)?;
    debug!(key, "config updated: {}", path.display());
    Ok(config)
}

fn save_config_to(path: &Path, config: &AppConfig) -> Result<()> {
    let toml_str = config
        .to_toml_string()
        .context("Failed to serialize config")?;
    fs::write(path, toml_str).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
