use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::days::deserialize_days;

fn default_match_window() -> u32 {
    10
}

fn default_backfill_step() -> u32 {
    7
}

fn default_investment_tag() -> String {
    "investment".to_string()
}

/// Reconciliation engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long after a pending transaction its cleared counterpart may post.
    #[serde(
        rename = "match_window",
        default = "default_match_window",
        deserialize_with = "deserialize_days"
    )]
    pub match_window_days: u32,

    /// Spacing of reconstructed balance snapshots.
    #[serde(
        rename = "backfill_step",
        default = "default_backfill_step",
        deserialize_with = "deserialize_days"
    )]
    pub backfill_step_days: u32,

    /// Tag applied automatically to investment-type transactions.
    #[serde(default = "default_investment_tag")]
    pub investment_tag: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_window_days: default_match_window(),
            backfill_step_days: default_backfill_step(),
            investment_tag: default_investment_tag(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to data directory. If relative, resolved from config file location.
    /// If not specified, defaults to the config file's directory.
    pub data_dir: Option<PathBuf>,

    /// Users synced when none are named on the command line.
    pub users: Vec<String>,

    #[serde(default)]
    pub engine: EngineConfig,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the data directory path.
    ///
    /// If `data_dir` is set and relative, it's resolved relative to `config_dir`.
    /// If `data_dir` is not set, returns `config_dir`.
    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }
}

/// Loaded configuration with resolved paths.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_dir: PathBuf,
    pub users: Vec<String>,
    pub engine: EngineConfig,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./thinmint.toml` if it exists in current directory
/// 2. `~/.local/share/thinmint/thinmint.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("thinmint.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("thinmint").join("thinmint.toml");
    }

    local_config
}

impl ResolvedConfig {
    /// Load and resolve config from a file path.
    ///
    /// The data directory is resolved relative to the config file's parent directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        let config = Config::load(&config_path)?;
        let data_dir = config.resolve_data_dir(config_dir);

        Ok(Self {
            data_dir,
            users: config.users,
            engine: config.engine,
        })
    }

    /// Load config, or fall back to defaults with the config file's intended
    /// parent directory as the data directory.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };

        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?;

        Ok(Self {
            data_dir: config_dir.to_path_buf(),
            users: Vec::new(),
            engine: EngineConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_default_data_dir_is_config_dir() {
        let config = Config::default();
        let config_dir = Path::new("/home/user/finances");
        assert_eq!(
            config.resolve_data_dir(config_dir),
            PathBuf::from("/home/user/finances")
        );
    }

    #[test]
    fn test_relative_data_dir() {
        let config = Config {
            data_dir: Some(PathBuf::from("data")),
            ..Default::default()
        };
        assert_eq!(
            config.resolve_data_dir(Path::new("/home/user/finances")),
            PathBuf::from("/home/user/finances/data")
        );
    }

    #[test]
    fn test_default_engine_config() {
        let config = Config::default();
        assert_eq!(config.engine.match_window_days, 10);
        assert_eq!(config.engine.backfill_step_days, 7);
        assert_eq!(config.engine.investment_tag, "investment");
    }

    #[test]
    fn test_load_engine_config() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("thinmint.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "users = [\"rob\", \"sam\"]")?;
        writeln!(file, "[engine]")?;
        writeln!(file, "match_window = \"2w\"")?;
        writeln!(file, "backfill_step = 1")?;
        writeln!(file, "investment_tag = \"brokerage\"")?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.users, vec!["rob".to_string(), "sam".to_string()]);
        assert_eq!(config.engine.match_window_days, 14);
        assert_eq!(config.engine.backfill_step_days, 1);
        assert_eq!(config.engine.investment_tag, "brokerage");

        Ok(())
    }

    #[test]
    fn test_partial_engine_section_keeps_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("thinmint.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "[engine]")?;
        writeln!(file, "match_window = \"5d\"")?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.engine.match_window_days, 5);
        assert_eq!(config.engine.backfill_step_days, 7);

        Ok(())
    }

    #[test]
    fn test_load_empty_config() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("thinmint.toml");
        std::fs::File::create(&config_path)?;

        let config = Config::load(&config_path)?;
        assert_eq!(config.data_dir, None);
        assert!(config.users.is_empty());

        Ok(())
    }

    #[test]
    fn test_resolved_config_load_or_default_missing_file() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("thinmint.toml");

        let resolved = ResolvedConfig::load_or_default(&config_path)?;
        assert_eq!(resolved.data_dir, dir.path());
        assert_eq!(resolved.engine.match_window_days, 10);

        Ok(())
    }

    #[test]
    fn test_resolved_config_resolves_relative_data_dir() -> Result<()> {
        let dir = TempDir::new()?;
        let config_path = dir.path().join("thinmint.toml");

        let mut file = std::fs::File::create(&config_path)?;
        writeln!(file, "data_dir = \"./data\"")?;

        let resolved = ResolvedConfig::load(&config_path)?;
        assert_eq!(resolved.data_dir, dir.path().canonicalize()?.join("./data"));

        Ok(())
    }
}
