use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};
use time::format_description::{self, OwnedFormatItem};

use crate::config::themes::ThemeRegistry;
use crate::storage::STORE_FILE_NAME;

pub mod themes;

const APP_DOMAIN: &str = "io";
const APP_ORG: &str = "NetaTui";
const APP_NAME: &str = "neta";

/// `toLocaleDateString('ja-JP')` style: 2025/1/9.
pub const DEFAULT_DEADLINE_FORMAT: &str = "[year]/[month padding:none]/[day padding:none]";
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

pub struct ConfigLoader {
    paths: ConfigPaths,
}

impl ConfigLoader {
    pub fn discover() -> Result<Self> {
        let paths = ConfigPaths::discover()?;
        Ok(Self { paths })
    }

    pub fn from_paths(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        self.paths.ensure_directories()?;
        if !self.paths.config_file.exists() {
            let mut default_cfg = AppConfig::default();
            self.write_default_config(&default_cfg)?;
            default_cfg.post_load(&self.paths);
            return Ok(default_cfg);
        }

        self.load()
    }

    pub fn load(&self) -> Result<AppConfig> {
        let raw = fs::read_to_string(&self.paths.config_file)
            .with_context(|| format!("reading config {}", self.paths.config_file.display()))?;
        let mut cfg: AppConfig = toml::from_str(&raw).context("parsing config toml")?;
        cfg.post_load(&self.paths);
        Ok(cfg)
    }

    fn write_default_config(&self, cfg: &AppConfig) -> Result<()> {
        let toml = toml::to_string_pretty(cfg).context("serializing default config")?;
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut file = fs::File::create(&self.paths.config_file)
            .with_context(|| format!("creating config {}", self.paths.config_file.display()))?;
        file.write_all(toml.as_bytes())
            .context("writing default config")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub data_dir: PathBuf,
    pub store_path: PathBuf,
    pub backup_dir: PathBuf,
}

impl ConfigPaths {
    pub fn discover() -> Result<Self> {
        let override_config = env::var("NETA_CONFIG").ok().map(PathBuf::from);
        let override_data = env::var("NETA_DATA").ok().map(PathBuf::from);

        let project_dirs = ProjectDirs::from(APP_DOMAIN, APP_ORG, APP_NAME)
            .context("resolving XDG project directories")?;

        let config_dir = override_config
            .clone()
            .map(|p| {
                if p.is_dir() {
                    p
                } else {
                    p.parent().map(Path::to_path_buf).unwrap_or(p)
                }
            })
            .unwrap_or_else(|| project_dirs.config_dir().to_path_buf());

        let config_file = override_config
            .filter(|p| p.is_file() || p.extension().is_some())
            .unwrap_or_else(|| config_dir.join("config.toml"));

        let data_root = override_data.unwrap_or_else(|| project_dirs.data_dir().to_path_buf());
        Ok(Self::rooted(config_dir, config_file, data_root))
    }

    /// Lays out the data files under `data_dir`.
    pub fn rooted(config_dir: PathBuf, config_file: PathBuf, data_dir: PathBuf) -> Self {
        let store_path = data_dir.join(STORE_FILE_NAME);
        let backup_dir = data_dir.join("backups");
        Self {
            config_dir,
            config_file,
            data_dir,
            store_path,
            backup_dir,
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.backup_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating application directory {}", dir.display()))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub theme: ThemeName,
    /// Seconds between expiry sweeps while the TUI is open.
    pub sweep_interval_secs: u64,
    /// `time` format description used to show deadlines in the list.
    pub deadline_format: String,
    pub storage: StorageOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            theme: ThemeName::Dark,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            deadline_format: DEFAULT_DEADLINE_FORMAT.to_string(),
            storage: StorageOptions::default(),
        }
    }
}

impl AppConfig {
    fn post_load(&mut self, paths: &ConfigPaths) {
        self.storage.resolve(paths);
        if !ThemeRegistry::default().contains(&self.theme) {
            tracing::warn!(?self.theme, "unknown theme in config, falling back to Dark");
            self.theme = ThemeName::Dark;
        }
        if self.sweep_interval_secs == 0 {
            tracing::warn!("sweep_interval_secs must be positive, using default");
            self.sweep_interval_secs = DEFAULT_SWEEP_INTERVAL_SECS;
        }
        if let Err(err) = format_description::parse_owned::<2>(&self.deadline_format) {
            tracing::warn!(%err, format = %self.deadline_format, "invalid deadline_format, using default");
            self.deadline_format = DEFAULT_DEADLINE_FORMAT.to_string();
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    pub fn deadline_display_format(&self) -> OwnedFormatItem {
        format_description::parse_owned::<2>(&self.deadline_format)
            .or_else(|_| format_description::parse_owned::<2>(DEFAULT_DEADLINE_FORMAT))
            .unwrap_or_else(|_| OwnedFormatItem::Compound(Vec::new().into_boxed_slice()))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// Empty means `<data_dir>/neta_db.json`.
    pub store_path: PathBuf,
    /// Where exports land. Empty means `<data_dir>/backups`.
    pub export_dir: PathBuf,
}

impl StorageOptions {
    fn resolve(&mut self, paths: &ConfigPaths) {
        if self.store_path.as_os_str().is_empty() {
            self.store_path = paths.store_path.clone();
        }
        if self.export_dir.as_os_str().is_empty() {
            self.export_dir = paths.backup_dir.clone();
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, std::hash::Hash, Display, EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ThemeName {
    Dark,
    Light,
    HighContrast,
    Solarized,
}

impl Default for ThemeName {
    fn default() -> Self {
        ThemeName::Dark
    }
}
