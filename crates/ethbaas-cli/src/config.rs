//! ethbaas CLI configuration
//!
//! Settings resolve field by field (highest priority first):
//! 1. Command line flags
//! 2. `ETHBAAS_*` environment variables
//! 3. `~/.ethbaas/config.json` (or the file passed with `--config`)
//! 4. Built-in defaults under `~/.ethbaas/`

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ethbaas_manifest::generator::{DEFAULT_ETHERBASE, DEFAULT_IMAGE, DEFAULT_VOLUME_ROOT};

use crate::{Error, Result};

const CONFIG_DIR_NAME: &str = ".ethbaas";
const CONFIG_FILE_NAME: &str = "config.json";
const DB_FILE_NAME: &str = "ethbaas.db";
const PROJECTS_DIR_NAME: &str = "projects";
const GENESIS_FILE_NAME: &str = "genesis.json";

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "ETHBAAS_";

/// Where chain nodes' RPC ports are reached when nothing else is configured
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1";

/// Configuration as read from one source; unset fields fall through.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct EthbaasConfig {
    /// Directory holding one manifest directory per project
    pub home_dir: Option<PathBuf>,
    /// Sqlite project store
    pub db_path: Option<PathBuf>,
    /// Scheme and host chain RPC ports are reached on
    pub rpc_url: Option<String>,
    /// Host directory for chain data volumes
    pub volume_root: Option<String>,
    /// Genesis block definition copied into every project
    pub genesis_path: Option<PathBuf>,
    /// Kubeconfig for the target cluster
    pub kubeconfig: Option<PathBuf>,
    /// Miner etherbase
    pub etherbase: Option<String>,
    /// Geth container image
    pub image: Option<String>,
}

impl EthbaasConfig {
    /// Read `ETHBAAS_*` variables through `lookup`, ignoring empty values
    pub fn from_env<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(&format!("{}{}", ENV_PREFIX, key)).filter(|v| !v.is_empty());
        Self {
            home_dir: var("HOME_DIR").map(PathBuf::from),
            db_path: var("DB_PATH").map(PathBuf::from),
            rpc_url: var("RPC_URL"),
            volume_root: var("VOLUME_ROOT"),
            genesis_path: var("GENESIS_PATH").map(PathBuf::from),
            kubeconfig: var("KUBECONFIG").map(PathBuf::from),
            etherbase: var("ETHERBASE"),
            image: var("IMAGE"),
        }
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win
    pub fn merge(self, overrides: EthbaasConfig) -> Self {
        Self {
            home_dir: overrides.home_dir.or(self.home_dir),
            db_path: overrides.db_path.or(self.db_path),
            rpc_url: overrides.rpc_url.or(self.rpc_url),
            volume_root: overrides.volume_root.or(self.volume_root),
            genesis_path: overrides.genesis_path.or(self.genesis_path),
            kubeconfig: overrides.kubeconfig.or(self.kubeconfig),
            etherbase: overrides.etherbase.or(self.etherbase),
            image: overrides.image.or(self.image),
        }
    }
}

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding one manifest directory per project
    pub home_dir: PathBuf,
    /// Sqlite project store
    pub db_path: PathBuf,
    /// Scheme and host chain RPC ports are reached on
    pub rpc_url: String,
    /// Host directory for chain data volumes
    pub volume_root: String,
    /// Genesis block definition
    pub genesis_path: PathBuf,
    /// Kubeconfig; `None` infers it from the environment
    pub kubeconfig: Option<PathBuf>,
    /// Miner etherbase
    pub etherbase: String,
    /// Geth container image
    pub image: String,
}

impl Settings {
    /// Fill unset fields with defaults rooted at `base_dir`
    pub fn resolve(config: EthbaasConfig, base_dir: &Path) -> Self {
        Self {
            home_dir: config
                .home_dir
                .unwrap_or_else(|| base_dir.join(PROJECTS_DIR_NAME)),
            db_path: config.db_path.unwrap_or_else(|| base_dir.join(DB_FILE_NAME)),
            rpc_url: config.rpc_url.unwrap_or_else(|| DEFAULT_RPC_URL.to_string()),
            volume_root: config
                .volume_root
                .unwrap_or_else(|| DEFAULT_VOLUME_ROOT.to_string()),
            genesis_path: config
                .genesis_path
                .unwrap_or_else(|| base_dir.join(GENESIS_FILE_NAME)),
            kubeconfig: config.kubeconfig,
            etherbase: config
                .etherbase
                .unwrap_or_else(|| DEFAULT_ETHERBASE.to_string()),
            image: config.image.unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
        }
    }
}

/// Returns `~/.ethbaas/`.
pub fn ethbaas_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::command_failed("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Path to `~/.ethbaas/config.json`.
pub fn config_path() -> Result<PathBuf> {
    Ok(ethbaas_dir()?.join(CONFIG_FILE_NAME))
}

/// Load a config file, returning default if missing.
pub fn load_config(path: &Path) -> Result<EthbaasConfig> {
    if !path.exists() {
        return Ok(EthbaasConfig::default());
    }
    let data = std::fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|e| Error::ConfigFile {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Resolve settings from every source
///
/// `config_file` replaces the default `~/.ethbaas/config.json`; `flags` are
/// the command line overrides.
pub fn load(config_file: Option<&Path>, flags: EthbaasConfig) -> Result<Settings> {
    let base_dir = ethbaas_dir()?;
    let path = match config_file {
        Some(path) => path.to_path_buf(),
        None => base_dir.join(CONFIG_FILE_NAME),
    };
    let file = load_config(&path)?;
    let env = EthbaasConfig::from_env(|key| std::env::var(key).ok());
    Ok(Settings::resolve(file.merge(env).merge(flags), &base_dir))
}
