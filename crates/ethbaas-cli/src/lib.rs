//! ethbaas CLI library

pub mod commands;
pub mod config;
pub mod context;
pub mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use config::EthbaasConfig;
use context::Context;

/// ethbaas - private Ethereum networks on Kubernetes
#[derive(Parser, Debug)]
#[command(name = "ethbaas")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings overrides accepted by every command
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Config file (default: ~/.ethbaas/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to kubeconfig file (default: inferred)
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Directory holding project manifests
    #[arg(long, global = true)]
    pub home_dir: Option<PathBuf>,

    /// Project store database
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Scheme and host of node RPC ports (e.g. http://127.0.0.1)
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// Genesis block definition
    #[arg(long, global = true)]
    pub genesis: Option<PathBuf>,
}

impl GlobalArgs {
    fn overrides(&self) -> EthbaasConfig {
        EthbaasConfig {
            home_dir: self.home_dir.clone(),
            db_path: self.db_path.clone(),
            rpc_url: self.rpc_url.clone(),
            genesis_path: self.genesis.clone(),
            kubeconfig: self.kubeconfig.clone(),
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Project operations
    Project(commands::project::ProjectArgs),
    /// Chain operations
    Chain(commands::chain::ChainArgs),
}

impl Cli {
    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        let settings = config::load(self.global.config.as_deref(), self.global.overrides())?;
        let ctx = Context::new(settings);
        match self.command {
            Commands::Project(args) => commands::project::run(args, &ctx).await,
            Commands::Chain(args) => commands::chain::run(args, &ctx).await,
        }
    }
}
