//! CLI commands

use clap::ValueEnum;

pub mod chain;
pub mod format;
pub mod project;

/// Output format
#[derive(Clone, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Columnar table (default)
    #[default]
    Table,
    /// JSON
    Json,
}
