//! CLI argument parsing and command definitions.

use clap::{Parser, Subcommand};

// ============================================================================
// CLI argument types
// ============================================================================

/// Top-level arguments for the `bencao` binary.
#[derive(Parser, Debug)]
#[command(name = "bencao", author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file.
    #[arg(short, long, env = "BENCAO_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-essential output.
    #[arg(short, long)]
    pub quiet: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Option<BaseCommand>,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum BaseCommand {
    /// Load documents and publish them as a new active snapshot.
    Publish {
        /// Document directory (defaults to `etl.source_dir`).
        #[arg(short, long)]
        source: Option<String>,
    },

    /// Inspect and manage snapshots.
    Versions(VersionsCommand),

    /// Query the active snapshot.
    Query {
        /// Query text.
        text: String,

        /// Number of results.
        #[arg(short, default_value = "5")]
        k: usize,
    },

    /// Publish periodically until interrupted.
    Schedule {
        /// Minutes between runs (defaults to `etl.interval_minutes`).
        #[arg(short, long)]
        interval_minutes: Option<u64>,

        /// Run a single job and exit.
        #[arg(long)]
        once: bool,
    },

    /// Print version information.
    Version,

    /// Check system health.
    Health,

    /// Configuration operations.
    Config(ConfigCommand),
}

/// Snapshot subcommands.
#[derive(Parser, Debug)]
pub struct VersionsCommand {
    /// Versions subcommand to execute.
    #[command(subcommand)]
    pub command: VersionsAction,
}

/// Available snapshot subcommands.
#[derive(Subcommand, Debug)]
pub enum VersionsAction {
    /// List snapshots, newest first.
    List {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the active version id.
    Active,

    /// Print the id the next publish would use.
    Next,

    /// Make a retained snapshot active.
    Activate {
        /// Version id, e.g. chroma_v003.
        id: String,
    },

    /// Delete snapshots beyond the retention limit.
    Prune,
}

/// Config-specific subcommands.
#[derive(Parser, Debug)]
pub struct ConfigCommand {
    /// Config subcommand to execute.
    #[command(subcommand)]
    pub command: ConfigAction,
}

/// Available config subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path.
    Path,

    /// Get a configuration value by dotted key.
    Get {
        /// Dotted key (e.g., "versions.retention_limit").
        key: String,
    },

    /// Set a configuration value by dotted key.
    Set {
        /// Dotted key (e.g., "versions.retention_limit").
        key: String,

        /// Value to set.
        value: String,
    },

    /// Create a default configuration file.
    Init {
        /// Output file path (defaults to XDG config path).
        #[arg(short, long)]
        file: Option<String>,

        /// Overwrite existing file.
        #[arg(long)]
        force: bool,
    },

    /// Export configuration as environment variables.
    Export {
        /// Format as Docker --env flags.
        #[arg(long)]
        docker_env: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================
