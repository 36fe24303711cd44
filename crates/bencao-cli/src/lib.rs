//! Command-line front end for Bencao.
//!
//! Wires configuration, logging and the version manager together behind the
//! `bencao` binary: one-shot publishing, snapshot inspection and rollback,
//! queries against the active snapshot, and a periodic ETL scheduler.

pub mod app;
pub mod cli;
pub mod config;
pub mod config_handlers;
pub mod loader;

pub use app::BencaoCli;
pub use cli::CliArgs;
pub use config::{BencaoConfig, EtlConfig};
