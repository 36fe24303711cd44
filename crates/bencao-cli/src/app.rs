//! The `bencao` application: logging, command dispatch and the scheduler.

use crate::cli::{BaseCommand, CliArgs, VersionsAction};
use crate::config::BencaoConfig;
use crate::{config_handlers, loader};
use bencao_core::{Error, Result};
use bencao_vector::{create_engine, SearchHit};
use bencao_versions::{PublishError, VersionManager};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

/// Characters of document content shown per query hit.
const SNIPPET_CHARS: usize = 80;

// ============================================================================
// BencaoCli
// ============================================================================

/// The command-line application.
pub struct BencaoCli {
    config: Arc<BencaoConfig>,
    version: String,
}

impl BencaoCli {
    /// Create from CLI args, loading config from file/env.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let config = BencaoConfig::load(args.config.as_deref())?;
        Ok(Self::new(config))
    }

    /// Create an application around a loaded config.
    pub fn new(config: BencaoConfig) -> Self {
        Self {
            config: Arc::new(config),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Override the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// The loaded configuration.
    pub fn config(&self) -> &BencaoConfig {
        &self.config
    }

    /// Initialize tracing-based logging.
    ///
    /// Uses `RUST_LOG` if set, otherwise defaults based on verbosity flags.
    /// Library crates log through `log`; those records reach the same
    /// subscriber.
    pub fn init_logging(&self, verbose: bool, quiet: bool) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else if quiet {
            EnvFilter::new("warn")
        } else if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        };

        // Already set in tests.
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    /// Build a version manager from the loaded config.
    pub fn version_manager(&self) -> Result<VersionManager> {
        let engine = create_engine(&self.config.vector)?;
        Ok(VersionManager::from_config(&self.config.versions, engine))
    }

    /// Run the CLI with the given arguments.
    pub async fn run(&self, args: CliArgs) -> Result<()> {
        self.init_logging(args.verbose, args.quiet);

        match args.command {
            Some(BaseCommand::Publish { source }) => {
                let manager = self.version_manager()?;
                let source_dir = source
                    .map(|s| bencao_core::expand_tilde(&s))
                    .unwrap_or_else(|| self.config.source_dir());
                let documents = loader::load_documents(&source_dir, &self.config.etl.extensions).await?;
                let version = manager.publish(documents).await.map_err(publish_failed)?;
                println!("Published {version}");
                Ok(())
            }
            Some(BaseCommand::Versions(cmd)) => self.handle_versions(cmd.command).await,
            Some(BaseCommand::Query { text, k }) => {
                let manager = self.version_manager()?;
                for line in query_active(&manager, &text, k).await? {
                    println!("{line}");
                }
                Ok(())
            }
            Some(BaseCommand::Schedule {
                interval_minutes,
                once,
            }) => {
                let manager = self.version_manager()?;
                if once {
                    run_etl_job(&manager, &self.config).await?;
                    return Ok(());
                }
                let minutes = interval_minutes.unwrap_or(self.config.etl.interval_minutes);
                run_scheduler(&manager, &self.config, minutes).await
            }
            Some(BaseCommand::Version) => {
                println!("bencao {}", self.version);
                Ok(())
            }
            Some(BaseCommand::Health) => {
                let manager = self.version_manager()?;
                println!("{}", health_report(&manager)?);
                Ok(())
            }
            Some(BaseCommand::Config(config_cmd)) => {
                config_handlers::handle_config_command(args.config.as_deref(), config_cmd.command)
            }
            None => {
                println!("bencao {} (use --help for usage)", self.version);
                Ok(())
            }
        }
    }

    async fn handle_versions(&self, action: VersionsAction) -> Result<()> {
        let manager = self.version_manager()?;
        match action {
            VersionsAction::List { json } => {
                let versions = manager.list_versions()?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&versions)?);
                } else if versions.is_empty() {
                    println!("No versions in {}", manager.store().base_dir().display());
                } else {
                    for info in &versions {
                        let marker = if info.is_active { "*" } else { " " };
                        println!(
                            "{marker} {}  {}  {}",
                            info.id,
                            info.created_display(),
                            info.path.display()
                        );
                    }
                }
            }
            VersionsAction::Active => match manager.current_version()? {
                Some(id) => println!("{id}"),
                None => println!("No active version"),
            },
            VersionsAction::Next => println!("{}", manager.store().next_version_id()?),
            VersionsAction::Activate { id } => {
                manager.activate(&id).await.map_err(publish_failed)?;
                println!("Activated {id}");
            }
            VersionsAction::Prune => {
                let removed = manager.prune();
                println!("Removed {removed} version(s)");
            }
        }
        Ok(())
    }
}

fn publish_failed(err: PublishError) -> Error {
    tracing::debug!("Publish pipeline stopped while {}", err.stage());
    Error::operation(format!("nothing changed for readers: {err}"))
}

// ============================================================================
// Query
// ============================================================================

/// Search the active snapshot and format one line per hit.
pub async fn query_active(manager: &VersionManager, text: &str, k: usize) -> Result<Vec<String>> {
    let store = manager
        .open_active()
        .await?
        .ok_or_else(|| Error::not_found("no active version, run `bencao publish` first"))?;
    let hits = store.similarity_search(text, k).await?;
    Ok(hits
        .iter()
        .enumerate()
        .map(|(rank, hit)| format_hit(rank + 1, hit))
        .collect())
}

fn format_hit(rank: usize, hit: &SearchHit) -> String {
    let source = hit.metadata.get("source").map(String::as_str).unwrap_or("-");
    let snippet: String = hit
        .content
        .chars()
        .take(SNIPPET_CHARS)
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    format!("{rank}. [{:.3}] {source}: {snippet}", hit.score)
}

// ============================================================================
// Health
// ============================================================================

/// Summarize the snapshot directory for `bencao health`.
pub fn health_report(manager: &VersionManager) -> Result<String> {
    let versions = manager.list_versions()?;
    let active = match (manager.current_version()?, manager.active_path()?) {
        (Some(id), Some(_)) => id,
        (Some(id), None) => format!("{id} (missing)"),
        (None, _) => "none".to_string(),
    };
    Ok(format!(
        "bencao: base={} versions={} active={active}",
        manager.store().base_dir().display(),
        versions.len()
    ))
}

// ============================================================================
// ETL scheduling
// ============================================================================

/// Load the configured document source and publish it.
///
/// Returns `None` without publishing when the source holds no documents.
pub async fn run_etl_job(manager: &VersionManager, config: &BencaoConfig) -> Result<Option<String>> {
    let source_dir = config.source_dir();
    let documents = loader::load_documents(&source_dir, &config.etl.extensions).await?;
    if documents.is_empty() {
        tracing::warn!(
            "No documents found in {}, skipping publish",
            source_dir.display()
        );
        return Ok(None);
    }

    let version = manager.publish(documents).await.map_err(publish_failed)?;
    tracing::info!("ETL job published {version}");
    Ok(Some(version))
}

/// Run the ETL job every `interval_minutes` until Ctrl-C.
///
/// The first job starts immediately. A job always completes before the next
/// tick is awaited, so publishes never overlap. Job failures are logged and
/// the schedule continues.
pub async fn run_scheduler(
    manager: &VersionManager,
    config: &BencaoConfig,
    interval_minutes: u64,
) -> Result<()> {
    let period = Duration::from_secs(interval_minutes.max(1) * 60);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    run_schedule(manager, config, period, shutdown).await
}

async fn run_schedule<F>(
    manager: &VersionManager,
    config: &BencaoConfig,
    period: Duration,
    mut shutdown: std::pin::Pin<&mut F>,
) -> Result<()>
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    tracing::info!(
        "Scheduler started: publishing from {} every {}s",
        config.source_dir().display(),
        period.as_secs()
    );
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_etl_job(manager, config).await {
                    tracing::error!("ETL job failed: {e}");
                }
            }
            signal = shutdown.as_mut() => {
                signal.map_err(|e| Error::operation(format!("Failed to listen for Ctrl-C: {e}")))?;
                tracing::info!("Scheduler stopped");
                return Ok(());
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> BencaoConfig {
        let source = dir.path().join("corpus");
        std::fs::create_dir_all(&source).unwrap();
        let mut config = BencaoConfig::default();
        config.versions.base_dir = dir.path().join("chroma_db").display().to_string();
        config.etl.source_dir = source.display().to_string();
        config.vector.dimension = 32;
        config
    }

    fn write_source(config: &BencaoConfig, name: &str, content: &str) {
        std::fs::write(config.source_dir().join(name), content).unwrap();
    }

    #[test]
    fn test_bencao_cli_new() {
        let cli = BencaoCli::new(BencaoConfig::default()).with_version("1.2.3");
        assert_eq!(cli.version, "1.2.3");
        assert_eq!(cli.config().versions.prefix, "chroma_v");
    }

    #[test]
    fn test_from_args_with_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[etl]\ninterval_minutes = 7\n").unwrap();

        let args = CliArgs::parse_from(["bencao", "--config", path.to_str().unwrap()]);
        let cli = BencaoCli::from_args(&args).unwrap();
        assert_eq!(cli.config().etl.interval_minutes, 7);
    }

    #[test]
    fn test_init_logging_repeatable() {
        let cli = BencaoCli::new(BencaoConfig::default());
        cli.init_logging(false, false);
        cli.init_logging(true, false);
        cli.init_logging(false, true);
    }

    #[tokio::test]
    async fn test_run_version_and_none() {
        let cli = BencaoCli::new(BencaoConfig::default());
        assert!(cli.run(CliArgs::parse_from(["bencao", "version"])).await.is_ok());
        assert!(cli.run(CliArgs::parse_from(["bencao"])).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_publish_and_versions_commands() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_source(&config, "guizhi.txt", "桂枝汤：桂枝、芍药、甘草、生姜、大枣");
        let cli = BencaoCli::new(config.clone());

        cli.run(CliArgs::parse_from(["bencao", "publish"])).await.unwrap();
        cli.run(CliArgs::parse_from(["bencao", "publish"])).await.unwrap();
        cli.run(CliArgs::parse_from(["bencao", "versions", "list", "--json"]))
            .await
            .unwrap();
        cli.run(CliArgs::parse_from(["bencao", "versions", "activate", "chroma_v001"]))
            .await
            .unwrap();

        let manager = cli.version_manager().unwrap();
        assert_eq!(manager.current_version().unwrap().as_deref(), Some("chroma_v001"));
        assert_eq!(manager.list_versions().unwrap().len(), 2);
        assert!(config.base_dir().join("active_version.txt").is_file());
    }

    #[tokio::test]
    async fn test_run_activate_missing_version_fails() {
        let dir = TempDir::new().unwrap();
        let cli = BencaoCli::new(test_config(&dir));
        let err = cli
            .run(CliArgs::parse_from(["bencao", "versions", "activate", "chroma_v042"]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nothing changed"));
    }

    #[tokio::test]
    async fn test_publish_empty_source_uses_placeholder() {
        let dir = TempDir::new().unwrap();
        let cli = BencaoCli::new(test_config(&dir));
        cli.run(CliArgs::parse_from(["bencao", "publish"])).await.unwrap();

        let manager = cli.version_manager().unwrap();
        let store = manager.open_active().await.unwrap().unwrap();
        assert_eq!(store.document_count(), 1);
    }

    #[tokio::test]
    async fn test_query_active() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_source(&config, "a.txt", "麻黄汤发汗解表");
        write_source(&config, "b.txt", "四君子汤益气健脾");
        let cli = BencaoCli::new(config.clone());
        let manager = cli.version_manager().unwrap();
        run_etl_job(&manager, &config).await.unwrap();

        let lines = query_active(&manager, "益气健脾", 1).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("1. ["));
        assert!(lines[0].contains("b.txt"));
    }

    #[tokio::test]
    async fn test_query_without_active_version() {
        let dir = TempDir::new().unwrap();
        let cli = BencaoCli::new(test_config(&dir));
        let manager = cli.version_manager().unwrap();
        let err = query_active(&manager, "人参", 3).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_format_hit_truncates() {
        let hit = SearchHit {
            content: "草".repeat(200),
            metadata: HashMap::from([("source".to_string(), "bencao.txt".to_string())]),
            score: 0.5,
            distance: 0.5,
        };
        let line = format_hit(2, &hit);
        assert!(line.starts_with("2. [0.500] bencao.txt: "));
        assert_eq!(line.chars().filter(|c| *c == '草').count(), SNIPPET_CHARS);
    }

    #[tokio::test]
    async fn test_etl_job_skips_empty_source() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let manager = BencaoCli::new(config.clone()).version_manager().unwrap();

        assert_eq!(run_etl_job(&manager, &config).await.unwrap(), None);
        assert!(manager.list_versions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_etl_job_missing_source_fails() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.etl.source_dir = dir.path().join("nowhere").display().to_string();
        let manager = BencaoCli::new(config.clone()).version_manager().unwrap();

        assert!(run_etl_job(&manager, &config).await.is_err());
    }

    #[tokio::test]
    async fn test_schedule_once() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_source(&config, "a.txt", "黄芪");
        let cli = BencaoCli::new(config);

        cli.run(CliArgs::parse_from(["bencao", "schedule", "--once"]))
            .await
            .unwrap();
        let manager = cli.version_manager().unwrap();
        assert_eq!(manager.current_version().unwrap().as_deref(), Some("chroma_v001"));
    }

    #[tokio::test]
    async fn test_schedule_runs_first_job_then_stops() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        write_source(&config, "a.txt", "白术健脾");
        let manager = BencaoCli::new(config.clone()).version_manager().unwrap();

        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok::<(), std::io::Error>(())
        };
        tokio::pin!(shutdown);
        run_schedule(&manager, &config, Duration::from_secs(3600), shutdown)
            .await
            .unwrap();

        assert_eq!(manager.list_versions().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_health_report() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let manager = BencaoCli::new(config.clone()).version_manager().unwrap();
        assert!(health_report(&manager).unwrap().contains("active=none"));

        write_source(&config, "a.txt", "陈皮理气");
        run_etl_job(&manager, &config).await.unwrap();
        let report = health_report(&manager).unwrap();
        assert!(report.contains("versions=1"));
        assert!(report.contains("active=chroma_v001"));
    }
}
