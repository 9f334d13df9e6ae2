//! legacy-bridge
//!
//! Batch migration of a legacy desktop database, plus a company registry
//! scraper, into one normalized target store.

use anyhow::{Context, Result};
use clap::Parser;
use legacy_bridge::cli::inspect::InspectArgs;
use legacy_bridge::cli::migrate::MigrateArgs;
use legacy_bridge::cli::scrape::ScrapeArgs;
use legacy_bridge::cli::{Cli, Command};
use legacy_bridge::config::{CONFIG_PATH_ENV, ConfigLoader, MigrationConfig};
use legacy_bridge::db::{Database, TargetStore};
use legacy_bridge::error::MigrationError;
use legacy_bridge::fetch::FetchClient;
use legacy_bridge::inspect::inspect;
use legacy_bridge::legacy::open_source;
use legacy_bridge::logging::{self, LogTarget};
use legacy_bridge::orchestrator::{RunContext, ScrapeSource, run_legacy, run_scrape};
use legacy_bridge::report::{RunMode, RunReport};
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    logging::init(&LogTarget::parse(&cli.log), cli.verbose)?;

    // If --config is specified, make it the explicit config path so the
    // loader skips the project and user tiers.
    if let Some(config_path) = &cli.config {
        // SAFETY: called at start-up before any other threads read the environment.
        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, config_path);
        }
    }

    let mut loader = ConfigLoader::load()?;
    for source in loader.sources() {
        debug!(path = %source.display(), "loaded config tier");
    }
    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.db_path = db_path.into();
    }

    match cli.command {
        Command::Migrate(args) => {
            args.apply(config);
            run_migrate(loader.into_config(), args).await
        }
        Command::Scrape(args) => {
            args.apply(config);
            run_scrape_command(loader.into_config(), args).await
        }
        Command::Inspect(args) => {
            run_inspect(loader.config(), args)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Cancel `token` on Ctrl-C. Stages finish their current batch, then stop.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current batch");
            token.cancel();
        }
    });
}

fn open_store(config: &MigrationConfig) -> Result<Arc<dyn TargetStore>> {
    config.ensure_db_dir()?;
    let db = Database::open(&config.db_path)
        .with_context(|| format!("failed to open target store {}", config.db_path.display()))?;
    Ok(Arc::new(db))
}

async fn run_migrate(config: MigrationConfig, args: MigrateArgs) -> Result<ExitCode> {
    if config.dry_run {
        info!("dry run: nothing will be written (pass --live to write)");
    }
    let store = match open_store(&config) {
        Ok(store) => store,
        Err(e) => {
            let report = aborted(RunMode::Legacy, &config, MigrationError::store(format!("{e:#}")));
            return finish(&report, &config.report_dir);
        }
    };
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let ctx = RunContext::new(config, store).with_cancellation(cancel);
    let only = args.only;
    let report_ctx = ctx.clone();
    let report = tokio::task::spawn_blocking(move || run_legacy(&ctx, &only))
        .await
        .context("migration task panicked")?;

    finish(&report, &report_ctx.config.report_dir)
}

async fn run_scrape_command(config: MigrationConfig, args: ScrapeArgs) -> Result<ExitCode> {
    if config.dry_run {
        info!("dry run: nothing will be written (pass --live to write)");
    }
    if config.scrape.cookies.is_none() && args.dump.is_none() {
        warn!("REGISTRY_COOKIES not set; the registry may reject unauthenticated requests");
    }
    let client = match FetchClient::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            let report = aborted(RunMode::Scrape, &config, MigrationError::Config(e.to_string()));
            return finish(&report, &config.report_dir);
        }
    };
    let store = match open_store(&config) {
        Ok(store) => store,
        Err(e) => {
            let report = aborted(RunMode::Scrape, &config, MigrationError::store(format!("{e:#}")));
            return finish(&report, &config.report_dir);
        }
    };
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let ctx = RunContext::new(config, store).with_cancellation(cancel);
    let source = match args.dump {
        Some(path) => ScrapeSource::Dump(path),
        None => ScrapeSource::Registry,
    };
    let report = run_scrape(&ctx, &client, source).await;

    finish(&report, &ctx.config.report_dir)
}

/// Report for a run that failed before its first stage.
fn aborted(mode: RunMode, config: &MigrationConfig, error: MigrationError) -> RunReport {
    let mut report = RunReport::new(mode, config.dry_run);
    report.start();
    report.abort(&error);
    report.finish();
    report
}

/// Persist the report, print the summary and map the outcome to an exit code.
fn finish(report: &RunReport, report_dir: &std::path::Path) -> Result<ExitCode> {
    let path = report.write(report_dir)?;
    println!("{}", report.summary());
    println!("Report written to {}", path.display());
    Ok(ExitCode::from(report.exit_code()))
}

fn run_inspect(config: &MigrationConfig, args: InspectArgs) -> Result<()> {
    let path = args.source.unwrap_or_else(|| config.source_path.clone());
    let source = open_source(&path, &config.legacy_encoding)?;
    let inspection = inspect(source.as_ref())?;
    let json = serde_json::to_string_pretty(&inspection)?;

    match args.output {
        Some(output) => {
            std::fs::write(&output, json)
                .with_context(|| format!("failed to write {}", output.display()))?;
            eprintln!(
                "Inspected {} tables to {}",
                inspection.tables.len(),
                output.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}
