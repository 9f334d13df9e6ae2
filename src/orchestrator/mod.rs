//! Migration orchestrator.
//!
//! Drives one run end to end: stages in dependency order, id maps built after
//! the stage that populates them, a verification pass, and a report that is
//! produced whether the run completes or aborts.

pub mod legacy;
pub mod scrape;
pub mod verify;

use crate::config::MigrationConfig;
use crate::db::TargetStore;
use crate::upsert::BatchOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub use legacy::run_legacy;
pub use scrape::{ScrapeSource, run_scrape};
pub use verify::verify;

/// Everything a run needs, passed explicitly to every stage.
#[derive(Clone)]
pub struct RunContext {
    pub config: Arc<MigrationConfig>,
    pub store: Arc<dyn TargetStore>,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(config: MigrationConfig, store: Arc<dyn TargetStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn batch_options(&self, ignore_duplicates: bool) -> BatchOptions {
        BatchOptions {
            batch_size: self.config.effective_batch_size(),
            dry_run: self.config.dry_run,
            ignore_duplicates,
            progress_every: self.config.progress_every,
        }
    }
}
