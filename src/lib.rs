//! dupindex - content-addressed file indexer
//!
//! Walks a directory tree, fingerprints every eligible file, and records
//! each distinct content once in SQLite. Later copies of the same content
//! increment the first record's `updateCount`. Every run is audited and
//! reconciled: paths the walker produced but the workers never finished
//! are reported as missing.

pub mod audit;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod scanner;
pub mod store;

use std::io::{self, IsTerminal};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::error::ExitCode;
use crate::output::{JsonOutput, StoreTotals, TextOutput};
use crate::pipeline::Indexer;
use crate::progress::Progress;
use crate::store::Store;

/// Run the application with parsed CLI arguments.
///
/// # Errors
///
/// Returns an error for invalid configuration, an unusable scan root, or a
/// store that cannot be opened. Per-file problems are not errors; they
/// appear in the summary.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    log::debug!("Effective configuration: {:?}", config);

    let root = cli.scan_root(&config);
    log::info!("Scanning folder: {}", root.display());

    let store = Store::open(&config.db_path)
        .with_context(|| format!("Failed to open store at {}", config.db_path.display()))?;

    let mut indexer_config = config.indexer_config().with_resume(cli.resume);
    let show_progress = !cli.quiet && !cli.no_progress && io::stderr().is_terminal();
    if show_progress {
        indexer_config = indexer_config.with_progress_callback(Arc::new(Progress::new()));
    }

    let (report, store) = Indexer::new(indexer_config).run(&root, store)?;

    let totals = match StoreTotals::query(&store) {
        Ok(totals) => totals,
        Err(e) => {
            log::warn!("Failed to read store totals: {}", e);
            StoreTotals {
                location: store.location().to_string(),
                ..StoreTotals::default()
            }
        }
    };

    let exit_code = ExitCode::Success;
    let mut stdout = io::stdout().lock();
    match cli.output {
        OutputFormat::Text => TextOutput::new(&report, &totals).write_to(&mut stdout)?,
        OutputFormat::Json => JsonOutput::new(&report, &totals, exit_code).write_to(&mut stdout, true)?,
    }

    Ok(exit_code)
}
