use super::import_ui::ImportUi;
use crate::output::{key_value_table, Output};
use clap::Args;
use color_eyre::eyre::Context;
use color_eyre::Result;
use filmflex_config::{Config, PathManager};
use filmflex_core::stats::format_error_breakdown;
use filmflex_core::{
    CheckpointStore, FieldNormalizer, ImportOptions, ImportOrchestrator, ImportSummary, MemoryStore, MovieStore,
    PageRange, PgMovieStore,
};
use filmflex_sources::{CatalogSource, OphimClient};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Args)]
pub struct RunArgs {
    /// Write to an in-memory store; the real checkpoint is left untouched
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the detail fetch when the stored copy is already up to date
    #[arg(long)]
    pub skip_unchanged: bool,
}

#[derive(Debug, Clone, Copy)]
pub enum ImportJob {
    Page(u32),
    Range { start: u32, end: Option<u32> },
    Resume { max_pages: Option<u32> },
    RetryFailed,
}

/// Dry runs work on a copy of the checkpoint so resume still starts in the right place
fn dry_run_checkpoint(paths: &PathManager) -> Result<CheckpointStore> {
    let real = paths.progress_file();
    let copy: PathBuf = real.with_extension("dry-run.json");
    if real.exists() {
        std::fs::create_dir_all(paths.data_dir())?;
        std::fs::copy(&real, &copy)
            .wrap_err_with(|| format!("Failed to copy checkpoint {} for dry run", real.display()))?;
    } else if copy.exists() {
        std::fs::remove_file(&copy)?;
    }
    Ok(CheckpointStore::new(copy))
}

async fn open_store(config: &Config, dry_run: bool, output: &Output) -> Result<Arc<dyn MovieStore>> {
    if dry_run {
        output.warn("Dry run: movies are written to an in-memory store and discarded");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let url = config.database_url().map_err(|e| color_eyre::eyre::eyre!("{}", e))?;
    let store = PgMovieStore::connect(url, config.database.max_connections)
        .await
        .wrap_err("Failed to connect to the database")?;
    store.ensure_schema().await.wrap_err("Failed to prepare the catalog schema")?;
    Ok(Arc::new(store))
}

pub async fn run_import(
    job: ImportJob,
    run: RunArgs,
    config: &Config,
    paths: &PathManager,
    output: &Output,
) -> Result<()> {
    tracing::debug!("Import command started: {:?} ({:?})", job, run);

    let client = OphimClient::from_config(&config.api)
        .map_err(|e| color_eyre::eyre::eyre!("Failed to create API client: {}", e))?;
    let source: Arc<dyn CatalogSource> = Arc::new(client);
    let store = open_store(config, run.dry_run, output).await?;

    let checkpoint = if run.dry_run {
        dry_run_checkpoint(paths)?
    } else {
        CheckpointStore::new(paths.progress_file())
    };

    let mut options = ImportOptions::from_config(config);
    options.skip_unchanged |= run.skip_unchanged;

    let normalizer = FieldNormalizer::new(config.fallback_year()).with_image_base(config.api.image_base_url.clone());

    let ui = ImportUi::new(output.is_human() && !output.is_quiet());
    let mut orchestrator = ImportOrchestrator::new(source, store, checkpoint, normalizer)
        .with_options(options)
        .with_observer(ui.observer());

    let result = match job {
        ImportJob::Page(page) => orchestrator.import_page(page).await,
        ImportJob::Range { start, end } => match PageRange::new(start, end) {
            Ok(range) => orchestrator.import_range(range).await,
            Err(e) => Err(e),
        },
        ImportJob::Resume { max_pages } => orchestrator.resume(max_pages).await,
        ImportJob::RetryFailed => orchestrator.retry_failed().await,
    };
    ui.finish();

    let summary = result.wrap_err("Import aborted")?;
    print_summary(&summary, run.dry_run, output);
    Ok(())
}

fn print_summary(summary: &ImportSummary, dry_run: bool, output: &Output) {
    if !output.is_human() {
        let mut value = serde_json::to_value(summary).unwrap_or_default();
        if let Some(map) = value.as_object_mut() {
            map.insert("type".to_string(), serde_json::json!("import_summary"));
            map.insert("dry_run".to_string(), serde_json::json!(dry_run));
        }
        output.json(&value);
        return;
    }

    let errors = if summary.errors.is_empty() {
        "-".to_string()
    } else {
        format_error_breakdown(&summary.errors)
    };
    let pages = |pages: &[u32]| {
        if pages.is_empty() {
            "-".to_string()
        } else {
            pages.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
        }
    };

    let title = if dry_run { "Import summary (dry run)" } else { "Import summary" };
    output.table(&key_value_table(
        title,
        vec![
            ("Pages completed", pages(&summary.pages_completed)),
            ("Pages failed", pages(&summary.pages_failed)),
            ("Saved", summary.counts.saved.to_string()),
            ("Existing", summary.counts.existing.to_string()),
            ("Failed", summary.counts.failed.to_string()),
            ("Errors", errors),
            ("Duration", format!("{:.1}s", summary.duration_secs)),
        ],
    ));

    if summary.is_clean() {
        output.success(format!(
            "Imported {} pages: {} saved, {} existing",
            summary.pages_completed.len(),
            summary.counts.saved,
            summary.counts.existing
        ));
    } else if !summary.pages_failed.is_empty() {
        output.warn(format!(
            "{} pages could not be fetched; run `filmflex retry-failed` to try them again",
            summary.pages_failed.len()
        ));
    } else {
        output.warn(format!("{} movies failed; see the log for details", summary.counts.failed));
    }
}
