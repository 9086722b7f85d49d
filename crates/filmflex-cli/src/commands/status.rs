use crate::output::{key_value_table, Output};
use color_eyre::Result;
use filmflex_config::{Config, PathManager};
use filmflex_core::{CheckpointStore, ImportOrchestrator, MovieStore, PgMovieStore, StoreCounts};
use filmflex_sources::{CatalogSource, OphimClient};
use serde_json::json;

async fn store_counts(config: &Config) -> Result<StoreCounts, String> {
    let url = config.database_url().map_err(|e| e.to_string())?;
    let store = PgMovieStore::connect(url, 1).await.map_err(|e| e.to_string())?;
    store.counts().await.map_err(|e| e.to_string())
}

async fn api_health(config: &Config) -> Result<(), String> {
    let client = OphimClient::from_config(&config.api).map_err(|e| e.to_string())?;
    client.health_check().await.map_err(|e| e.to_string())
}

pub async fn run_status(check_api: bool, config: &Config, paths: &PathManager, output: &Output) -> Result<()> {
    let checkpoint = CheckpointStore::new(paths.progress_file());
    let progress = checkpoint
        .read_progress()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to read checkpoint: {}", e))?;
    let next_page = ImportOrchestrator::resume_start_page(progress.as_ref());

    let counts = store_counts(config).await;
    if let Err(e) = &counts {
        tracing::debug!("Catalog counts unavailable: {}", e);
    }
    let api = if check_api { Some(api_health(config).await) } else { None };

    if !output.is_human() {
        output.json(&json!({
            "type": "status",
            "checkpoint_file": checkpoint.path().display().to_string(),
            "checkpoint": progress,
            "next_page": next_page,
            "store": match &counts {
                Ok(c) => json!(c),
                Err(e) => json!({ "error": e }),
            },
            "api": api.as_ref().map(|result| match result {
                Ok(()) => json!({ "reachable": true, "base_url": config.api.base_url }),
                Err(e) => json!({ "reachable": false, "base_url": config.api.base_url, "error": e }),
            }),
        }));
        return Ok(());
    }

    let mut rows = vec![("Checkpoint file", checkpoint.path().display().to_string())];
    match &progress {
        Some(p) => {
            rows.push(("Last completed page", p.last_completed_page.to_string()));
            rows.push(("Updated", p.timestamp.to_rfc3339()));
            let failed = if p.failed_pages.is_empty() {
                "-".to_string()
            } else {
                p.failed_pages.iter().map(u32::to_string).collect::<Vec<_>>().join(", ")
            };
            rows.push(("Failed pages", failed));
        }
        None => rows.push(("Last completed page", "none".to_string())),
    }
    rows.push(("Next page", next_page.to_string()));

    match &counts {
        Ok(c) => {
            rows.push(("Movies", c.movies.to_string()));
            rows.push(("Episodes", c.episodes.to_string()));
        }
        Err(e) => rows.push(("Catalog", format!("unavailable ({})", e))),
    }

    if let Some(result) = &api {
        let state = match result {
            Ok(()) => "reachable".to_string(),
            Err(e) => format!("unreachable ({})", e),
        };
        rows.push(("API", format!("{} {}", config.api.base_url, state)));
    }

    output.table(&key_value_table("Import status", rows));

    if let Some(Err(_)) = &api {
        output.warn("Remote API is not reachable");
    }
    Ok(())
}
