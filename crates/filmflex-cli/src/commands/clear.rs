use crate::output::Output;
use color_eyre::Result;
use filmflex_config::PathManager;
use filmflex_core::CheckpointStore;

pub fn run_clear(progress: bool, paths: &PathManager, output: &Output) -> Result<()> {
    if !progress {
        output.warn("No clear option specified. Use --progress");
        output.info("\nExample: filmflex clear --progress");
        return Ok(());
    }

    let checkpoint = CheckpointStore::new(paths.progress_file());
    let removed = checkpoint
        .clear()
        .map_err(|e| color_eyre::eyre::eyre!("Failed to remove checkpoint: {}", e))?;

    if removed {
        output.success(format!("Cleared checkpoint: {}", checkpoint.path().display()));
    } else {
        output.info("No checkpoint found to clear");
    }

    // Leftover from an earlier dry run
    let dry_run_copy = CheckpointStore::new(paths.progress_file().with_extension("dry-run.json"));
    if dry_run_copy.clear().unwrap_or(false) {
        output.info(format!("Removed dry-run checkpoint: {}", dry_run_copy.path().display()));
    }

    Ok(())
}
