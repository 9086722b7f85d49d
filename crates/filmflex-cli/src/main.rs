use clap::{ArgAction, Parser, Subcommand};
use commands::import::{ImportJob, RunArgs};
use commands::{clear, config, import, status};
use filmflex_config::PathManager;
use std::path::PathBuf;

mod commands;
mod logging;
mod output;

#[derive(Parser)]
#[command(name = "filmflex")]
#[command(about = "FilmFlex - import the Ophim/PhimAPI movie catalog into Postgres")]
#[command(version)]
struct Cli {
    /// Enable verbose output (use multiple times for more verbosity: -v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "human", value_enum)]
    output: output::OutputFormat,

    /// Config file (defaults to <config dir>/filmflex/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import specific catalog pages
    #[command(subcommand)]
    Import(ImportTarget),

    /// Continue from the saved checkpoint
    #[command(long_about = "Continue importing after the last completed page recorded in the checkpoint, or from page 1 when there is none. Without --max-pages the run stops at the last page the API declares, or at the first empty page.")]
    Resume {
        /// Stop after this many pages
        #[arg(long, value_name = "N")]
        max_pages: Option<u32>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Re-import pages whose list fetch failed in an earlier run
    RetryFailed {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Show checkpoint, failed pages and catalog counts
    Status {
        /// Also probe the remote API
        #[arg(long, action = ArgAction::SetTrue)]
        check_api: bool,
    },

    /// Clear saved import state
    Clear {
        /// Delete the checkpoint so the next resume starts at page 1
        #[arg(long, action = ArgAction::SetTrue)]
        progress: bool,
    },

    /// Show or create the configuration file
    Config {
        #[command(subcommand)]
        cmd: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ImportTarget {
    /// Import a single page
    Page {
        page: u32,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Import an inclusive page range; without END, runs until the catalog ends
    Range {
        start: u32,
        end: Option<u32>,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration (database password masked)
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}

impl Commands {
    /// Commands that hit the API and the database get their own log file
    fn writes_run_log(&self) -> bool {
        matches!(self, Commands::Import(_) | Commands::Resume { .. } | Commands::RetryFailed { .. })
    }
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let paths = PathManager::default();
    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());

    let config = commands::load_config(&config_path)?;

    let paths = match &config.logging.dir {
        Some(dir) => paths.with_log_dir(dir.clone()),
        None => paths,
    };

    let log_file = (cli.command.writes_run_log() && config.logging.file)
        .then(|| paths.run_log_file(chrono::Utc::now()));

    logging::init_logging(cli.verbose, cli.quiet, log_file.clone())
        .map_err(|e| color_eyre::eyre::eyre!("Failed to initialize logging: {}", e))?;
    if let Some(log_file) = &log_file {
        tracing::debug!("Writing run log to {}", log_file.display());
    }

    let output = output::Output::new(cli.output, cli.quiet);

    match cli.command {
        Commands::Import(ImportTarget::Page { page, run }) => {
            import::run_import(ImportJob::Page(page), run, &config, &paths, &output).await
        }
        Commands::Import(ImportTarget::Range { start, end, run }) => {
            import::run_import(ImportJob::Range { start, end }, run, &config, &paths, &output).await
        }
        Commands::Resume { max_pages, run } => {
            import::run_import(ImportJob::Resume { max_pages }, run, &config, &paths, &output).await
        }
        Commands::RetryFailed { run } => {
            import::run_import(ImportJob::RetryFailed, run, &config, &paths, &output).await
        }
        Commands::Status { check_api } => status::run_status(check_api, &config, &paths, &output).await,
        Commands::Clear { progress } => clear::run_clear(progress, &paths, &output),
        Commands::Config { cmd } => {
            let cmd = cmd.unwrap_or(ConfigCommands::Show);
            config::run_config(cmd, &config_path, &config, &output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_range() {
        let cli = Cli::try_parse_from(["filmflex", "-v", "import", "range", "3", "9", "--dry-run"]).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Import(ImportTarget::Range { start, end, run }) => {
                assert_eq!((start, end), (3, Some(9)));
                assert!(run.dry_run);
                assert!(!run.skip_unchanged);
            }
            _ => panic!("expected import range"),
        }
    }

    #[test]
    fn test_parse_resume_and_globals() {
        let cli = Cli::try_parse_from([
            "filmflex",
            "resume",
            "--max-pages",
            "5",
            "--skip-unchanged",
            "--output",
            "json",
            "--config",
            "/tmp/filmflex.toml",
        ])
        .unwrap();
        assert_eq!(cli.output, output::OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/filmflex.toml")));
        assert!(cli.command.writes_run_log());
        match cli.command {
            Commands::Resume { max_pages, run } => {
                assert_eq!(max_pages, Some(5));
                assert!(run.skip_unchanged);
            }
            _ => panic!("expected resume"),
        }
    }

    #[test]
    fn test_status_does_not_write_run_log() {
        let cli = Cli::try_parse_from(["filmflex", "status", "--check-api"]).unwrap();
        assert!(!cli.command.writes_run_log());
        assert!(Cli::try_parse_from(["filmflex", "import", "page", "abc"]).is_err());
    }
}
