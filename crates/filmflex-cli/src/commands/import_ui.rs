use filmflex_core::{ImportObserver, ItemOutcome, PageReport};
use filmflex_sources::SourceError;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

/// Per-page progress bar. Disabled when not attached to a terminal, where
/// the structured log lines already carry progress.
pub struct ImportUi {
    bar: Option<ProgressBar>,
}

impl ImportUi {
    pub fn new(enabled: bool) -> Self {
        if !(enabled && is_interactive()) {
            tracing::debug!("Progress bar disabled; relying on log output");
            return Self { bar: None };
        }

        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_message("Starting import...");
        Self { bar: Some(bar) }
    }

    pub fn observer(&self) -> Box<dyn ImportObserver> {
        Box::new(BarObserver { bar: self.bar.clone() })
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

struct BarObserver {
    bar: Option<ProgressBar>,
}

impl ImportObserver for BarObserver {
    fn page_started(&self, page: u32, items: usize) {
        if let Some(bar) = &self.bar {
            bar.reset();
            bar.set_length(items as u64);
            bar.set_message(format!("page {}", page));
        }
    }

    fn item_finished(&self, page: u32, slug: &str, outcome: &ItemOutcome) {
        if let Some(bar) = &self.bar {
            bar.inc(1);
            if let ItemOutcome::Failed { reason, .. } = outcome {
                bar.set_message(format!("page {} | last failure: {} ({})", page, slug, reason));
            }
        }
    }

    fn page_finished(&self, report: &PageReport) {
        if let Some(bar) = &self.bar {
            bar.println(format!(
                "page {}: {} saved, {} existing, {} failed",
                report.page, report.counts.saved, report.counts.existing, report.counts.failed
            ));
        }
    }

    fn page_failed(&self, page: u32, error: &SourceError) {
        if let Some(bar) = &self.bar {
            bar.println(format!("page {} failed: {}", page, error));
        }
    }
}

pub fn is_interactive() -> bool {
    std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
}
