//! End-to-end analysis run
//!
//! Reads error records from every configured source, saves them, ranks the
//! recurring ones, saves the ranking and asks the LLM backend for advice. Each
//! step that fails is logged and shown; the run always reaches its end panel.

use crate::aggregator::{RecurringErrorAggregator, RecurringErrors};
use crate::ai::{Suggestion, SuggestionRequester};
use crate::collectors::{read_all, LogSource};
use crate::config::Config;
use crate::display::Display;
use crate::export::{save_error_records, save_recurring_errors};
use chrono::{DateTime, Local};
use log::{error, info};
use std::io::{Stdout, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Timestamp embedded in artifact file names
pub const ARTIFACT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub const NO_RECORDS_WARNING: &str = "No critical/error events found or processing failed.";

/// What a run produced
#[derive(Debug)]
pub struct RunReport {
    pub records_read: usize,
    /// Aggregation result; `None` when no records were read
    pub recurring: Option<RecurringErrors>,
    /// LLM outcome; `None` when there were no groups to send
    pub suggestion: Option<Suggestion>,
    pub records_file: Option<PathBuf>,
    pub groups_file: Option<PathBuf>,
    pub duration: Duration,
}

/// Sequences one analysis run
pub struct RunOrchestrator<W: Write> {
    sources: Vec<Box<dyn LogSource>>,
    requester: SuggestionRequester,
    aggregator: RecurringErrorAggregator,
    display: Display<W>,
    max_events: usize,
    top_n: usize,
    output_dir: PathBuf,
}

impl RunOrchestrator<Stdout> {
    /// Build sources, backend and console output from the configuration
    pub fn from_config(config: &Config) -> Self {
        let sources = config
            .source_specs()
            .into_iter()
            .map(|spec| spec.into_source())
            .collect();
        let requester = SuggestionRequester::from_config(&config.llm);
        Self::new(config, sources, requester, Display::stdout())
    }
}

impl<W: Write> RunOrchestrator<W> {
    pub fn new(
        config: &Config,
        sources: Vec<Box<dyn LogSource>>,
        requester: SuggestionRequester,
        display: Display<W>,
    ) -> Self {
        Self {
            sources,
            requester,
            aggregator: RecurringErrorAggregator::default(),
            display,
            max_events: config.analysis.max_events,
            top_n: config.analysis.top_n,
            output_dir: config.analysis.output_dir.clone(),
        }
    }

    /// Run the pipeline, naming artifacts after the current local time
    pub async fn run(&mut self) -> RunReport {
        self.run_at(Local::now()).await
    }

    /// Run the pipeline, naming artifacts after `started_at`
    pub async fn run_at(&mut self, started_at: DateTime<Local>) -> RunReport {
        let start = Instant::now();
        let stamp = started_at.format(ARTIFACT_TIMESTAMP_FORMAT).to_string();
        self.display.start();

        let names: Vec<String> = self.sources.iter().map(|s| s.name()).collect();
        info!(
            "Analysis settings - sources: [{}], max events: {}, top N: {}",
            names.join(", "),
            self.max_events,
            self.top_n
        );

        let records = read_all(&self.sources, self.max_events);
        let mut report = RunReport {
            records_read: records.len(),
            recurring: None,
            suggestion: None,
            records_file: None,
            groups_file: None,
            duration: Duration::ZERO,
        };

        if records.is_empty() {
            self.display.warning(NO_RECORDS_WARNING);
            return self.finish(report, start);
        }

        let records_path = artifact_path(&self.output_dir, "error_records", &stamp, "csv");
        report.records_file = match save_error_records(&records, &records_path) {
            Ok(path) => path,
            Err(e) => {
                error!("Failed to save error records: {}", e);
                None
            }
        };

        info!("Analyzing recurring errors");
        let recurring = self.aggregator.aggregate(&records, self.top_n);

        if recurring.is_empty() {
            self.display.warning(&recurring.summary);
        } else {
            self.display.summary(&recurring.summary);

            let groups_path = artifact_path(&self.output_dir, "recurring_errors", &stamp, "json");
            report.groups_file = match save_recurring_errors(&recurring.groups, &groups_path) {
                Ok(path) => path,
                Err(e) => {
                    error!("Failed to save recurring errors: {}", e);
                    None
                }
            };

            info!("Requesting analysis from LLM");
            let suggestion = self.requester.request(&recurring.groups).await;
            self.display.suggestions(&suggestion.render());
            report.suggestion = Some(suggestion);
        }

        report.recurring = Some(recurring);
        self.finish(report, start)
    }

    pub fn into_display(self) -> Display<W> {
        self.display
    }

    fn finish(&mut self, mut report: RunReport, start: Instant) -> RunReport {
        report.duration = start.elapsed();
        self.display.end(report.duration);
        info!("Run finished in {:.2}s", report.duration.as_secs_f64());
        report
    }
}

fn artifact_path(dir: &Path, prefix: &str, stamp: &str, extension: &str) -> PathBuf {
    dir.join(format!("{}_{}.{}", prefix, stamp, extension))
}
