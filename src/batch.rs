//! Batch scoring of many competitors
//!
//! Reads competitor statistics from CSV, scores every row in parallel with
//! rayon and writes the results back out as CSV:
//! - Flexible header names (`ones`, `1s`, `ones_rating`, `onesGames`, `1s_peak`, ...)
//! - Configuration checked once before any row is scored
//! - Per-row failures collected, or the batch stopped at the first one
//! - Optional progress bar and a throughput summary

use csv::{ReaderBuilder, Trim, WriterBuilder};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{BatchError, Result, SkillScoreError};
use crate::models::{Category, PerCategoryStats};
use crate::scoring::{Algorithm, ScoreCalculator, ScoringConfig, ScoringError};

/// Settings for batch scoring runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker threads; `None` uses rayon's default (one per CPU)
    pub threads: Option<usize>,
    /// Show a progress bar while scoring
    pub show_progress: bool,
    /// Keep scoring remaining rows when one fails; otherwise the first
    /// failure stops the batch
    pub continue_on_error: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            threads: None,
            show_progress: true,
            continue_on_error: true,
        }
    }
}

/// One competitor read from the input file
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitorRecord {
    pub id: String,
    pub stats: PerCategoryStats,
}

/// Score for one competitor, as written to the output file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    pub id: String,
    pub algorithm: Algorithm,
    pub score: Option<i64>,
    pub error: Option<String>,
}

impl ScoredRecord {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of a batch scoring run
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// Total records processed
    pub total_records: usize,
    /// Records scored successfully
    pub scored_records: usize,
    /// Records that failed
    pub failed_records: usize,
    /// Total duration in milliseconds
    pub total_duration_ms: u128,
    /// `(id, error)` for every failed record
    pub errors: Vec<(String, String)>,
}

impl BatchSummary {
    /// Get throughput (records per second)
    pub fn throughput_records_per_sec(&self) -> f64 {
        if self.total_duration_ms == 0 {
            return 0.0;
        }
        (self.total_records as f64 / self.total_duration_ms as f64) * 1000.0
    }

    /// Check if every record was scored
    pub fn is_fully_successful(&self) -> bool {
        self.failed_records == 0
    }

    /// Get human-readable summary
    pub fn to_string_pretty(&self) -> String {
        format!(
            "Batch Scoring Summary\n  \
             Total Records: {}\n  \
             Scored: {}\n  \
             Failed: {}\n  \
             Total Time: {:.2}s\n  \
             Throughput: {:.2} records/sec",
            self.total_records,
            self.scored_records,
            self.failed_records,
            self.total_duration_ms as f64 / 1000.0,
            self.throughput_records_per_sec(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    Rating(Category),
    Games(Category),
    Peak(Category),
}

/// CSV reader with flexible column mapping
pub struct CsvStatsReader {
    column_mapping: HashMap<String, Field>,
}

impl CsvStatsReader {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        for id in ["id", "player_id", "competitor_id", "user_id"] {
            column_mapping.insert(id.to_string(), Field::Id);
        }

        for category in Category::ALL {
            let prefixes: &[&str] = match category {
                Category::Ones => &["ones", "1s", "1v1"],
                Category::Twos => &["twos", "2s", "2v2"],
                Category::Threes => &["threes", "3s", "3v3"],
                Category::Fours => &["fours", "4s", "4v4"],
            };
            for prefix in prefixes {
                for suffix in ["", "_rating"] {
                    column_mapping.insert(format!("{}{}", prefix, suffix), Field::Rating(category));
                }
                for suffix in ["_games", "games", "_games_played"] {
                    column_mapping.insert(format!("{}{}", prefix, suffix), Field::Games(category));
                }
                for suffix in ["_peak", "peak", "_peak_rating"] {
                    column_mapping.insert(format!("{}{}", prefix, suffix), Field::Peak(category));
                }
            }
        }

        Self { column_mapping }
    }

    fn normalize_column_name(name: &str) -> String {
        name.trim().to_lowercase().replace([' ', '-'], "_")
    }

    /// Read competitors from a CSV file
    pub fn read_path<P: AsRef<Path>>(&self, path: P) -> Result<Vec<CompetitorRecord>> {
        let file = File::open(path.as_ref())?;
        self.read_from(file)
    }

    /// Read competitors from any CSV source.
    ///
    /// Empty cells mean "no data". Unrecognized columns are ignored.
    pub fn read_from<R: Read>(&self, reader: R) -> Result<Vec<CompetitorRecord>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);

        let headers = reader.headers().map_err(BatchError::from)?.clone();
        let fields: Vec<Option<Field>> = headers
            .iter()
            .map(|h| {
                let field = self.column_mapping.get(&Self::normalize_column_name(h)).copied();
                if field.is_none() {
                    debug!(column = h, "Ignoring unrecognized column");
                }
                field
            })
            .collect();

        if !fields.contains(&Some(Field::Id)) {
            return Err(BatchError::MissingColumn {
                column: "id".to_string(),
            }
            .into());
        }

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(BatchError::from)?;
            let line = row.position().map(|p| p.line()).unwrap_or(0);

            let mut id = String::new();
            let mut stats = PerCategoryStats::default();

            for ((value, field), header) in row.iter().zip(&fields).zip(headers.iter()) {
                let Some(field) = field else {
                    continue;
                };
                if value.is_empty() {
                    continue;
                }
                let invalid = || BatchError::InvalidValue {
                    line,
                    column: header.to_string(),
                    value: value.to_string(),
                };
                // ratings must be finite; `NaN` and `inf` parse as f64 otherwise
                let rating = || {
                    value
                        .parse::<f64>()
                        .ok()
                        .filter(|r| r.is_finite())
                        .ok_or_else(invalid)
                };
                match *field {
                    Field::Id if !id.is_empty() => {
                        debug!(line, column = header, "Ignoring second id column");
                    }
                    Field::Id => id = value.to_string(),
                    Field::Rating(c) => stats.get_mut(c).rating = Some(rating()?),
                    Field::Games(c) => {
                        stats.get_mut(c).games_played = Some(value.parse().map_err(|_| invalid())?)
                    }
                    Field::Peak(c) => stats.get_mut(c).peak_rating = Some(rating()?),
                }
            }

            if id.is_empty() {
                warn!(line, "Skipping row without an id");
                continue;
            }
            records.push(CompetitorRecord { id, stats });
        }

        info!("Read {} competitors from CSV", records.len());
        Ok(records)
    }
}

impl Default for CsvStatsReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parallel batch scorer
pub struct BatchScorer {
    pub config: BatchConfig,
}

impl BatchScorer {
    /// Create new batch scorer with default config
    pub fn new() -> Self {
        Self::with_config(BatchConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Score every record under one scoring configuration.
    ///
    /// The configuration is checked before any record is scored, so an
    /// unusable configuration fails the whole batch. Results keep input order.
    pub fn score_records(
        &self,
        records: &[CompetitorRecord],
        scoring: Option<&ScoringConfig>,
    ) -> Result<(Vec<ScoredRecord>, BatchSummary)> {
        let scoring = scoring.ok_or(ScoringError::ConfigRequired)?;
        ScoreCalculator::check_config(Some(scoring))?;

        let start_time = Instant::now();
        info!(
            algorithm = %scoring.algorithm(),
            "Starting batch scoring of {} records",
            records.len()
        );

        let progress = if self.config.show_progress {
            let pb = ProgressBar::new(records.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({msg})")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            Some(pb)
        } else {
            None
        };

        let fail_fast = !self.config.continue_on_error;
        let results = match self.config.threads {
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| {
                        SkillScoreError::Internal(format!("Failed to create thread pool: {}", e))
                    })?;
                pool.install(|| Self::score_parallel(records, scoring, &progress, fail_fast))
            }
            None => Self::score_parallel(records, scoring, &progress, fail_fast),
        };

        if let Some(pb) = progress {
            match &results {
                Ok(_) => pb.finish_with_message("Complete"),
                Err(_) => pb.abandon_with_message("Stopped"),
            }
        }
        let results = results?;

        let errors: Vec<(String, String)> = results
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| (r.id.clone(), e.clone())))
            .collect();

        let summary = BatchSummary {
            total_records: records.len(),
            scored_records: records.len() - errors.len(),
            failed_records: errors.len(),
            total_duration_ms: start_time.elapsed().as_millis(),
            errors,
        };

        info!("{}", summary.to_string_pretty());
        Ok((results, summary))
    }

    /// Score records in parallel.
    ///
    /// With `fail_fast`, the first failed row stops the remaining work and
    /// its error is returned instead of the results.
    fn score_parallel(
        records: &[CompetitorRecord],
        scoring: &ScoringConfig,
        progress: &Option<ProgressBar>,
        fail_fast: bool,
    ) -> Result<Vec<ScoredRecord>> {
        records
            .par_iter()
            .map(|record| {
                let scored = match ScoreCalculator::calculate(&record.stats, Some(scoring)) {
                    Ok(score) => ScoredRecord {
                        id: record.id.clone(),
                        algorithm: scoring.algorithm(),
                        score: Some(score),
                        error: None,
                    },
                    Err(e) => {
                        warn!(id = %record.id, error = %e, "Failed to score competitor");
                        if fail_fast {
                            return Err(SkillScoreError::Internal(format!(
                                "Scoring failed for {}: {}",
                                record.id, e
                            )));
                        }
                        ScoredRecord {
                            id: record.id.clone(),
                            algorithm: scoring.algorithm(),
                            score: None,
                            error: Some(e.to_string()),
                        }
                    }
                };
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                Ok(scored)
            })
            .collect()
    }

    /// Write results as CSV with columns `id, algorithm, score, error`
    pub fn write_results<W: Write>(results: &[ScoredRecord], writer: W) -> Result<()> {
        let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
        for result in results {
            writer.serialize(result).map_err(BatchError::from)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write results to a CSV file
    pub fn write_results_to_path<P: AsRef<Path>>(results: &[ScoredRecord], path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| BatchError::ExportFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::write_results(results, file)?;
        info!("Wrote {} results to {}", results.len(), path.display());
        Ok(())
    }
}

impl Default for BatchScorer {
    fn default() -> Self {
        Self::new()
    }
}
