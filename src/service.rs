use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::{
    error::{Result, TimetableError},
    helpers::{
        dates,
        docx::DocxPackage,
        substitute::{normalize_fonts, substitute, PlaceholderPolicy},
    },
    models::document::{Block, BlockKind, Body},
};

/// What a blank entry in the input list does to the rest of the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlankPathPolicy {
    /// Record the entry as failed and carry on with the next one.
    #[default]
    Skip,
    /// Record the entry as failed and leave every later entry unprocessed.
    Abort,
}

/// Largest accepted week count (ten years of weeks).
pub const MAX_WEEKS: u32 = 520;

/// Configuration for the timetable service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimetableConfig {
    pub owner_name: String,
    pub weeks: u32,
    pub font: String,
    pub owner_marker: String,
    pub interval_marker: String,
    pub date_format: String,
    pub output_suffix: String,
    pub placeholder_policy: PlaceholderPolicy,
    pub blank_path_policy: BlankPathPolicy,
    /// Replace an existing output file instead of failing.
    pub overwrite: bool,
}

impl Default for TimetableConfig {
    fn default() -> Self {
        Self {
            owner_name: "Nguyễn Quốc Đạt".to_string(),
            weeks: 53,
            font: "Arial".to_string(),
            owner_marker: "[OwnerName]".to_string(),
            interval_marker: "[TimeInterval]".to_string(),
            date_format: dates::DEFAULT_DATE_FORMAT.to_string(),
            output_suffix: "_output".to_string(),
            placeholder_policy: PlaceholderPolicy::default(),
            blank_path_policy: BlankPathPolicy::default(),
            overwrite: false,
        }
    }
}

impl TimetableConfig {
    /// Load a JSON configuration file; missing fields take their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());

        let text = fs::read_to_string(path).map_err(|source| TimetableError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&text).map_err(|e| TimetableError::Config {
            message: format!("{}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |message: &str| {
            Err(TimetableError::Config {
                message: message.to_string(),
            })
        };

        if self.weeks == 0 || self.weeks > MAX_WEEKS {
            return invalid(&format!("weeks must be between 1 and {MAX_WEEKS}"));
        }
        if self.owner_marker.is_empty() || self.interval_marker.is_empty() {
            return invalid("placeholder markers must not be empty");
        }
        if self.owner_marker == self.interval_marker {
            return invalid("owner and interval markers must differ");
        }
        if self.font.trim().is_empty() {
            return invalid("font must not be empty");
        }
        if self.output_suffix.is_empty() {
            return invalid("output suffix must not be empty");
        }
        if !dates::validate_pattern(&self.date_format) {
            return invalid("date format is not a valid chrono pattern");
        }
        Ok(())
    }
}

/// What happened to one entry of the input list.
#[derive(Debug)]
pub enum ItemStatus {
    Generated(PathBuf),
    Failed(TimetableError),
    /// Left untouched because an earlier entry aborted the batch.
    NotProcessed,
}

#[derive(Debug)]
pub struct ItemOutcome {
    pub index: usize,
    pub input: String,
    pub status: ItemStatus,
}

/// Per-entry results of a batch, in input order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &PathBuf> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.status {
            ItemStatus::Generated(path) => Some(path),
            _ => None,
        })
    }

    pub fn failed(&self) -> impl Iterator<Item = (&ItemOutcome, &TimetableError)> {
        self.outcomes.iter().filter_map(|outcome| match &outcome.status {
            ItemStatus::Failed(err) => Some((outcome, err)),
            _ => None,
        })
    }

    pub fn not_processed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, ItemStatus::NotProcessed))
            .count()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes
            .iter()
            .all(|outcome| matches!(outcome.status, ItemStatus::Generated(_)))
    }
}

/// `dir/stem.ext` becomes `dir/stem{suffix}.ext`.
pub fn output_path_for(path: &Path, suffix: &str) -> Result<PathBuf> {
    let invalid = |reason: &str| TimetableError::InvalidPath {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let stem = path
        .file_stem()
        .and_then(OsStr::to_str)
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| invalid("missing file name"))?;
    let extension = path
        .extension()
        .and_then(OsStr::to_str)
        .filter(|ext| !ext.is_empty())
        .ok_or_else(|| invalid("missing document extension"))?;

    Ok(path.with_file_name(format!("{stem}{suffix}.{extension}")))
}

/// The timetable service: expands week templates into full timetables
#[derive(Debug, Clone)]
pub struct TimetableService {
    pub config: TimetableConfig,
}

impl TimetableService {
    /// Create a new timetable service instance
    pub fn new(config: TimetableConfig) -> Result<Self> {
        config.validate()?;
        info!(
            "Creating new TimetableService instance ({} weeks for {})",
            config.weeks, config.owner_name
        );
        Ok(Self { config })
    }

    /// One week block: fresh clones of the repeatable template blocks with both
    /// placeholders filled in.
    pub fn build_week(&self, template: &Body, interval: &str) -> Result<Vec<Block>> {
        let config = &self.config;
        let mut week = template.clone_blocks(BlockKind::REPEATABLE);

        normalize_fonts(&mut week, &config.font);
        substitute(
            &mut week,
            &config.owner_marker,
            &config.owner_name,
            config.placeholder_policy,
        )?;
        substitute(
            &mut week,
            &config.interval_marker,
            interval,
            config.placeholder_policy,
        )?;

        Ok(week)
    }

    /// All week blocks in date order, followed by the template's section properties.
    pub fn build_body(&self, template: &Body, anchor: NaiveDate) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();

        for (offset, interval) in
            dates::week_ranges(anchor, self.config.weeks, &self.config.date_format).enumerate()
        {
            let week = self.build_week(template, &interval)?;
            debug!(
                "Built week {} ({}) with {} block(s)",
                offset,
                interval,
                week.len()
            );
            blocks.extend(week);
        }

        blocks.extend(template.clone_blocks(BlockKind::TRAILING));
        Ok(blocks)
    }

    /// Generate the timetable for one template; returns the output path.
    pub fn generate(&self, template_path: &Path, today: NaiveDate) -> Result<PathBuf> {
        self.try_generate(template_path, today)
            .map_err(|e| e.for_template(template_path))
    }

    fn try_generate(&self, template_path: &Path, today: NaiveDate) -> Result<PathBuf> {
        info!("Processing template: {}", template_path.display());

        let output_path = output_path_for(template_path, &self.config.output_suffix)?;
        if !self.config.overwrite && output_path.exists() {
            return Err(TimetableError::OutputExists { path: output_path });
        }

        let template = DocxPackage::open(template_path)?;
        let body = template.body()?;
        info!(
            "Template has {} paragraph(s) and {} table(s)",
            body.count(BlockKind::Paragraph),
            body.count(BlockKind::Table)
        );

        let anchor = dates::week_anchor(today);
        let blocks = self.build_body(&body, anchor)?;

        if self.config.overwrite && output_path.exists() {
            warn!("Overwriting existing file {}", output_path.display());
        }
        template
            .with_body(blocks)?
            .save(&output_path, self.config.overwrite)?;

        Ok(output_path)
    }

    /// Process every path in order. A failing entry never stops the entries after it,
    /// except a blank one under [`BlankPathPolicy::Abort`].
    pub fn process_paths<I, S>(&self, paths: I, today: NaiveDate) -> BatchReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = BatchReport::default();
        let mut aborted = false;

        for (index, input) in paths.into_iter().enumerate() {
            let input = input.as_ref().to_string();

            if aborted {
                report.outcomes.push(ItemOutcome {
                    index,
                    input,
                    status: ItemStatus::NotProcessed,
                });
                continue;
            }

            let status = if input.trim().is_empty() {
                match self.config.blank_path_policy {
                    BlankPathPolicy::Skip => {
                        warn!("Skipping blank path at position {}", index);
                    }
                    BlankPathPolicy::Abort => {
                        error!("Blank path at position {}, aborting batch", index);
                        aborted = true;
                    }
                }
                ItemStatus::Failed(TimetableError::BlankPath { index })
            } else {
                match self.generate(Path::new(&input), today) {
                    Ok(output) => {
                        info!("Timetable written to {}", output.display());
                        ItemStatus::Generated(output)
                    }
                    Err(e) => {
                        error!("Failed to generate timetable: {}", e);
                        ItemStatus::Failed(e)
                    }
                }
            };

            report.outcomes.push(ItemOutcome {
                index,
                input,
                status,
            });
        }

        report
    }
}
