use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use timetable_maker::{
    helpers::substitute::PlaceholderPolicy, service::BlankPathPolicy, DocxPackage,
    TimetableConfig, TimetableService,
};

#[derive(Parser)]
#[command(
    name = "timetable-maker",
    version,
    about = "Expand a one-week .docx template into a full-year timetable"
)]
struct Cli {
    /// Template documents; each one produces a sibling `<name>_output.<ext>`
    #[arg(required = true)]
    paths: Vec<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Name written in place of the owner placeholder
    #[arg(long, env = "TIMETABLE_OWNER")]
    owner: Option<String>,

    /// Number of weeks to generate
    #[arg(long)]
    weeks: Option<u32>,

    /// Font applied to every run of the cloned paragraphs
    #[arg(long)]
    font: Option<String>,

    /// Date the first week is anchored on (YYYY-MM-DD), defaults to today
    #[arg(long)]
    today: Option<NaiveDate>,

    /// Rewrite placeholders split over several runs instead of failing
    #[arg(long)]
    merge_split_runs: bool,

    /// Stop the whole batch at the first blank path
    #[arg(long)]
    abort_on_blank: bool,

    /// Replace output files that already exist
    #[arg(long)]
    overwrite: bool,

    /// Print the block outline of each template and exit
    #[arg(long)]
    dump: bool,

    /// Like --dump, as JSON
    #[arg(long, conflicts_with = "dump")]
    dump_json: bool,
}

impl Cli {
    fn load_config(&self) -> Result<TimetableConfig> {
        let mut config = match &self.config {
            Some(path) => TimetableConfig::load(path)
                .with_context(|| format!("Loading configuration {}", path.display()))?,
            None => TimetableConfig::default(),
        };

        if let Some(owner) = &self.owner {
            config.owner_name = owner.clone();
        }
        if let Some(weeks) = self.weeks {
            config.weeks = weeks;
        }
        if let Some(font) = &self.font {
            config.font = font.clone();
        }
        if self.merge_split_runs {
            config.placeholder_policy = PlaceholderPolicy::MergeRuns;
        }
        if self.abort_on_blank {
            config.blank_path_policy = BlankPathPolicy::Abort;
        }
        if self.overwrite {
            config.overwrite = true;
        }

        Ok(config)
    }
}

fn dump(paths: &[String], json: bool) -> Result<()> {
    for path in paths.iter().filter(|path| !path.trim().is_empty()) {
        let package = DocxPackage::open(path).with_context(|| format!("Opening {path}"))?;
        let body = package.body()?;

        if json {
            println!("{}", serde_json::to_string_pretty(&body.outline())?);
        } else {
            println!("{path}");
            print!("{body}");
        }
    }
    Ok(())
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if cli.dump || cli.dump_json {
        dump(&cli.paths, cli.dump_json)?;
        return Ok(ExitCode::SUCCESS);
    }

    let service = TimetableService::new(cli.load_config()?)?;
    let today = cli.today.unwrap_or_else(|| Local::now().date_naive());
    info!("Starting timetable generation for {} path(s), today is {}", cli.paths.len(), today);

    let report = service.process_paths(&cli.paths, today);

    for output in report.succeeded() {
        println!("{}", output.display());
    }
    for (outcome, err) in report.failed() {
        error!("#{} '{}': {}", outcome.index, outcome.input, err);
    }
    if report.not_processed() > 0 {
        error!("{} path(s) were not processed", report.not_processed());
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
