mod catalog;
mod config;
mod electives;
mod error;
mod export;
mod fetch;
mod model;
mod parser;
mod schedule;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;

use crate::catalog::{AggregateOptions, OnFetchFailure};
use crate::config::{ElectiveSettings, RunRequest, Settings, SpecialExports, DEFAULT_CONFIG_PATH};
use crate::electives::ElectiveRule;
use crate::export::ExportFormat;
use crate::fetch::HttpCatalog;
use crate::model::{course_count, CourseDirectory};
use crate::schedule::SectionTable;

#[derive(Parser)]
#[command(
    name = "course_directory",
    about = "Course catalog scraper cross-referenced with the term schedule"
)]
struct Cli {
    /// Settings document (catalog URLs, subject lists, elective rules)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape the catalog, join the schedule, and export the directory
    Run {
        /// Schedule export (CSV or spreadsheet)
        #[arg(short, long)]
        schedule: PathBuf,
        /// Term label, e.g. "Winter 2025" (default: settings)
        #[arg(short, long)]
        term: Option<String>,
        /// Catalog level, e.g. undergrad or grad (default: settings)
        #[arg(short, long)]
        level: Option<String>,
        /// json, yaml, or xlsx; anything else writes JSON (default: settings)
        #[arg(short, long)]
        format: Option<String>,
        /// Output directory
        #[arg(short, long, default_value = "exports")]
        out_dir: PathBuf,
        /// Drop catalog courses with no sections this term
        #[arg(long)]
        scheduled_only: bool,
        /// Also export mechanical electives
        #[arg(long)]
        mech: bool,
        /// Also export advanced electives
        #[arg(long)]
        advanced: bool,
        /// Also export one file per subject
        #[arg(long)]
        by_subject: bool,
        /// Fetch every configured subject, even ones absent from the schedule
        #[arg(long)]
        all_subjects: bool,
        #[arg(long, value_enum)]
        on_fetch_failure: Option<OnFetchFailure>,
        /// Subject pages fetched concurrently
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Derive an elective subset from a previously exported JSON directory
    Classify {
        /// JSON export produced by `run`
        input: PathBuf,
        #[arg(short, long, value_enum, default_value = "mechanical")]
        rule: RuleKind,
        #[arg(short, long, default_value = "json")]
        format: String,
        /// Output file (default: next to the input)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show the joined sections for one course
    Sections {
        #[arg(short, long)]
        schedule: PathBuf,
        subject: String,
        number: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum RuleKind {
    Mechanical,
    Advanced,
}

impl RuleKind {
    fn label(self) -> &'static str {
        match self {
            Self::Mechanical => "MECH",
            Self::Advanced => "ADV",
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            schedule,
            term,
            level,
            format,
            out_dir,
            scheduled_only,
            mech,
            advanced,
            by_subject,
            all_subjects,
            on_fetch_failure,
            jobs,
        } => {
            let settings = Settings::load(&cli.config)?;
            if !settings.settings.title.is_empty() {
                println!("{} {}", settings.settings.title, settings.settings.version);
            }
            let term = term.unwrap_or_else(|| settings.defaults.term.clone());
            let level_name = level.unwrap_or_else(|| settings.defaults.level.clone());
            let level = settings.level(&level_name)?;
            let format = format.unwrap_or_else(|| settings.defaults.export_type.clone());
            let export_format = ExportFormat::from_selector(&format);
            if export_format == ExportFormat::Json && !format.eq_ignore_ascii_case("json") {
                warn!("Unrecognised export type {:?}; writing JSON", format);
            }

            let request = RunRequest {
                term,
                level: level_name.clone(),
                schedule,
                catalog_url: level.url.clone(),
                subjects: level.tags.clone(),
                format: export_format,
                out_dir,
                exports: SpecialExports {
                    mechanical: mech,
                    advanced,
                    by_subject,
                },
                aggregate: AggregateOptions {
                    include_all: !scheduled_only,
                    strict_subjects: settings.fetch.strict_subjects && !all_subjects,
                    on_fetch_failure: on_fetch_failure.unwrap_or(settings.fetch.on_failure),
                    jobs: jobs.unwrap_or(settings.fetch.jobs),
                },
                retry: settings.fetch.retry(),
                timeout: settings.fetch.timeout(),
                mechanical: settings.electives.mechanical.clone(),
                advanced: settings.electives.advanced.clone(),
            };
            run(&request).await
        }
        Commands::Classify {
            input,
            rule,
            format,
            out,
        } => {
            let rules = ElectiveSettings::load_or_builtin(&cli.config)?;
            let rule_set = match rule {
                RuleKind::Mechanical => rules.mechanical,
                RuleKind::Advanced => rules.advanced,
            };
            classify_file(&input, rule, &rule_set, ExportFormat::from_selector(&format), out)
        }
        Commands::Sections {
            schedule,
            subject,
            number,
        } => {
            let table = SectionTable::load(&schedule)?;
            let sections = table.sections_for(&subject, &number);
            if sections.is_empty() {
                println!("No sections for {}-{}.", subject, number);
            } else {
                println!("{}", serde_json::to_string_pretty(&sections)?);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run(request: &RunRequest) -> Result<()> {
    let table = SectionTable::load_or_empty(&request.schedule);
    if table.is_empty() {
        warn!("No schedule rows loaded; every course will have zero sections");
    } else {
        println!("Loaded {} schedule rows from {}.", table.len(), request.schedule.display());
    }
    let source = HttpCatalog::new(&request.catalog_url, request.retry, request.timeout)?;

    println!(
        "Scraping {} subjects for {} ({})...",
        request.subjects.len(),
        request.term,
        request.level
    );
    let directory =
        catalog::build_directory(&request.subjects, &source, &table, &request.aggregate).await?;
    println!(
        "Collected {} courses across {} subjects.",
        course_count(&directory),
        directory.len()
    );

    std::fs::create_dir_all(&request.out_dir)
        .with_context(|| format!("Failed to create {}", request.out_dir.display()))?;

    write(&directory, request.format, &request.output_path(&request.level))?;

    if request.exports.mechanical {
        let subset = electives::classify(&directory, &request.mechanical)
            .context("Mechanical elective classification failed")?;
        write(&subset, request.format, &request.output_path("MECH"))?;
    }
    if request.exports.advanced {
        let subset = electives::classify(&directory, &request.advanced)
            .context("Advanced elective classification failed")?;
        write(&subset, request.format, &request.output_path("ADV"))?;
    }
    if request.exports.by_subject {
        for (subject, courses) in &directory {
            let single = CourseDirectory::from([(subject.clone(), courses.clone())]);
            write(&single, request.format, &request.output_path(subject))?;
        }
    }

    Ok(())
}

fn classify_file(
    input: &Path,
    kind: RuleKind,
    rule: &ElectiveRule,
    format: ExportFormat,
    out: Option<PathBuf>,
) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let directory: CourseDirectory = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a course directory export", input.display()))?;

    let subset = electives::classify(&directory, rule)?;
    let out = out.unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "courses".into());
        input.with_file_name(format!("{}_{}.{}", stem, kind.label(), format.extension()))
    });

    println!(
        "{} of {} courses qualify.",
        course_count(&subset),
        course_count(&directory)
    );
    write(&subset, format, &out)
}

fn write(directory: &CourseDirectory, format: ExportFormat, path: &Path) -> Result<()> {
    export::export(directory, format, path)
        .with_context(|| format!("Failed to export {}", path.display()))
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
