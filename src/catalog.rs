use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::CatalogError;
use crate::fetch::CatalogSource;
use crate::model::{CourseDirectory, CourseRecord};
use crate::parser::{self, fields::CourseFields};
use crate::schedule::SectionTable;

/// What to do when a subject page cannot be fetched after retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OnFetchFailure {
    /// Stop the whole run with the fetch error.
    Abort,
    /// Log the failure and leave the subject out.
    #[default]
    Skip,
}

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Keep catalog courses with no schedule rows.
    pub include_all: bool,
    /// Only fetch subjects that appear in the schedule.
    pub strict_subjects: bool,
    pub on_fetch_failure: OnFetchFailure,
    /// Subject pages fetched concurrently. 1 = strictly sequential.
    pub jobs: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            include_all: true,
            strict_subjects: true,
            on_fetch_failure: OnFetchFailure::Skip,
            jobs: 1,
        }
    }
}

/// Join extracted fields with the schedule. `None` when the course has no
/// schedule rows and `include_all` is off.
pub fn build_record(
    fields: CourseFields,
    table: &SectionTable,
    include_all: bool,
) -> Option<CourseRecord> {
    if !include_all && !table.has_course(&fields.tag) {
        return None;
    }

    let sections = match fields.tag.split_once('-') {
        Some((subject, number)) => table.sections_for(subject, number),
        None => Default::default(),
    };

    Some(CourseRecord {
        tag: fields.tag,
        name: fields.name,
        coreqs: fields.coreqs,
        prereqs: fields.prereqs,
        standing: fields.standing,
        desc: fields.desc,
        sections,
        credits: fields.credits,
    })
}

/// Records for one subject page, keyed by course tag.
pub fn subject_courses(
    subject: &str,
    html: &str,
    table: &SectionTable,
    include_all: bool,
) -> BTreeMap<String, CourseRecord> {
    parser::parse_page(subject, html)
        .into_iter()
        .filter_map(|f| build_record(f, table, include_all))
        .map(|r| (r.tag.clone(), r))
        .collect()
}

/// Scrape every subject and assemble the course directory.
pub async fn build_directory<S: CatalogSource>(
    subjects: &[String],
    source: &S,
    table: &SectionTable,
    opts: &AggregateOptions,
) -> Result<CourseDirectory, CatalogError> {
    // An empty schedule would filter out every subject.
    let strict = opts.strict_subjects && !table.is_empty();
    if opts.strict_subjects && !strict {
        warn!("Schedule is empty; fetching every subject without the schedule filter");
    }

    let selected: Vec<&String> = subjects
        .iter()
        .filter(|s| {
            let keep = !strict || table.has_subject(s);
            if !keep {
                info!("Skipping {}: no rows in schedule", s);
            }
            keep
        })
        .collect();

    let pb = ProgressBar::new(selected.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut pages = std::pin::pin!(stream::iter(selected)
        .map(|subject| async move { (subject, source.fetch(subject).await) })
        .buffered(opts.jobs.max(1)));

    let mut directory = CourseDirectory::new();
    while let Some((subject, page)) = pages.next().await {
        pb.set_message(subject.clone());
        match page {
            Ok(html) => {
                info!("Parsing data for {}", subject);
                let courses = subject_courses(subject, &html, table, opts.include_all);
                info!("{}: {} courses", subject, courses.len());
                directory.insert(subject.clone(), courses);
            }
            Err(e) => match opts.on_fetch_failure {
                OnFetchFailure::Abort => {
                    pb.abandon();
                    return Err(e);
                }
                OnFetchFailure::Skip => warn!("{}; skipping subject", e),
            },
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(directory)
}
