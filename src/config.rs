use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use tracing::info;

use crate::catalog::{AggregateOptions, OnFetchFailure};
use crate::electives::ElectiveRule;
use crate::export::ExportFormat;
use crate::fetch::{RetryPolicy, DEFAULT_ATTEMPTS, DEFAULT_BACKOFF_MS, DEFAULT_TIMEOUT_SECS};

pub const DEFAULT_CONFIG_PATH: &str = "data/config.yml";
const ENV_PREFIX: &str = "COURSES";

/// Settings document. Catalog level names are lowercase keys.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub settings: AppSettings,
    pub catalog: HashMap<String, CatalogLevel>,
    #[serde(default)]
    pub defaults: Defaults,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub electives: ElectiveSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogLevel {
    pub url: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub term: String,
    pub level: String,
    pub export_type: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            term: String::new(),
            level: "undergrad".into(),
            export_type: "xlsx".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub on_failure: OnFetchFailure,
    pub attempts: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
    pub jobs: usize,
    pub strict_subjects: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            on_failure: OnFetchFailure::Skip,
            attempts: DEFAULT_ATTEMPTS,
            backoff_ms: DEFAULT_BACKOFF_MS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            jobs: 1,
            strict_subjects: true,
        }
    }
}

impl FetchSettings {
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.attempts,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElectiveSettings {
    #[serde(default = "ElectiveRule::mechanical")]
    pub mechanical: ElectiveRule,
    #[serde(default = "ElectiveRule::advanced")]
    pub advanced: ElectiveRule,
}

impl Default for ElectiveSettings {
    fn default() -> Self {
        Self {
            mechanical: ElectiveRule::mechanical(),
            advanced: ElectiveRule::advanced(),
        }
    }
}

impl ElectiveSettings {
    /// Rules from the settings file, or the built-in rules when there is no
    /// settings file. A file that exists but does not load is an error.
    pub fn load_or_builtin(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No settings at {}; using built-in elective rules", path.display());
            return Ok(Self::default());
        }
        Ok(Settings::load(path)?.electives)
    }
}

impl Settings {
    /// Read the settings file, with `COURSES__SECTION__KEY` environment
    /// variables layered on top.
    pub fn load(path: &Path) -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to read settings from {}", path.display()))?
            .try_deserialize()
            .with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn level(&self, name: &str) -> Result<&CatalogLevel> {
        self.catalog.get(&name.to_lowercase()).ok_or_else(|| {
            let mut known: Vec<&String> = self.catalog.keys().collect();
            known.sort();
            anyhow!("Unknown catalog level {:?} (configured: {:?})", name, known)
        })
    }
}

/// Extra files produced alongside the full directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpecialExports {
    pub mechanical: bool,
    pub advanced: bool,
    pub by_subject: bool,
}

/// Everything one run needs, fixed before any work starts.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub term: String,
    pub level: String,
    pub schedule: PathBuf,
    pub catalog_url: String,
    pub subjects: Vec<String>,
    pub format: ExportFormat,
    pub out_dir: PathBuf,
    pub exports: SpecialExports,
    pub aggregate: AggregateOptions,
    pub retry: RetryPolicy,
    pub timeout: Duration,
    pub mechanical: ElectiveRule,
    pub advanced: ElectiveRule,
}

impl RunRequest {
    /// `{out}/{TERM}_{label}.{ext}`.
    pub fn output_path(&self, label: &str) -> PathBuf {
        self.out_dir.join(format!(
            "{}_{}.{}",
            term_code(&self.term),
            label,
            self.format.extension()
        ))
    }
}

/// "Summer 2024" → "S2024", "Winter 2025" → "W2025".
pub fn term_code(term: &str) -> String {
    term.replace("Summer", "S")
        .replace("Winter", "W")
        .replace(' ', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
settings:
  title: Course Directory
  version: "1.0"
  export_filetypes: [Excel, YAML, JSON]
catalog:
  undergrad:
    url: https://catalog.example.edu/coursesaz/undergrad/
    tags: [MATH, MECH]
  grad:
    url: https://catalog.example.edu/coursesaz/grad/
    tags: [MECH]
defaults:
  term: Winter 2025
  level: Undergrad
  export_type: Excel
fetch:
  on_failure: abort
  jobs: 2
electives:
  mechanical:
    min_level: 300
    max_level: 600
    upper_inclusive: true
    exclude: [COMM]
"#;

    fn sample() -> Settings {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, SAMPLE).unwrap();
        Settings::load(&path).unwrap()
    }

    #[test]
    fn loads_levels_and_defaults() {
        let s = sample();
        assert_eq!(s.defaults.term, "Winter 2025");
        let level = s.level("Undergrad").unwrap();
        assert_eq!(level.tags, vec!["MATH", "MECH"]);
        assert!(s.level("doctoral").is_err());
    }

    #[test]
    fn fetch_section_merges_defaults() {
        let s = sample();
        assert_eq!(s.fetch.on_failure, OnFetchFailure::Abort);
        assert_eq!(s.fetch.attempts, DEFAULT_ATTEMPTS);
        assert_eq!(s.fetch.retry().backoff, Duration::from_millis(1000));
    }

    #[test]
    fn elective_rules_from_file_and_defaults() {
        let s = sample();
        assert!(s.electives.mechanical.upper_inclusive);
        assert_eq!(s.electives.mechanical.exclude, vec!["COMM"]);
        assert_eq!(s.electives.advanced, ElectiveRule::advanced());
    }

    #[test]
    fn shipped_config_matches_builtin_rules() {
        let s = Settings::load(Path::new(DEFAULT_CONFIG_PATH)).unwrap();
        assert_eq!(s.electives.mechanical, ElectiveRule::mechanical());
        assert_eq!(s.electives.advanced, ElectiveRule::advanced());
        assert!(s.level("grad").is_ok());
    }

    #[test]
    fn output_paths_use_term_code() {
        let s = sample();
        let level = s.level("undergrad").unwrap();
        let request = RunRequest {
            term: "Summer 2024".into(),
            level: "Undergrad".into(),
            schedule: PathBuf::from("schedule.csv"),
            catalog_url: level.url.clone(),
            subjects: level.tags.clone(),
            format: ExportFormat::from_selector("Excel"),
            out_dir: PathBuf::from("exports"),
            exports: SpecialExports::default(),
            aggregate: AggregateOptions::default(),
            retry: s.fetch.retry(),
            timeout: s.fetch.timeout(),
            mechanical: s.electives.mechanical.clone(),
            advanced: s.electives.advanced.clone(),
        };
        assert_eq!(request.output_path("Undergrad"), Path::new("exports/S2024_Undergrad.xlsx"));
        assert_eq!(request.output_path("MECH"), Path::new("exports/S2024_MECH.xlsx"));
    }

    #[test]
    fn missing_file_is_error() {
        assert!(Settings::load(Path::new("no/such/config.yml")).is_err());
    }

    #[test]
    fn partial_defaults_section_fills_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "catalog:\n  undergrad:\n    url: https://catalog.example.edu/\n    tags: [MATH]\ndefaults:\n  term: Fall 2024\n",
        )
        .unwrap();
        let s = Settings::load(&path).unwrap();
        assert_eq!(s.defaults.term, "Fall 2024");
        assert_eq!(s.defaults.level, "undergrad");
        assert_eq!(s.defaults.export_type, "xlsx");
    }

    #[test]
    fn elective_rules_without_settings_file_are_builtin() {
        let rules = ElectiveSettings::load_or_builtin(Path::new("no/such/config.yml")).unwrap();
        assert_eq!(rules.mechanical, ElectiveRule::mechanical());
        assert_eq!(rules.advanced, ElectiveRule::advanced());
    }

    #[test]
    fn elective_rules_from_broken_settings_file_are_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "electives:\n  mechanical: [unclosed\n").unwrap();
        assert!(ElectiveSettings::load_or_builtin(&path).is_err());
    }

    #[test]
    fn term_codes() {
        assert_eq!(term_code("Summer 2024"), "S2024");
        assert_eq!(term_code("Winter 2025"), "W2025");
        assert_eq!(term_code("Fall 2024"), "Fall2024");
    }
}
