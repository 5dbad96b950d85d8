use std::collections::HashSet;
use std::mem::take;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, info, warn};

use crate::error::CatalogError;
use crate::model::{ScheduleRow, SectionInfo, SectionMap};

/// Columns kept from the schedule export. Anything else is dropped at load.
const COLUMNS: [&str; 13] = [
    "SUBJ",
    "NUMB",
    "SEC",
    "M",
    "T",
    "W",
    "TH",
    "F",
    "INSTRUCTOR",
    "TIME",
    "BLDG",
    "ROOM",
    "AVAIL",
];

const SPREADSHEET_EXTS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// In-memory schedule export, queried by subject + course number.
#[derive(Debug, Clone, Default)]
pub struct SectionTable {
    rows: Vec<ScheduleRow>,
    subjects: HashSet<String>,
    course_tags: HashSet<String>,
}

impl SectionTable {
    pub fn from_rows(rows: Vec<ScheduleRow>) -> Self {
        let subjects = rows.iter().map(|r| r.subject.clone()).collect();
        let course_tags = rows.iter().map(|r| r.course_tag()).collect();
        Self {
            rows,
            subjects,
            course_tags,
        }
    }

    /// Load a CSV or spreadsheet schedule export.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let unavailable = |reason: String| CatalogError::DataUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let grid = if SPREADSHEET_EXTS.contains(&ext.as_str()) {
            read_spreadsheet(path).map_err(unavailable)?
        } else {
            let text = std::fs::read_to_string(path).map_err(|e| unavailable(e.to_string()))?;
            parse_csv(&text)
        };

        let rows = rows_from_grid(grid).map_err(unavailable)?;
        info!("Retrieving course data from {} ({} rows)", path.display(), rows.len());
        Ok(Self::from_rows(rows))
    }

    /// Load, degrading to an empty table when the file is unavailable.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(table) => table,
            Err(e) => {
                warn!("{}; continuing with no sections", e);
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn has_subject(&self, subject: &str) -> bool {
        self.subjects.contains(subject)
    }

    /// True when at least one row carries this "SUBJ-NUM" tag.
    pub fn has_course(&self, tag: &str) -> bool {
        self.course_tags.contains(tag)
    }

    /// Rows matching subject and number exactly, in file order.
    pub fn rows_for<'a>(
        &'a self,
        subject: &'a str,
        number: &'a str,
    ) -> impl Iterator<Item = &'a ScheduleRow> + 'a {
        self.rows
            .iter()
            .filter(move |r| r.subject == subject && r.number == number)
    }

    /// Section map for one course. Later rows for the same section id win.
    pub fn sections_for(&self, subject: &str, number: &str) -> SectionMap {
        let mut sections = SectionMap::new();
        for row in self.rows_for(subject, number) {
            sections.insert(row.section.clone(), section_info(row));
        }
        sections
    }
}

/// Reshape one schedule row. Blank weekday markers are skipped.
pub fn section_info(row: &ScheduleRow) -> SectionInfo {
    let date = row
        .weekdays()
        .into_iter()
        .filter(|d| !d.trim().is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    SectionInfo {
        instructor: row.instructor.clone(),
        time: row.time.clone(),
        date,
        building: row.building.clone(),
        room: row.room.clone(),
        avail: row.avail,
    }
}

fn rows_from_grid(grid: Vec<Vec<String>>) -> Result<Vec<ScheduleRow>, String> {
    let mut lines = grid.into_iter();
    let header = lines.next().ok_or_else(|| "file is empty".to_string())?;

    let mut idx = [0usize; COLUMNS.len()];
    for (slot, name) in idx.iter_mut().zip(COLUMNS) {
        *slot = header
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| format!("missing column {}", name))?;
    }
    let dropped: Vec<&str> = header
        .iter()
        .map(|h| h.trim())
        .filter(|h| !COLUMNS.contains(h))
        .collect();
    if !dropped.is_empty() {
        debug!("Dropping schedule columns: {}", dropped.join(", "));
    }

    let mut rows = Vec::new();
    for line in lines {
        let cell = |i: usize| line.get(idx[i]).cloned().unwrap_or_default();
        let subject = cell(0).trim().to_string();
        if subject.is_empty() {
            continue;
        }
        rows.push(ScheduleRow {
            subject,
            number: cell(1).trim().to_string(),
            section: cell(2).trim().to_string(),
            mon: cell(3),
            tue: cell(4),
            wed: cell(5),
            thu: cell(6),
            fri: cell(7),
            instructor: cell(8).trim().to_string(),
            time: cell(9).trim().to_string(),
            building: cell(10).trim().to_string(),
            room: cell(11).trim().to_string(),
            avail: parse_avail(&cell(12)),
        });
    }
    Ok(rows)
}

fn parse_avail(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Some(n);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 => Some(f as i64),
        _ => {
            warn!("Non-numeric AVAIL value {:?}", raw);
            None
        }
    }
}

/// Quote-aware CSV parser (CRLF tolerant, `""` escapes).
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

fn read_spreadsheet(path: &Path) -> Result<Vec<Vec<String>>, String> {
    let mut workbook = open_workbook_auto(path).map_err(|e| e.to_string())?;
    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "workbook has no sheets".to_string())?;
    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| e.to_string())?;

    Ok(range
        .rows()
        .map(|r| r.iter().map(cell_to_string).collect())
        .collect())
}

fn cell_to_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(d) => d.to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Empty | Data::Error(_) => String::new(),
    }
}
