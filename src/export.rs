use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::ExportError;
use crate::model::{CourseDirectory, CourseRecord, SectionInfo};

pub const HEADERS: [&str; 12] = [
    "Tag",
    "Name",
    "Coreqs",
    "Prereqs",
    "Standing",
    "Section",
    "Instructor",
    "Time",
    "Date",
    "Building",
    "Room",
    "Avail",
];

/// Written in place of section columns for courses with no sections.
pub const ABSENT: &str = "N/A";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Json,
    Yaml,
    Xlsx,
}

impl ExportFormat {
    /// Total mapping: file extensions and display names are recognised,
    /// anything else is JSON.
    pub fn from_selector(selector: &str) -> Self {
        match selector.trim().to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Self::Yaml,
            "xlsx" | "excel" => Self::Xlsx,
            _ => Self::Json,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Xlsx => "xlsx",
        }
    }
}

/// One spreadsheet row per (course, section); sectionless courses get one
/// row with absent markers.
pub fn flatten(directory: &CourseDirectory) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for course in directory.values().flat_map(|courses| courses.values()) {
        if course.sections.is_empty() {
            rows.push(row(course, None));
        }
        for (id, section) in &course.sections {
            rows.push(row(course, Some((id, section))));
        }
    }
    rows
}

fn row(course: &CourseRecord, section: Option<(&String, &SectionInfo)>) -> Vec<String> {
    let mut cells = vec![
        course.tag.clone(),
        course.name.clone(),
        course.coreqs.clone(),
        course.prereqs.clone(),
        course.standing.clone(),
    ];
    match section {
        Some((id, s)) => cells.extend([
            id.clone(),
            s.instructor.clone(),
            s.time.clone(),
            s.date.clone(),
            s.building.clone(),
            s.room.clone(),
            s.avail.map(|a| a.to_string()).unwrap_or_else(|| ABSENT.to_string()),
        ]),
        None => cells.extend(std::iter::repeat(ABSENT.to_string()).take(7)),
    }
    cells
}

pub fn export(
    directory: &CourseDirectory,
    format: ExportFormat,
    path: &Path,
) -> Result<(), ExportError> {
    match format {
        ExportFormat::Json => write_json(directory, path)?,
        ExportFormat::Yaml => write_yaml(directory, path)?,
        ExportFormat::Xlsx => write_xlsx(directory, path)?,
    }
    info!("Exported courses to {}", path.display());
    Ok(())
}

fn write_json(directory: &CourseDirectory, path: &Path) -> Result<(), ExportError> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut out, directory)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn write_yaml(directory: &CourseDirectory, path: &Path) -> Result<(), ExportError> {
    let mut out = BufWriter::new(File::create(path)?);
    serde_yaml::to_writer(&mut out, directory)?;
    out.flush()?;
    Ok(())
}

fn write_xlsx(directory: &CourseDirectory, path: &Path) -> Result<(), ExportError> {
    let rows = flatten(directory);
    let mut book = umya_spreadsheet::new_file();
    let sheet = book
        .get_sheet_by_name_mut("Sheet1")
        .ok_or_else(|| ExportError::Sheet("new workbook has no Sheet1".into()))?;

    let mut widths: Vec<usize> = HEADERS.iter().map(|h| h.chars().count()).collect();

    for (col, header) in HEADERS.iter().enumerate() {
        sheet
            .get_cell_mut((col as u32 + 1, 1u32))
            .set_value(header.to_string());
    }
    for (r, cells) in rows.iter().enumerate() {
        let row_no = r as u32 + 2;
        for (col, value) in cells.iter().enumerate() {
            let cell = sheet.get_cell_mut((col as u32 + 1, row_no));
            // Avail stays numeric so the column sorts.
            match value.parse::<i64>() {
                Ok(n) if col == HEADERS.len() - 1 => {
                    cell.set_value_number(n as f64);
                }
                _ => {
                    cell.set_value(value.clone());
                }
            }
            widths[col] = widths[col].max(value.chars().count());
        }
    }

    for (col, width) in widths.iter().enumerate() {
        sheet
            .get_column_dimension_mut(&column_letter(col as u32 + 1))
            .set_width(*width as f64 + 2.0);
    }

    umya_spreadsheet::writer::xlsx::write(&book, path)?;
    Ok(())
}

/// 1-based column index to spreadsheet letters (1 → A, 27 → AA).
fn column_letter(mut index: u32) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}
