use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Subject code ("MATH") → course tag ("MATH-204") → record.
pub type CourseDirectory = BTreeMap<String, BTreeMap<String, CourseRecord>>;

/// Section identifier ("A", "01") → meeting details.
pub type SectionMap = BTreeMap<String, SectionInfo>;

/// One row of the administrative schedule export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRow {
    pub subject: String,
    pub number: String,
    pub section: String,
    pub mon: String,
    pub tue: String,
    pub wed: String,
    pub thu: String,
    pub fri: String,
    pub instructor: String,
    pub time: String,
    pub building: String,
    pub room: String,
    pub avail: Option<i64>,
}

impl ScheduleRow {
    pub fn course_tag(&self) -> String {
        format!("{}-{}", self.subject, self.number)
    }

    /// Weekday markers in Mon..Fri order.
    pub fn weekdays(&self) -> [&str; 5] {
        [
            self.mon.as_str(),
            self.tue.as_str(),
            self.wed.as_str(),
            self.thu.as_str(),
            self.fri.as_str(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionInfo {
    pub instructor: String,
    pub time: String,
    pub date: String,
    pub building: String,
    pub room: String,
    pub avail: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub tag: String,
    pub name: String,
    pub coreqs: String,
    pub prereqs: String,
    pub standing: String,
    pub desc: String,
    pub sections: SectionMap,
    pub credits: String,
}

pub fn course_count(directory: &CourseDirectory) -> usize {
    directory.values().map(|courses| courses.len()).sum()
}
