use serde::Deserialize;

use crate::error::CatalogError;
use crate::model::CourseDirectory;

const MECH_EXCLUDE: &[&str] = &[
    "COMM", "ECON", "BUSN", "MGMT", "HIST", "HUMN", "CILE", "LA", "LIT", "PHIL", "SSCI",
    "MECH-231L", "EE-212", "MECH-300", "MECH-307", "MECH-310", "MECH-312", "MECH-320",
    "MECH-322", "MECH-330", "MECH-331", "MECH-420", "MECH-422", "MECH-430", "MECH-431",
];

const MECH_INCLUDE: &[&str] = &[
    "BUSN-303", "BUSN-304", "MGMT-310", "MGMT-419", "MGMT-546", "MECH-448", "MECH-495",
];

/// Level window plus exclusion rules for one elective category.
///
/// A course is rejected when its subject code, numeric level, or full tag is
/// listed in `exclude`, unless the full tag is listed in `include`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ElectiveRule {
    #[serde(default)]
    pub min_level: Option<u32>,
    pub max_level: u32,
    #[serde(default)]
    pub upper_inclusive: bool,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
}

impl ElectiveRule {
    /// 300 ≤ level < 600 with the departmental exclusion lists.
    pub fn mechanical() -> Self {
        Self {
            min_level: Some(300),
            max_level: 600,
            upper_inclusive: false,
            exclude: MECH_EXCLUDE.iter().map(|s| s.to_string()).collect(),
            include: MECH_INCLUDE.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// level < 600, no lower bound, same exclusion lists.
    pub fn advanced() -> Self {
        Self {
            min_level: None,
            ..Self::mechanical()
        }
    }

    pub fn in_range(&self, level: u32) -> bool {
        let above_min = self.min_level.map_or(true, |min| level >= min);
        let below_max = if self.upper_inclusive {
            level <= self.max_level
        } else {
            level < self.max_level
        };
        above_min && below_max
    }

    pub fn is_excluded(&self, subject: &str, number: &str, tag: &str) -> bool {
        if self.include.iter().any(|t| t == tag) {
            return false;
        }
        self.exclude
            .iter()
            .any(|e| e == subject || e == number || e == tag)
    }

    pub fn accepts(&self, tag: &str) -> Result<bool, CatalogError> {
        let level = CourseLevel::parse(tag)?;
        Ok(self.in_range(level.level) && !self.is_excluded(level.subject, level.number, tag))
    }
}

/// "MECH-231L" → subject "MECH", number "231", level 231.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CourseLevel<'a> {
    pub subject: &'a str,
    pub number: &'a str,
    pub level: u32,
}

impl<'a> CourseLevel<'a> {
    pub fn parse(tag: &'a str) -> Result<Self, CatalogError> {
        let bad = || CatalogError::ClassificationParse {
            tag: tag.to_string(),
            number: tag.split_once('-').map(|(_, n)| n).unwrap_or("").to_string(),
        };

        let (subject, raw) = tag.split_once('-').ok_or_else(bad)?;
        // Lab sections carry a one-letter suffix.
        let number = match raw.chars().last() {
            Some(c) if !c.is_ascii_digit() => &raw[..raw.len() - c.len_utf8()],
            _ => raw,
        };
        let level = number.parse::<u32>().map_err(|_| bad())?;
        Ok(Self {
            subject,
            number,
            level,
        })
    }
}

/// Derive the subset of `directory` accepted by `rule`. Subjects left with
/// no courses are dropped. Any unparseable course level fails the whole call.
pub fn classify(
    directory: &CourseDirectory,
    rule: &ElectiveRule,
) -> Result<CourseDirectory, CatalogError> {
    let mut electives = CourseDirectory::new();

    for (subject, courses) in directory {
        let mut kept = std::collections::BTreeMap::new();
        for (tag, course) in courses {
            if rule.accepts(tag)? {
                kept.insert(tag.clone(), course.clone());
            }
        }
        if !kept.is_empty() {
            electives.insert(subject.clone(), kept);
        }
    }

    Ok(electives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CourseRecord;
    use test_case::test_case;

    fn course(tag: &str) -> CourseRecord {
        CourseRecord {
            tag: tag.into(),
            name: "Name".into(),
            coreqs: "None".into(),
            prereqs: "None".into(),
            standing: "Freshman".into(),
            desc: "Desc".into(),
            sections: Default::default(),
            credits: "4".into(),
        }
    }

    fn directory(tags: &[&str]) -> CourseDirectory {
        let mut dir = CourseDirectory::new();
        for tag in tags {
            let subject = tag.split('-').next().unwrap().to_string();
            dir.entry(subject)
                .or_default()
                .insert(tag.to_string(), course(tag));
        }
        dir
    }

    fn open_rule() -> ElectiveRule {
        ElectiveRule {
            exclude: vec![],
            include: vec![],
            ..ElectiveRule::mechanical()
        }
    }

    #[test_case("MECH-231L", "MECH", "231", 231 ; "lab suffix stripped")]
    #[test_case("MECH-330", "MECH", "330", 330 ; "plain number")]
    #[test_case("EE-5", "EE", "5", 5 ; "short number")]
    fn parses_levels(tag: &str, subject: &str, number: &str, level: u32) {
        let parsed = CourseLevel::parse(tag).unwrap();
        assert_eq!(parsed.subject, subject);
        assert_eq!(parsed.number, number);
        assert_eq!(parsed.level, level);
    }

    #[test_case("MECH-TBD" ; "letters")]
    #[test_case("MECH-" ; "empty number")]
    #[test_case("MECH330" ; "no dash")]
    fn bad_levels_error(tag: &str) {
        assert!(matches!(
            CourseLevel::parse(tag),
            Err(CatalogError::ClassificationParse { .. })
        ));
    }

    #[test]
    fn lab_below_range_excluded() {
        assert!(!open_rule().accepts("MECH-231L").unwrap());
        assert!(open_rule().accepts("MECH-330").unwrap());
    }

    #[test]
    fn exclusion_list_rejects_tag() {
        let rule = ElectiveRule {
            exclude: vec!["MECH-330".into()],
            ..open_rule()
        };
        assert!(!rule.accepts("MECH-330").unwrap());
    }

    #[test]
    fn inclusion_overrides_subject_exclusion() {
        let rule = ElectiveRule::mechanical();
        assert!(!rule.accepts("BUSN-305").unwrap());
        assert!(rule.accepts("BUSN-303").unwrap());
        assert!(rule.accepts("MECH-448").unwrap());
    }

    #[test]
    fn numeric_level_exclusion() {
        let rule = ElectiveRule {
            exclude: vec!["450".into()],
            ..open_rule()
        };
        assert!(!rule.accepts("CHEM-450").unwrap());
        assert!(!rule.accepts("CHEM-450L").unwrap());
        assert!(rule.accepts("CHEM-451").unwrap());
    }

    #[test_case(false, false ; "exclusive upper bound")]
    #[test_case(true, true ; "inclusive upper bound")]
    fn upper_bound(inclusive: bool, accepts_600: bool) {
        let rule = ElectiveRule {
            upper_inclusive: inclusive,
            ..open_rule()
        };
        assert_eq!(rule.accepts("MECH-600").unwrap(), accepts_600);
        assert!(rule.accepts("MECH-599").unwrap());
        assert!(!rule.accepts("MECH-601").unwrap());
    }

    #[test]
    fn advanced_has_no_lower_bound() {
        let rule = ElectiveRule::advanced();
        assert!(rule.accepts("MATH-101").unwrap());
        assert!(!rule.accepts("MECH-610").unwrap());
    }

    #[test]
    fn classify_drops_empty_subjects() {
        let dir = directory(&["MECH-231L", "MECH-330", "MECH-448", "MECH-512", "MECH-610", "COMM-301"]);
        let mech = classify(&dir, &ElectiveRule::mechanical()).unwrap();
        assert_eq!(mech.keys().collect::<Vec<_>>(), vec!["MECH"]);
        assert_eq!(
            mech["MECH"].keys().collect::<Vec<_>>(),
            vec!["MECH-448", "MECH-512"]
        );
    }

    #[test]
    fn classify_surfaces_parse_errors() {
        let dir = directory(&["MECH-330", "MECH-XYZ"]);
        let err = classify(&dir, &ElectiveRule::mechanical()).unwrap_err();
        assert!(err.to_string().contains("MECH-XYZ"));
    }
}
