use std::sync::LazyLock;

use regex::Regex;

use super::blocks::RawBlock;
use super::text::{flatten, remove_newlines, strip_html};
use crate::error::CatalogError;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z&]+-[0-9A-Za-z]+$").unwrap());

const STANDING_LABEL: &str = "Minimum Class Standing:";
const PREREQ_LABEL: &str = "Prerequisites:";
const COREQ_LABEL: &str = "Corequisites:";
const CREDITS_SUFFIX: &str = " Credits";

pub const NONE: &str = "None";
pub const DEFAULT_STANDING: &str = "Freshman";

/// Departmental special-topics numbering; these descriptions vary by term.
const SPECIAL_TOPICS: &str = "391";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseFields {
    pub tag: String,
    pub name: String,
    pub credits: String,
    pub desc: String,
    pub prereqs: String,
    pub coreqs: String,
    pub standing: String,
}

/// Extract structured fields from one raw block.
///
/// Title layout is `[tag, "", name, .., "N Credits"]`; the description is the
/// third fragment from the end. Requisite and standing lines may appear in any
/// fragment, and the last occurrence of each label wins.
pub fn extract(block: &RawBlock) -> Result<CourseFields, CatalogError> {
    let malformed = |reason: String| CatalogError::MalformedCatalogBlock {
        index: block.index,
        reason,
    };

    if block.title.len() < 3 {
        return Err(malformed(format!(
            "title has {} parts, expected at least 3",
            block.title.len()
        )));
    }
    let tag = block.title[0].trim().to_string();
    if !TAG_RE.is_match(&tag) {
        return Err(malformed(format!("title tag {:?} is not SUBJ-NUM", tag)));
    }
    let name = remove_newlines(&block.title[2]).trim().to_string();
    let credits_raw = block.title[block.title.len() - 1].trim();
    let credits = credits_raw
        .strip_suffix(CREDITS_SUFFIX)
        .unwrap_or(credits_raw)
        .trim()
        .to_string();

    if block.desc.len() < 3 {
        return Err(malformed(format!(
            "{}: description has {} fragments, expected at least 3",
            tag,
            block.desc.len()
        )));
    }
    let mut desc = flatten(&strip_html(&block.desc[block.desc.len() - 3]));

    let mut standing = DEFAULT_STANDING.to_string();
    let mut prereqs = NONE.to_string();
    let mut coreqs = NONE.to_string();

    for fragment in &block.desc {
        let line = strip_html(fragment);
        if let Some(value) = labelled(&line, STANDING_LABEL) {
            standing = value;
        }
        if let Some(value) = labelled(&line, PREREQ_LABEL) {
            prereqs = value;
        }
        if let Some(value) = labelled(&line, COREQ_LABEL) {
            coreqs = value;
        }
    }

    if tag.contains(SPECIAL_TOPICS) {
        desc = NONE.to_string();
    }

    Ok(CourseFields {
        tag,
        name,
        credits,
        desc,
        prereqs,
        coreqs,
        standing,
    })
}

fn labelled(line: &str, label: &str) -> Option<String> {
    let (_, rest) = line.split_once(label)?;
    Some(remove_newlines(rest).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::blocks::course_blocks;
    use pretty_assertions::assert_eq;

    fn block(title: &[&str], desc: &[&str]) -> RawBlock {
        RawBlock {
            index: 0,
            title: title.iter().map(|s| s.to_string()).collect(),
            desc: desc.iter().map(|s| s.to_string()).collect(),
        }
    }

    const TITLE: [&str; 5] = ["MATH-204", "", "Differential Equations", "", "4 Credits"];

    #[test]
    fn full_block() {
        let b = block(
            &TITLE,
            &[
                "\n",
                "First order equations and\n  linear systems.",
                "<strong>Minimum Class Standing:</strong> Sophomore",
                "<strong>Prerequisites:</strong> <a href=\"#\">MATH-203</a>",
            ],
        );
        let f = extract(&b).unwrap();
        assert_eq!(
            f,
            CourseFields {
                tag: "MATH-204".into(),
                name: "Differential Equations".into(),
                credits: "4".into(),
                desc: "First order equations and linear systems.".into(),
                prereqs: "MATH-203".into(),
                coreqs: NONE.into(),
                standing: "Sophomore".into(),
            }
        );
    }

    #[test]
    fn defaults_when_labels_absent() {
        let f = extract(&block(&TITLE, &["a", "b", "c"])).unwrap();
        assert_eq!(f.desc, "a");
        assert_eq!(f.standing, DEFAULT_STANDING);
        assert_eq!(f.prereqs, NONE);
        assert_eq!(f.coreqs, NONE);
    }

    #[test]
    fn corequisites_extracted() {
        let f = extract(&block(
            &TITLE,
            &["d", "x", "y", "<strong>Corequisites:</strong> MATH-204L"],
        ))
        .unwrap();
        assert_eq!(f.coreqs, "MATH-204L");
    }

    #[test]
    fn special_topics_description_forced() {
        let f = extract(&block(
            &["MECH-391", "", "Special Topics", "", "4 Credits"],
            &["Rotating topics in mechanics.", "x", "y"],
        ))
        .unwrap();
        assert_eq!(f.desc, NONE);
    }

    #[test]
    fn short_title_is_malformed() {
        let err = extract(&block(&["MATH-204", "Diff Eq"], &["a", "b", "c"])).unwrap_err();
        assert!(matches!(err, CatalogError::MalformedCatalogBlock { .. }));
    }

    #[test]
    fn bad_tag_is_malformed() {
        let err = extract(&block(&["Course Listing", "", "x", "", "y"], &["a", "b", "c"])).unwrap_err();
        assert!(err.to_string().contains("not SUBJ-NUM"));
    }

    #[test]
    fn short_description_is_malformed() {
        let err = extract(&block(&TITLE, &["only one"])).unwrap_err();
        assert!(err.to_string().contains("MATH-204"));
    }

    #[test]
    fn credits_without_suffix_kept() {
        let f = extract(&block(&["MATH-204", "", "Diff Eq", "", "Variable"], &["a", "b", "c"])).unwrap();
        assert_eq!(f.credits, "Variable");
    }

    #[test]
    fn math_fixture() {
        let html = std::fs::read_to_string("tests/fixtures/catalog_math.html").unwrap();
        let fields: Vec<_> = course_blocks(&html)
            .into_iter()
            .filter_map(Result::ok)
            .map(|b| extract(&b))
            .collect::<Result<_, _>>()
            .unwrap();
        let tags: Vec<&str> = fields.iter().map(|f| f.tag.as_str()).collect();
        assert_eq!(tags, vec!["MATH-101", "MATH-204", "MATH-391"]);

        let calc = &fields[0];
        assert_eq!(calc.name, "Calculus I");
        assert_eq!(calc.credits, "4");
        assert_eq!(calc.standing, DEFAULT_STANDING);

        let diffeq = &fields[1];
        assert_eq!(diffeq.prereqs, "MATH-102 and MATH-203");
        assert_eq!(diffeq.coreqs, "MATH-204L");
        assert_eq!(diffeq.standing, "Sophomore");
        assert_eq!(
            diffeq.desc,
            "First-order equations, linear systems, and Laplace transforms with applications."
        );

        assert_eq!(fields[2].desc, NONE);
    }
}
