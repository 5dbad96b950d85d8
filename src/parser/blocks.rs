use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::text::split_line_breaks;
use crate::error::CatalogError;

static COURSEBLOCK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.courseblock").unwrap());
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p.courseblocktitle").unwrap());
static DESC: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p.courseblockdesc").unwrap());

/// Separator between tag, name, and credits in a block title.
pub const TITLE_SEPARATOR: char = '\u{a0}';

/// One course block as it appears on a subject page, before field extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBlock {
    pub index: usize,
    /// Title text split on non-breaking spaces.
    pub title: Vec<String>,
    /// Description markup split on line breaks.
    pub desc: Vec<String>,
}

/// Collect every `div.courseblock` on a page, in document order.
/// Blocks missing a title or description paragraph are returned as errors.
pub fn course_blocks(html: &str) -> Vec<Result<RawBlock, CatalogError>> {
    let doc = Html::parse_document(html);

    doc.select(&COURSEBLOCK)
        .enumerate()
        .map(|(index, block)| {
            let malformed = |reason: &str| CatalogError::MalformedCatalogBlock {
                index,
                reason: reason.to_string(),
            };

            let title = block
                .select(&TITLE)
                .next()
                .ok_or_else(|| malformed("no courseblocktitle paragraph"))?;
            let desc = block
                .select(&DESC)
                .next()
                .ok_or_else(|| malformed("no courseblockdesc paragraph"))?;

            let title_text: String = title.text().collect();
            Ok(RawBlock {
                index,
                title: title_text
                    .split(TITLE_SEPARATOR)
                    .map(str::to_string)
                    .collect(),
                desc: split_line_breaks(&desc.inner_html()),
            })
        })
        .collect()
}
