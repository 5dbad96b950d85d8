pub mod blocks;
pub mod fields;
pub mod text;

use tracing::warn;

use fields::CourseFields;

/// Two-pass pipeline: page markup → raw course blocks → structured fields.
/// Malformed blocks are logged and skipped so one bad block never drops
/// its siblings.
pub fn parse_page(subject: &str, html: &str) -> Vec<CourseFields> {
    blocks::course_blocks(html)
        .into_iter()
        .filter_map(|block| match block.and_then(|b| fields::extract(&b)) {
            Ok(f) => Some(f),
            Err(e) => {
                warn!("{}: skipping {}", subject, e);
                None
            }
        })
        .collect()
}
