//! Regular expression extraction

use regex::Regex;

/// Extract a capture group from the first match in `text`
///
/// `group` counts the parenthesized groups from 0, so the default picks the
/// first one. Returns `None` when nothing matches, the pattern has fewer
/// groups, or the requested group did not take part in the match.
pub fn extract_regex(text: &str, regex: &Regex, group: usize) -> Option<String> {
    regex
        .captures(text)?
        .get(group.checked_add(1)?)
        .map(|m| m.as_str().to_string())
}
