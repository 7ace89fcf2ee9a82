//! HTML attribute extraction
//!
//! Uses the scraper crate to walk every element of the document in order.

use scraper::{ElementRef, Html};

use crate::tag_matcher::TagMatcher;

/// Extract the `extract` attribute from elements accepted by `matcher`
///
/// Elements are compared by tag name, not through a CSS selector, so any
/// name the parser produces (`svg:rect`, `my-widget`) can be matched.
/// Every matching element overwrites the result, so the last match in
/// document order wins. A later match without the attribute resets the
/// result to `None`.
pub fn extract_html(html: &str, matcher: &TagMatcher, extract: &str) -> Option<String> {
    let document = Html::parse_document(html);

    let mut result = None;
    for element in document.root_element().descendants().filter_map(ElementRef::wrap) {
        if matcher.matches(element.value()) {
            result = element.value().attr(extract).map(String::from);
        }
    }

    result
}
