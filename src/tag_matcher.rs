//! Attribute constraints for HTML elements

use regex::Regex;
use scraper::node::Element;

/// Matches elements by tag name and attribute patterns
///
/// Each pattern is a regular expression matched from the start of the
/// attribute's value, so `".*"` only requires the attribute to exist.
#[derive(Debug, Clone)]
pub struct TagMatcher {
    tag: String,
    attributes: Vec<(String, Regex)>,
}

impl TagMatcher {
    pub fn new<I, K, V>(tag: &str, attributes: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let attributes = attributes
            .into_iter()
            .map(|(name, pattern)| {
                let regex = Regex::new(&format!("^(?:{})", pattern.as_ref()))?;
                Ok((name.as_ref().to_ascii_lowercase(), regex))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;

        Ok(Self {
            tag: tag.to_ascii_lowercase(),
            attributes,
        })
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// True when the element has the tag name and every constrained
    /// attribute is present with a matching value
    pub fn matches(&self, element: &Element) -> bool {
        element.name() == self.tag
            && self.attributes.iter().all(|(name, pattern)| {
                element
                    .attr(name)
                    .map(|value| pattern.is_match(value))
                    .unwrap_or(false)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    fn first_input(html: &str) -> Element {
        let document = Html::parse_fragment(html);
        let selector = Selector::parse("input").unwrap();
        document.select(&selector).next().unwrap().value().clone()
    }

    #[test]
    fn test_all_constraints_must_match() {
        let element = first_input(r#"<input name="csrf_token" type="hidden" value="abc">"#);

        let matcher = TagMatcher::new("input", [("name", "csrf"), ("type", "hidden")]).unwrap();
        assert!(matcher.matches(&element));

        let matcher = TagMatcher::new("input", [("name", "csrf"), ("type", "text")]).unwrap();
        assert!(!matcher.matches(&element));
    }

    #[test]
    fn test_pattern_anchored_at_start() {
        let element = first_input(r#"<input name="user_csrf">"#);

        let matcher = TagMatcher::new("input", [("name", "csrf")]).unwrap();
        assert!(!matcher.matches(&element));

        let matcher = TagMatcher::new("input", [("name", ".*csrf")]).unwrap();
        assert!(matcher.matches(&element));
    }

    #[test]
    fn test_missing_attribute_and_wrong_tag() {
        let element = first_input(r#"<input name="a">"#);

        let matcher = TagMatcher::new("input", [("value", ".*")]).unwrap();
        assert!(!matcher.matches(&element));

        let matcher = TagMatcher::new("INPUT", Vec::<(&str, &str)>::new()).unwrap();
        assert!(matcher.matches(&element));

        let matcher = TagMatcher::new("meta", Vec::<(&str, &str)>::new()).unwrap();
        assert!(!matcher.matches(&element));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(TagMatcher::new("input", [("name", "(")]).is_err());
    }
}
