//! `@name@` placeholder substitution.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex_lite::{Captures, Regex};

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@([A-Za-z0-9_.+-]+)@").expect("valid placeholder pattern"))
}

/// Whether `token` is a single placeholder such as `@cdbs@`.
pub fn is_placeholder(token: &str) -> bool {
    token.len() > 2
        && token.starts_with('@')
        && token.ends_with('@')
        && !token[1..token.len() - 1].contains(|c: char| c == '@' || c.is_whitespace())
}

/// Values for the placeholders a template may contain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionRule {
    values: BTreeMap<String, String>,
}

impl SubstitutionRule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Names of the placeholders in `text`, in order of appearance.
    pub fn placeholders(text: &str) -> Vec<&str> {
        placeholder_pattern()
            .captures_iter(text)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect()
    }

    /// Placeholders in `text` this rule has no value for.
    pub fn missing<'t>(&self, text: &'t str) -> Vec<&'t str> {
        Self::placeholders(text)
            .into_iter()
            .filter(|name| !self.values.contains_key(*name))
            .collect()
    }

    pub fn can_expand(&self, text: &str) -> bool {
        self.missing(text).is_empty()
    }

    /// Replace every placeholder, or `None` if one has no value.
    pub fn expand(&self, text: &str) -> Option<String> {
        if !self.can_expand(text) {
            return None;
        }
        let expanded = placeholder_pattern().replace_all(text, |caps: &Captures<'_>| {
            let name = caps.get(1).map_or("", |m| m.as_str());
            self.values.get(name).cloned().unwrap_or_default()
        });
        Some(expanded.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_placeholder() {
        assert!(is_placeholder("@cdbs@"));
        assert!(is_placeholder("@misc.build-deps@"));
        assert!(!is_placeholder("@@"));
        assert!(!is_placeholder("@a b@"));
        assert!(!is_placeholder("debhelper"));
    }

    #[test]
    fn test_placeholders_and_missing() {
        let text = "Build-Depends: @cdbs@, libc6\nUploaders: @uploaders@\n";
        assert_eq!(SubstitutionRule::placeholders(text), ["cdbs", "uploaders"]);

        let rule = SubstitutionRule::new().with("cdbs", "debhelper");
        assert_eq!(rule.missing(text), ["uploaders"]);
        assert!(!rule.can_expand(text));
        assert_eq!(rule.expand(text), None);
    }

    #[test]
    fn test_expand() {
        let rule = SubstitutionRule::new()
            .with("cdbs", "some-foo")
            .with("uploaders", "Joe <joe@example.com>");
        assert_eq!(
            rule.expand("@cdbs@, libc6 / @uploaders@").as_deref(),
            Some("some-foo, libc6 / Joe <joe@example.com>")
        );
        assert_eq!(rule.expand("no placeholders").as_deref(), Some("no placeholders"));
    }
}
