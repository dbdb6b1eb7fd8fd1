//! Wildcard host patterns.
//!
//! A pattern is a host with one or more `*`. Every literal segment is escaped
//! and each `*` becomes "any run of characters", dots included, so `*.cdn`
//! matches both `img.cdn` and `a.b.cdn`. The pattern is anchored at both ends
//! and compared ASCII case-insensitively.

use regex::Regex;

/// A compiled wildcard host pattern.
#[derive(Debug, Clone)]
pub struct HostPattern {
    regex: Regex,
}

impl HostPattern {
    pub fn compile(host: &str) -> Result<Self, regex::Error> {
        let mut source = String::with_capacity(host.len() + 16);
        source.push_str("(?i)^");
        for (i, literal) in host.split('*').enumerate() {
            if i > 0 {
                source.push_str(".*");
            }
            source.push_str(&regex::escape(literal));
        }
        source.push('$');

        Ok(Self {
            regex: Regex::new(&source)?,
        })
    }

    pub fn is_match(&self, subdomain: &str) -> bool {
        self.regex.is_match(subdomain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, subdomain: &str) -> bool {
        HostPattern::compile(pattern).unwrap().is_match(subdomain)
    }

    #[test]
    fn star_spans_labels() {
        assert!(matches("*.cdn", "img.cdn"));
        assert!(matches("*.cdn", "a.b.cdn"));
        assert!(!matches("*.cdn", "cdn"));
    }

    #[test]
    fn pattern_is_anchored() {
        assert!(!matches("*.cdn", "img.cdn.extra"));
        assert!(!matches("api-*", "v1.api-x"));
        assert!(matches("api-*", "api-v1"));
    }

    #[test]
    fn literal_dots_are_escaped() {
        assert!(!matches("*.cdn", "imgxcdn"));
        assert!(matches("a.*.c", "a.b.c"));
        assert!(!matches("a.*.c", "aXbXc"));
    }

    #[test]
    fn inner_and_multiple_stars() {
        assert!(matches("img-*.*.cdn", "img-1.eu.cdn"));
        assert!(!matches("img-*.*.cdn", "img-1.cdn"));
        assert!(matches("*", "anything.at.all"));
    }

    #[test]
    fn case_insensitive() {
        assert!(matches("*.CDN", "img.cdn"));
        assert!(matches("*.cdn", "IMG.CDN"));
    }
}
