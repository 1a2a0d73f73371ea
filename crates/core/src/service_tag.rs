use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::error::{Error, Result};

static SERVICE_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z]{7}$").expect("service tag regex is valid"));

/// A Dell service tag: seven ASCII alphanumerics, always held in uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceTag(String);

impl ServiceTag {
    pub fn parse(raw: &str) -> Result<Self> {
        if !SERVICE_TAG_PATTERN.is_match(raw) {
            return Err(Error::Validation(format!(
                "invalid service tag '{}': expected 7 alphanumeric characters",
                raw
            )));
        }
        Ok(Self(raw.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Validate, normalize and deduplicate raw tags.
    ///
    /// Blank tokens are dropped silently; malformed ones are dropped with a
    /// warning. The first occurrence of each tag decides its position.
    pub fn collect<I, S>(raw: I) -> Vec<ServiceTag>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = std::collections::HashSet::new();
        let mut tags = Vec::new();

        for token in raw {
            let token = token.as_ref().trim();
            if token.is_empty() {
                continue;
            }
            match ServiceTag::parse(token) {
                Ok(tag) => {
                    if seen.insert(tag.clone()) {
                        tags.push(tag);
                    }
                }
                Err(_) => warn!(token, "Skipping malformed service tag"),
            }
        }

        tags
    }
}

impl FromStr for ServiceTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for ServiceTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes_case() {
        let tag = ServiceTag::parse("abc1234").unwrap();
        assert_eq!(tag.as_str(), "ABC1234");
        assert_eq!(tag, ServiceTag::parse("ABC1234").unwrap());
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        for raw in ["ABC123", "ABC12345", "ABC-123", " ABC1234", "ÄBC1234", ""] {
            assert!(ServiceTag::parse(raw).is_err(), "accepted {:?}", raw);
        }
    }

    #[test]
    fn test_collect_dedups_and_skips_invalid() {
        let tags = ServiceTag::collect(["abc1234", "XYZ9876", "ABC1234", "nope", "", "  xyz9876 "]);
        let tags: Vec<&str> = tags.iter().map(|t| t.as_str()).collect();
        assert_eq!(tags, vec!["ABC1234", "XYZ9876"]);
    }
}
