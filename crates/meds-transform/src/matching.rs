//! Code matching predicates shared by the code-targeted transforms.

use std::fmt;

use serde::{Deserialize, Serialize};

use meds_model::{MedsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingType {
    StartsWith,
    EndsWith,
    Contains,
    Equals,
}

impl MatchingType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Contains => "contains",
            Self::Equals => "equals",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "starts_with" => Ok(Self::StartsWith),
            "ends_with" => Ok(Self::EndsWith),
            "contains" => Ok(Self::Contains),
            "equals" => Ok(Self::Equals),
            other => Err(MedsError::config(format!(
                "invalid matching type '{other}'; expected starts_with, ends_with, contains or equals"
            ))),
        }
    }
}

impl fmt::Display for MatchingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `matching_type` applied against a literal `matching_value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeMatcher {
    pub matching_type: MatchingType,
    pub matching_value: String,
}

impl CodeMatcher {
    pub fn new(matching_type: MatchingType, matching_value: impl Into<String>) -> Self {
        Self {
            matching_type,
            matching_value: matching_value.into(),
        }
    }

    /// Empty codes never match.
    pub fn matches(&self, code: &str) -> bool {
        if code.is_empty() {
            return false;
        }
        let value = self.matching_value.as_str();
        match self.matching_type {
            MatchingType::StartsWith => code.starts_with(value),
            MatchingType::EndsWith => code.ends_with(value),
            MatchingType::Contains => code.contains(value),
            MatchingType::Equals => code == value,
        }
    }
}

impl fmt::Display for CodeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}'", self.matching_type, self.matching_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_matching_type() {
        let code = "LAB//50912//mg/dL";
        assert!(CodeMatcher::new(MatchingType::StartsWith, "LAB//").matches(code));
        assert!(CodeMatcher::new(MatchingType::EndsWith, "mg/dL").matches(code));
        assert!(CodeMatcher::new(MatchingType::Contains, "50912").matches(code));
        assert!(!CodeMatcher::new(MatchingType::Equals, "LAB//50912").matches(code));
        assert!(CodeMatcher::new(MatchingType::Equals, code).matches(code));
    }

    #[test]
    fn empty_code_never_matches() {
        assert!(!CodeMatcher::new(MatchingType::Contains, "").matches(""));
        assert!(!CodeMatcher::new(MatchingType::Equals, "").matches(""));
    }

    #[test]
    fn unknown_matching_type_is_a_config_error() {
        assert_eq!(MatchingType::parse("equals").unwrap(), MatchingType::Equals);
        assert!(matches!(
            MatchingType::parse("regex"),
            Err(MedsError::Config { .. })
        ));
    }
}
