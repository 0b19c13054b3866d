//! Ordered routing rules
//!
//! Each rule matches a message by case-insensitive keywords and/or a regex
//! and may name a preferred provider. Rules are evaluated in order and the
//! first match wins.

use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// A rule as written in configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Rule name, reported in routing decisions
    pub name: String,
    /// Substrings, any of which matches (case-insensitive)
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Regular expression (case-insensitive)
    #[serde(default)]
    pub pattern: Option<String>,
    /// Provider moved to the front of the ranking when this rule matches
    #[serde(default)]
    pub preferred_provider: Option<String>,
}

impl RuleConfig {
    /// Create a keyword rule
    #[must_use]
    pub fn keywords(name: &str, keywords: &[&str], preferred_provider: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| (*k).to_string()).collect(),
            pattern: None,
            preferred_provider: preferred_provider.map(str::to_string),
        }
    }
}

/// The rules shipped in the default configuration
#[must_use]
pub fn default_rules() -> Vec<RuleConfig> {
    vec![
        RuleConfig::keywords(
            "code_generation",
            &["write", "create", "generate", "implement"],
            Some("moonshot"),
        ),
        RuleConfig::keywords(
            "complex_analysis",
            &["optimize", "refactor", "analyze", "debug"],
            Some("moonshot"),
        ),
        RuleConfig::keywords(
            "simple_queries",
            &["what is", "how to", "explain"],
            Some("groq"),
        ),
    ]
}

/// A compiled rule
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    keywords: Vec<String>,
    pattern: Option<Regex>,
    preferred_provider: Option<String>,
}

impl Rule {
    fn compile(config: &RuleConfig) -> Result<Self> {
        let pattern = config
            .pattern
            .as_deref()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::Configuration(format!("rule {}: {e}", config.name)))
            })
            .transpose()?;

        Ok(Self {
            name: config.name.clone(),
            keywords: config
                .keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            pattern,
            preferred_provider: config.preferred_provider.clone(),
        })
    }

    /// Rule name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Preferred provider, if any
    #[must_use]
    pub fn preferred_provider(&self) -> Option<&str> {
        self.preferred_provider.as_deref()
    }

    fn matches(&self, lowered: &str, original: &str) -> bool {
        self.keywords.iter().any(|k| lowered.contains(k.as_str()))
            || self.pattern.as_ref().is_some_and(|p| p.is_match(original))
    }
}

/// Ordered, first-match-wins rule list
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Compile rules from configuration
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] when a pattern does not compile.
    pub fn from_config(rules: &[RuleConfig]) -> Result<Self> {
        Ok(Self {
            rules: rules.iter().map(Rule::compile).collect::<Result<_>>()?,
        })
    }

    /// First rule matching `message`
    #[must_use]
    pub fn evaluate(&self, message: &str) -> Option<&Rule> {
        let lowered = message.to_lowercase();
        self.rules.iter().find(|r| r.matches(&lowered, message))
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the table has no rules
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_first_match_wins() {
        let table = RuleTable::from_config(&default_rules()).unwrap();

        let rule = table.evaluate("Explain how to write a parser").unwrap();
        assert_eq!(rule.name(), "code_generation");
        assert_eq!(rule.preferred_provider(), Some("moonshot"));

        let rule = table.evaluate("What is a monad?").unwrap();
        assert_eq!(rule.name(), "simple_queries");
        assert_eq!(rule.preferred_provider(), Some("groq"));

        assert!(table.evaluate("hello").is_none());
    }

    #[test]
    fn test_pattern_rule() {
        let table = RuleTable::from_config(&[RuleConfig {
            name: "sql".to_string(),
            keywords: vec![],
            pattern: Some(r"\bselect\b.+\bfrom\b".to_string()),
            preferred_provider: None,
        }])
        .unwrap();

        assert_eq!(table.evaluate("SELECT id FROM users").unwrap().name(), "sql");
        assert!(table.evaluate("selection from the menu").is_none());
    }

    #[test]
    fn test_bad_pattern_is_configuration_error() {
        let result = RuleTable::from_config(&[RuleConfig {
            name: "broken".to_string(),
            keywords: vec![],
            pattern: Some("(".to_string()),
            preferred_provider: None,
        }]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_rule_without_matchers_never_matches() {
        let table = RuleTable::from_config(&[RuleConfig::keywords("empty", &[], None)]).unwrap();
        assert!(table.evaluate("anything").is_none());
    }
}
