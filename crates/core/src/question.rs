//! Question and expanded query types

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Upper bound on question length, in characters
pub const MAX_QUESTION_CHARS: usize = 2000;

/// A validated, immutable user question
///
/// Holds between 1 and `MAX_QUESTION_CHARS` characters after trimming.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Question(String);

impl Question {
    /// Validate and wrap a raw question
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        Self::with_limit(raw, MAX_QUESTION_CHARS)
    }

    /// Validate against a custom length limit (capped at `MAX_QUESTION_CHARS`)
    pub fn with_limit(raw: impl Into<String>, max_chars: usize) -> Result<Self> {
        let raw = raw.into();
        let text = raw.trim();
        let limit = max_chars.min(MAX_QUESTION_CHARS);

        if text.is_empty() {
            return Err(Error::InvalidInput("question must not be empty".to_string()));
        }

        let chars = text.chars().count();
        if chars > limit {
            return Err(Error::InvalidInput(format!(
                "question is {} characters, limit is {}",
                chars, limit
            )));
        }

        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cache key form: trimmed and lowercased
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Deref for Question {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Question {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Question {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Question::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Ordered search queries derived from one question
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpandedQuerySet(Vec<String>);

impl ExpandedQuerySet {
    pub fn new(queries: Vec<String>) -> Self {
        Self(queries)
    }

    /// The single-query set used when expansion is skipped or fails
    pub fn from_question(question: &Question) -> Self {
        Self(vec![question.as_str().to_string()])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl<'a> IntoIterator for &'a ExpandedQuerySet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_trims_input() {
        let q = Question::new("  what is hybrid search?  ").unwrap();
        assert_eq!(q.as_str(), "what is hybrid search?");
    }

    #[test]
    fn test_question_rejects_blank() {
        assert!(Question::new("").is_err());
        assert!(Question::new("   \n\t").is_err());
    }

    #[test]
    fn test_question_length_limit_counts_chars() {
        let at_limit = "가".repeat(MAX_QUESTION_CHARS);
        assert!(Question::new(at_limit).is_ok());

        let over = "a".repeat(MAX_QUESTION_CHARS + 1);
        assert!(Question::new(over).is_err());

        assert!(Question::with_limit("abcdef", 5).is_err());
        assert!(Question::with_limit("abcde", 5).is_ok());
    }

    #[test]
    fn test_question_normalized() {
        let q = Question::new(" Hello World ").unwrap();
        assert_eq!(q.normalized(), "hello world");
    }

    #[test]
    fn test_question_deserialize_validates() {
        let ok: std::result::Result<Question, _> = serde_json::from_str("\"hi\"");
        assert!(ok.is_ok());
        let bad: std::result::Result<Question, _> = serde_json::from_str("\"  \"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_expanded_from_question() {
        let q = Question::new("rust async").unwrap();
        let set = ExpandedQuerySet::from_question(&q);
        assert_eq!(set.as_slice(), &["rust async".to_string()]);
    }
}
