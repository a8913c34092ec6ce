//! Subject identifiers
//!
//! A subject is the entity whose dashboard is tracked (a player). Every
//! subscription filter and every aggregator call is scoped to one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::SidelineError;

/// Non-empty, trimmed subject id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Create a subject id, rejecting empty or whitespace-only input
    pub fn new(raw: impl AsRef<str>) -> Result<Self, SidelineError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(SidelineError::InvalidSubject(raw.as_ref().to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SubjectId {
    type Err = SidelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SubjectId {
    type Error = SidelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubjectId> for String {
    fn from(id: SubjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for SubjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
