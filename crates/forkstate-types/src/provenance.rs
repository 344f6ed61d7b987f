use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque provenance token attached to a write.
///
/// Positions travel with values through merges purely for diagnostics: they
/// never take part in equality checks between contributions. A typical
/// position names the source location or rule that produced a binding.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(String);

impl Position {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Position {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Position {
    fn from(token: String) -> Self {
        Self(token)
    }
}
