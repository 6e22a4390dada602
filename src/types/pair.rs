use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical trading-pair identifier, e.g. "SOL/USDC".
///
/// Opaque symbol; two pairs are equal iff their strings match exactly.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pair(String);

impl Pair {
    pub fn new(symbol: impl Into<String>) -> Self {
        Pair(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Quote side of the pair ("USDC" for "SOL/USDC"), if the symbol has one.
    pub fn quote(&self) -> Option<&str> {
        self.0.split('/').nth(1)
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Pair {
    fn from(s: &str) -> Self {
        Pair(s.to_string())
    }
}
