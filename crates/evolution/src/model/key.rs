//! Composite rule identity: a family id plus an integer version.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identity of one rule version within its lineage.
///
/// The display form `"{family}-v{version}"` exists only for logs, seed files
/// and CLI output. Lineage checks compare `family` directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleKey {
    pub family: String,
    pub version: u32,
}

impl RuleKey {
    pub fn new(family: impl Into<String>, version: u32) -> Self {
        Self {
            family: family.into(),
            version,
        }
    }

    /// First version of a family.
    pub fn initial(family: impl Into<String>) -> Self {
        Self::new(family, 1)
    }

    /// The key the next promoted version of this lineage receives, or `None`
    /// once the version counter is exhausted.
    pub fn successor(&self) -> Option<Self> {
        self.version
            .checked_add(1)
            .map(|version| Self::new(self.family.clone(), version))
    }

    pub fn same_family(&self, other: &RuleKey) -> bool {
        self.family == other.family
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-v{}", self.family, self.version)
    }
}

impl FromStr for RuleKey {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (family, version) = s
            .rsplit_once("-v")
            .ok_or_else(|| format!("rule id '{}' has no '-v<version>' suffix", s))?;
        if family.is_empty() {
            return Err(format!("rule id '{}' has an empty family", s));
        }
        let version: u32 = version
            .parse()
            .map_err(|_| format!("rule id '{}' has a non-numeric version", s))?;
        if version == 0 {
            return Err(format!("rule id '{}' has version 0", s));
        }
        Ok(Self::new(family, version))
    }
}
