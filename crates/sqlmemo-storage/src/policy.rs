//! Eviction policies.
//!
//! Each policy contributes SQL fragments to the cache schema: extra columns,
//! extra indexes, a statement run after a successful read, and the ordering
//! used to pick rows for eviction.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Cache replacement policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Policy {
    /// Oldest insert is evicted first.
    #[default]
    Fifo,
    /// Least recently read is evicted first.
    Lru,
    /// Least frequently read is evicted first.
    Lfu,
}

/// SQL fragments a policy adds to the schema and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicySpec {
    /// Column definitions appended to the base table.
    pub columns: &'static [&'static str],
    /// Column lists, one index per entry.
    pub indexes: &'static [&'static str],
    /// `UPDATE` prefix run after a hit; completed with `WHERE key = ?1`.
    pub after_get: Option<&'static str>,
    /// `ORDER BY` expression selecting eviction victims first.
    pub delete_order: &'static str,
}

const USED_COLUMN: &str = "used INTEGER NOT NULL DEFAULT 0";

const FIFO: PolicySpec = PolicySpec {
    columns: &[],
    indexes: &[],
    after_get: None,
    delete_order: "ts, seq",
};

const LRU: PolicySpec = PolicySpec {
    columns: &[USED_COLUMN],
    indexes: &["used, ts, seq"],
    after_get: Some("UPDATE cache SET used = (SELECT max(used) FROM cache) + 1"),
    delete_order: "used, ts, seq",
};

const LFU: PolicySpec = PolicySpec {
    columns: &[USED_COLUMN],
    indexes: &["used, ts, seq"],
    after_get: Some("UPDATE cache SET used = used + 1"),
    delete_order: "used, ts, seq",
};

impl Policy {
    /// All supported policies.
    pub const ALL: [Policy; 3] = [Policy::Fifo, Policy::Lru, Policy::Lfu];

    /// The SQL fragments for this policy.
    pub fn spec(self) -> &'static PolicySpec {
        match self {
            Policy::Fifo => &FIFO,
            Policy::Lru => &LRU,
            Policy::Lfu => &LFU,
        }
    }

    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Policy::Fifo => "FIFO",
            Policy::Lru => "LRU",
            Policy::Lfu => "LFU",
        }
    }

    /// Whether the policy keeps a `used` counter.
    pub fn tracks_usage(self) -> bool {
        !self.spec().columns.is_empty()
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Policy::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StorageError::InvalidConfiguration(format!("Invalid policy: {s}")))
    }
}

impl TryFrom<String> for Policy {
    type Error = StorageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Policy> for String {
    fn from(policy: Policy) -> Self {
        policy.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_policies() {
        assert_eq!("FIFO".parse::<Policy>().unwrap(), Policy::Fifo);
        assert_eq!("lru".parse::<Policy>().unwrap(), Policy::Lru);
        assert_eq!(" Lfu ".parse::<Policy>().unwrap(), Policy::Lfu);
    }

    #[test]
    fn test_parse_unknown_policy() {
        let err = "MRU".parse::<Policy>().unwrap_err();
        assert!(matches!(err, StorageError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("MRU"));
    }

    #[test]
    fn test_specs() {
        assert!(!Policy::Fifo.tracks_usage());
        assert!(Policy::Fifo.spec().after_get.is_none());
        assert_eq!(Policy::Fifo.spec().delete_order, "ts, seq");

        for policy in [Policy::Lru, Policy::Lfu] {
            assert!(policy.tracks_usage());
            assert_eq!(policy.spec().indexes, &["used, ts, seq"]);
            assert_eq!(policy.spec().delete_order, "used, ts, seq");
        }
        assert!(Policy::Lru.spec().after_get.unwrap().contains("max(used)"));
        assert!(Policy::Lfu.spec().after_get.unwrap().contains("used + 1"));
    }

    #[test]
    fn test_display_roundtrips_through_from_str() {
        for policy in Policy::ALL {
            assert_eq!(policy.to_string().parse::<Policy>().unwrap(), policy);
        }
        assert_eq!(Policy::default(), Policy::Fifo);
    }
}
