//! Record keys for persisted bases.
//!
//! A basis is stored under `<strategy>_rank_<r>`, so that a sweep over a
//! family of ranks can enumerate every record of a strategy.

use core::fmt;

use crate::{CoreError, CoreResult};

const RANK_SEPARATOR: &str = "_rank_";

/// Identifies one computed basis: the strategy that produced it and its rank.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BasisKey {
    pub strategy: String,
    pub rank: usize,
}

impl BasisKey {
    pub fn new(strategy: impl Into<String>, rank: usize) -> Self {
        Self {
            strategy: strategy.into(),
            rank,
        }
    }

    /// Parse a key of the form `<strategy>_rank_<r>`.
    ///
    /// The last `_rank_` occurrence splits the key, so strategy names may
    /// themselves contain underscores (`balanced_truncation_rank_4`).
    pub fn parse(key: &str) -> CoreResult<Self> {
        let (strategy, rank) =
            key.rsplit_once(RANK_SEPARATOR)
                .ok_or_else(|| CoreError::MalformedKey {
                    key: key.to_string(),
                    reason: "missing '_rank_' separator",
                })?;
        if strategy.is_empty() {
            return Err(CoreError::MalformedKey {
                key: key.to_string(),
                reason: "empty strategy name",
            });
        }
        let rank = rank.parse::<usize>().map_err(|_| CoreError::MalformedKey {
            key: key.to_string(),
            reason: "rank is not an unsigned integer",
        })?;
        Ok(Self::new(strategy, rank))
    }
}

impl fmt::Display for BasisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.strategy, RANK_SEPARATOR, self.rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn display_matches_record_convention() {
        assert_eq!(BasisKey::new("pod", 3).to_string(), "pod_rank_3");
    }

    #[test]
    fn parse_handles_underscored_strategy() {
        let key = BasisKey::parse("balanced_truncation_rank_12").unwrap();
        assert_eq!(key.strategy, "balanced_truncation");
        assert_eq!(key.rank, 12);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(BasisKey::parse("pod").is_err());
        assert!(BasisKey::parse("_rank_2").is_err());
        assert!(BasisKey::parse("pod_rank_x").is_err());
    }

    proptest! {
        #[test]
        fn parse_inverts_display(strategy in "[a-z][a-z_]{0,12}[a-z]", rank in 1_usize..10_000) {
            let key = BasisKey::new(strategy, rank);
            let parsed = BasisKey::parse(&key.to_string()).unwrap();
            prop_assert_eq!(parsed, key);
        }
    }
}
