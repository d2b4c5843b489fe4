use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Largest accepted capacity floor.
pub const MAX_MIN_CAPACITY: usize = 1 << 24;

/// Sizing and id-assignment policy for the node table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodestoreConfig {
    /// Floor for the table capacity. The table starts at the smallest prime
    /// at or above this value and never shrinks below it.
    pub min_capacity: usize,
    /// The table grows once live plus tombstoned slots would exceed
    /// `grow_numerator / grow_denominator` of the capacity.
    pub grow_numerator: usize,
    pub grow_denominator: usize,
    /// The table shrinks once live slots fall below
    /// `shrink_numerator / shrink_denominator` of the capacity.
    pub shrink_numerator: usize,
    pub shrink_denominator: usize,
    /// Namespace for numeric ids assigned to nodes inserted with a null id.
    pub auto_id_namespace: u16,
}

impl Default for NodestoreConfig {
    fn default() -> Self {
        Self {
            min_capacity: 64,
            grow_numerator: 3,
            grow_denominator: 4,
            shrink_numerator: 1,
            shrink_denominator: 8,
            auto_id_namespace: 1,
        }
    }
}

impl NodestoreConfig {
    /// Check that the load-factor bounds leave room between growth and
    /// shrinkage and that growth happens before the table is full.
    pub fn validate(&self) -> StoreResult<()> {
        if self.grow_denominator == 0 || self.shrink_denominator == 0 {
            return Err(StoreError::InvalidConfig(
                "load factor denominators must be non-zero".into(),
            ));
        }
        if self.grow_numerator == 0 || self.grow_numerator >= self.grow_denominator {
            return Err(StoreError::InvalidConfig(format!(
                "grow load factor {}/{} must lie strictly between 0 and 1",
                self.grow_numerator, self.grow_denominator
            )));
        }
        // After a resize the load is at most 1/2, which must sit strictly
        // between the shrink and grow thresholds or the table would thrash.
        if self.grow_numerator * 2 <= self.grow_denominator {
            return Err(StoreError::InvalidConfig(format!(
                "grow load factor {}/{} must exceed 1/2",
                self.grow_numerator, self.grow_denominator
            )));
        }
        if self.shrink_numerator * 4 > self.shrink_denominator {
            return Err(StoreError::InvalidConfig(format!(
                "shrink load factor {}/{} must not exceed 1/4",
                self.shrink_numerator, self.shrink_denominator
            )));
        }
        if self.min_capacity > MAX_MIN_CAPACITY {
            return Err(StoreError::InvalidConfig(format!(
                "min_capacity {} exceeds {MAX_MIN_CAPACITY}",
                self.min_capacity
            )));
        }
        if self.auto_id_namespace == 0 {
            return Err(StoreError::InvalidConfig(
                "auto-assigned ids cannot live in namespace 0".into(),
            ));
        }
        Ok(())
    }
}
