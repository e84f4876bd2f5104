//! Deterministic partitioning of bindings across replicas.
//!
//! Every replica computes the same assignment from the provider ID alone, so
//! no two replicas ever reconcile the same binding in the same tick.

use thiserror::Error;

use dirsync_core::AuthProviderId;

/// Invalid replica index/count combination.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("partition index {index} out of range for {count} replicas")]
pub struct InvalidPartition {
    pub index: u32,
    pub count: u32,
}

/// One replica's slice of the binding set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    index: u32,
    count: u32,
}

impl Partition {
    /// Create a partition for replica `index` of `count`.
    pub fn new(index: u32, count: u32) -> Result<Self, InvalidPartition> {
        if count == 0 || index >= count {
            return Err(InvalidPartition { index, count });
        }
        Ok(Self { index, count })
    }

    /// The partition of a single-replica deployment, owning everything.
    #[must_use]
    pub fn solo() -> Self {
        Self { index: 0, count: 1 }
    }

    /// Whether this replica is responsible for the given binding.
    #[must_use]
    pub fn owns(&self, provider_id: AuthProviderId) -> bool {
        provider_id.as_uuid().as_u128() % u128::from(self.count) == u128::from(self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_solo_owns_everything() {
        let partition = Partition::solo();
        for _ in 0..32 {
            assert!(partition.owns(AuthProviderId::new()));
        }
    }

    #[test]
    fn test_each_binding_owned_by_exactly_one_replica() {
        let count = 4;
        let partitions: Vec<Partition> = (0..count)
            .map(|i| Partition::new(i, count).unwrap())
            .collect();

        for _ in 0..64 {
            let id = AuthProviderId::new();
            let owners = partitions.iter().filter(|p| p.owns(id)).count();
            assert_eq!(owners, 1);
        }
    }

    #[test]
    fn test_assignment_is_deterministic() {
        let id = AuthProviderId::from_uuid(Uuid::from_u128(7));
        let partition = Partition::new(3, 4).unwrap();
        assert!(partition.owns(id));
        assert!(!Partition::new(0, 4).unwrap().owns(id));
    }

    #[test]
    fn test_invalid_partitions_rejected() {
        assert!(Partition::new(0, 0).is_err());
        assert!(Partition::new(2, 2).is_err());
        assert!(Partition::new(1, 2).is_ok());
    }
}
