use sha2::{Digest, Sha256};
use shipyard_core::{AppError, AppResult};

/// Index of one topic partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicPartition(u32);

impl TopicPartition {
    /// Creates a partition index.
    #[must_use]
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// Maps a publish key onto one of `partition_count` partitions.
    ///
    /// The mapping only depends on the key bytes, so every producer and
    /// consumer process agrees on it.
    pub fn for_key(key: &str, partition_count: u32) -> AppResult<Self> {
        if partition_count == 0 {
            return Err(AppError::Validation(
                "partition_count must be greater than zero".to_owned(),
            ));
        }

        let digest = Sha256::digest(key.as_bytes());
        let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
        Ok(Self(prefix % partition_count))
    }

    /// Returns the partition index.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.0
    }
}

/// Static partition ownership for one consumer of a group.
///
/// A consumer with `count = 3, index = 1` owns partitions 1, 4, 7, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartitionAssignment {
    count: u32,
    index: u32,
}

impl PartitionAssignment {
    /// Creates an assignment after validating bounds.
    pub fn new(count: u32, index: u32) -> AppResult<Self> {
        if count == 0 {
            return Err(AppError::Validation(
                "partition assignment count must be greater than zero".to_owned(),
            ));
        }

        if index >= count {
            return Err(AppError::Validation(format!(
                "partition assignment index {index} must be lower than count {count}"
            )));
        }

        Ok(Self { count, index })
    }

    /// Returns whether this consumer owns the given partition.
    #[must_use]
    pub fn owns(&self, partition: TopicPartition) -> bool {
        partition.index() % self.count == self.index
    }

    /// Returns the partitions owned out of `partition_count`.
    #[must_use]
    pub fn owned_partitions(
        assignment: Option<Self>,
        partition_count: u32,
    ) -> Vec<TopicPartition> {
        (0..partition_count)
            .map(TopicPartition::new)
            .filter(|partition| assignment.is_none_or(|value| value.owns(*partition)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{PartitionAssignment, TopicPartition};

    #[test]
    fn zero_partitions_is_rejected() {
        assert!(TopicPartition::for_key("D1", 0).is_err());
    }

    #[test]
    fn assignment_validates_index() {
        assert!(PartitionAssignment::new(0, 0).is_err());
        assert!(PartitionAssignment::new(2, 2).is_err());
        assert!(PartitionAssignment::new(2, 1).is_ok());
    }

    #[test]
    fn unassigned_consumer_owns_every_partition() {
        assert_eq!(PartitionAssignment::owned_partitions(None, 4).len(), 4);
    }

    #[test]
    fn assignments_split_partitions_without_overlap() {
        let first = PartitionAssignment::new(2, 0).ok();
        let second = PartitionAssignment::new(2, 1).ok();

        let first = PartitionAssignment::owned_partitions(first, 5);
        let second = PartitionAssignment::owned_partitions(second, 5);

        assert_eq!(
            first.iter().map(TopicPartition::index).collect::<Vec<_>>(),
            vec![0, 2, 4]
        );
        assert_eq!(
            second.iter().map(TopicPartition::index).collect::<Vec<_>>(),
            vec![1, 3]
        );
    }

    proptest! {
        #[test]
        fn key_partition_is_in_range_and_stable(key in ".*", count in 1_u32..64) {
            let first = TopicPartition::for_key(&key, count);
            let second = TopicPartition::for_key(&key, count);

            prop_assert!(first.is_ok());
            let first = first.unwrap_or_else(|_| unreachable!());
            prop_assert!(first.index() < count);
            prop_assert_eq!(Some(first), second.ok());
        }
    }
}
