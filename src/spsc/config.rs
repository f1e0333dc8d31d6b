use crate::errors::InitError;

/// The tuning of a [`BatchedRing`](crate::spsc::BatchedRing).
///
/// * `batch_size` is the number of slots the producer claims at once and the
///   largest batch the consumer looks ahead for;
/// * `batch_increment` is how much the consumer grows its remembered batch back
///   toward `batch_size` every time it starts a new batch;
/// * `congestion_penalty` is the number of spin iterations the consumer waits
///   before halving its batch when the look-ahead slot is still empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub batch_increment: usize,
    pub congestion_penalty: usize,
}

impl BatchConfig {
    /// The number of spin iterations of [`BatchConfig::for_capacity`].
    pub const DEFAULT_CONGESTION_PENALTY: usize = 1000;

    /// Returns the default configuration for a ring of the given capacity:
    /// a batch of a sixteenth of the ring, growing back by half a batch.
    pub const fn for_capacity(capacity: usize) -> Self {
        let batch_size = if capacity / 16 == 0 { 1 } else { capacity / 16 };
        let batch_increment = if batch_size / 2 == 0 {
            1
        } else {
            batch_size / 2
        };

        Self {
            batch_size,
            batch_increment,
            congestion_penalty: Self::DEFAULT_CONGESTION_PENALTY,
        }
    }

    /// Checks the configuration against the capacity of a ring.
    pub(crate) fn validate(&self, capacity: usize) -> Result<(), InitError> {
        if self.batch_size == 0 || self.batch_size > capacity || self.batch_increment == 0 {
            return Err(InitError::InvalidBatchConfig {
                batch_size: self.batch_size,
                batch_increment: self.batch_increment,
                capacity,
            });
        }

        Ok(())
    }
}
