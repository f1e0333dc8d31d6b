//! Outcome types shared by every container.
//!
//! None of them is a failure of the container itself: `Full` and `Empty` are
//! steady-state conditions, `Contention` means a concurrent operation was
//! observed and the caller should retry with its own cadence. Only
//! [`InitError`] reports a misuse.
use thiserror::Error;

/// Represents the possible outcomes of a failed attempt to enqueue a value.
///
/// The rejected value is always handed back.
pub enum EnqueueErr<T> {
    /// The container was full.
    Full(T),
    /// A concurrent operation won the race for the slot. Retry.
    Contention(T),
}

impl<T> EnqueueErr<T> {
    /// Returns the value that was not enqueued.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(value) | Self::Contention(value) => value,
        }
    }

    /// Returns `true` for [`EnqueueErr::Full`].
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }

    /// Returns `true` for [`EnqueueErr::Contention`].
    pub fn is_contention(&self) -> bool {
        matches!(self, Self::Contention(_))
    }
}

impl<T> std::fmt::Debug for EnqueueErr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(_) => write!(f, "full"),
            Self::Contention(_) => write!(f, "contention"),
        }
    }
}

impl<T> std::fmt::Display for EnqueueErr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(_) => write!(f, "the container is full"),
            Self::Contention(_) => write!(f, "lost a race for the slot, retry"),
        }
    }
}

impl<T> std::error::Error for EnqueueErr<T> {}

/// Represents the possible outcomes of a failed attempt to dequeue a value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeueErr {
    /// The container was empty.
    #[error("the container is empty")]
    Empty,
    /// Another thread got in the way. For the rings, another consumer moved the
    /// cursor first. For the MPSC queue, a push has not linked its node yet. Retry.
    #[error("a concurrent operation is in flight, retry")]
    Contention,
}

/// Construction-time misuse. Reported before any byte of the storage is written.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    /// The storage pointer was null.
    #[error("the storage pointer is null")]
    Null,
    /// The storage pointer was not aligned to the required boundary
    /// (16 bytes at least).
    #[error("the storage is not aligned to {required} bytes")]
    NotAligned {
        /// The required alignment.
        required: usize,
    },
    /// The batch configuration does not fit the capacity, or its batch never grows
    /// back.
    #[error(
        "batch size {batch_size} must be within 1..={capacity} \
         and batch increment {batch_increment} must be at least 1"
    )]
    InvalidBatchConfig {
        /// The rejected batch size.
        batch_size: usize,
        /// The rejected batch increment.
        batch_increment: usize,
        /// The capacity of the ring.
        capacity: usize,
    },
}

/// Represents the possible outcomes of a failed attempt to push a node into a
/// [`NonBlockingList`](crate::list::NonBlockingList).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushErr {
    /// The head of the list was not the expected top anymore. Refetch the top and
    /// retry.
    #[error("the head of the list has changed, refetch the top and retry")]
    TopChanged,
    /// The node has already been linked into a list. A node is linked at most once.
    #[error("the node has already been linked into a list")]
    AlreadyLinked,
}
