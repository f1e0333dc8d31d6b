//! This module contains the intrusive multi-producer, single-consumer queue.
//!
//! Use [`new_intrusive`] to get cloneable [`MpscProducer`]s and the only
//! [`MpscConsumer`], or use the [`IntrusiveMpscQueue`] directly.
mod intrusive;
#[cfg(all(test, not(nbcoll_loom)))]
mod tests;

pub use intrusive::*;
