//! This module contains the single-producer, single-consumer ring with batch look-ahead.
//!
//! Use [`new_batched`] or [`new_batched_with_config`] to get the only
//! [`BatchedProducer`] and the only [`BatchedConsumer`] of a ring, or use the
//! [`BatchedRing`] directly with its unsafe methods.
//!
//! The one-producer, one-consumer assumption is load-bearing: the ring uses no
//! compare-and-swap at all. Never share one side between threads.
mod batched_ring;
mod config;

pub use batched_ring::*;
pub use config::*;
