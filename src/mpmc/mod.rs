//! This module contains the bounded multi-producer, multi-consumer ring.
//!
//! [`BoundedRing`] can be used directly (all its methods take `&self`), or
//! split into cloneable [`BoundedProducer`] / [`BoundedConsumer`] handles with
//! [`new_bounded`] or [`new_compact_bounded`].
mod bounded_ring;

pub use bounded_ring::*;
