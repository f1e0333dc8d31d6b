//! This module provides the orderings which are not tested but seem correct.
//!
//! The list cursor loads that only step over links (to the next node, past dead
//! nodes) read links whose nodes were published by an earlier acquire of the
//! head, so `Relaxed` looks sufficient for them. Until loom agrees, they default
//! to `Acquire`.
use std::sync::atomic::Ordering;

#[cfg(feature = "untested_memory_ordering")]
/// We guess it should be [`Ordering::Relaxed`], but it is not tested.
///
/// If the `untested_memory_ordering` feature is disabled, it will be [`Ordering::Acquire`].
pub(crate) const SUSPICIOUS_RELAXED_ACQUIRE: Ordering = Ordering::Relaxed;

#[cfg(not(feature = "untested_memory_ordering"))]
/// We guess it should be [`Ordering::Relaxed`], but it is not tested.
///
/// If the `untested_memory_ordering` feature is disabled, it will be [`Ordering::Acquire`].
pub(crate) const SUSPICIOUS_RELAXED_ACQUIRE: Ordering = Ordering::Acquire;
