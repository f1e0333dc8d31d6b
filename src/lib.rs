//! Non-blocking collections: a bounded MPMC ring, a batched SPSC ring, an
//! intrusive MPSC queue and a lock-free singly linked list.
//!
//! | Container                                  | Producers | Consumers | Bounded |
//! |--------------------------------------------|-----------|-----------|---------|
//! | [`BoundedRing`](mpmc::BoundedRing)         | many      | many      | yes     |
//! | [`BatchedRing`](spsc::BatchedRing)         | one       | one       | yes     |
//! | [`IntrusiveMpscQueue`](mpsc::IntrusiveMpscQueue) | many | one       | no      |
//! | [`NonBlockingList`](list::NonBlockingList) | any       | any       | no      |
//!
//! None of the operations block. A failed attempt returns an error that tells
//! whether the container was full or empty, or whether another thread won a race
//! and the call may be retried at once.
//!
//! # Example
//!
//! ```
//! use nbcoll::mpmc::new_bounded;
//!
//! let (producer, consumer) = new_bounded::<u32, 8>();
//!
//! producer.try_enqueue(1).unwrap();
//!
//! assert_eq!(consumer.try_dequeue(), Ok(1));
//! ```
#![deny(clippy::all)]
#![deny(clippy::assertions_on_result_states)]
#![deny(clippy::match_wild_err_arm)]
#![deny(clippy::allow_attributes_without_reason)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(
    clippy::missing_const_for_fn,
    reason = "Since we cannot make a constant function non-constant after its release,
    we need to look for a reason to make it constant, and not vice versa."
)]
#![allow(clippy::inline_always, reason = "We write highly optimized code.")]
#![allow(
    clippy::must_use_candidate,
    reason = "It is better to developer think about it."
)]
#![allow(
    clippy::module_name_repetitions,
    reason = "This is acceptable most of the time."
)]
#![allow(
    clippy::missing_errors_doc,
    reason = "Unless the error is something special,
    the developer should document it."
)]
#![allow(clippy::redundant_pub_crate, reason = "It improves readability.")]
#![allow(clippy::struct_field_names, reason = "It improves readability.")]
#![allow(
    clippy::module_inception,
    reason = "It is fine if a file in has the same mane as a module."
)]
#![allow(clippy::if_not_else, reason = "It improves readability.")]
#![allow(
    rustdoc::private_intra_doc_links,
    reason = "It allows to create more readable docs."
)]
#![allow(
    clippy::result_unit_err,
    reason = "The function's doc should explain what it returns."
)]
pub mod cache_padded;
pub mod errors;
pub mod hints;
pub mod list;
#[cfg(all(nbcoll_loom, test))]
mod loom;
pub mod loom_bindings;
pub mod mpmc;
pub mod mpsc;
pub mod spsc;
mod suspicious_orders;
#[cfg(all(test, not(nbcoll_loom)))]
mod test_lock;
pub mod trace;
