//! This module contains the Fomitchev-Ruppert lock-free singly linked list.
//!
//! [`NonBlockingList`] links caller-owned [`ListNode`]s. It supports push and pop
//! at the head, deletion of any node, and iteration with [`Cursor`] or
//! [`Iter`].
//!
//! The list never frees a node: it borrows every node for its lifetime, so a node
//! can be reclaimed only after the list is dropped.
mod cursor;
mod marked_ptr;
mod non_blocking_list;
#[cfg(all(test, not(nbcoll_loom)))]
mod tests;

pub use cursor::*;
pub use non_blocking_list::{Iter, ListNode, NonBlockingList};
