//! This module abstracts over `loom` and `std::sync` depending on whether we
//! are running loom model tests or not.

#![allow(unused)]

#[cfg(not(all(test, nbcoll_loom)))]
mod std;
#[cfg(not(all(test, nbcoll_loom)))]
pub use self::std::*;

#[cfg(all(test, nbcoll_loom))]
mod mocked;
#[cfg(all(test, nbcoll_loom))]
pub use self::mocked::*;
