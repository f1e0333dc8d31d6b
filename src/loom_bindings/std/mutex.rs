use std::sync::{self, MutexGuard};

/// Adapter for `std::Mutex` that removes the poisoning aspects
/// from its API. Only the test suite serializes through it.
#[derive(Debug)]
pub struct Mutex<T: ?Sized>(sync::Mutex<T>);

impl<T> Mutex<T> {
    #[inline]
    pub const fn new(t: T) -> Self {
        Self(sync::Mutex::new(t))
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().unwrap_or_else(sync::PoisonError::into_inner)
    }
}
