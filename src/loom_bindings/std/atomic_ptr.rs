use std::cell::UnsafeCell;
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::Ordering;

/// `AtomicPtr` providing an additional `unsync_load` function.
///
/// The MPSC queue walks its links with it in `Drop`.
pub struct AtomicPtr<T> {
    inner: UnsafeCell<std::sync::atomic::AtomicPtr<T>>,
}

unsafe impl<T> Send for AtomicPtr<T> {}
unsafe impl<T> Sync for AtomicPtr<T> {}

impl<T> AtomicPtr<T> {
    pub const fn new(ptr: *mut T) -> Self {
        Self {
            inner: UnsafeCell::new(std::sync::atomic::AtomicPtr::new(ptr)),
        }
    }

    /// Performs an unsynchronized load.
    ///
    /// # Safety
    ///
    /// Caller must ensure no concurrent mutation.
    pub unsafe fn unsync_load(&self) -> *mut T {
        unsafe { core::ptr::read(self.inner.get().cast()) }
    }
}

impl<T> Deref for AtomicPtr<T> {
    type Target = std::sync::atomic::AtomicPtr<T>;

    fn deref(&self) -> &Self::Target {
        // safety: it is always safe to access `&self` fns on the inner value as
        // we never perform unsafe mutations.
        unsafe { &*self.inner.get() }
    }
}

impl<T> Default for AtomicPtr<T> {
    fn default() -> Self {
        Self::new(core::ptr::null_mut())
    }
}

impl<T> fmt::Debug for AtomicPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomicPtr")
            .field("ptr", &self.load(Ordering::SeqCst))
            .finish()
    }
}
