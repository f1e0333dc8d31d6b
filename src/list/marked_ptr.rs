// Tagged pointer operations using the two low bits of a link address.
//
// Bit layout:
//   Bit 0: MARK - the node that owns this link is logically deleted
//   Bit 1: FLAG - the successor this link points to is being deleted
//
//   0b00: clean
//   0b01: marked
//   0b10: flagged
//   0b11: never stored (a flagged link is unflagged before its owner is marked)
use std::fmt;

const MARK: usize = 0b01;
const FLAG: usize = 0b10;
const TAGS: usize = 0b11;

/// A copy of a link value: an address plus the MARK and FLAG bits.
pub(crate) struct MarkedPtr<T> {
    ptr: *mut T,
}

impl<T> MarkedPtr<T> {
    #[inline]
    pub(crate) fn new(ptr: *mut T) -> Self {
        Self { ptr }
    }

    /// The address without the tags. This is the one to dereference.
    #[inline]
    pub(crate) fn as_ptr(self) -> *mut T {
        self.ptr.map_addr(|addr| addr & !TAGS)
    }

    /// The address with the tags, as stored in the link.
    #[inline]
    pub(crate) fn as_raw(self) -> *mut T {
        self.ptr
    }

    #[inline]
    pub(crate) fn is_null(self) -> bool {
        self.as_ptr().is_null()
    }

    #[inline]
    pub(crate) fn is_marked(self) -> bool {
        self.ptr.addr() & MARK != 0
    }

    #[inline]
    pub(crate) fn is_flagged(self) -> bool {
        self.ptr.addr() & FLAG != 0
    }

    #[inline]
    pub(crate) fn is_tagged(self) -> bool {
        self.ptr.addr() & TAGS != 0
    }

    #[inline]
    pub(crate) fn with_mark(self) -> Self {
        Self::new(self.ptr.map_addr(|addr| addr | MARK))
    }

    #[inline]
    pub(crate) fn with_flag(self) -> Self {
        Self::new(self.ptr.map_addr(|addr| addr | FLAG))
    }
}

impl<T> Clone for MarkedPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for MarkedPtr<T> {}

impl<T> PartialEq for MarkedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for MarkedPtr<T> {}

impl<T> fmt::Debug for MarkedPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkedPtr")
            .field("ptr", &self.as_ptr())
            .field("marked", &self.is_marked())
            .field("flagged", &self.is_flagged())
            .finish()
    }
}
