//! This module provides a multi-producer, multi-consumer bounded ring. Read more in
//! [`BoundedRing`].
use crate::cache_padded::{CachePadded, NotCachePadded};
use crate::errors::{DequeueErr, EnqueueErr, InitError};
use crate::hints::{likely, unlikely};
use crate::loom_bindings::sync::Arc;
use crate::loom_bindings::sync::atomic::AtomicUsize;
use crate::trace;
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{MaybeUninit, needs_drop};
use std::ops::Deref;
use std::ptr;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

// Implementation notes.
//
// Each cell carries its own sequence counter, and the two cursors (enqueue and
// dequeue positions) only grow. A cell at `position & MASK` is:
//   - free for the producer at `position`   when `sequence == position`;
//   - ready for the consumer at `position`  when `sequence == position + 1`.
//
// A producer claims the cell by moving the enqueue cursor with a CAS, writes the
// value and publishes it with `sequence = position + 1` (release). The consumer
// claims it the same way on the dequeue cursor, reads the value and hands the cell
// to the producer of the next lap with `sequence = position + CAPACITY` (release).
//
// Both counters and their difference use wrapping arithmetic over the whole
// `usize` range, so the lap is encoded implicitly and never corrected. The signed
// difference `sequence - position` tells the three outcomes apart:
//   - zero:      the cell is ours to claim;
//   - negative:  the cell still holds the value of the previous lap (full) or
//                has not been published yet (empty);
//   - positive:  another thread already claimed this position (contention).
//
// Every call is a single attempt. A lost CAS is reported as contention instead of
// being retried here, so the retry cadence stays with the caller.

/// The per-cell state and payload.
struct Cell<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Cell<T> {
    fn new(sequence: usize) -> Self {
        Self {
            sequence: AtomicUsize::new(sequence),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// # Safety
    ///
    /// The caller must own the cell (won the CAS on the dequeue cursor) and the cell
    /// must hold a published value.
    unsafe fn read_value(&self) -> T {
        unsafe { (*self.value.get()).assume_init_read() }
    }

    /// # Safety
    ///
    /// The caller must own the cell (won the CAS on the enqueue cursor).
    unsafe fn write_value(&self, value: T) {
        unsafe { (*self.value.get()).write(value) };
    }
}

/// A fixed-capacity multi-producer, multi-consumer ring.
///
/// Any thread may call [`try_enqueue`](Self::try_enqueue) and
/// [`try_dequeue`](Self::try_dequeue) concurrently. Slot ownership is arbitrated
/// per cell by a sequence counter; a value written into a cell is read by exactly
/// one successful dequeue.
///
/// `CAPACITY` must be a power of two and at least 2; it is checked when the ring is
/// constructed, at compile time.
///
/// It accepts the atomic wrapper of the two cursors as a generic parameter: the
/// default [`CachePadded`] keeps the producer cursor and the consumer cursor on
/// different cache lines, [`NotCachePadded`] saves the memory.
///
/// # Example
///
/// ```
/// use nbcoll::mpmc::BoundedRing;
/// use nbcoll::errors::{DequeueErr, EnqueueErr};
///
/// let ring = BoundedRing::<u64, 2>::new();
///
/// ring.try_enqueue(1).unwrap();
/// ring.try_enqueue(2).unwrap();
/// assert!(matches!(ring.try_enqueue(3), Err(EnqueueErr::Full(3))));
///
/// assert_eq!(ring.try_dequeue(), Ok(1));
/// assert_eq!(ring.try_dequeue(), Ok(2));
/// assert_eq!(ring.try_dequeue(), Err(DequeueErr::Empty));
/// ```
#[repr(C, align(16))]
pub struct BoundedRing<
    T,
    const CAPACITY: usize,
    AtomicWrapper: Deref<Target = AtomicUsize> + Default = CachePadded<AtomicUsize>,
> {
    enqueue_position: AtomicWrapper,
    dequeue_position: AtomicWrapper,
    cells: [Cell<T>; CAPACITY],
}

impl<T, const CAPACITY: usize, AtomicWrapper> BoundedRing<T, CAPACITY, AtomicWrapper>
where
    AtomicWrapper: Deref<Target = AtomicUsize> + Default,
{
    const MASK: usize = CAPACITY - 1;

    const CAPACITY_CHECK: () = assert!(
        CAPACITY >= 2 && CAPACITY.is_power_of_two(),
        "BoundedRing capacity must be a power of two and at least 2"
    );

    /// The alignment [`init_in_place`](Self::init_in_place) requires from the storage.
    pub const REQUIRED_ALIGN: usize = if align_of::<Self>() > 16 {
        align_of::<Self>()
    } else {
        16
    };

    /// Creates a new empty [`BoundedRing`].
    pub fn new() -> Self {
        let mut ring = MaybeUninit::<Self>::uninit();

        unsafe {
            Self::write_initial_state(ring.as_mut_ptr());

            ring.assume_init()
        }
    }

    /// Creates a new empty [`BoundedRing`] directly on the heap.
    ///
    /// Prefer it to `Box::new(BoundedRing::new())` for large capacities: the ring is
    /// never built on the stack.
    pub fn new_boxed() -> Box<Self> {
        let mut ring = Box::<Self>::new_uninit();

        unsafe {
            Self::write_initial_state(ring.as_mut_ptr());

            ring.assume_init()
        }
    }

    /// Initializes a ring in caller-provided storage.
    ///
    /// Nothing is written when the storage is rejected.
    ///
    /// # Errors
    ///
    /// * [`InitError::Null`] if `storage` is null;
    /// * [`InitError::NotAligned`] if `storage` is not aligned to
    ///   [`REQUIRED_ALIGN`](Self::REQUIRED_ALIGN) (a 16-byte boundary at least).
    ///
    /// # Safety
    ///
    /// A non-null, aligned `storage` must be valid for writes of `size_of::<Self>()`
    /// bytes and must stay valid, and not be written by anything else, for `'a`.
    /// A ring previously initialized there is overwritten without being dropped.
    pub unsafe fn init_in_place<'a>(storage: *mut Self) -> Result<&'a Self, InitError> {
        if unlikely(storage.is_null()) {
            trace::warn!("BoundedRing::init_in_place: null storage");

            return Err(InitError::Null);
        }

        if unlikely(storage.addr() % Self::REQUIRED_ALIGN != 0) {
            trace::warn!(
                addr = storage.addr(),
                "BoundedRing::init_in_place: misaligned storage"
            );

            return Err(InitError::NotAligned {
                required: Self::REQUIRED_ALIGN,
            });
        }

        unsafe {
            Self::write_initial_state(storage);

            Ok(&*storage)
        }
    }

    /// # Safety
    ///
    /// `storage` must be non-null, aligned and valid for writes.
    unsafe fn write_initial_state(storage: *mut Self) {
        let () = Self::CAPACITY_CHECK;

        unsafe {
            ptr::addr_of_mut!((*storage).enqueue_position).write(AtomicWrapper::default());
            ptr::addr_of_mut!((*storage).dequeue_position).write(AtomicWrapper::default());

            let cells = ptr::addr_of_mut!((*storage).cells).cast::<Cell<T>>();

            for i in 0..CAPACITY {
                cells.add(i).write(Cell::new(i));
            }
        }
    }

    #[inline(always)]
    fn cell(&self, position: usize) -> &Cell<T> {
        &self.cells[position & Self::MASK]
    }

    /// Returns the capacity of the ring.
    #[inline]
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    /// Returns the number of values in the ring.
    ///
    /// It is a snapshot: concurrent operations may change it right after it is read.
    pub fn len(&self) -> usize {
        loop {
            let dequeue_position = self.dequeue_position.load(Relaxed);
            let enqueue_position = self.enqueue_position.load(Relaxed);
            let len = enqueue_position.wrapping_sub(dequeue_position);

            // Inconsistent when we were preempted between the two loads. Try again.
            if !unlikely(len > CAPACITY) {
                return len;
            }
        }
    }

    /// Returns whether the ring is empty. A snapshot, like [`len`](Self::len).
    pub fn is_empty(&self) -> bool {
        self.dequeue_position.load(Relaxed) == self.enqueue_position.load(Relaxed)
    }

    /// Makes a single attempt to enqueue the value.
    ///
    /// # Errors
    ///
    /// * [`EnqueueErr::Full`] if the cell at the enqueue cursor still holds the value
    ///   of the previous lap;
    /// * [`EnqueueErr::Contention`] if another producer claimed the position first.
    ///
    /// Both return the value back.
    pub fn try_enqueue(&self, value: T) -> Result<(), EnqueueErr<T>> {
        let position = self.enqueue_position.load(Relaxed);
        let cell = self.cell(position);
        let sequence = cell.sequence.load(Acquire);
        #[allow(clippy::cast_possible_wrap, reason = "Wrapping difference is intended")]
        let difference = sequence.wrapping_sub(position) as isize;

        if likely(difference == 0) {
            // Let the compiler cache it into a register
            let new_position = position.wrapping_add(1);

            if self
                .enqueue_position
                .compare_exchange(position, new_position, Relaxed, Relaxed)
                .is_ok()
            {
                unsafe { cell.write_value(value) };

                cell.sequence.store(new_position, Release);

                return Ok(());
            }

            return Err(EnqueueErr::Contention(value));
        }

        if difference < 0 {
            Err(EnqueueErr::Full(value))
        } else {
            Err(EnqueueErr::Contention(value))
        }
    }

    /// Makes a single attempt to dequeue a value.
    ///
    /// # Errors
    ///
    /// * [`DequeueErr::Empty`] if the cell at the dequeue cursor is not published;
    /// * [`DequeueErr::Contention`] if another consumer claimed the position first.
    pub fn try_dequeue(&self) -> Result<T, DequeueErr> {
        let position = self.dequeue_position.load(Relaxed);
        let cell = self.cell(position);
        let sequence = cell.sequence.load(Acquire);
        let new_position = position.wrapping_add(1);
        #[allow(clippy::cast_possible_wrap, reason = "Wrapping difference is intended")]
        let difference = sequence.wrapping_sub(new_position) as isize;

        if likely(difference == 0) {
            if self
                .dequeue_position
                .compare_exchange(position, new_position, Relaxed, Relaxed)
                .is_ok()
            {
                let value = unsafe { cell.read_value() };

                cell.sequence
                    .store(position.wrapping_add(CAPACITY), Release);

                return Ok(value);
            }

            return Err(DequeueErr::Contention);
        }

        if difference < 0 {
            Err(DequeueErr::Empty)
        } else {
            Err(DequeueErr::Contention)
        }
    }
}

impl<T, const CAPACITY: usize, AtomicWrapper> Default for BoundedRing<T, CAPACITY, AtomicWrapper>
where
    AtomicWrapper: Deref<Target = AtomicUsize> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const CAPACITY: usize, AtomicWrapper> fmt::Debug for BoundedRing<T, CAPACITY, AtomicWrapper>
where
    AtomicWrapper: Deref<Target = AtomicUsize> + Default,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedRing")
            .field("capacity", &CAPACITY)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<T, const CAPACITY: usize, AtomicWrapper> Drop for BoundedRing<T, CAPACITY, AtomicWrapper>
where
    AtomicWrapper: Deref<Target = AtomicUsize> + Default,
{
    fn drop(&mut self) {
        if !needs_drop::<T>() {
            return;
        }

        // We hold `&mut self`: every claimed cell has been published.
        let mut position = unsafe { self.dequeue_position.unsync_load() };
        let enqueue_position = unsafe { self.enqueue_position.unsync_load() };

        while position != enqueue_position {
            unsafe { (*self.cell(position).value.get()).assume_init_drop() };

            position = position.wrapping_add(1);
        }
    }
}

unsafe impl<T: Send, const CAPACITY: usize, AtomicWrapper> Send
    for BoundedRing<T, CAPACITY, AtomicWrapper>
where
    AtomicWrapper: Deref<Target = AtomicUsize> + Default + Send,
{
}

unsafe impl<T: Send, const CAPACITY: usize, AtomicWrapper> Sync
    for BoundedRing<T, CAPACITY, AtomicWrapper>
where
    AtomicWrapper: Deref<Target = AtomicUsize> + Default + Sync,
{
}

/// The producer handle of a shared [`BoundedRing`]. It can be cloned and sent to
/// other threads; every clone may enqueue concurrently.
pub struct BoundedProducer<
    T,
    const CAPACITY: usize,
    AtomicWrapper: Deref<Target = AtomicUsize> + Default = CachePadded<AtomicUsize>,
> {
    inner: Arc<BoundedRing<T, CAPACITY, AtomicWrapper>>,
    _non_sync: PhantomData<*const ()>,
}

/// The consumer handle of a shared [`BoundedRing`]. It can be cloned and sent to
/// other threads; every clone may dequeue concurrently.
pub struct BoundedConsumer<
    T,
    const CAPACITY: usize,
    AtomicWrapper: Deref<Target = AtomicUsize> + Default = CachePadded<AtomicUsize>,
> {
    inner: Arc<BoundedRing<T, CAPACITY, AtomicWrapper>>,
    _non_sync: PhantomData<*const ()>,
}

impl<T, const CAPACITY: usize, AtomicWrapper> BoundedProducer<T, CAPACITY, AtomicWrapper>
where
    AtomicWrapper: Deref<Target = AtomicUsize> + Default,
{
    /// Returns a reference to the shared [`BoundedRing`].
    pub fn ring(&self) -> &BoundedRing<T, CAPACITY, AtomicWrapper> {
        &self.inner
    }

    /// See [`BoundedRing::try_enqueue`].
    #[inline]
    pub fn try_enqueue(&self, value: T) -> Result<(), EnqueueErr<T>> {
        self.inner.try_enqueue(value)
    }

    /// Creates a consumer of the same ring.
    pub fn consumer(&self) -> BoundedConsumer<T, CAPACITY, AtomicWrapper> {
        BoundedConsumer {
            inner: self.inner.clone(),
            _non_sync: PhantomData,
        }
    }
}

impl<T, const CAPACITY: usize, AtomicWrapper> BoundedConsumer<T, CAPACITY, AtomicWrapper>
where
    AtomicWrapper: Deref<Target = AtomicUsize> + Default,
{
    /// Returns a reference to the shared [`BoundedRing`].
    pub fn ring(&self) -> &BoundedRing<T, CAPACITY, AtomicWrapper> {
        &self.inner
    }

    /// See [`BoundedRing::try_dequeue`].
    #[inline]
    pub fn try_dequeue(&self) -> Result<T, DequeueErr> {
        self.inner.try_dequeue()
    }

    /// Creates a producer of the same ring.
    pub fn producer(&self) -> BoundedProducer<T, CAPACITY, AtomicWrapper> {
        BoundedProducer {
            inner: self.inner.clone(),
            _non_sync: PhantomData,
        }
    }
}

impl<T, const CAPACITY: usize, AtomicWrapper> Clone for BoundedProducer<T, CAPACITY, AtomicWrapper>
where
    AtomicWrapper: Deref<Target = AtomicUsize> + Default,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _non_sync: PhantomData,
        }
    }
}

impl<T, const CAPACITY: usize, AtomicWrapper> Clone for BoundedConsumer<T, CAPACITY, AtomicWrapper>
where
    AtomicWrapper: Deref<Target = AtomicUsize> + Default,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _non_sync: PhantomData,
        }
    }
}

#[allow(clippy::non_send_fields_in_send_ty, reason = "We guarantee it is safe")]
unsafe impl<T: Send, const CAPACITY: usize, AtomicWrapper> Send
    for BoundedProducer<T, CAPACITY, AtomicWrapper>
where
    AtomicWrapper: Deref<Target = AtomicUsize> + Default + Send + Sync,
{
}

#[allow(clippy::non_send_fields_in_send_ty, reason = "We guarantee it is safe")]
unsafe impl<T: Send, const CAPACITY: usize, AtomicWrapper> Send
    for BoundedConsumer<T, CAPACITY, AtomicWrapper>
where
    AtomicWrapper: Deref<Target = AtomicUsize> + Default + Send + Sync,
{
}

/// Creates a new multi-producer, multi-consumer ring with cache-padded cursors.
/// Returns [`producer`](BoundedProducer) and [`consumer`](BoundedConsumer).
///
/// # Cache padding
///
/// Padding costs two cache lines per ring. If the memory matters more than false
/// sharing between producers and consumers, use [`new_compact_bounded`].
///
/// # Examples
///
/// ```
/// use nbcoll::mpmc::new_bounded;
///
/// let (producer, consumer) = new_bounded::<_, 256>();
/// let producer2 = producer.clone();
///
/// producer.try_enqueue(1).unwrap();
/// producer2.try_enqueue(2).unwrap();
///
/// assert_eq!(consumer.try_dequeue(), Ok(1));
/// assert_eq!(consumer.try_dequeue(), Ok(2));
/// ```
pub fn new_bounded<T: Send, const CAPACITY: usize>() -> (
    BoundedProducer<T, CAPACITY>,
    BoundedConsumer<T, CAPACITY>,
) {
    let ring = Arc::new(BoundedRing::new());

    (
        BoundedProducer {
            inner: ring.clone(),
            _non_sync: PhantomData,
        },
        BoundedConsumer {
            inner: ring,
            _non_sync: PhantomData,
        },
    )
}

/// Creates a new multi-producer, multi-consumer ring without cursor padding.
/// Read more in [`new_bounded`].
pub fn new_compact_bounded<T: Send, const CAPACITY: usize>() -> (
    BoundedProducer<T, CAPACITY, NotCachePadded<AtomicUsize>>,
    BoundedConsumer<T, CAPACITY, NotCachePadded<AtomicUsize>>,
) {
    let ring = Arc::new(BoundedRing::new());

    (
        BoundedProducer {
            inner: ring.clone(),
            _non_sync: PhantomData,
        },
        BoundedConsumer {
            inner: ring,
            _non_sync: PhantomData,
        },
    )
}
