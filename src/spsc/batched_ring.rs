//! This module provides a single-producer, single-consumer ring with batch look-ahead.
//! Read more in [`BatchedRing`].
use crate::cache_padded::CachePadded;
use crate::errors::{DequeueErr, EnqueueErr, InitError};
use crate::hints::unlikely;
use crate::loom_bindings::hint::spin_loop;
use crate::loom_bindings::sync::Arc;
use crate::loom_bindings::sync::atomic::AtomicBool;
use crate::spsc::BatchConfig;
use crate::trace;
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{MaybeUninit, needs_drop};
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

// Implementation notes.
//
// Nothing but the per-slot occupancy flags is shared between the two sides. The
// producer only writes free slots and the consumer only reads occupied ones, and
// both walk the ring in position order. So:
//   - if the producer sees the slot `head + batch - 1` free, the consumer has
//     already released every slot before it, and `batch` slots can be written
//     without looking at the flags again;
//   - if the consumer sees the slot `tail + batch - 1` occupied, the producer has
//     already published every slot before it.
//
// The flags are written with release and probed with acquire, so the probe of the
// last slot of a batch synchronizes with the writes to all the slots before it.

struct Slot<T> {
    occupied: AtomicBool,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            occupied: AtomicBool::new(false),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }
}

struct ProducerState {
    head: usize,
    batch_head: usize,
}

struct ConsumerState {
    tail: usize,
    batch_tail: usize,
    batch_history: usize,
}

/// A fixed-capacity single-producer, single-consumer ring.
///
/// The producer confirms a whole batch of free slots with a single look-ahead and
/// then writes the batch without reading shared state. The consumer looks ahead
/// for a batch of published slots in the same way; when the look-ahead slot is
/// still empty, it waits [`congestion_penalty`](BatchConfig::congestion_penalty)
/// spin iterations and halves its batch, down to reporting
/// [`Empty`](DequeueErr::Empty).
///
/// Every slot carries an explicit occupancy flag, so any `T` can be stored.
///
/// It is safe to use when and only when only one thread is enqueuing at the same
/// time, and only one thread is dequeuing at the same time. That is why
/// [`enqueue`](Self::enqueue) and [`dequeue`](Self::dequeue) are unsafe; the
/// handles returned by [`new_batched`] move that contract into the type system.
///
/// `CAPACITY` must be a power of two.
pub struct BatchedRing<T, const CAPACITY: usize> {
    producer: CachePadded<UnsafeCell<ProducerState>>,
    consumer: CachePadded<UnsafeCell<ConsumerState>>,
    config: BatchConfig,
    slots: Box<[Slot<T>]>,
}

impl<T, const CAPACITY: usize> BatchedRing<T, CAPACITY> {
    const MASK: usize = CAPACITY - 1;

    const CAPACITY_CHECK: () = assert!(
        CAPACITY.is_power_of_two(),
        "BatchedRing capacity must be a power of two"
    );

    /// Creates a new empty [`BatchedRing`] with [`BatchConfig::for_capacity`].
    pub fn new() -> Self {
        Self::with_valid_config(BatchConfig::for_capacity(CAPACITY))
    }

    /// Creates a new empty [`BatchedRing`] with the provided configuration.
    ///
    /// # Errors
    ///
    /// [`InitError::InvalidBatchConfig`] if the batch size is not within
    /// `1..=CAPACITY` or the batch increment is 0.
    pub fn with_config(config: BatchConfig) -> Result<Self, InitError> {
        if let Err(err) = config.validate(CAPACITY) {
            trace::warn!(?config, capacity = CAPACITY, "BatchedRing: invalid config");

            return Err(err);
        }

        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: BatchConfig) -> Self {
        let () = Self::CAPACITY_CHECK;

        Self {
            producer: CachePadded::new(UnsafeCell::new(ProducerState {
                head: 0,
                batch_head: 0,
            })),
            consumer: CachePadded::new(UnsafeCell::new(ConsumerState {
                tail: 0,
                batch_tail: 0,
                batch_history: config.batch_size,
            })),
            config,
            slots: (0..CAPACITY).map(|_| Slot::new()).collect(),
        }
    }

    #[inline(always)]
    fn slot(&self, position: usize) -> &Slot<T> {
        &self.slots[position & Self::MASK]
    }

    /// Returns the capacity of the ring.
    #[inline]
    pub const fn capacity(&self) -> usize {
        CAPACITY
    }

    /// Returns the configuration of the ring.
    #[inline]
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Enqueues the value or returns it back in [`EnqueueErr::Full`] if the next
    /// batch of slots is not free yet.
    ///
    /// The producer never waits: it is the caller who decides when to retry.
    ///
    /// # Safety
    ///
    /// The caller must be the only producer.
    pub unsafe fn enqueue(&self, value: T) -> Result<(), EnqueueErr<T>> {
        let state = unsafe { &mut *self.producer.get() };

        if state.head == state.batch_head {
            let batch_size = self.config.batch_size;
            let probe = state.head.wrapping_add(batch_size - 1);

            if unlikely(self.slot(probe).occupied.load(Acquire)) {
                return Err(EnqueueErr::Full(value));
            }

            state.batch_head = state.head.wrapping_add(batch_size);
        }

        let slot = self.slot(state.head);

        debug_assert!(!slot.occupied.load(Relaxed));

        unsafe { (*slot.value.get()).write(value) };

        slot.occupied.store(true, Release);
        state.head = state.head.wrapping_add(1);

        Ok(())
    }

    /// Dequeues a value.
    ///
    /// When a new batch is needed and the look-ahead slot is not published yet, it
    /// spins and halves the batch. It returns [`DequeueErr::Empty`] when the batch
    /// reaches zero, so a lone value is still found at a batch of one.
    ///
    /// # Safety
    ///
    /// The caller must be the only consumer.
    pub unsafe fn dequeue(&self) -> Result<T, DequeueErr> {
        let state = unsafe { &mut *self.consumer.get() };

        if state.tail == state.batch_tail {
            state.batch_history = state
                .batch_history
                .saturating_add(self.config.batch_increment)
                .min(self.config.batch_size);

            let mut batch_size = state.batch_history;

            while !self
                .slot(state.tail.wrapping_add(batch_size - 1))
                .occupied
                .load(Acquire)
            {
                for _ in 0..self.config.congestion_penalty {
                    spin_loop();
                }

                batch_size >>= 1;

                if batch_size == 0 {
                    return Err(DequeueErr::Empty);
                }
            }

            if batch_size < state.batch_history {
                trace::trace!(
                    from = state.batch_history,
                    to = batch_size,
                    "BatchedRing: consumer batch shrunk"
                );
            }

            state.batch_history = batch_size;
            state.batch_tail = state.tail.wrapping_add(batch_size);
        }

        let slot = self.slot(state.tail);

        debug_assert!(slot.occupied.load(Relaxed));

        let value = unsafe { (*slot.value.get()).assume_init_read() };

        slot.occupied.store(false, Release);
        state.tail = state.tail.wrapping_add(1);

        Ok(value)
    }
}

impl<T, const CAPACITY: usize> Default for BatchedRing<T, CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const CAPACITY: usize> fmt::Debug for BatchedRing<T, CAPACITY> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchedRing")
            .field("capacity", &CAPACITY)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T, const CAPACITY: usize> Drop for BatchedRing<T, CAPACITY> {
    fn drop(&mut self) {
        if !needs_drop::<T>() {
            return;
        }

        for slot in self.slots.iter_mut() {
            if slot.occupied.load(Relaxed) {
                unsafe { slot.value.get_mut().assume_init_drop() };
            }
        }
    }
}

unsafe impl<T: Send, const CAPACITY: usize> Send for BatchedRing<T, CAPACITY> {}
unsafe impl<T: Send, const CAPACITY: usize> Sync for BatchedRing<T, CAPACITY> {}

/// The producer of a [`BatchedRing`] created with [`new_batched`].
///
/// It can be sent to another thread but not cloned, so it is the only producer.
pub struct BatchedProducer<T, const CAPACITY: usize> {
    inner: Arc<BatchedRing<T, CAPACITY>>,
    _non_sync: PhantomData<*const ()>,
}

impl<T, const CAPACITY: usize> BatchedProducer<T, CAPACITY> {
    /// Returns the capacity of the ring.
    pub fn capacity(&self) -> usize {
        CAPACITY
    }

    /// Enqueues the value. Read more in [`BatchedRing::enqueue`].
    #[inline]
    pub fn enqueue(&self, value: T) -> Result<(), EnqueueErr<T>> {
        unsafe { self.inner.enqueue(value) }
    }
}

/// The consumer of a [`BatchedRing`] created with [`new_batched`].
///
/// It can be sent to another thread but not cloned, so it is the only consumer.
pub struct BatchedConsumer<T, const CAPACITY: usize> {
    inner: Arc<BatchedRing<T, CAPACITY>>,
    _non_sync: PhantomData<*const ()>,
}

impl<T, const CAPACITY: usize> BatchedConsumer<T, CAPACITY> {
    /// Returns the capacity of the ring.
    pub fn capacity(&self) -> usize {
        CAPACITY
    }

    /// Dequeues a value. Read more in [`BatchedRing::dequeue`].
    #[inline]
    pub fn dequeue(&self) -> Result<T, DequeueErr> {
        unsafe { self.inner.dequeue() }
    }
}

#[allow(clippy::non_send_fields_in_send_ty, reason = "We guarantee it is safe")]
unsafe impl<T: Send, const CAPACITY: usize> Send for BatchedProducer<T, CAPACITY> {}
#[allow(clippy::non_send_fields_in_send_ty, reason = "We guarantee it is safe")]
unsafe impl<T: Send, const CAPACITY: usize> Send for BatchedConsumer<T, CAPACITY> {}

fn split<T, const CAPACITY: usize>(
    ring: BatchedRing<T, CAPACITY>,
) -> (BatchedProducer<T, CAPACITY>, BatchedConsumer<T, CAPACITY>) {
    let ring = Arc::new(ring);

    (
        BatchedProducer {
            inner: ring.clone(),
            _non_sync: PhantomData,
        },
        BatchedConsumer {
            inner: ring,
            _non_sync: PhantomData,
        },
    )
}

/// Creates a new [`BatchedRing`] with the default configuration and returns its
/// only [`producer`](BatchedProducer) and only [`consumer`](BatchedConsumer).
///
/// # Examples
///
/// ```
/// use nbcoll::spsc::new_batched;
///
/// let (producer, consumer) = new_batched::<_, 256>();
///
/// std::thread::spawn(move || {
///     for i in 0..100 {
///         while producer.enqueue(i).is_err() {}
///     }
/// });
///
/// for i in 0..100 {
///     loop {
///         if let Ok(value) = consumer.dequeue() {
///             assert_eq!(value, i);
///
///             break;
///         }
///     }
/// }
/// ```
pub fn new_batched<T: Send, const CAPACITY: usize>()
-> (BatchedProducer<T, CAPACITY>, BatchedConsumer<T, CAPACITY>) {
    split(BatchedRing::new())
}

/// Creates a new [`BatchedRing`] with the provided configuration.
/// Read more in [`new_batched`] and [`BatchedRing::with_config`].
pub fn new_batched_with_config<T: Send, const CAPACITY: usize>(
    config: BatchConfig,
) -> Result<(BatchedProducer<T, CAPACITY>, BatchedConsumer<T, CAPACITY>), InitError> {
    BatchedRing::with_config(config).map(split)
}
