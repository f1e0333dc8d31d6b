//! This module provides an intrusive multi-producer, single-consumer queue.
//! Read more in [`IntrusiveMpscQueue`].
use crate::cache_padded::CachePadded;
use crate::errors::DequeueErr;
use crate::loom_bindings::hint::spin_loop;
use crate::loom_bindings::sync::Arc;
use crate::loom_bindings::sync::atomic::AtomicPtr;
use crate::trace;
use std::cell::UnsafeCell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};

/// The forward link of a node. Both the stub and every [`MpscNode`] start with it.
struct Links {
    next: AtomicPtr<Links>,
}

impl Links {
    fn new() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

/// A node of an [`IntrusiveMpscQueue`]: the forward link and the value.
///
/// The queue never allocates nodes. The caller boxes a node, moves it into the
/// queue with [`push`](IntrusiveMpscQueue::push) and gets the same box back from a
/// pop.
#[repr(C)]
pub struct MpscNode<T> {
    links: Links,
    value: T,
}

impl<T> MpscNode<T> {
    /// Creates a new unlinked node.
    pub fn new(value: T) -> Self {
        Self {
            links: Links::new(),
            value,
        }
    }

    /// Creates a new unlinked node on the heap, ready to be pushed.
    pub fn boxed(value: T) -> Box<Self> {
        Box::new(Self::new(value))
    }

    /// Returns a reference to the value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns a mutable reference to the value.
    pub fn value_mut(&mut self) -> &mut T {
        &mut self.value
    }

    /// Consumes the node and returns the value.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: fmt::Debug> fmt::Debug for MpscNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MpscNode")
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

/// An unbounded multi-producer, single-consumer queue of caller-provided nodes.
///
/// Any number of threads may [`push`](Self::push) concurrently. A push is two
/// atomic steps: it swaps the head to the new node, then links the previous head
/// to it. There is no compare-and-swap on either side.
///
/// Only one thread may pop at a time, so [`try_pop`](Self::try_pop) is unsafe;
/// [`new_intrusive`] returns a unique [`MpscConsumer`] that moves this contract
/// into the type system.
///
/// # Inconsistent states
///
/// Between the two steps of a push, the consumer can see a head that is not linked
/// yet. Then [`try_pop`](Self::try_pop) returns [`DequeueErr::Contention`]: the item
/// exists, but it is only reachable after the producer finishes its push. This
/// includes the case when the consumer pushed the internal stub node to close the
/// window and still saw no successor. The item is returned by a later pop.
pub struct IntrusiveMpscQueue<T> {
    head: CachePadded<AtomicPtr<Links>>,
    tail: CachePadded<UnsafeCell<*mut Links>>,
    stub: Box<Links>,
    _marker: PhantomData<Box<MpscNode<T>>>,
}

impl<T> IntrusiveMpscQueue<T> {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        let stub = Box::new(Links::new());
        let stub_ptr = ptr::from_ref(&*stub).cast_mut();

        Self {
            head: CachePadded::new(AtomicPtr::new(stub_ptr)),
            tail: CachePadded::new(UnsafeCell::new(stub_ptr)),
            stub,
            _marker: PhantomData,
        }
    }

    #[inline(always)]
    fn stub_ptr(&self) -> *mut Links {
        ptr::from_ref(&*self.stub).cast_mut()
    }

    /// Pushes the node into the queue.
    ///
    /// It never waits and never fails. The queue owns the node until it is popped
    /// or the queue is dropped.
    pub fn push(&self, node: Box<MpscNode<T>>) {
        let node = Box::into_raw(node);

        // The node is ours until the swap below publishes it.
        unsafe { (*node).links.next.store(ptr::null_mut(), Relaxed) };

        self.push_links(node.cast::<Links>());
    }

    #[inline]
    fn push_links(&self, links: *mut Links) {
        let prev = self.head.swap(links, AcqRel);

        // There is always a stub or a node in the queue, so `prev` is never null.
        unsafe { (*prev).next.store(links, Release) };
    }

    /// Returns whether the queue looks empty. It is a hint: concurrent pushes may
    /// change it right after it is read.
    pub fn is_empty(&self) -> bool {
        self.head.load(Acquire) == self.stub_ptr()
    }

    /// Makes a single attempt to pop the oldest node.
    ///
    /// # Errors
    ///
    /// * [`DequeueErr::Empty`] if the queue is empty;
    /// * [`DequeueErr::Contention`] if a push is in flight and its node is not linked
    ///   yet. Read more in [inconsistent states](Self#inconsistent-states).
    ///
    /// # Safety
    ///
    /// The caller must be the only consumer.
    pub unsafe fn try_pop(&self) -> Result<Box<MpscNode<T>>, DequeueErr> {
        let tail_cell = unsafe { &mut *self.tail.get() };
        let stub = self.stub_ptr();
        let mut tail = *tail_cell;
        let mut next = unsafe { (*tail).next.load(Acquire) };

        if tail == stub {
            if next.is_null() {
                return Err(DequeueErr::Empty);
            }

            // Skip the stub. It is never returned.
            *tail_cell = next;
            tail = next;
            next = unsafe { (*next).next.load(Acquire) };
        }

        if !next.is_null() {
            *tail_cell = next;

            return Ok(unsafe { Box::from_raw(tail.cast::<MpscNode<T>>()) });
        }

        if tail != self.head.load(Acquire) {
            return Err(DequeueErr::Contention);
        }

        // `tail` is the last node. Push the stub behind it so that it gets a successor.
        // The stub still links to the node it was skipped for.
        unsafe { (*stub).next.store(ptr::null_mut(), Relaxed) };

        self.push_links(stub);

        next = unsafe { (*tail).next.load(Acquire) };

        if next.is_null() {
            trace::debug!("IntrusiveMpscQueue: a push is in flight behind the stub");

            return Err(DequeueErr::Contention);
        }

        *tail_cell = next;

        Ok(unsafe { Box::from_raw(tail.cast::<MpscNode<T>>()) })
    }

    /// Pops the oldest node or returns `None` if the queue is empty.
    ///
    /// It spins while a push is in flight.
    ///
    /// # Safety
    ///
    /// The caller must be the only consumer.
    pub unsafe fn pop(&self) -> Option<Box<MpscNode<T>>> {
        loop {
            match unsafe { self.try_pop() } {
                Ok(node) => return Some(node),
                Err(DequeueErr::Empty) => return None,
                Err(DequeueErr::Contention) => spin_loop(),
            }
        }
    }
}

impl<T> Default for IntrusiveMpscQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for IntrusiveMpscQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntrusiveMpscQueue")
            .field("head", &self.head.load(Relaxed))
            .field("stub", &self.stub_ptr())
            .finish_non_exhaustive()
    }
}

impl<T> Drop for IntrusiveMpscQueue<T> {
    fn drop(&mut self) {
        let stub = self.stub_ptr();
        let mut current = *self.tail.get_mut();

        while !current.is_null() {
            // We hold `&mut self`: every push has returned.
            let next = unsafe { (*current).next.unsync_load() };

            if current != stub {
                drop(unsafe { Box::from_raw(current.cast::<MpscNode<T>>()) });
            }

            current = next;
        }
    }
}

unsafe impl<T: Send> Send for IntrusiveMpscQueue<T> {}
unsafe impl<T: Send> Sync for IntrusiveMpscQueue<T> {}

/// A producer of an [`IntrusiveMpscQueue`] created with [`new_intrusive`].
/// It can be cloned and sent to other threads.
pub struct MpscProducer<T> {
    inner: Arc<IntrusiveMpscQueue<T>>,
}

impl<T> MpscProducer<T> {
    /// See [`IntrusiveMpscQueue::push`].
    #[inline]
    pub fn push(&self, node: Box<MpscNode<T>>) {
        self.inner.push(node);
    }

    /// Boxes the value into a new node and pushes it.
    pub fn push_value(&self, value: T) {
        self.inner.push(MpscNode::boxed(value));
    }
}

impl<T> Clone for MpscProducer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// The only consumer of an [`IntrusiveMpscQueue`] created with [`new_intrusive`].
///
/// It can be sent to another thread but not cloned.
pub struct MpscConsumer<T> {
    inner: Arc<IntrusiveMpscQueue<T>>,
    _non_sync: PhantomData<*const ()>,
}

impl<T> MpscConsumer<T> {
    /// See [`IntrusiveMpscQueue::try_pop`].
    #[inline]
    pub fn try_pop(&self) -> Result<Box<MpscNode<T>>, DequeueErr> {
        unsafe { self.inner.try_pop() }
    }

    /// See [`IntrusiveMpscQueue::pop`].
    #[inline]
    pub fn pop(&self) -> Option<Box<MpscNode<T>>> {
        unsafe { self.inner.pop() }
    }

    /// See [`IntrusiveMpscQueue::is_empty`].
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[allow(clippy::non_send_fields_in_send_ty, reason = "We guarantee it is safe")]
unsafe impl<T: Send> Send for MpscConsumer<T> {}

/// Creates a new [`IntrusiveMpscQueue`] and returns a cloneable
/// [`producer`](MpscProducer) and the only [`consumer`](MpscConsumer).
///
/// # Examples
///
/// ```
/// use nbcoll::mpsc::{MpscNode, new_intrusive};
///
/// let (producer, consumer) = new_intrusive();
/// let producer2 = producer.clone();
///
/// producer.push(MpscNode::boxed(1));
/// producer2.push_value(2);
///
/// assert_eq!(consumer.pop().map(|node| node.into_inner()), Some(1));
/// assert_eq!(consumer.pop().map(|node| node.into_inner()), Some(2));
/// assert!(consumer.pop().is_none());
/// ```
pub fn new_intrusive<T: Send>() -> (MpscProducer<T>, MpscConsumer<T>) {
    let queue = Arc::new(IntrusiveMpscQueue::new());

    (
        MpscProducer {
            inner: queue.clone(),
        },
        MpscConsumer {
            inner: queue,
            _non_sync: PhantomData,
        },
    )
}
