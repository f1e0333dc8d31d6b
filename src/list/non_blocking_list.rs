//! This module provides the Fomitchev-Ruppert lock-free singly linked list.
//! Read more in [`NonBlockingList`].
use crate::errors::PushErr;
use crate::list::Cursor;
use crate::list::marked_ptr::MarkedPtr;
use crate::loom_bindings::sync::atomic::{AtomicBool, AtomicPtr};
use crate::trace;
use std::fmt;
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};

// Implementation notes.
//
// A deletion of `n` with predecessor `p` goes through three steps, each a single
// CAS that any thread may perform:
//   1. flag:  `p.next`  n        -> n | FLAG   (p may not change until step 3)
//   2. mark:  `n.next`  s        -> s | MARK   (n is logically deleted)
//   3. rend:  `p.next`  n | FLAG -> s          (n is physically removed)
//
// Before marking, `n.backlink` is set to `p`. A thread that finds its predecessor
// marked walks the backlinks back to a live node and searches forward again.
//
// A flagged link is never marked: marking a node first clears the flag of its own
// link by completing the deletion of its successor. So a flagged predecessor stays
// alive until its successor is removed.
//
// Nodes are never freed by the list and are linked at most once, so every address
// observed in a link stays valid and never reappears in another position.

/// The link of a node: the tagged forward pointer and the backlink.
#[repr(C, align(4))]
pub(crate) struct Link {
    pub(crate) next: AtomicPtr<Link>,
    pub(crate) backlink: AtomicPtr<Link>,
}

impl Link {
    fn new() -> Self {
        Self {
            next: AtomicPtr::new(ptr::null_mut()),
            backlink: AtomicPtr::new(ptr::null_mut()),
        }
    }

    #[inline(always)]
    pub(crate) fn load_next(&self, order: std::sync::atomic::Ordering) -> MarkedPtr<Link> {
        MarkedPtr::new(self.next.load(order))
    }
}

/// A node of a [`NonBlockingList`].
///
/// The storage belongs to the caller. The list borrows it for its lifetime and
/// never frees it. A node can be linked into a list only once; after it is removed
/// it stays [marked](Self::is_marked) forever.
#[repr(C)]
pub struct ListNode<T> {
    link: Link,
    linked: AtomicBool,
    value: T,
}

impl<T> ListNode<T> {
    /// Creates a new unlinked node.
    pub fn new(value: T) -> Self {
        Self {
            link: Link::new(),
            linked: AtomicBool::new(false),
            value,
        }
    }

    /// Returns a reference to the value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns whether the node is logically deleted.
    pub fn is_marked(&self) -> bool {
        self.link.load_next(Acquire).is_marked()
    }

    /// Returns a pointer to the link that still covers the whole node, so that
    /// [`from_link`](Self::from_link) can turn it back into the node.
    #[inline(always)]
    pub(crate) fn link_ptr(&self) -> *mut Link {
        // `link` is at offset 0 of the `repr(C)` node.
        ptr::from_ref(self).cast::<Link>().cast_mut()
    }

    /// # Safety
    ///
    /// `link` must be the link of a `ListNode<T>` that lives for `'a`.
    #[inline(always)]
    pub(crate) unsafe fn from_link<'a>(link: *mut Link) -> &'a Self {
        unsafe { &*link.cast::<Self>() }
    }
}

impl<T: fmt::Debug> fmt::Debug for ListNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListNode")
            .field("value", &self.value)
            .field("marked", &self.is_marked())
            .finish_non_exhaustive()
    }
}

/// An unbounded lock-free singly linked list of caller-owned nodes.
///
/// It supports [`push`](Self::push) at the head, [`pop`](Self::pop) and
/// [`top`](Self::top) of the head, [`del`](Self::del) of any node, and forward
/// iteration with an optional deletion at the [cursor](Cursor).
///
/// Every operation is lock-free. Threads that run into a pending deletion complete
/// it before going on.
///
/// # Example
///
/// ```
/// use nbcoll::list::{ListNode, NonBlockingList};
///
/// let nodes = [ListNode::new(1), ListNode::new(2), ListNode::new(3)];
/// let list = NonBlockingList::new();
///
/// for node in &nodes {
///     list.push_front(node).unwrap();
/// }
///
/// assert!(list.del(&nodes[1]));
/// assert_eq!(list.iter().map(|node| *node.value()).collect::<Vec<_>>(), [3, 1]);
/// assert_eq!(list.pop().map(|node| *node.value()), Some(3));
/// ```
pub struct NonBlockingList<'a, T> {
    head: Box<Link>,
    _marker: PhantomData<&'a ListNode<T>>,
}

#[inline(always)]
pub(crate) fn link<'l>(ptr: *mut Link) -> &'l Link {
    debug_assert!(!ptr.is_null());

    // Links are the sentinel of a live list or nodes borrowed by it.
    unsafe { &*ptr }
}

impl<'a, T> NonBlockingList<'a, T> {
    /// Creates a new empty list.
    pub fn new() -> Self {
        Self {
            head: Box::new(Link::new()),
            _marker: PhantomData,
        }
    }

    #[inline(always)]
    pub(crate) fn head_ptr(&self) -> *mut Link {
        ptr::from_ref(&*self.head).cast_mut()
    }

    /// Flags `prev -> target`, where `prev_val` is a value of `prev.next`.
    ///
    /// Returns the node that points to `target` (or `None` if `target` is not in
    /// the list anymore) and whether this call flagged it.
    fn try_flag(
        mut prev: *mut Link,
        mut prev_val: MarkedPtr<Link>,
        target: *mut Link,
    ) -> (Option<*mut Link>, bool) {
        let flagged = MarkedPtr::new(target).with_flag();

        loop {
            if prev_val == flagged {
                return (Some(prev), false);
            }

            match link(prev)
                .next
                .compare_exchange(target, flagged.as_raw(), AcqRel, Acquire)
            {
                Ok(_) => return (Some(prev), true),
                Err(current) => {
                    prev_val = MarkedPtr::new(current);

                    if prev_val == flagged {
                        return (Some(prev), false);
                    }
                }
            }

            // `prev` was deleted under us. Walk the backlinks back to a live node.
            while prev_val.is_marked() {
                let back = link(prev).backlink.load(Acquire);

                debug_assert!(!back.is_null(), "a marked node always has a backlink");

                if back.is_null() {
                    return (None, false);
                }

                trace::trace!("NonBlockingList: recovering a predecessor by a backlink");

                prev = back;
                prev_val = link(prev).load_next(Acquire);
            }

            // And search forward for the node that points to `target`.
            match Self::search_from(prev, prev_val, target) {
                Some((found, found_val)) => {
                    prev = found;
                    prev_val = found_val;
                }
                None => return (None, false),
            }
        }
    }

    /// Walks forward from `prev`, where `prev_val` is a value of `prev.next`, to the
    /// node that points to `target`. Unlinks the marked nodes behind flagged links on
    /// the way.
    ///
    /// Returns that node and a value of its link, or `None` if `target` is not in
    /// the list anymore.
    fn search_from(
        mut prev: *mut Link,
        mut prev_val: MarkedPtr<Link>,
        target: *mut Link,
    ) -> Option<(*mut Link, MarkedPtr<Link>)> {
        loop {
            let n = prev_val.as_ptr();

            if n.is_null() {
                return None;
            }

            let n_val = link(n).load_next(Acquire);

            if n_val.is_marked() && prev_val.is_flagged() {
                Self::rend(prev, n, n_val);

                if n == target {
                    return None;
                }

                // `prev` is still alive: it was flagged. Stay on it.
                prev_val = link(prev).load_next(Acquire);

                continue;
            }

            if n == target {
                return Some((prev, prev_val));
            }

            prev = n;
            prev_val = n_val;
        }
    }

    /// Completes the deletion of `target` from its flagged predecessor `prev`.
    fn clear_flag(prev: *mut Link, target: *mut Link) {
        let old_backlink = link(target).backlink.swap(prev, AcqRel);

        debug_assert!(old_backlink.is_null() || old_backlink == prev);

        let mut next_val = link(target).load_next(Acquire);

        while !next_val.is_marked() {
            while next_val.is_flagged() {
                trace::trace!("NonBlockingList: helping to delete a successor");

                Self::clear_flag(target, next_val.as_ptr());

                next_val = link(target).load_next(Acquire);
            }

            match link(target).next.compare_exchange(
                next_val.as_raw(),
                next_val.with_mark().as_raw(),
                AcqRel,
                Acquire,
            ) {
                Ok(_) => next_val = next_val.with_mark(),
                Err(current) => next_val = MarkedPtr::new(current),
            }
        }

        Self::rend(prev, target, next_val);
    }

    /// Unlinks the marked `target` from its flagged predecessor `prev`, where
    /// `next_val` is the value of `target.next`.
    fn rend(prev: *mut Link, target: *mut Link, next_val: MarkedPtr<Link>) {
        debug_assert!(next_val.is_marked());
        debug_assert!(!next_val.is_flagged());

        let _ = link(prev).next.compare_exchange(
            MarkedPtr::new(target).with_flag().as_raw(),
            next_val.as_ptr(),
            AcqRel,
            Relaxed,
        );
    }

    /// Pushes `node` at the head of the list if the head is still `top`.
    ///
    /// If the head link is being deleted, it completes that deletion first.
    ///
    /// # Errors
    ///
    /// * [`PushErr::TopChanged`] if the head is not `top`. Refetch the
    ///   [`top`](Self::top) and retry;
    /// * [`PushErr::AlreadyLinked`] if `node` has been linked into a list before.
    pub fn push(&self, top: Option<&ListNode<T>>, node: &'a ListNode<T>) -> Result<(), PushErr> {
        if node.linked.swap(true, AcqRel) {
            return Err(PushErr::AlreadyLinked);
        }

        let head = self.head_ptr();
        let mut old = link(head).load_next(Acquire);

        while old.is_flagged() {
            Self::clear_flag(head, old.as_ptr());

            old = link(head).load_next(Acquire);
        }

        debug_assert!(!old.is_marked(), "the sentinel is never marked");

        let top = top.map_or(ptr::null_mut(), ListNode::link_ptr);

        if old.as_ptr() == top {
            let node_link = node.link_ptr();

            node.link.next.store(old.as_raw(), Relaxed);
            node.link.backlink.store(ptr::null_mut(), Relaxed);

            if link(head)
                .next
                .compare_exchange(old.as_raw(), node_link, AcqRel, Relaxed)
                .is_ok()
            {
                return Ok(());
            }
        }

        node.linked.store(false, Release);

        Err(PushErr::TopChanged)
    }

    /// Pushes `node` at the head of the list, retrying while the head changes.
    ///
    /// # Errors
    ///
    /// [`PushErr::AlreadyLinked`] if `node` has been linked into a list before.
    pub fn push_front(&self, node: &'a ListNode<T>) -> Result<(), PushErr> {
        loop {
            match self.push(self.top(), node) {
                Err(PushErr::TopChanged) => {}
                res => return res,
            }
        }
    }

    /// Removes and returns the first node that is not already being deleted, or
    /// returns `None` if there is no such node.
    pub fn pop(&self) -> Option<&'a ListNode<T>> {
        let mut prev = self.head_ptr();
        let mut prev_val = link(prev).load_next(Acquire);

        debug_assert!(!prev_val.is_marked(), "the sentinel is never marked");

        // Find the first `prev -> n` with a clean `prev.next` and flag it.
        let target = loop {
            let n = prev_val.as_ptr();

            if n.is_null() {
                return None;
            }

            if prev_val.is_tagged() {
                prev = n;
                prev_val = link(prev).load_next(Acquire);

                continue;
            }

            match link(prev).next.compare_exchange(
                n,
                prev_val.with_flag().as_raw(),
                AcqRel,
                Acquire,
            ) {
                Ok(_) => break n,
                Err(current) => prev_val = MarkedPtr::new(current),
            }
        };

        Self::clear_flag(prev, target);

        Some(unsafe { ListNode::from_link(target) })
    }

    /// Returns the first node of the list without removing it.
    ///
    /// The node may be concurrently deleted right after it is returned.
    pub fn top(&self) -> Option<&'a ListNode<T>> {
        let first = link(self.head_ptr()).load_next(Acquire).as_ptr();

        if first.is_null() {
            None
        } else {
            Some(unsafe { ListNode::from_link(first) })
        }
    }

    /// Returns whether the list has no nodes. It is a snapshot.
    pub fn is_empty(&self) -> bool {
        self.top().is_none()
    }

    /// Removes `target` from the list.
    ///
    /// Returns `true` if this call removed it. Returns `false` if another thread
    /// is removing it (then it is removed by the time this call returns) or if it
    /// is not in the list.
    pub fn del(&self, target: &ListNode<T>) -> bool {
        let target = target.link_ptr();
        let head = self.head_ptr();

        // Find `prev -> target`, completing deletions on the way.
        let Some((prev, prev_val)) =
            Self::search_from(head, link(head).load_next(Acquire), target)
        else {
            return false;
        };

        Self::delete_from(prev, prev_val, target)
    }

    /// Flags `prev -> target` and completes the deletion. Returns whether this call
    /// flagged it.
    pub(crate) fn delete_from(
        prev: *mut Link,
        prev_val: MarkedPtr<Link>,
        target: *mut Link,
    ) -> bool {
        let (prev, flagged) = Self::try_flag(prev, prev_val, target);

        if let Some(prev) = prev {
            Self::clear_flag(prev, target);
        }

        flagged
    }

    /// Returns a [`Cursor`] that is not positioned yet. Call [`Cursor::first`].
    pub fn cursor(&self) -> Cursor<'_, 'a, T> {
        Cursor::new(self)
    }

    /// Returns an iterator over the live nodes, from the head.
    ///
    /// It never writes to the list. It skips nodes that are marked when it reaches
    /// them, but a node it yields may be deleted concurrently.
    pub fn iter(&self) -> Iter<'_, 'a, T> {
        Iter {
            cursor: self.cursor(),
            started: false,
        }
    }
}

impl<T> Default for NonBlockingList<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for NonBlockingList<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(ListNode::value))
            .finish()
    }
}

impl<'l, 'a, T> IntoIterator for &'l NonBlockingList<'a, T> {
    type Item = &'a ListNode<T>;
    type IntoIter = Iter<'l, 'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The iterator returned by [`NonBlockingList::iter`].
pub struct Iter<'l, 'a, T> {
    cursor: Cursor<'l, 'a, T>,
    started: bool,
}

impl<'a, T> Iterator for Iter<'_, 'a, T> {
    type Item = &'a ListNode<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.started {
            self.cursor.next()
        } else {
            self.started = true;

            self.cursor.first()
        }
    }
}

#[cfg(all(test, not(nbcoll_loom)))]
mod tests {
    use super::*;

    fn values(list: &NonBlockingList<'_, u32>) -> Vec<u32> {
        list.iter().map(|node| *node.value()).collect()
    }

    #[test]
    fn test_list_scenario() {
        let nodes = [
            ListNode::new(1),
            ListNode::new(2),
            ListNode::new(3),
            ListNode::new(4),
        ];
        let list = NonBlockingList::new();

        for node in &nodes {
            list.push(list.top(), node).unwrap();
        }

        assert_eq!(values(&list), [4, 3, 2, 1]);
        assert_eq!(list.pop().map(|node| *node.value()), Some(4));
        assert!(nodes[3].is_marked());

        let top = list.top().unwrap();

        assert_eq!(*top.value(), 3);
        assert!(list.del(top));
        assert_eq!(list.top().map(|node| *node.value()), Some(2));

        assert!(list.del(&nodes[0]));
        assert_eq!(list.top().map(|node| *node.value()), Some(2));
        assert_eq!(list.pop().map(|node| *node.value()), Some(2));

        assert!(list.top().is_none());
        assert!(list.pop().is_none());
        assert!(list.is_empty());
    }

    #[test]
    fn test_list_reads_values_through_links() {
        let nodes = [
            ListNode::new(String::from("first")),
            ListNode::new(String::from("second")),
            ListNode::new(String::from("third")),
        ];
        let list = NonBlockingList::new();

        for node in &nodes {
            list.push_front(node).unwrap();
        }

        assert_eq!(list.top().map(|node| node.value().as_str()), Some("third"));
        assert_eq!(
            list.iter().map(|node| node.value().as_str()).collect::<Vec<_>>(),
            ["third", "second", "first"]
        );

        let mut cursor = list.cursor();

        assert_eq!(cursor.first().map(|node| node.value().as_str()), Some("third"));
        assert_eq!(cursor.next().map(|node| node.value().as_str()), Some("second"));
        assert_eq!(cursor.current().map(|node| node.value().len()), Some(6));

        assert_eq!(list.pop().map(|node| node.value().as_str()), Some("third"));
        assert!(list.del(&nodes[1]));
        assert_eq!(list.pop().map(|node| node.value().as_str()), Some("first"));
        assert!(list.is_empty());
    }

    #[test]
    fn test_list_push_with_stale_top() {
        let nodes = [ListNode::new(1), ListNode::new(2), ListNode::new(3)];
        let list = NonBlockingList::new();

        list.push(None, &nodes[0]).unwrap();

        assert_eq!(list.push(None, &nodes[1]), Err(PushErr::TopChanged));
        assert!(!nodes[1].linked.load(Relaxed));

        list.push(Some(&nodes[0]), &nodes[1]).unwrap();

        assert_eq!(list.push(Some(&nodes[0]), &nodes[2]), Err(PushErr::TopChanged));
        assert_eq!(values(&list), [2, 1]);
    }

    #[test]
    fn test_list_node_is_linked_once() {
        let node = ListNode::new(1);
        let list = NonBlockingList::new();
        let other = NonBlockingList::new();

        list.push_front(&node).unwrap();

        assert_eq!(list.push_front(&node), Err(PushErr::AlreadyLinked));
        assert_eq!(other.push_front(&node), Err(PushErr::AlreadyLinked));
        assert!(list.del(&node));
        assert_eq!(list.push_front(&node), Err(PushErr::AlreadyLinked));
        assert!(list.is_empty());
    }

    #[test]
    fn test_list_del_twice_and_missing() {
        let nodes = [ListNode::new(1), ListNode::new(2), ListNode::new(3)];
        let stranger = ListNode::new(4);
        let list = NonBlockingList::new();

        for node in &nodes {
            list.push_front(node).unwrap();
        }

        assert!(list.del(&nodes[1]));
        assert!(!list.del(&nodes[1]));
        assert!(!list.del(&stranger));
        assert_eq!(values(&list), [3, 1]);

        assert!(list.del(&nodes[0]));
        assert!(list.del(&nodes[2]));
        assert!(list.is_empty());
        assert!(!list.del(&nodes[2]));
    }

    #[test]
    fn test_list_completes_pending_deletion() {
        let nodes = [ListNode::new(1), ListNode::new(2), ListNode::new(3)];
        let list = NonBlockingList::new();

        for node in &nodes {
            list.push_front(node).unwrap();
        }

        // Simulate a thread that flagged `3 -> 2` and stalled.
        let prev = nodes[2].link_ptr();
        let target = nodes[1].link_ptr();
        let (flagged_prev, flagged) =
            NonBlockingList::<u32>::try_flag(prev, nodes[2].link.load_next(Acquire), target);

        assert_eq!(flagged_prev, Some(prev));
        assert!(flagged);

        // Another deleter of the same node completes the deletion and loses.
        assert!(!list.del(&nodes[1]));
        assert!(nodes[1].is_marked());
        assert_eq!(values(&list), [3, 1]);
    }

    #[test]
    fn test_list_push_helps_flagged_head() {
        let nodes = [ListNode::new(1), ListNode::new(2), ListNode::new(3)];
        let list = NonBlockingList::new();

        list.push_front(&nodes[0]).unwrap();
        list.push_front(&nodes[1]).unwrap();

        // Simulate a stalled pop: the head link is flagged, `2` is not marked yet.
        let head = list.head_ptr();
        let (_, flagged) = NonBlockingList::<u32>::try_flag(
            head,
            link(head).load_next(Acquire),
            nodes[1].link_ptr(),
        );

        assert!(flagged);

        list.push(Some(&nodes[0]), &nodes[2]).unwrap();

        assert!(nodes[1].is_marked());
        assert_eq!(values(&list), [3, 1]);
    }
}
