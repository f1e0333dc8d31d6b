use crate::list::non_blocking_list::{Link, link};
use crate::list::{ListNode, NonBlockingList};
use crate::suspicious_orders::SUSPICIOUS_RELAXED_ACQUIRE;
use std::ptr;
use std::sync::atomic::Ordering::Acquire;

/// A forward-only position in a [`NonBlockingList`] that can delete the node it
/// points to.
///
/// A cursor never writes to the list except through [`del_at`](Self::del_at). It
/// skips the nodes it finds marked, but a node it returns may be deleted
/// concurrently right after.
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
/// // Deletes every node from the second one onward.
/// let mut cursor = list.cursor();
/// let mut node = cursor.first().and_then(|_| cursor.next());
///
/// while node.is_some() {
///     assert!(cursor.del_at());
///     assert!(!cursor.del_at());
///
///     node = cursor.next();
/// }
///
/// assert_eq!(list.iter().map(|node| *node.value()).collect::<Vec<_>>(), [3]);
/// ```
pub struct Cursor<'l, 'a, T> {
    list: &'l NonBlockingList<'a, T>,
    /// `None` after a `del_at` until the cursor is advanced.
    prev: Option<*mut Link>,
    cur: *mut Link,
}

impl<'l, 'a, T> Cursor<'l, 'a, T> {
    pub(crate) fn new(list: &'l NonBlockingList<'a, T>) -> Self {
        Self {
            list,
            prev: None,
            cur: ptr::null_mut(),
        }
    }

    fn skip_dead_nodes(&mut self) -> Option<&'a ListNode<T>> {
        while !self.cur.is_null() {
            let next = link(self.cur).load_next(SUSPICIOUS_RELAXED_ACQUIRE);

            if !next.is_marked() {
                return Some(unsafe { ListNode::from_link(self.cur) });
            }

            // `prev` stays where it was.
            self.cur = next.as_ptr();
        }

        None
    }

    /// Moves the cursor to the first live node and returns it.
    pub fn first(&mut self) -> Option<&'a ListNode<T>> {
        let head = self.list.head_ptr();

        self.prev = Some(head);
        self.cur = link(head).load_next(Acquire).as_ptr();

        self.skip_dead_nodes()
    }

    /// Moves the cursor to the next live node and returns it.
    ///
    /// Returns `None` at the end of the list. A cursor that was never positioned
    /// starts from the first node.
    #[allow(
        clippy::should_implement_trait,
        reason = "A cursor is positioned explicitly; see `NonBlockingList::iter`"
    )]
    pub fn next(&mut self) -> Option<&'a ListNode<T>> {
        if self.cur.is_null() {
            if self.prev.is_none() {
                return self.first();
            }

            return None;
        }

        self.prev = Some(self.cur);
        self.cur = link(self.cur)
            .load_next(SUSPICIOUS_RELAXED_ACQUIRE)
            .as_ptr();

        self.skip_dead_nodes()
    }

    /// Returns the node the cursor points to, if any. It may be marked by now.
    pub fn current(&self) -> Option<&'a ListNode<T>> {
        if self.cur.is_null() {
            None
        } else {
            Some(unsafe { ListNode::from_link(self.cur) })
        }
    }

    /// Tries to delete the node returned by the last [`first`](Self::first) or
    /// [`next`](Self::next).
    ///
    /// Returns `true` if this call removed it. Returns `false` at the end of the
    /// list, if the node is already deleted, or if `del_at` was already called at
    /// this position. The cursor stays usable: [`next`](Self::next) continues from
    /// the deleted node.
    pub fn del_at(&mut self) -> bool {
        if self.cur.is_null() {
            return false;
        }

        let Some(prev) = self.prev.take() else {
            return false;
        };

        if link(self.cur).load_next(Acquire).is_marked() {
            return false;
        }

        let prev_val = link(prev).load_next(Acquire);

        NonBlockingList::<T>::delete_from(prev, prev_val, self.cur)
    }
}
