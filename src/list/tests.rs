use crate::list::{ListNode, NonBlockingList};
use crate::test_lock::TEST_LOCK;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

const THREADS: usize = 4;

#[test]
fn test_list_concurrent_push_pop() {
    const N: usize = 20_000;

    let test_guard = TEST_LOCK.lock();

    crate::trace::init_tracing();

    let nodes: Vec<_> = (0..THREADS * N).map(ListNode::new).collect();
    let list = NonBlockingList::new();
    let popped = Mutex::new(Vec::new());

    thread::scope(|scope| {
        for chunk in nodes.chunks(N) {
            let list = &list;
            let popped = &popped;

            scope.spawn(move || {
                let mut local = Vec::new();

                for (i, node) in chunk.iter().enumerate() {
                    list.push_front(node).unwrap();

                    if i % 2 == 1 {
                        if let Some(node) = list.pop() {
                            local.push(*node.value());
                        }
                    }
                }

                popped.lock().unwrap().extend(local);
            });
        }
    });

    let mut popped = popped.into_inner().unwrap();

    while let Some(node) = list.pop() {
        popped.push(*node.value());
    }

    popped.sort_unstable();

    assert_eq!(popped, (0..THREADS * N).collect::<Vec<_>>());
    assert!(nodes.iter().all(ListNode::is_marked));

    drop(test_guard);
}

#[test]
fn test_list_racing_del_succeeds_once() {
    const N: usize = 5_000;

    let test_guard = TEST_LOCK.lock();
    let nodes: Vec<_> = (0..N).map(ListNode::new).collect();
    let wins: Vec<_> = (0..N).map(|_| AtomicUsize::new(0)).collect();
    let list = NonBlockingList::new();

    for node in &nodes {
        list.push_front(node).unwrap();
    }

    thread::scope(|scope| {
        for t in 0..THREADS {
            let (list, nodes, wins) = (&list, &nodes, &wins);

            scope.spawn(move || {
                // Every thread deletes every node, in a different order.
                for i in 0..N {
                    let i = if t % 2 == 0 { i } else { N - 1 - i };

                    if list.del(&nodes[i]) {
                        wins[i].fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    for (i, wins) in wins.iter().enumerate() {
        assert_eq!(wins.load(Ordering::Relaxed), 1, "node {i}");
    }

    assert!(list.is_empty());

    drop(test_guard);
}

#[test]
fn test_list_pop_and_del_remove_each_node_once() {
    const N: usize = 10_000;

    let test_guard = TEST_LOCK.lock();
    let nodes: Vec<_> = (0..N).map(ListNode::new).collect();
    let removals: Vec<_> = (0..N).map(|_| AtomicUsize::new(0)).collect();
    let list = NonBlockingList::new();

    for node in &nodes {
        list.push_front(node).unwrap();
    }

    thread::scope(|scope| {
        let (list, nodes, removals) = (&list, &nodes, &removals);

        for _ in 0..THREADS / 2 {
            scope.spawn(move || {
                while let Some(node) = list.pop() {
                    removals[*node.value()].fetch_add(1, Ordering::Relaxed);
                }
            });
        }

        for t in 0..THREADS / 2 {
            scope.spawn(move || {
                for i in (t..N).step_by(THREADS / 2) {
                    if list.del(&nodes[i]) {
                        removals[i].fetch_add(1, Ordering::Relaxed);
                    }
                }
            });
        }
    });

    while let Some(node) = list.pop() {
        removals[*node.value()].fetch_add(1, Ordering::Relaxed);
    }

    for (i, removals) in removals.iter().enumerate() {
        assert_eq!(removals.load(Ordering::Relaxed), 1, "node {i}");
    }

    drop(test_guard);
}

#[test]
fn test_list_iteration_under_concurrent_del() {
    const N: usize = 10_000;

    let test_guard = TEST_LOCK.lock();
    let nodes: Vec<_> = (0..N).map(ListNode::new).collect();
    let list = NonBlockingList::new();
    let done = AtomicBool::new(false);

    for node in &nodes {
        list.push_front(node).unwrap();
    }

    thread::scope(|scope| {
        let (list, nodes, done) = (&list, &nodes, &done);

        scope.spawn(move || {
            // Odd values are deleted, even ones stay.
            for node in nodes.iter().skip(1).step_by(2) {
                assert!(list.del(node));
            }

            done.store(true, Ordering::Release);
        });

        for _ in 0..THREADS - 1 {
            scope.spawn(move || {
                loop {
                    let finished = done.load(Ordering::Acquire);
                    let mut seen = HashSet::new();
                    let mut last = None;

                    for node in list {
                        let value = *node.value();

                        assert!(seen.insert(value), "{value} was yielded twice");

                        // Pushed at the head, so the iteration is descending.
                        if let Some(last) = last {
                            assert!(value < last);
                        }

                        last = Some(value);
                    }

                    for even in (0..N).step_by(2) {
                        assert!(seen.contains(&even), "live node {even} was skipped");
                    }

                    if finished {
                        assert_eq!(seen.len(), N / 2);

                        break;
                    }
                }
            });
        }
    });

    drop(test_guard);
}

#[test]
fn test_list_cursor_del_at_concurrently() {
    const N: usize = 10_000;

    let test_guard = TEST_LOCK.lock();
    let nodes: Vec<_> = (0..N).map(ListNode::new).collect();
    let deleted = AtomicUsize::new(0);
    let list = NonBlockingList::new();

    for node in &nodes {
        list.push_front(node).unwrap();
    }

    thread::scope(|scope| {
        for _ in 0..THREADS {
            let (list, deleted) = (&list, &deleted);

            scope.spawn(move || {
                let mut cursor = list.cursor();
                let mut node = cursor.first();

                while node.is_some() {
                    if cursor.del_at() {
                        deleted.fetch_add(1, Ordering::Relaxed);
                    }

                    assert!(!cursor.del_at());

                    node = cursor.next();
                }
            });
        }
    });

    // Every node is either deleted by exactly one cursor or still linked.
    let survivors = list.iter().count();

    assert_eq!(deleted.load(Ordering::Relaxed) + survivors, N);

    let mut cursor = list.cursor();

    while cursor.next().is_some() {
        assert!(cursor.del_at());
    }

    assert!(list.is_empty());
    assert!(nodes.iter().all(ListNode::is_marked));

    drop(test_guard);
}

#[test]
fn test_list_cursor_current() {
    let nodes = [ListNode::new(1), ListNode::new(2)];
    let list = NonBlockingList::new();

    for node in &nodes {
        list.push_front(node).unwrap();
    }

    let mut cursor = list.cursor();

    assert!(cursor.current().is_none());
    assert_eq!(cursor.first().map(|node| *node.value()), Some(2));
    assert_eq!(cursor.current().map(|node| *node.value()), Some(2));
    assert!(cursor.del_at());

    // The cursor still points to the deleted node.
    assert!(cursor.current().is_some_and(ListNode::is_marked));
    assert_eq!(cursor.next().map(|node| *node.value()), Some(1));
    assert!(cursor.next().is_none());
    assert!(cursor.current().is_none());
    assert!(!cursor.del_at());
    assert_eq!(list.iter().map(|node| *node.value()).collect::<Vec<_>>(), [1]);
}
