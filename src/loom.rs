use crate::errors::{DequeueErr, EnqueueErr};
use crate::list::{ListNode, NonBlockingList};
use crate::mpmc::{BoundedRing, new_compact_bounded};
use crate::mpsc::{MpscNode, new_intrusive};
use crate::spsc::{BatchConfig, new_batched_with_config};
use loom::sync::Arc;
use loom::thread;

#[test]
fn loom_bounded_ring_two_producers() {
    loom::model(|| {
        let (producer, consumer) = new_compact_bounded::<usize, 2>();
        let producer2 = producer.clone();

        let th = thread::spawn(move || {
            while producer2.try_enqueue(2).is_err() {
                thread::yield_now();
            }
        });

        while producer.try_enqueue(1).is_err() {
            thread::yield_now();
        }

        let mut sum = 0;

        for _ in 0..2 {
            loop {
                match consumer.try_dequeue() {
                    Ok(value) => {
                        sum += value;

                        break;
                    }
                    Err(DequeueErr::Empty | DequeueErr::Contention) => thread::yield_now(),
                }
            }
        }

        th.join().unwrap();

        assert_eq!(sum, 3);
        assert_eq!(consumer.try_dequeue(), Err(DequeueErr::Empty));
    });
}

#[test]
fn loom_bounded_ring_full_and_concurrent_consumer() {
    loom::model(|| {
        let ring = Arc::new(BoundedRing::<usize, 2>::new());

        ring.try_enqueue(1).unwrap();
        ring.try_enqueue(2).unwrap();

        assert!(matches!(ring.try_enqueue(3), Err(EnqueueErr::Full(3))));

        let consumer = ring.clone();
        let th = thread::spawn(move || consumer.try_dequeue());

        // Either the consumer freed a cell, or the ring is still full.
        let enqueued = match ring.try_enqueue(3) {
            Ok(()) => true,
            Err(err) => {
                assert!(err.is_full());

                false
            }
        };

        assert_eq!(th.join().unwrap(), Ok(1));
        assert_eq!(ring.try_dequeue(), Ok(2));

        if enqueued {
            assert_eq!(ring.try_dequeue(), Ok(3));
        }

        assert_eq!(ring.try_dequeue(), Err(DequeueErr::Empty));
    });
}

#[test]
fn loom_batched_ring() {
    loom::model(|| {
        let config = BatchConfig {
            batch_size: 1,
            batch_increment: 1,
            congestion_penalty: 0,
        };
        let (producer, consumer) = new_batched_with_config::<usize, 2>(config).unwrap();

        let th = thread::spawn(move || {
            for i in 0..3 {
                while producer.enqueue(i).is_err() {
                    thread::yield_now();
                }
            }
        });

        for i in 0..3 {
            loop {
                if let Ok(value) = consumer.dequeue() {
                    assert_eq!(value, i);

                    break;
                }

                thread::yield_now();
            }
        }

        th.join().unwrap();
    });
}

#[test]
fn loom_intrusive_mpsc() {
    loom::model(|| {
        let (producer, consumer) = new_intrusive::<usize>();
        let producer2 = producer.clone();

        let th = thread::spawn(move || producer2.push(MpscNode::boxed(2)));

        producer.push(MpscNode::boxed(1));

        let mut seen = Vec::new();

        while seen.len() < 2 {
            match consumer.try_pop() {
                Ok(node) => seen.push(node.into_inner()),
                Err(_) => thread::yield_now(),
            }
        }

        th.join().unwrap();

        seen.sort_unstable();

        assert_eq!(seen, [1, 2]);
        assert_eq!(consumer.try_pop().err(), Some(DequeueErr::Empty));
    });
}

/// List nodes are never freed, so the model leaks them along with the list.
fn leaked_list(
    values: &[usize],
) -> (
    &'static [ListNode<usize>],
    &'static NonBlockingList<'static, usize>,
) {
    let nodes: &'static [ListNode<usize>] =
        Box::leak(values.iter().copied().map(ListNode::new).collect());
    let list: &'static NonBlockingList<'static, usize> =
        Box::leak(Box::new(NonBlockingList::new()));

    for node in nodes {
        list.push_front(node).unwrap();
    }

    (nodes, list)
}

#[test]
fn loom_list_pop_and_del() {
    loom::model(|| {
        let (nodes, list) = leaked_list(&[0, 1, 2]);

        let th = thread::spawn(move || list.del(&nodes[1]));

        let popped = list.pop().map(|node| *node.value());
        let deleted = th.join().unwrap();

        // Nothing but the pop flags the head link, and nothing but the deletion
        // flags the link to 1.
        assert_eq!(popped, Some(2));
        assert!(deleted);
        assert!(nodes[1].is_marked() && nodes[2].is_marked());
        assert_eq!(list.iter().map(|node| *node.value()).collect::<Vec<_>>(), [0]);
    });
}

#[test]
fn loom_list_racing_del() {
    loom::model(|| {
        let (nodes, list) = leaked_list(&[0, 1]);

        let th = thread::spawn(move || list.del(&nodes[0]));
        let here = list.del(&nodes[0]);
        let there = th.join().unwrap();

        assert!(here ^ there);
        assert!(nodes[0].is_marked());
        assert_eq!(list.iter().map(|node| *node.value()).collect::<Vec<_>>(), [1]);
    });
}

#[test]
fn loom_list_push_and_pop() {
    loom::model(|| {
        let (nodes, list) = leaked_list(&[0]);
        let pushed: &'static ListNode<usize> = Box::leak(Box::new(ListNode::new(1)));

        let th = thread::spawn(move || list.push_front(pushed).unwrap());

        let popped = list.pop().map(|node| *node.value());

        th.join().unwrap();

        let rest: Vec<_> = list.iter().map(|node| *node.value()).collect();

        match popped {
            Some(0) => assert_eq!(rest, [1]),
            Some(1) => assert_eq!(rest, [0]),
            _ => panic!("unexpected pop: {popped:?}"),
        }

        assert_eq!(nodes[0].is_marked(), popped == Some(0));
    });
}
