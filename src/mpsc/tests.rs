use crate::errors::DequeueErr;
use crate::mpsc::{MpscNode, new_intrusive};
use crate::test_lock::TEST_LOCK;
use crossbeam_utils::Backoff;
use std::thread::spawn;

#[test]
fn test_intrusive_mpsc_multi_threaded_seen_once() {
    const PRODUCERS: usize = 8;
    const N: usize = 200_000;

    let test_guard = TEST_LOCK.lock();
    let (producer, consumer) = new_intrusive::<usize>();
    let mut handles = Vec::new();

    for p in 0..PRODUCERS {
        let producer = producer.clone();

        handles.push(spawn(move || {
            for i in (p..PRODUCERS * N).step_by(PRODUCERS) {
                producer.push(MpscNode::boxed(i));
            }
        }));
    }

    let mut seen = vec![false; PRODUCERS * N];
    let mut last_of_producer = [None; PRODUCERS];
    let backoff = Backoff::new();
    let mut received = 0;

    while received < PRODUCERS * N {
        match consumer.try_pop() {
            Ok(node) => {
                let value = node.into_inner();

                assert!(!seen[value], "{value} was popped twice");

                // The pushes of one producer are popped in the order they were made.
                let p = value % PRODUCERS;

                if let Some(last) = last_of_producer[p] {
                    assert!(last < value);
                }

                last_of_producer[p] = Some(value);
                seen[value] = true;
                received += 1;

                backoff.reset();
            }
            Err(DequeueErr::Empty | DequeueErr::Contention) => backoff.snooze(),
        }
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(seen.iter().all(|seen| *seen));
    assert!(consumer.pop().is_none());
    assert!(consumer.is_empty());

    drop(test_guard);
}

#[test]
fn test_intrusive_mpsc_consumer_on_other_thread() {
    const N: usize = 100_000;

    let test_guard = TEST_LOCK.lock();
    let (producer, consumer) = new_intrusive::<usize>();

    let t0 = spawn(move || {
        let mut sum = 0;
        let mut received = 0;

        while received < N {
            if let Some(node) = consumer.pop() {
                sum += *node.value();
                received += 1;
            }
        }

        sum
    });

    for i in 0..N {
        producer.push_value(i);
    }

    assert_eq!(t0.join().unwrap(), N * (N - 1) / 2);

    drop(test_guard);
}
