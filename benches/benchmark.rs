use crate::generic_queue::{GenericConsumer, GenericProducer, new_array_queue, new_seg_queue};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use nbcoll::list::{ListNode, NonBlockingList};
use nbcoll::{mpmc, mpsc, spsc};
use std::hint::black_box;
use std::thread;
use std::time::Instant;


// Single-threaded benchmark.
//
// `N` items are pushed and then popped from the queue.
pub fn push_pop<P, C, Creator, const N: usize>(name: &str, creator: Creator, c: &mut Criterion)
where
    P: GenericProducer<usize>,
    C: GenericConsumer<usize>,
    Creator: Fn() -> (P, C),
{
    let (producer, consumer) = creator();

    c.bench_function(&format!("push_pop-{name}"), |b| {
        b.iter_custom(|iters| {
            let start = Instant::now();

            for _ in 0..iters {
                for i in 0..N {
                    let _ = producer.push(i);
                }

                for _ in 0..N {
                    let _ = black_box(consumer.pop());
                }
            }

            start.elapsed() / N as _
        });
    });
}

// Two-threaded benchmark.
//
// One thread pushes `N` items while the other one pops them.
pub fn transfer<P, C, Creator, const N: usize>(name: &str, creator: Creator, c: &mut Criterion)
where
    P: GenericProducer<usize>,
    C: GenericConsumer<usize>,
    Creator: Fn() -> (P, C),
{
    c.bench_function(&format!("transfer-{name}"), |b| {
        b.iter_custom(|iters| {
            let (producer, consumer) = creator();
            let start = Instant::now();

            thread::scope(|scope| {
                // The handles are `Send` but not `Sync`.
                scope.spawn(move || {
                    for _ in 0..iters {
                        for i in 0..N {
                            let mut item = i;

                            while let Err(returned) = producer.push(item) {
                                item = returned;

                                std::hint::spin_loop();
                            }
                        }
                    }
                });

                for _ in 0..iters {
                    let mut received = 0;

                    while received < N {
                        if black_box(consumer.pop()).is_some() {
                            received += 1;
                        } else {
                            std::hint::spin_loop();
                        }
                    }
                }
            });

            start.elapsed() / N as _
        });
    });
}

// region push_pop small

pub fn push_pop_small_crossbeam_array_queue(c: &mut Criterion) {
    push_pop::<_, _, _, 8>("small-crossbeam_array_queue", || new_array_queue(256), c);
}

pub fn push_pop_small_crossbeam_seg_queue(c: &mut Criterion) {
    push_pop::<_, _, _, 8>("small-crossbeam_seg_queue", new_seg_queue, c);
}

pub fn push_pop_small_nbcoll_bounded(c: &mut Criterion) {
    push_pop::<_, _, _, 8>("small-nbcoll_bounded", mpmc::new_bounded::<_, 256>, c);
}

pub fn push_pop_small_nbcoll_compact_bounded(c: &mut Criterion) {
    push_pop::<_, _, _, 8>(
        "small-nbcoll_compact_bounded",
        mpmc::new_compact_bounded::<_, 256>,
        c,
    );
}

pub fn push_pop_small_nbcoll_batched(c: &mut Criterion) {
    push_pop::<_, _, _, 8>("small-nbcoll_batched", spsc::new_batched::<_, 256>, c);
}

pub fn push_pop_small_nbcoll_intrusive(c: &mut Criterion) {
    push_pop::<_, _, _, 8>("small-nbcoll_intrusive", mpsc::new_intrusive, c);
}

// endregion

// region push_pop large

pub fn push_pop_large_crossbeam_array_queue(c: &mut Criterion) {
    push_pop::<_, _, _, 256>("large-crossbeam_array_queue", || new_array_queue(256), c);
}

pub fn push_pop_large_crossbeam_seg_queue(c: &mut Criterion) {
    push_pop::<_, _, _, 256>("large-crossbeam_seg_queue", new_seg_queue, c);
}

pub fn push_pop_large_nbcoll_bounded(c: &mut Criterion) {
    push_pop::<_, _, _, 256>("large-nbcoll_bounded", mpmc::new_bounded::<_, 256>, c);
}

pub fn push_pop_large_nbcoll_compact_bounded(c: &mut Criterion) {
    push_pop::<_, _, _, 256>(
        "large-nbcoll_compact_bounded",
        mpmc::new_compact_bounded::<_, 256>,
        c,
    );
}

pub fn push_pop_large_nbcoll_batched(c: &mut Criterion) {
    push_pop::<_, _, _, 256>("large-nbcoll_batched", spsc::new_batched::<_, 256>, c);
}

pub fn push_pop_large_nbcoll_intrusive(c: &mut Criterion) {
    push_pop::<_, _, _, 256>("large-nbcoll_intrusive", mpsc::new_intrusive, c);
}

// endregion

// region transfer

pub fn transfer_crossbeam_array_queue(c: &mut Criterion) {
    transfer::<_, _, _, 4096>("crossbeam_array_queue", || new_array_queue(1024), c);
}

pub fn transfer_nbcoll_bounded(c: &mut Criterion) {
    transfer::<_, _, _, 4096>("nbcoll_bounded", mpmc::new_bounded::<_, 1024>, c);
}

pub fn transfer_nbcoll_batched(c: &mut Criterion) {
    transfer::<_, _, _, 4096>("nbcoll_batched", spsc::new_batched::<_, 1024>, c);
}

pub fn transfer_nbcoll_intrusive(c: &mut Criterion) {
    transfer::<_, _, _, 4096>("nbcoll_intrusive", mpsc::new_intrusive, c);
}

// endregion

// A list node is linked only once, so every iteration links fresh nodes.
pub fn push_pop_nbcoll_list(c: &mut Criterion) {
    const N: usize = 256;

    c.bench_function("push_pop-nbcoll_list", |b| {
        b.iter_batched(
            || (0..N).map(ListNode::new).collect::<Vec<_>>(),
            |nodes| {
                let list = NonBlockingList::new();

                for node in &nodes {
                    let _ = list.push_front(node);
                }

                while let Some(node) = list.pop() {
                    black_box(node);
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    push_pop_benchmark,
    push_pop_small_crossbeam_array_queue,
    push_pop_small_crossbeam_seg_queue,
    push_pop_small_nbcoll_bounded,
    push_pop_small_nbcoll_compact_bounded,
    push_pop_small_nbcoll_batched,
    push_pop_small_nbcoll_intrusive,
    push_pop_large_crossbeam_array_queue,
    push_pop_large_crossbeam_seg_queue,
    push_pop_large_nbcoll_bounded,
    push_pop_large_nbcoll_compact_bounded,
    push_pop_large_nbcoll_batched,
    push_pop_large_nbcoll_intrusive,
    push_pop_nbcoll_list
);

criterion_group!(
    transfer_benchmark,
    transfer_crossbeam_array_queue,
    transfer_nbcoll_bounded,
    transfer_nbcoll_batched,
    transfer_nbcoll_intrusive
);

criterion_main!(push_pop_benchmark, transfer_benchmark);
