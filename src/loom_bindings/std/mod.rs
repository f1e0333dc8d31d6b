#![cfg_attr(nbcoll_loom, allow(unused_imports, dead_code))]

mod atomic_ptr;
mod atomic_usize;
mod mutex;

pub mod hint {
    pub use std::hint::spin_loop;
}

pub mod sync {
    pub use std::sync::Arc;

    pub use crate::loom_bindings::std::mutex::Mutex;

    pub mod atomic {
        pub use crate::loom_bindings::std::atomic_ptr::AtomicPtr;
        pub use crate::loom_bindings::std::atomic_usize::AtomicUsize;
        pub use std::sync::atomic::AtomicBool;
    }
}

pub mod thread {
    #[inline]
    pub fn yield_now() {
        std::thread::yield_now();
    }

    #[allow(unused_imports)]
    pub use std::thread::{spawn, JoinHandle};
}
