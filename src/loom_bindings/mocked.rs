pub mod hint {
    pub use loom::hint::spin_loop;
}

pub mod sync {
    pub use loom::sync::{Arc, Mutex};

    pub mod atomic {
        pub use loom::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize};
    }
}

pub mod thread {
    pub use loom::thread::{spawn, yield_now, JoinHandle};
}
