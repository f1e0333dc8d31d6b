//! This module contains a lock for the multi-threaded tests.
use crate::loom_bindings::sync::Mutex;

/// Serializes the stress tests so that they don't fight for the cores.
pub(crate) static TEST_LOCK: Mutex<()> = Mutex::new(());
