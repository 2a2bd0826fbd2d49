use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cross-thread handle that asks a running evaluation to stop.
///
/// The evaluator polls the flag at statement boundaries, loop iterations and
/// calls, and unwinds with [`crate::JSError::Interrupted`] when it is set.
#[derive(Clone, Debug, Default)]
pub struct InterruptHandle {
    flag: Arc<AtomicBool>,
}

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_interrupted(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_shared_across_clones_and_threads() {
        let handle = InterruptHandle::new();
        let remote = handle.clone();
        std::thread::spawn(move || remote.interrupt()).join().unwrap();
        assert!(handle.is_interrupted());
        handle.clear();
        assert!(!handle.is_interrupted());
    }
}
