use std::sync::atomic::{AtomicU64, Ordering};

/// Derived unread count. Never negative: decrements saturate at zero.
#[derive(Debug, Default)]
pub struct UnreadCounter {
    value: AtomicU64,
}

impl UnreadCounter {
    pub fn new(initial: u64) -> Self {
        Self {
            value: AtomicU64::new(initial),
        }
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn set(&self, count: u64) {
        self.value.store(count, Ordering::SeqCst);
    }

    pub fn increment(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst).saturating_add(1)
    }

    /// Local mark-as-read; returns the new value.
    pub fn decrement(&self, by: u64) -> u64 {
        let previous = self
            .value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_sub(by))
            })
            .unwrap_or_default();
        previous.saturating_sub(by)
    }

    pub fn reset(&self) {
        self.set(0);
    }
}
