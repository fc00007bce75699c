use core::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the time stamped into outgoing telemetry, in milliseconds.
pub trait Clock {
    fn timestamp(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn timestamp(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: Cell<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self { now_ms: Cell::new(start_ms) }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.set(now_ms);
    }

    pub fn advance(&self, dt_ms: u64) {
        self.now_ms.set(self.now_ms.get().saturating_add(dt_ms));
    }
}

impl Clock for ManualClock {
    fn timestamp(&self) -> u64 {
        self.now_ms.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn timestamp(&self) -> u64 {
        (**self).timestamp()
    }
}
