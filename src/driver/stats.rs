// SPDX-License-Identifier: MPL-2.0

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about the frames that went through the video output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Frames that completed at least one presentation pass.
    pub frames_displayed: u64,
    /// Frames handed back, displayed or not.
    pub frames_released: u64,
    /// Frames whose surface was still being rendered.
    pub skipped_not_ready: u64,
    /// Frames shown without a usable context or surface.
    pub unsupported: u64,
    /// Software frames that could not be uploaded.
    pub conversion_failures: u64,
    /// OSD batches that could not be attached.
    pub association_failures: u64,
    /// Presentations slower than one 60 Hz interval.
    pub slow_presents: u64,
    pub context_rebuilds: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub frames_displayed: AtomicU64,
    pub frames_released: AtomicU64,
    pub skipped_not_ready: AtomicU64,
    pub unsupported: AtomicU64,
    pub conversion_failures: AtomicU64,
    pub association_failures: AtomicU64,
    pub slow_presents: AtomicU64,
    pub context_rebuilds: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DriverStats {
        DriverStats {
            frames_displayed: self.frames_displayed.load(Ordering::Relaxed),
            frames_released: self.frames_released.load(Ordering::Relaxed),
            skipped_not_ready: self.skipped_not_ready.load(Ordering::Relaxed),
            unsupported: self.unsupported.load(Ordering::Relaxed),
            conversion_failures: self.conversion_failures.load(Ordering::Relaxed),
            association_failures: self.association_failures.load(Ordering::Relaxed),
            slow_presents: self.slow_presents.load(Ordering::Relaxed),
            context_rebuilds: self.context_rebuilds.load(Ordering::Relaxed),
        }
    }
}
