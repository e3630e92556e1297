//! Shared flame verdict handed off between the monitor and request handlers.
//!
//! The monitor is the only writer. Readers always copy the current value
//! out; the lock is held only for a single assignment or copy and never
//! across frame I/O or classification.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of the flame monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    /// The frame source is being opened.
    Opening,

    /// Frames are being classified.
    Running,

    /// The frame source could not be opened. The verdict will not change again.
    Failed,

    /// The monitor was cancelled.
    Stopped,
}

/// Everything the monitor publishes, copied out as one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VerdictSnapshot {
    /// Whether a flame was visible in the last classified frame.
    pub flame: bool,

    pub status: MonitorStatus,

    /// In-band pixel count of the last classified frame.
    pub flame_pixels: u64,

    pub frames_classified: u64,

    /// Times the source was rewound after end-of-stream or a decode error.
    pub rewinds: u64,

    /// When the last verdict was published, if ever.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for VerdictSnapshot {
    fn default() -> Self {
        Self {
            flame: false,
            status: MonitorStatus::Opening,
            flame_pixels: 0,
            frames_classified: 0,
            rewinds: 0,
            updated_at: None,
        }
    }
}

/// Cloneable handle to the shared verdict cell.
#[derive(Debug, Clone, Default)]
pub struct FlameCell {
    inner: Arc<Mutex<VerdictSnapshot>>,
}

impl FlameCell {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking writer cannot leave the snapshot half-written, so a
    // poisoned lock still holds a usable value.
    fn lock(&self) -> MutexGuard<'_, VerdictSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current flame verdict.
    pub fn flame_detected(&self) -> bool {
        self.lock().flame
    }

    /// Copy of the whole cell.
    pub fn snapshot(&self) -> VerdictSnapshot {
        *self.lock()
    }

    /// Publish the verdict for a freshly classified frame.
    pub fn publish(&self, flame: bool, flame_pixels: u64) {
        let now = Utc::now();
        let mut cell = self.lock();
        cell.flame = flame;
        cell.flame_pixels = flame_pixels;
        cell.frames_classified += 1;
        cell.updated_at = Some(now);
    }

    pub fn set_status(&self, status: MonitorStatus) {
        self.lock().status = status;
    }

    pub fn record_rewind(&self) {
        self.lock().rewinds += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_verdict_is_no_flame() {
        let cell = FlameCell::new();

        assert!(!cell.flame_detected());
        let snapshot = cell.snapshot();
        assert_eq!(snapshot.status, MonitorStatus::Opening);
        assert_eq!(snapshot.frames_classified, 0);
        assert!(snapshot.updated_at.is_none());
    }

    #[test]
    fn test_publish_is_visible_to_clones() {
        let writer = FlameCell::new();
        let reader = writer.clone();

        writer.publish(true, 812);

        assert!(reader.flame_detected());
        let snapshot = reader.snapshot();
        assert_eq!(snapshot.flame_pixels, 812);
        assert_eq!(snapshot.frames_classified, 1);
        assert!(snapshot.updated_at.is_some());

        writer.publish(false, 3);
        assert!(!reader.flame_detected());
        assert_eq!(reader.snapshot().frames_classified, 2);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let cell = FlameCell::new();
        let before = cell.snapshot();

        cell.publish(true, 600);
        cell.record_rewind();
        cell.set_status(MonitorStatus::Running);

        assert!(!before.flame);
        assert_eq!(before.rewinds, 0);
        let after = cell.snapshot();
        assert_eq!(after.rewinds, 1);
        assert_eq!(after.status, MonitorStatus::Running);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let cell = FlameCell::new();

        let writer = {
            let cell = cell.clone();
            std::thread::spawn(move || {
                for i in 0..1000u64 {
                    cell.publish(i % 2 == 0, i);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let cell = cell.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let _ = cell.flame_detected();
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        let snapshot = cell.snapshot();
        assert_eq!(snapshot.frames_classified, 1000);
        assert_eq!(snapshot.flame_pixels, 999);
        assert!(!snapshot.flame);
    }
}
