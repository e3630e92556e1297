//! The flame monitor: a cancellable loop that replays a frame source,
//! classifies every frame and publishes the verdict.
//!
//! # Lifecycle
//!
//! `Opening -> Running` (rewinding at end of stream forever), `Failed` if
//! the source cannot be opened, `Stopped` once cancelled. On failure the
//! published verdict is left untouched, so readers keep seeing "no flame".

use std::path::PathBuf;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::source::{FrameSource, SourceError, open_source};
use crate::state::{FlameCell, MonitorStatus};
use crate::vision::FlameClassifier;

/// Default pause between classification cycles.
pub const DEFAULT_CYCLE_INTERVAL: Duration = Duration::from_millis(30);

/// Settings for one monitor run.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub source_path: PathBuf,
    pub classifier: FlameClassifier,
    pub cycle_interval: Duration,
}

/// Spawn the monitor for `config.source_path` on the blocking pool.
///
/// The returned handle completes once the source fails to open or the
/// token is cancelled.
pub fn spawn_monitor(
    config: MonitorConfig,
    cell: FlameCell,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let path = config.source_path.clone();
        run_monitor(
            || open_source(&path),
            config.classifier,
            config.cycle_interval,
            &cell,
            &cancel,
        );
    })
}

/// Run the classification loop until cancelled.
///
/// The source is opened here and owned by this call, so it is dropped on
/// every exit path.
pub fn run_monitor<S, F>(
    open: F,
    classifier: FlameClassifier,
    cycle_interval: Duration,
    cell: &FlameCell,
    cancel: &CancellationToken,
) where
    S: FrameSource,
    F: FnOnce() -> Result<S, SourceError>,
{
    cell.set_status(MonitorStatus::Opening);

    let mut source = match open() {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "Cannot open frame source, flame detection disabled");
            cell.set_status(MonitorStatus::Failed);
            return;
        }
    };

    cell.set_status(MonitorStatus::Running);
    info!(
        pixel_threshold = classifier.pixel_threshold(),
        interval_ms = cycle_interval.as_millis() as u64,
        "Flame monitor running"
    );

    // Set after a rewind; a second miss in a row means the stream is
    // yielding nothing, so pace instead of spinning.
    let mut just_rewound = false;

    while !cancel.is_cancelled() {
        let frame = match source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("End of stream, rewinding");
                just_rewound = rewind(&mut source, cell, just_rewound, cycle_interval);
                continue;
            }
            Err(e) => {
                warn!(error = %e, "Frame read failed, rewinding");
                just_rewound = rewind(&mut source, cell, just_rewound, cycle_interval);
                continue;
            }
        };
        just_rewound = false;

        let classification = classifier.classify(&frame);
        let previous = cell.flame_detected();
        cell.publish(classification.flame, classification.flame_pixels);

        if classification.flame != previous {
            info!(
                flame = classification.flame,
                flame_pixels = classification.flame_pixels,
                "Flame verdict changed"
            );
        }

        std::thread::sleep(cycle_interval);
    }

    cell.set_status(MonitorStatus::Stopped);
    info!("Flame monitor stopped");
}

/// Rewind `source`, pacing when the previous cycle was also a rewind.
fn rewind<S: FrameSource>(
    source: &mut S,
    cell: &FlameCell,
    just_rewound: bool,
    cycle_interval: Duration,
) -> bool {
    if just_rewound {
        std::thread::sleep(cycle_interval);
    }

    if let Err(e) = source.rewind() {
        warn!(error = %e, "Rewind failed");
        std::thread::sleep(cycle_interval);
    }
    cell.record_rewind();

    true
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use image::RgbImage;

    use super::*;
    use crate::vision::tests::synthetic_frame;

    /// In-memory source. `None` entries simulate decode errors.
    struct ScriptedSource {
        frames: Vec<Option<RgbImage>>,
        position: usize,
        drops: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Option<RgbImage>>, drops: Arc<AtomicUsize>) -> Self {
            Self {
                frames,
                position: 0,
                drops,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> Result<Option<RgbImage>, SourceError> {
            let Some(entry) = self.frames.get(self.position) else {
                return Ok(None);
            };
            self.position += 1;
            match entry {
                Some(frame) => Ok(Some(frame.clone())),
                None => Err(SourceError::Io(std::io::Error::other("corrupt frame"))),
            }
        }

        fn rewind(&mut self) -> Result<(), SourceError> {
            self.position = 0;
            Ok(())
        }
    }

    impl Drop for ScriptedSource {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn wait_until(cell: &FlameCell, predicate: impl Fn(&crate::state::VerdictSnapshot) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !predicate(&cell.snapshot()) {
            assert!(Instant::now() < deadline, "timed out waiting for monitor");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn start(
        frames: Vec<Option<RgbImage>>,
        cell: &FlameCell,
        cancel: &CancellationToken,
        drops: &Arc<AtomicUsize>,
    ) -> std::thread::JoinHandle<()> {
        let cell = cell.clone();
        let cancel = cancel.clone();
        let drops = Arc::clone(drops);
        std::thread::spawn(move || {
            run_monitor(
                move || Ok(ScriptedSource::new(frames, drops)),
                FlameClassifier::default(),
                Duration::from_millis(1),
                &cell,
                &cancel,
            );
        })
    }

    #[test]
    fn test_open_failure_keeps_no_flame() {
        let cell = FlameCell::new();
        let cancel = CancellationToken::new();

        run_monitor(
            || -> Result<ScriptedSource, SourceError> {
                Err(SourceError::Empty {
                    path: PathBuf::from("nothing"),
                })
            },
            FlameClassifier::default(),
            Duration::from_millis(1),
            &cell,
            &cancel,
        );

        let snapshot = cell.snapshot();
        assert_eq!(snapshot.status, MonitorStatus::Failed);
        assert!(!snapshot.flame);
        assert_eq!(snapshot.frames_classified, 0);
    }

    #[test]
    fn test_publishes_flame_and_stops_on_cancel() {
        let cell = FlameCell::new();
        let cancel = CancellationToken::new();
        let drops = Arc::new(AtomicUsize::new(0));

        let handle = start(vec![Some(synthetic_frame(900))], &cell, &cancel, &drops);

        wait_until(&cell, |s| s.flame && s.status == MonitorStatus::Running);
        cancel.cancel();
        handle.join().unwrap();

        let snapshot = cell.snapshot();
        assert_eq!(snapshot.status, MonitorStatus::Stopped);
        assert_eq!(snapshot.flame_pixels, 900);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rewinds_at_end_of_stream() {
        let cell = FlameCell::new();
        let cancel = CancellationToken::new();
        let drops = Arc::new(AtomicUsize::new(0));

        let frames = vec![Some(synthetic_frame(0)), Some(synthetic_frame(700))];
        let handle = start(frames, &cell, &cancel, &drops);

        wait_until(&cell, |s| s.rewinds >= 2 && s.frames_classified >= 4);
        cancel.cancel();
        handle.join().unwrap();
    }

    #[test]
    fn test_decode_errors_rewind_and_continue() {
        let cell = FlameCell::new();
        let cancel = CancellationToken::new();
        let drops = Arc::new(AtomicUsize::new(0));

        // The corrupt second frame sends the loop back to the first frame
        let frames = vec![Some(synthetic_frame(800)), None, Some(synthetic_frame(0))];
        let handle = start(frames, &cell, &cancel, &drops);

        wait_until(&cell, |s| s.rewinds >= 3);
        cancel.cancel();
        handle.join().unwrap();

        let snapshot = cell.snapshot();
        assert!(snapshot.flame);
        assert_eq!(snapshot.flame_pixels, 800);
    }

    #[test]
    fn test_empty_stream_is_paced() {
        let cell = FlameCell::new();
        let cancel = CancellationToken::new();
        let drops = Arc::new(AtomicUsize::new(0));

        let handle = {
            let cell = cell.clone();
            let cancel = cancel.clone();
            let drops = Arc::clone(&drops);
            std::thread::spawn(move || {
                run_monitor(
                    move || Ok(ScriptedSource::new(Vec::new(), drops)),
                    FlameClassifier::default(),
                    Duration::from_millis(20),
                    &cell,
                    &cancel,
                );
            })
        };

        std::thread::sleep(Duration::from_millis(200));
        cancel.cancel();
        handle.join().unwrap();

        let snapshot = cell.snapshot();
        assert_eq!(snapshot.frames_classified, 0);
        // One unpaced rewind, then at most one per interval
        assert!(snapshot.rewinds <= 15, "rewinds = {}", snapshot.rewinds);
    }

    #[test]
    fn test_verdict_follows_frames() {
        let cell = FlameCell::new();
        let cancel = CancellationToken::new();
        let drops = Arc::new(AtomicUsize::new(0));

        let mut seen = VecDeque::new();
        let frames = vec![Some(synthetic_frame(501)), Some(synthetic_frame(499))];
        let handle = start(frames, &cell, &cancel, &drops);

        let deadline = Instant::now() + Duration::from_secs(5);
        while seen.len() < 2 && Instant::now() < deadline {
            let flame = cell.flame_detected();
            if cell.snapshot().frames_classified > 0 && seen.back() != Some(&flame) {
                seen.push_back(flame);
            }
            std::thread::sleep(Duration::from_micros(200));
        }
        cancel.cancel();
        handle.join().unwrap();

        assert!(seen.contains(&true));
        assert!(seen.contains(&false));
    }

    #[tokio::test]
    async fn test_spawn_monitor_with_missing_source() {
        let cell = FlameCell::new();
        let cancel = CancellationToken::new();
        let config = MonitorConfig {
            source_path: PathBuf::from("/definitely/not/here"),
            classifier: FlameClassifier::default(),
            cycle_interval: DEFAULT_CYCLE_INTERVAL,
        };

        spawn_monitor(config, cell.clone(), cancel).await.unwrap();

        assert_eq!(cell.snapshot().status, MonitorStatus::Failed);
        assert!(!cell.flame_detected());
    }
}
