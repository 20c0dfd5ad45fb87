use image::RgbImage;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::cue::Zone;
use crate::STATUS_STOPPED;

/// Button enablement for the presentation layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Controls {
    pub start_enabled: bool,
    pub stop_enabled: bool,
}

impl Controls {
    pub const STOPPED: Controls = Controls {
        start_enabled: true,
        stop_enabled: false,
    };
    pub const RUNNING: Controls = Controls {
        start_enabled: false,
        stop_enabled: true,
    };
}

/// One annotated frame with the status line that goes with it.
#[derive(Clone, Debug)]
pub struct PublishedFrame {
    /// RGB image with overlays drawn.
    pub image: RgbImage,
    pub status: String,
    pub sequence: u64,
    /// Number of target-label detections in the frame.
    pub targets: usize,
    /// Cue emitted during this pass.
    pub cue: Option<Zone>,
}

/// Presentation boundary.
///
/// Calls arrive from both the capture worker and the thread driving the
/// session controller, so implementations must be thread safe. `publish`
/// replaces the displayed frame; there is no backlog.
pub trait Presenter: Send + Sync {
    fn publish(&self, frame: PublishedFrame);

    /// Remove the displayed frame.
    fn clear(&self);

    fn set_status(&self, status: &str);

    fn set_controls(&self, controls: Controls);

    /// Blocking user notification in a GUI; reported once per failure.
    fn notify_error(&self, title: &str, message: &str);
}

#[derive(Debug)]
struct LatestState {
    frame: Option<Arc<PublishedFrame>>,
    status: String,
    controls: Controls,
    errors: Vec<(String, String)>,
    published: u64,
}

/// Last-writer-wins presenter.
///
/// Readers take the most recent frame reference; nothing is queued.
#[derive(Debug)]
pub struct LatestFrame {
    state: Mutex<LatestState>,
    changed: Condvar,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LatestState {
                frame: None,
                status: STATUS_STOPPED.to_string(),
                controls: Controls::STOPPED,
                errors: Vec::new(),
                published: 0,
            }),
            changed: Condvar::new(),
        }
    }

    // A panic while holding the lock leaves plain data behind; keep serving it.
    fn lock(&self) -> MutexGuard<'_, LatestState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut LatestState)) {
        let mut state = self.lock();
        f(&mut state);
        drop(state);
        self.changed.notify_all();
    }

    pub fn latest(&self) -> Option<Arc<PublishedFrame>> {
        self.lock().frame.clone()
    }

    pub fn status(&self) -> String {
        self.lock().status.clone()
    }

    pub fn controls(&self) -> Controls {
        self.lock().controls
    }

    pub fn errors(&self) -> Vec<(String, String)> {
        self.lock().errors.clone()
    }

    /// Frames published since creation.
    pub fn published_count(&self) -> u64 {
        self.lock().published
    }

    /// Wait until at least `count` frames have been published.
    pub fn wait_for_published(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.published < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match self.changed.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    /// Wait until the controls match `controls`.
    pub fn wait_for_controls(&self, controls: Controls, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.controls != controls {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = match self.changed.wait_timeout(state, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

impl Default for LatestFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl Presenter for LatestFrame {
    fn publish(&self, frame: PublishedFrame) {
        self.update(|state| {
            state.status = frame.status.clone();
            state.frame = Some(Arc::new(frame));
            state.published += 1;
        });
    }

    fn clear(&self) {
        self.update(|state| state.frame = None);
    }

    fn set_status(&self, status: &str) {
        self.update(|state| state.status = status.to_string());
    }

    fn set_controls(&self, controls: Controls) {
        self.update(|state| state.controls = controls);
    }

    fn notify_error(&self, title: &str, message: &str) {
        log::error!("{}: {}", title, message);
        self.update(|state| state.errors.push((title.to_string(), message.to_string())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u64) -> PublishedFrame {
        PublishedFrame {
            image: RgbImage::new(2, 2),
            status: format!("frame {}", sequence),
            sequence,
            targets: 0,
            cue: None,
        }
    }

    #[test]
    fn latest_publish_wins() {
        let slot = LatestFrame::new();
        slot.publish(frame(1));
        slot.publish(frame(2));
        assert_eq!(slot.latest().map(|f| f.sequence), Some(2));
        assert_eq!(slot.status(), "frame 2");
        assert_eq!(slot.published_count(), 2);
    }

    #[test]
    fn clear_drops_frame_and_is_idempotent() {
        let slot = LatestFrame::new();
        slot.publish(frame(1));
        slot.clear();
        slot.clear();
        assert!(slot.latest().is_none());
    }

    #[test]
    fn starts_stopped() {
        let slot = LatestFrame::new();
        assert_eq!(slot.status(), STATUS_STOPPED);
        assert_eq!(slot.controls(), Controls::STOPPED);
        assert!(slot.errors().is_empty());
    }

    #[test]
    fn wait_for_published_times_out() {
        let slot = LatestFrame::new();
        assert!(!slot.wait_for_published(1, Duration::from_millis(20)));
        slot.publish(frame(1));
        assert!(slot.wait_for_published(1, Duration::from_millis(20)));
    }
}
