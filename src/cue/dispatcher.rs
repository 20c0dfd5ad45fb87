use std::time::Duration;

use super::cooldown::CooldownGate;
use super::zone::{zone_for, Zone};
use crate::audio::CuePlayer;
use crate::detect::{BoundingBox, Detection};

/// A box to draw on the frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub bbox: BoundingBox,
    pub label: String,
    pub zone: Zone,
}

/// Result of one detection pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DispatchOutcome {
    pub emitted: bool,
    /// Zone of the emitted cue, if any.
    pub zone: Option<Zone>,
    /// Every target-label detection, in detector order.
    pub annotations: Vec<Annotation>,
}

/// Per-pass cue policy.
///
/// Keeps only detections whose label matches the target, annotates all of
/// them, and emits at most one cue per pass: for the first matching detection
/// while the cooldown gate is open.
pub struct CueDispatcher {
    gate: CooldownGate,
    target_label: String,
    player: CuePlayer,
}

impl CueDispatcher {
    pub fn new(target_label: impl Into<String>, cooldown: Duration, player: CuePlayer) -> Self {
        Self {
            gate: CooldownGate::new(cooldown),
            target_label: target_label.into(),
            player,
        }
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    pub fn target_label(&self) -> &str {
        &self.target_label
    }

    pub fn dispatch(
        &mut self,
        detections: &[Detection],
        frame_width: u32,
        now: Duration,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();

        for det in detections.iter().filter(|d| d.label == self.target_label) {
            let zone = zone_for(&det.bbox, frame_width);
            outcome.annotations.push(Annotation {
                bbox: det.bbox,
                label: det.label.clone(),
                zone,
            });

            if !outcome.emitted && self.gate.try_acquire(now) {
                self.player.play(zone);
                self.gate.record(now);
                outcome.emitted = true;
                outcome.zone = Some(zone);
                log::debug!("cue {} at {:.3}s", zone, now.as_secs_f64());
            }
        }

        outcome
    }
}
