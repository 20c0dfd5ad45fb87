//! Perception-to-cue policy.
//!
//! - `zone_for`: horizontal position of a box mapped to LEFT / CENTER / RIGHT
//! - `CooldownGate`: one cue per cooldown window, across all zones
//! - `CueDispatcher`: per-pass filtering, annotation list and cue emission

mod cooldown;
mod dispatcher;
mod zone;

pub use cooldown::CooldownGate;
pub use dispatcher::{Annotation, CueDispatcher, DispatchOutcome};
pub use zone::{zone_for, Zone};
