//! Audio cue subsystem.
//!
//! `AudioSystem::spawn` brackets the audio lifetime: it builds the output on a
//! dedicated thread (init) and `shutdown` stops and joins it (teardown).
//! Callers hold a `CuePlayer`, whose `play` is a non-blocking send. Playback
//! completion is never awaited and cues may overlap.

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, select, Receiver, Sender, TrySendError};
use std::thread::JoinHandle;

use crate::cue::Zone;

mod clip;
#[cfg(feature = "audio-cpal")]
mod device;

pub use clip::{CueBank, CueClip, SYNTH_SAMPLE_RATE};
#[cfg(feature = "audio-cpal")]
pub use device::CpalOutput;

/// Pending cues allowed before new ones are dropped.
pub const CUE_QUEUE_DEPTH: usize = 8;

/// Plays a cue for a zone. Lives on the audio thread.
pub trait CueOutput {
    fn name(&self) -> &'static str;

    /// Start playback and return without waiting for it to finish.
    fn play(&mut self, zone: Zone) -> Result<()>;
}

/// Output that only logs cues. Used when no audio device is configured.
#[derive(Debug, Default)]
pub struct LogOutput {
    played: u64,
}

impl LogOutput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CueOutput for LogOutput {
    fn name(&self) -> &'static str {
        "log"
    }

    fn play(&mut self, zone: Zone) -> Result<()> {
        self.played += 1;
        log::info!("cue #{}: {}", self.played, zone);
        Ok(())
    }
}

/// Fire-and-forget handle into the audio thread.
#[derive(Clone, Debug)]
pub struct CuePlayer {
    tx: Sender<Zone>,
}

impl CuePlayer {
    /// A player and the receiving end of its queue.
    pub fn channel(capacity: usize) -> (Self, Receiver<Zone>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }

    /// Queue a cue. Returns false when the cue was dropped.
    pub fn play(&self, zone: Zone) -> bool {
        match self.tx.try_send(zone) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::debug!("audio queue full, dropping {} cue", zone);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("audio subsystem stopped, dropping {} cue", zone);
                false
            }
        }
    }
}

/// Running audio thread.
pub struct AudioSystem {
    player: CuePlayer,
    output_name: &'static str,
    shutdown: Option<Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl AudioSystem {
    /// Start the audio thread. `make_output` runs on that thread, so outputs
    /// holding non-`Send` device handles are fine. Returns once the output is
    /// ready, or with its construction error.
    pub fn spawn<F>(make_output: F) -> Result<Self>
    where
        F: FnOnce() -> Result<Box<dyn CueOutput>> + Send + 'static,
    {
        let (player, cues) = CuePlayer::channel(CUE_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let (ready_tx, ready_rx) = bounded::<Result<&'static str>>(1);

        let join = std::thread::Builder::new()
            .name("audio-cues".to_string())
            .spawn(move || {
                let mut output = match make_output() {
                    Ok(output) => {
                        let _ = ready_tx.send(Ok(output.name()));
                        output
                    }
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                run_audio_loop(output.as_mut(), &cues, &shutdown_rx);
            })?;

        let output_name = match ready_rx.recv() {
            Ok(Ok(name)) => name,
            Ok(Err(err)) => {
                let _ = join.join();
                return Err(err.context("audio output init failed"));
            }
            Err(_) => {
                let _ = join.join();
                return Err(anyhow!("audio thread exited during init"));
            }
        };
        log::info!("audio subsystem ready ({} output)", output_name);

        Ok(Self {
            player,
            output_name,
            shutdown: Some(shutdown_tx),
            join: Some(join),
        })
    }

    /// Audio thread backed by `LogOutput`.
    pub fn logging() -> Result<Self> {
        Self::spawn(|| Ok(Box::new(LogOutput::new()) as Box<dyn CueOutput>))
    }

    pub fn player(&self) -> CuePlayer {
        self.player.clone()
    }

    pub fn output_name(&self) -> &'static str {
        self.output_name
    }

    /// Stop the audio thread and wait for it. Queued cues are discarded.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop()
    }

    fn stop(&mut self) -> Result<()> {
        // Dropping the sender wakes the loop's shutdown arm.
        self.shutdown.take();
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("audio thread panicked"))?;
            log::info!("audio subsystem stopped");
        }
        Ok(())
    }
}

impl Drop for AudioSystem {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            log::error!("audio teardown failed: {}", err);
        }
    }
}

fn run_audio_loop(output: &mut dyn CueOutput, cues: &Receiver<Zone>, shutdown: &Receiver<()>) {
    loop {
        select! {
            recv(cues) -> msg => match msg {
                Ok(zone) => {
                    if let Err(err) = output.play(zone) {
                        log::warn!("failed to play {} cue: {:#}", zone, err);
                    }
                }
                Err(_) => break,
            },
            recv(shutdown) -> _ => break,
        }
    }
}
