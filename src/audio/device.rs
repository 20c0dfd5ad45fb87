//! Default output device playback via cpal.

use anyhow::{anyhow, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{Arc, Mutex};

use super::clip::{CueBank, CueClip};
use super::CueOutput;
use crate::cue::Zone;

/// Cues overlapping at once; the oldest is cut when exceeded.
const MAX_VOICES: usize = 8;

struct Voice {
    clip: Arc<CueClip>,
    frame: usize,
}

/// Mixes cue clips into the default output device.
///
/// The stream is not `Send`, so the output must be built on the audio thread
/// (see `AudioSystem::spawn`).
pub struct CpalOutput {
    bank: CueBank,
    voices: Arc<Mutex<Vec<Voice>>>,
    _stream: cpal::Stream,
}

impl CpalOutput {
    pub fn open(bank: CueBank) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("no default audio output device"))?;
        let supported = device
            .default_output_config()
            .context("query default output config")?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let bank = bank.resampled(config.sample_rate.0);
        let voices: Arc<Mutex<Vec<Voice>>> = Arc::new(Mutex::new(Vec::new()));

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, voices.clone())?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, voices.clone())?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, voices.clone())?,
            other => return Err(anyhow!("unsupported output sample format {:?}", other)),
        };
        stream.play().context("start output stream")?;

        log::info!(
            "CpalOutput: {} @ {} Hz, {} channels",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            config.sample_rate.0,
            config.channels
        );

        Ok(Self {
            bank,
            voices,
            _stream: stream,
        })
    }
}

impl CueOutput for CpalOutput {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn play(&mut self, zone: Zone) -> Result<()> {
        let clip = self.bank.clip(zone);
        if clip.frames() == 0 {
            return Ok(());
        }
        let mut voices = self
            .voices
            .lock()
            .map_err(|_| anyhow!("voice list lock poisoned"))?;
        if voices.len() >= MAX_VOICES {
            voices.remove(0);
        }
        voices.push(Voice { clip, frame: 0 });
        Ok(())
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    voices: Arc<Mutex<Vec<Voice>>>,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let Ok(mut voices) = voices.lock() else {
                    data.iter_mut().for_each(|s| *s = T::from_sample(0.0));
                    return;
                };
                for frame in data.chunks_mut(channels) {
                    for (ch, out) in frame.iter_mut().enumerate() {
                        let mixed: f32 = voices
                            .iter()
                            .map(|v| v.clip.sample_for(v.frame, ch, channels))
                            .sum();
                        *out = T::from_sample(mixed.clamp(-1.0, 1.0));
                    }
                    for voice in voices.iter_mut() {
                        voice.frame += 1;
                    }
                    voices.retain(|v| v.frame < v.clip.frames());
                }
            },
            |err| log::error!("audio output stream error: {}", err),
            None,
        )
        .context("build output stream")?;
    Ok(stream)
}
