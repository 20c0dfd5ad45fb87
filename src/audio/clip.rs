use anyhow::{anyhow, Context, Result};
use std::f32::consts::TAU;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::cue::Zone;

/// Sample rate of synthesized cues.
pub const SYNTH_SAMPLE_RATE: u32 = 44_100;
const SYNTH_DURATION_SECS: f32 = 0.18;
const SYNTH_AMPLITUDE: f32 = 0.4;

/// A decoded sound, interleaved `f32` samples in `-1.0..=1.0`.
#[derive(Clone, Debug, PartialEq)]
pub struct CueClip {
    pub sample_rate: u32,
    pub channels: u16,
    samples: Vec<f32>,
}

impl CueClip {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Result<Self> {
        if sample_rate == 0 || channels == 0 {
            return Err(anyhow!("clip needs a non-zero sample rate and channel count"));
        }
        if samples.len() % channels as usize != 0 {
            return Err(anyhow!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            ));
        }
        Ok(Self {
            sample_rate,
            channels,
            samples,
        })
    }

    /// Decode a WAV stream (integer or float PCM).
    pub fn from_wav_reader<R: Read>(reader: R) -> Result<Self> {
        let mut wav = hound::WavReader::new(reader).context("failed to parse WAV data")?;
        let spec = wav.spec();
        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => wav
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .context("failed to read WAV samples")?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                wav.samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<_, _>>()
                    .context("failed to read WAV samples")?
            }
        };
        Self::new(spec.sample_rate, spec.channels, samples)
    }

    pub fn from_wav_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open cue sound {}", path.display()))?;
        Self::from_wav_reader(std::io::BufReader::new(file))
            .with_context(|| format!("invalid cue sound {}", path.display()))
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample for output channel `out_channel` of a device with
    /// `out_channels` channels. Mono clips feed every channel; stereo clips
    /// map left/right and feed extra channels nothing.
    pub fn sample_for(&self, frame: usize, out_channel: usize, out_channels: usize) -> f32 {
        let channels = self.channels as usize;
        let base = frame * channels;
        if channels == 1 {
            return self.samples[base];
        }
        if out_channels == 1 {
            let sum: f32 = self.samples[base..base + channels].iter().sum();
            return sum / channels as f32;
        }
        if out_channel < channels {
            self.samples[base + out_channel]
        } else {
            0.0
        }
    }

    /// Linear resample to `target_rate`.
    pub fn resampled(&self, target_rate: u32) -> CueClip {
        if target_rate == self.sample_rate || self.frames() == 0 {
            return self.clone();
        }
        let channels = self.channels as usize;
        let src_frames = self.frames();
        let ratio = self.sample_rate as f64 / target_rate as f64;
        let out_frames = ((src_frames as f64) / ratio).round().max(1.0) as usize;
        let mut out = Vec::with_capacity(out_frames * channels);
        for i in 0..out_frames {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(src_frames - 1);
            let next = (idx + 1).min(src_frames - 1);
            let frac = (pos - idx as f64) as f32;
            for c in 0..channels {
                let a = self.samples[idx * channels + c];
                let b = self.samples[next * channels + c];
                out.push(a + (b - a) * frac);
            }
        }
        CueClip {
            sample_rate: target_rate,
            channels: self.channels,
            samples: out,
        }
    }
}

/// The three directional cues.
#[derive(Clone, Debug)]
pub struct CueBank {
    left: Arc<CueClip>,
    center: Arc<CueClip>,
    right: Arc<CueClip>,
}

impl CueBank {
    pub fn new(left: CueClip, center: CueClip, right: CueClip) -> Self {
        Self {
            left: Arc::new(left),
            center: Arc::new(center),
            right: Arc::new(right),
        }
    }

    /// Load `left.wav`, `center.wav` and `right.wav` from `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        Ok(Self::new(
            CueClip::from_wav_file(&dir.join("left.wav"))?,
            CueClip::from_wav_file(&dir.join("center.wav"))?,
            CueClip::from_wav_file(&dir.join("right.wav"))?,
        ))
    }

    /// Short stereo tones panned to each side, rising in pitch left to right.
    pub fn synthesized() -> Self {
        Self::new(
            synth_tone(523.25, 1.0, 0.15),
            synth_tone(659.25, 0.7, 0.7),
            synth_tone(783.99, 0.15, 1.0),
        )
    }

    pub fn clip(&self, zone: Zone) -> Arc<CueClip> {
        match zone {
            Zone::Left => self.left.clone(),
            Zone::Center => self.center.clone(),
            Zone::Right => self.right.clone(),
        }
    }

    /// Resample every clip to the device rate.
    pub fn resampled(&self, target_rate: u32) -> Self {
        Self::new(
            self.left.resampled(target_rate),
            self.center.resampled(target_rate),
            self.right.resampled(target_rate),
        )
    }
}

fn synth_tone(freq: f32, left_gain: f32, right_gain: f32) -> CueClip {
    let frames = (SYNTH_SAMPLE_RATE as f32 * SYNTH_DURATION_SECS) as usize;
    let mut samples = Vec::with_capacity(frames * 2);
    for i in 0..frames {
        let t = i as f32 / SYNTH_SAMPLE_RATE as f32;
        // Linear fade in/out over the first and last 10% avoids clicks.
        let edge = (i.min(frames - 1 - i) as f32 / (frames as f32 * 0.1)).min(1.0);
        let v = (TAU * freq * t).sin() * SYNTH_AMPLITUDE * edge;
        samples.push(v * left_gain);
        samples.push(v * right_gain);
    }
    CueClip {
        sample_rate: SYNTH_SAMPLE_RATE,
        channels: 2,
        samples,
    }
}
