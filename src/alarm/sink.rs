//! Alarm audio output via `cpal`.
//!
//! [`ToneAlarm`] owns a single output stream that synthesises a beeping
//! sine tone.  The stream is built lazily by [`AlarmSink::prime`], which
//! must run from a user interaction: it builds the stream, starts it and
//! immediately pauses it so later playback starts without delay.

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::config::AlarmConfig;

// ---------------------------------------------------------------------------
// AlarmError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum AlarmError {
    #[error("no output device found on the default audio host")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("alarm audio has not been primed by a user interaction")]
    NotPrimed,
}

// ---------------------------------------------------------------------------
// AlarmSink
// ---------------------------------------------------------------------------

/// The audio resource behind the alarm state machine.
pub trait AlarmSink {
    /// Acquire and warm up the output.  Called once per user interaction
    /// until it succeeds.
    fn prime(&mut self) -> Result<(), AlarmError>;

    /// Start the alarm sound from the beginning.
    fn play(&mut self) -> Result<(), AlarmError>;

    /// Silence the alarm and rewind to the start.
    fn stop(&mut self);

    /// Drop the underlying output.
    fn release(&mut self);
}

// ---------------------------------------------------------------------------
// Beep pattern
// ---------------------------------------------------------------------------

/// Sample value at frame `pos` of the on/off beep pattern.
fn beep_sample(pos: u64, sample_rate: u32, config: &AlarmConfig) -> f32 {
    let rate = sample_rate.max(1) as u64;
    let on = (config.beep_on_ms as u64 * rate / 1000).max(1);
    let off = config.beep_off_ms as u64 * rate / 1000;
    let phase = pos % (on + off);
    if phase >= on {
        return 0.0;
    }
    let t = pos as f32 / rate as f32;
    (TAU * config.tone_hz * t).sin() * config.volume.clamp(0.0, 1.0)
}

// ---------------------------------------------------------------------------
// ToneAlarm
// ---------------------------------------------------------------------------

pub struct ToneAlarm {
    config: AlarmConfig,
    stream: Option<cpal::Stream>,
    sounding: Arc<AtomicBool>,
    position: Arc<AtomicU64>,
}

impl ToneAlarm {
    pub fn from_config(config: &AlarmConfig) -> Self {
        Self {
            config: config.clone(),
            stream: None,
            sounding: Arc::new(AtomicBool::new(false)),
            position: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_primed(&self) -> bool {
        self.stream.is_some()
    }

    fn build_stream(&self) -> Result<cpal::Stream, AlarmError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AlarmError::NoDevice)?;
        let supported = device.default_output_config()?;
        let channels = supported.channels().max(1) as usize;
        let sample_rate = supported.sample_rate().0;
        let stream_config: cpal::StreamConfig = supported.into();

        let sounding = Arc::clone(&self.sounding);
        let position = Arc::clone(&self.position);
        let config = self.config.clone();

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let on = sounding.load(Ordering::Relaxed);
                for frame in data.chunks_mut(channels) {
                    let value = if on {
                        let pos = position.fetch_add(1, Ordering::Relaxed);
                        beep_sample(pos, sample_rate, &config)
                    } else {
                        0.0
                    };
                    frame.iter_mut().for_each(|s| *s = value);
                }
            },
            |err: cpal::StreamError| {
                log::error!("alarm output stream error: {err}");
            },
            None,
        )?;
        Ok(stream)
    }
}

impl AlarmSink for ToneAlarm {
    fn prime(&mut self) -> Result<(), AlarmError> {
        if self.stream.is_some() {
            return Ok(());
        }
        let stream = self.build_stream()?;
        stream.play()?;
        if let Err(e) = stream.pause() {
            log::debug!("alarm: output stream cannot pause ({e}); leaving it running silent");
        }
        self.stream = Some(stream);
        Ok(())
    }

    fn play(&mut self) -> Result<(), AlarmError> {
        let stream = self.stream.as_ref().ok_or(AlarmError::NotPrimed)?;
        self.position.store(0, Ordering::Relaxed);
        self.sounding.store(true, Ordering::Relaxed);
        stream.play()?;
        Ok(())
    }

    fn stop(&mut self) {
        self.sounding.store(false, Ordering::Relaxed);
        self.position.store(0, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                log::debug!("alarm: pause failed: {e}");
            }
        }
    }

    fn release(&mut self) {
        self.stop();
        self.stream = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
