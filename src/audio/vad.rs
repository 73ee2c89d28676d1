//! Voice activity endpointing.
//!
//! Audio is cut into fixed FFT windows. Each window's average spectral level
//! (byte-scaled decibels, like a browser analyser node) is compared against a
//! threshold. Speech opens an utterance; a silence timer that runs for
//! `silence_delay_ms` of uninterrupted sub-threshold audio closes it.
//!
//! Time is measured in captured audio, not wall-clock, so the endpointer is
//! deterministic for a given input stream.

use realfft::{RealFftPlanner, RealToComplex};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use super::capture::AudioFrame;
use super::wav::encode_wav;

/// Decibel range mapped onto 0..=255
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Tunable endpointing constants
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Average spectral level (0..=255) above which a window counts as speech
    pub energy_threshold: f32,
    /// Silence needed to close an utterance
    pub silence_delay_ms: u64,
    /// Utterances with less voiced audio than this are discarded as noise
    pub min_utterance_ms: u64,
    /// Utterances are force-flushed once voiced audio exceeds this
    pub max_utterance_ms: u64,
    /// Samples per FFT window
    pub fft_window: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 50.0,
            silence_delay_ms: 1500,
            min_utterance_ms: 500,
            max_utterance_ms: 30_000,
            fft_window: 512,
        }
    }
}

/// One contiguous span of detected speech, ready for transcription
#[derive(Debug, Clone)]
pub struct Utterance {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    /// Voiced span, from first to last above-threshold window
    pub duration_ms: u64,
}

impl Utterance {
    /// WAV-encoded bytes for upload
    pub fn to_wav(&self) -> anyhow::Result<Vec<u8>> {
        encode_wav(&self.samples, self.sample_rate)
    }
}

/// Pending silence timer, in audio-clock milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SilenceTimer {
    pub started_ms: u64,
    pub fires_at_ms: u64,
}

/// Per-capture endpointing state, reset on every utterance boundary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VadState {
    pub is_speaking: bool,
    pub silence_timer: Option<SilenceTimer>,
}

#[derive(Debug, Clone)]
pub enum VadEvent {
    SpeechStarted { at_ms: u64 },
    /// Too short to be speech; never forwarded
    Discarded { voiced_ms: u64 },
    Utterance(Utterance),
}

/// Computes the average byte-scaled spectral level of a window
pub struct SpectrumAnalyzer {
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<realfft::num_complex::Complex<f32>>,
    window: usize,
}

impl SpectrumAnalyzer {
    pub fn new(window: usize) -> Self {
        let window = window.max(2);
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window);
        let input = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        Self {
            fft,
            input,
            spectrum,
            window,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Average level across frequency bins, 0.0 (silence) to 255.0
    pub fn energy(&mut self, samples: &[i16]) -> f32 {
        for (slot, &s) in self.input.iter_mut().zip(samples.iter().chain(std::iter::repeat(&0))) {
            *slot = s as f32 / 32768.0;
        }

        if self.fft.process(&mut self.input, &mut self.spectrum).is_err() {
            return 0.0;
        }

        let scale = 1.0 / self.window as f32;
        let total: f32 = self
            .spectrum
            .iter()
            .map(|bin| {
                let magnitude = bin.norm() * scale;
                if magnitude <= 0.0 {
                    return 0.0;
                }
                let db = 20.0 * magnitude.log10();
                let normalized = (db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
                normalized.clamp(0.0, 1.0) * 255.0
            })
            .sum();

        total / self.spectrum.len() as f32
    }
}

/// Energy-based endpointer turning a capture stream into utterances
pub struct VadEndpointer {
    config: VadConfig,
    analyzer: SpectrumAnalyzer,
    state: VadState,
    sample_rate: u32,
    /// Samples not yet forming a full window
    pending: Vec<i16>,
    /// Audio buffered for the current utterance
    buffer: Vec<i16>,
    /// Audio clock, in samples consumed
    clock: u64,
    speech_started: u64,
    last_voiced: u64,
}

impl VadEndpointer {
    pub fn new(config: VadConfig, sample_rate: u32) -> Self {
        let analyzer = SpectrumAnalyzer::new(config.fft_window);
        info!(
            "VAD endpointer initialized: threshold={}, silence={}ms, min={}ms, window={}",
            config.energy_threshold,
            config.silence_delay_ms,
            config.min_utterance_ms,
            analyzer.window()
        );

        Self {
            config,
            analyzer,
            state: VadState::default(),
            sample_rate: sample_rate.max(1),
            pending: Vec::new(),
            buffer: Vec::new(),
            clock: 0,
            speech_started: 0,
            last_voiced: 0,
        }
    }

    pub fn state(&self) -> &VadState {
        &self.state
    }

    /// Feed a captured frame; returns the boundary events it produced
    ///
    /// A sample-rate change starts a fresh stream: the audio clock is
    /// measured in samples, so a partial utterance cannot span rates.
    pub fn push_frame(&mut self, frame: &AudioFrame) -> Vec<VadEvent> {
        if frame.sample_rate != self.sample_rate {
            debug!(
                "Endpointer sample rate changed: {} -> {}",
                self.sample_rate, frame.sample_rate
            );
            self.reset();
            self.clock = 0;
            self.sample_rate = frame.sample_rate.max(1);
        }
        self.push(&frame.samples)
    }

    /// Audio-clock position in milliseconds
    pub fn clock_ms(&self) -> u64 {
        self.to_ms(self.clock)
    }

    fn to_ms(&self, samples: u64) -> u64 {
        samples * 1000 / self.sample_rate as u64
    }

    /// Feed mono samples; returns the boundary events they produced
    pub fn push(&mut self, samples: &[i16]) -> Vec<VadEvent> {
        self.pending.extend_from_slice(samples);

        let window = self.analyzer.window();
        let mut events = Vec::new();
        let mut offset = 0;

        while self.pending.len() - offset >= window {
            let chunk: Vec<i16> = self.pending[offset..offset + window].to_vec();
            offset += window;
            if let Some(event) = self.process_window(&chunk) {
                events.push(event);
            }
        }

        self.pending.drain(..offset);
        events
    }

    /// Drop all buffered audio and return to the idle state
    pub fn reset(&mut self) {
        self.state = VadState::default();
        self.pending.clear();
        self.buffer.clear();
    }

    fn process_window(&mut self, window: &[i16]) -> Option<VadEvent> {
        let window_start = self.clock;
        self.clock += window.len() as u64;
        let window_start_ms = self.to_ms(window_start);

        let energy = self.analyzer.energy(window);
        let above = energy > self.config.energy_threshold;

        if above {
            let started = !self.state.is_speaking;
            if started {
                self.state.is_speaking = true;
                self.speech_started = window_start;
                self.buffer.clear();
                debug!("Speech started at {}ms (energy {:.1})", window_start_ms, energy);
            }

            self.state.silence_timer = None;
            self.last_voiced = self.clock;
            self.buffer.extend_from_slice(window);

            if self.voiced_ms() >= self.config.max_utterance_ms {
                info!("Utterance reached {}ms, forcing boundary", self.voiced_ms());
                return self.flush();
            }

            return started.then_some(VadEvent::SpeechStarted {
                at_ms: window_start_ms,
            });
        }

        if !self.state.is_speaking {
            return None;
        }

        self.buffer.extend_from_slice(window);

        let timer = *self.state.silence_timer.get_or_insert(SilenceTimer {
            started_ms: window_start_ms,
            fires_at_ms: window_start_ms + self.config.silence_delay_ms,
        });

        if self.clock_ms() >= timer.fires_at_ms {
            return self.flush();
        }

        None
    }

    fn voiced_ms(&self) -> u64 {
        self.to_ms(self.last_voiced.saturating_sub(self.speech_started))
    }

    fn flush(&mut self) -> Option<VadEvent> {
        let voiced_ms = self.voiced_ms();
        let samples = std::mem::take(&mut self.buffer);
        self.state = VadState::default();

        if voiced_ms < self.config.min_utterance_ms {
            debug!("Discarding {}ms utterance as noise", voiced_ms);
            return Some(VadEvent::Discarded { voiced_ms });
        }

        info!(
            "Utterance ready: {}ms voiced, {} samples",
            voiced_ms,
            samples.len()
        );

        Some(VadEvent::Utterance(Utterance {
            samples,
            sample_rate: self.sample_rate,
            duration_ms: voiced_ms,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_has_zero_energy() {
        let mut analyzer = SpectrumAnalyzer::new(512);
        assert_eq!(analyzer.energy(&[0i16; 512]), 0.0);
    }

    #[test]
    fn test_short_window_is_zero_padded() {
        let mut analyzer = SpectrumAnalyzer::new(512);
        assert_eq!(analyzer.energy(&[0i16; 100]), 0.0);
    }
}
