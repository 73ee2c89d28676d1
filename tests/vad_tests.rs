// Endpointing tests for the energy-based voice activity detector.
//
// Signals are synthetic: broadband noise stands in for speech, zeros for
// silence. Timing is measured in audio, so the tests are deterministic.

mod common;

use common::{answer, noise, noise_samples, silence, SAMPLE_RATE};
use loqa_interviewer::audio::vad::SpectrumAnalyzer;
use loqa_interviewer::audio::{VadConfig, VadEndpointer, VadEvent};

fn utterances(events: &[VadEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            VadEvent::Utterance(u) => Some(u.duration_ms),
            _ => None,
        })
        .collect()
}

#[test]
fn test_noise_is_above_default_threshold() {
    let mut analyzer = SpectrumAnalyzer::new(512);
    let speech = noise(32);
    let energy = analyzer.energy(&speech[..512]);
    assert!(
        energy > VadConfig::default().energy_threshold * 2.0,
        "noise energy {} too low",
        energy
    );
}

#[test]
fn test_short_burst_is_discarded() {
    // 0.3s of speech, then silence: a false positive
    let mut vad = VadEndpointer::new(VadConfig::default(), SAMPLE_RATE);
    let mut events = vad.push(&noise(300));
    events.extend(vad.push(&silence(2000)));

    assert!(utterances(&events).is_empty());
    assert!(events
        .iter()
        .any(|e| matches!(e, VadEvent::Discarded { voiced_ms } if *voiced_ms < 500)));
    assert!(!vad.state().is_speaking);
    assert!(vad.state().silence_timer.is_none());
}

#[test]
fn test_speech_then_silence_emits_one_utterance() {
    let mut vad = VadEndpointer::new(VadConfig::default(), SAMPLE_RATE);
    let events = vad.push(&answer(1000));

    let durations = utterances(&events);
    assert_eq!(durations.len(), 1);
    assert!(
        (992..=1056).contains(&durations[0]),
        "voiced span {}ms",
        durations[0]
    );
    assert!(matches!(events[0], VadEvent::SpeechStarted { at_ms: 0 }));
}

#[test]
fn test_utterance_not_emitted_before_silence_delay() {
    let mut vad = VadEndpointer::new(VadConfig::default(), SAMPLE_RATE);
    let mut events = vad.push(&noise(1000));
    events.extend(vad.push(&silence(1000)));

    assert!(utterances(&events).is_empty());
    assert!(vad.state().is_speaking);
    let timer = vad.state().silence_timer.expect("silence timer pending");
    assert_eq!(timer.fires_at_ms - timer.started_ms, 1500);
}

#[test]
fn test_resumed_speech_cancels_silence_timer() {
    let mut vad = VadEndpointer::new(VadConfig::default(), SAMPLE_RATE);
    let mut events = vad.push(&noise(800));
    events.extend(vad.push(&silence(700)));
    events.extend(vad.push(&noise(800)));
    assert!(vad.state().silence_timer.is_none());

    events.extend(vad.push(&silence(1600)));

    // One utterance spanning both bursts and the gap
    let durations = utterances(&events);
    assert_eq!(durations.len(), 1);
    assert!(durations[0] >= 2300, "voiced span {}ms", durations[0]);
}

#[test]
fn test_state_resets_after_each_boundary() {
    let mut vad = VadEndpointer::new(VadConfig::default(), SAMPLE_RATE);
    let mut events = vad.push(&answer(1000));
    events.extend(vad.push(&answer(1200)));

    assert_eq!(utterances(&events).len(), 2);
    assert!(!vad.state().is_speaking);
}

#[test]
fn test_utterance_buffers_audio_from_speech_onset() {
    let mut vad = VadEndpointer::new(VadConfig::default(), SAMPLE_RATE);
    let mut events = vad.push(&silence(500));
    events.extend(vad.push(&answer(1000)));

    let utterance = events
        .into_iter()
        .find_map(|e| match e {
            VadEvent::Utterance(u) => Some(u),
            _ => None,
        })
        .expect("utterance");

    // Leading silence is not part of the utterance
    let leading_zeros = utterance.samples.iter().take_while(|&&s| s == 0).count();
    assert!(leading_zeros < 512);
    assert_eq!(utterance.sample_rate, SAMPLE_RATE);
    assert!(!utterance.to_wav().unwrap().is_empty());
}

#[test]
fn test_long_speech_is_force_flushed() {
    let config = VadConfig {
        max_utterance_ms: 2000,
        ..VadConfig::default()
    };
    let mut vad = VadEndpointer::new(config, SAMPLE_RATE);
    let events = vad.push(&noise(5000));

    let durations = utterances(&events);
    assert_eq!(durations.len(), 2);
    assert!(durations.iter().all(|&d| d >= 2000 && d < 2100));
}

#[test]
fn test_pure_silence_produces_nothing() {
    let mut vad = VadEndpointer::new(VadConfig::default(), SAMPLE_RATE);
    assert!(vad.push(&silence(5000)).is_empty());
    assert!(!vad.state().is_speaking);
}

#[test]
fn test_reset_drops_partial_utterance() {
    let mut vad = VadEndpointer::new(VadConfig::default(), SAMPLE_RATE);
    vad.push(&noise(1000));
    assert!(vad.state().is_speaking);

    vad.reset();
    let events = vad.push(&silence(2000));
    assert!(events.is_empty());
}

#[test]
fn test_audio_clock_is_exact_at_48khz() {
    // 512-sample windows are 10.67ms here; the clock must not round per window
    let mut vad = VadEndpointer::new(VadConfig::default(), 48_000);
    let mut samples = noise_samples(48_000);
    samples.extend(vec![0i16; 48 * 1600]);

    let events = vad.push(&samples);

    let durations = utterances(&events);
    assert_eq!(durations.len(), 1);
    assert!(
        (990..=1020).contains(&durations[0]),
        "voiced span {}ms",
        durations[0]
    );
    assert!(
        (2590..=2600).contains(&vad.clock_ms()),
        "clock {}ms after 2600ms of audio",
        vad.clock_ms()
    );
}
