pub mod capture;
pub mod playback;
pub mod vad;
pub mod wav;

pub use capture::{AudioFrame, CaptureConfig, CaptureDevice, StreamCapture};
pub use playback::{
    AudioChunk, ManualClock, PlaybackClock, PlaybackScheduler, ScheduledBuffer, TokioClock,
};
pub use vad::{SilenceTimer, Utterance, VadConfig, VadEndpointer, VadEvent, VadState};
pub use wav::{decode_wav, encode_wav, wrap_pcm16, DecodedAudio};
