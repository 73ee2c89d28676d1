use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Capture encoding negotiated with the client
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Frames queued for the session before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            queue_capacity: 256,
        }
    }
}

/// Audio capture device trait
///
/// A device is exclusively owned by one session. `stop` releases it; the
/// session guarantees it is called exactly once.
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames. The channel
    /// closes when the underlying source goes away.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio and release the device
    async fn stop(&mut self) -> Result<()>;

    /// Check if device is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get device name for logging
    fn name(&self) -> &str;
}

/// Capture device fed by raw binary frames arriving over the transport
///
/// Each inbound payload is 16-bit little-endian PCM in the negotiated
/// encoding. An odd trailing byte is carried into the next payload.
pub struct StreamCapture {
    config: CaptureConfig,
    source: Option<mpsc::Receiver<Vec<u8>>>,
    capturing: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl StreamCapture {
    pub fn new(config: CaptureConfig, source: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            config,
            source: Some(source),
            capturing: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for StreamCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let mut source = self
            .source
            .take()
            .ok_or_else(|| anyhow::anyhow!("Capture stream already started"))?;

        let (frame_tx, frame_rx) = mpsc::channel(self.config.queue_capacity.max(1));
        let sample_rate = self.config.sample_rate;
        let channels = self.config.channels;
        let capturing = Arc::clone(&self.capturing);
        capturing.store(true, Ordering::SeqCst);

        let task = tokio::spawn(async move {
            let mut carry: Option<u8> = None;
            let mut samples_seen: u64 = 0;

            while let Some(bytes) = source.recv().await {
                if !capturing.load(Ordering::SeqCst) {
                    break;
                }

                let samples = decode_pcm16(&bytes, &mut carry);
                if samples.is_empty() {
                    continue;
                }

                let per_channel = samples_seen / channels.max(1) as u64;
                let timestamp_ms = per_channel * 1000 / sample_rate.max(1) as u64;
                samples_seen += samples.len() as u64;

                let frame = AudioFrame {
                    samples,
                    sample_rate,
                    channels,
                    timestamp_ms,
                };

                match frame_tx.try_send(frame) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!("Capture queue full, dropping frame at {}ms", timestamp_ms);
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }

            capturing.store(false, Ordering::SeqCst);
            debug!("Capture stream ended after {} samples", samples_seen);
        });

        self.task = Some(task);
        info!(
            "Stream capture started: {}Hz, {} channel(s)",
            sample_rate, channels
        );

        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);
        self.source = None;

        if let Some(task) = self.task.take() {
            task.abort();
        }

        info!("Stream capture released");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "stream"
    }
}

/// Downmix interleaved frames to mono by averaging channels
pub fn to_mono(frame: AudioFrame) -> AudioFrame {
    if frame.channels <= 1 {
        return frame;
    }

    let channels = frame.channels as usize;
    let samples = frame
        .samples
        .chunks_exact(channels)
        .map(|chunk| {
            let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect();

    AudioFrame {
        samples,
        channels: 1,
        ..frame
    }
}

fn decode_pcm16(bytes: &[u8], carry: &mut Option<u8>) -> Vec<i16> {
    let mut buf = Vec::with_capacity(bytes.len() + 1);
    if let Some(b) = carry.take() {
        buf.push(b);
    }
    buf.extend_from_slice(bytes);

    if buf.len() % 2 == 1 {
        *carry = buf.pop();
    }

    buf.chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
