use anyhow::{Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;

/// Audio decoded into the scheduler's fixed in-memory format (mono i16)
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Encode mono 16-bit PCM as an in-memory WAV file
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer =
            WavWriter::new(&mut cursor, spec).context("Failed to create WAV writer")?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize().context("Failed to finalize WAV")?;
    }

    Ok(cursor.into_inner())
}

/// Wrap raw little-endian 16-bit mono PCM in a WAV container
///
/// A trailing odd byte is dropped.
pub fn wrap_pcm16(bytes: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    let samples: Vec<i16> = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    encode_wav(&samples, sample_rate)
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_le_bytes(bytes.get(at..at + 2)?.try_into().ok()?))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    Some(u32::from_le_bytes(bytes.get(at..at + 4)?.try_into().ok()?))
}

/// Rewrite the length fields of a streamed WAV header
///
/// Streaming encoders cannot know the final length up front and write
/// `0xFFFFFFFF` (or an overlong size) into the RIFF and `data` chunk headers.
/// The `data` size is recomputed from the bytes actually present, rounded
/// down to whole sample frames. Returns `None` when the header is already
/// consistent or is not a RIFF/WAVE buffer.
fn repair_streamed_header(bytes: &[u8]) -> Option<Vec<u8>> {
    if bytes.get(0..4)? != b"RIFF" || bytes.get(8..12)? != b"WAVE" {
        return None;
    }

    let mut pos = 12;
    let mut block_align = 1usize;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let size = read_u32(bytes, pos + 4)? as usize;
        let body = pos + 8;

        if id == b"fmt " {
            block_align = read_u16(bytes, body + 12).map_or(1, |a| a.max(1) as usize);
        }

        if id == b"data" {
            let available = bytes.len() - body;
            if size <= available {
                return None;
            }
            let data_len = available - available % block_align;

            let mut repaired = bytes[..body + data_len].to_vec();
            repaired[pos + 4..pos + 8].copy_from_slice(&(data_len as u32).to_le_bytes());
            let riff_len = (repaired.len() - 8) as u32;
            repaired[4..8].copy_from_slice(&riff_len.to_le_bytes());
            return Some(repaired);
        }

        // Chunks are word-aligned
        pos = body.checked_add(size)?.checked_add(size & 1)?;
    }

    None
}

/// Decode a WAV buffer, downmixing to mono
///
/// Streamed headers with placeholder lengths are accepted; the sample count
/// comes from the bytes present.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio> {
    let repaired = repair_streamed_header(bytes);
    let bytes = repaired.as_deref().unwrap_or(bytes);
    let reader = WavReader::new(Cursor::new(bytes)).context("Failed to parse WAV data")?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?,
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?,
        (format, bits) => anyhow::bail!("Unsupported WAV encoding: {:?} {}-bit", format, bits),
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|chunk| {
                let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect()
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_wav_decodes_to_same_duration() -> Result<()> {
        let samples = vec![0i16; 8000];
        let bytes = encode_wav(&samples, 16000)?;
        assert_eq!(&bytes[0..4], b"RIFF");

        let decoded = decode_wav(&bytes)?;
        assert_eq!(decoded.sample_rate, 16000);
        assert!((decoded.duration_secs() - 0.5).abs() < 1e-9);
        Ok(())
    }

    /// Overwrite the RIFF and data lengths the way streaming encoders do
    fn as_streamed(mut bytes: Vec<u8>) -> Vec<u8> {
        bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        bytes[40..44].copy_from_slice(&u32::MAX.to_le_bytes());
        bytes
    }

    #[test]
    fn test_decode_streamed_header_uses_bytes_present() -> Result<()> {
        let bytes = as_streamed(encode_wav(&vec![100i16; 24000], 24000)?);
        assert_eq!(&bytes[36..40], b"data");

        let decoded = decode_wav(&bytes)?;
        assert_eq!(decoded.sample_rate, 24000);
        assert_eq!(decoded.samples.len(), 24000);
        assert!((decoded.duration_secs() - 1.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_decode_streamed_header_drops_partial_sample() -> Result<()> {
        let mut bytes = as_streamed(encode_wav(&vec![0i16; 100], 16000)?);
        bytes.push(0x7f);

        let decoded = decode_wav(&bytes)?;
        assert_eq!(decoded.samples.len(), 100);
        Ok(())
    }

    #[test]
    fn test_wrap_pcm16() -> Result<()> {
        let pcm: Vec<u8> = [1i16, -2, 3]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .chain(std::iter::once(9))
            .collect();

        let decoded = decode_wav(&wrap_pcm16(&pcm, 24000)?)?;
        assert_eq!(decoded.samples, vec![1, -2, 3]);
        assert_eq!(decoded.sample_rate, 24000);
        Ok(())
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_wav(b"not a wav file").is_err());
    }
}
