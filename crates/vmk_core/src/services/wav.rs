//! WAV header probing.
//!
//! Speech is requested as WAV so its duration can be read from the RIFF
//! header without decoding.

use std::fs;
use std::path::Path;

use super::ServiceError;

/// Duration in seconds of a PCM WAV file.
pub fn wav_duration(path: &Path) -> Result<f64, ServiceError> {
    let bytes = fs::read(path).map_err(|e| ServiceError::io("reading WAV file", e))?;
    wav_duration_from_bytes(&bytes)
}

fn invalid(message: &str) -> ServiceError {
    ServiceError::invalid_response("speech", message)
}

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// Duration in seconds from in-memory WAV bytes.
pub fn wav_duration_from_bytes(bytes: &[u8]) -> Result<f64, ServiceError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(invalid("not a RIFF/WAVE file"));
    }

    let mut byte_rate = None;
    let mut offset = 12;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let size = read_u32(bytes, offset + 4).ok_or_else(|| invalid("truncated chunk header"))?;
        let body = offset + 8;

        if id == b"fmt " {
            byte_rate = read_u32(bytes, body + 8);
        } else if id == b"data" {
            let rate = byte_rate
                .filter(|r| *r > 0)
                .ok_or_else(|| invalid("data chunk before a valid fmt chunk"))?;
            // Streamed output leaves the size as a placeholder
            let available = (bytes.len() - body) as u64;
            let data_len = if size == u32::MAX || u64::from(size) > available {
                available
            } else {
                u64::from(size)
            };
            return Ok(data_len as f64 / f64::from(rate));
        }

        // Chunks are padded to an even length
        offset = body + size as usize + (size as usize & 1);
    }

    Err(invalid("no data chunk"))
}

#[cfg(test)]
pub(crate) fn pcm_wav(sample_rate: u32, channels: u16, seconds: f64) -> Vec<u8> {
    let bits: u16 = 16;
    let block_align = channels * bits / 8;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = (f64::from(byte_rate) * seconds) as u32;

    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&bits.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.resize(out.len() + data_len as usize, 0);
    out
}
