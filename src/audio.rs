//! # Audio Module
//!
//! Sound level from a PCM microphone stream.
//!
//! The level is the RMS of a block of signed samples normalized by full
//! scale (`2^(bits-1)`), so a full-scale square wave reads 1.0 and silence
//! reads 0.0.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{CansatError, Result};

/// Source of a normalized sound level in `0.0..=1.0`
#[cfg_attr(test, mockall::automock)]
pub trait AudioSource {
    fn rms_level(&mut self) -> Result<f64>;
}

/// RMS of `samples` normalized by the full scale of a `bits`-wide sample
///
/// An empty block or a zero width yields 0.0.
pub fn rms_level(samples: &[i32], bits: u32) -> f64 {
    if samples.is_empty() || bits == 0 {
        return 0.0;
    }

    let sum_squares: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();
    rms / 2f64.powi(bits as i32 - 1)
}

/// Decode little-endian signed PCM
///
/// A trailing partial sample is dropped.
pub fn decode_pcm(bytes: &[u8], bits: u32) -> Vec<i32> {
    match bits {
        16 => bytes
            .chunks_exact(2)
            .map(|c| i32::from(i16::from_le_bytes([c[0], c[1]])))
            .collect(),
        32 => bytes
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        _ => Vec::new(),
    }
}

/// Open a PCM stream, giving up after `timeout`
///
/// Opening a named pipe blocks until the writer connects, so the open runs
/// on a helper thread. On timeout that thread is left waiting on the pipe.
pub fn open_stream(path: &Path, timeout: Duration) -> Result<File> {
    let (tx, rx) = mpsc::channel();
    let target = path.to_path_buf();
    thread::Builder::new()
        .name("pcm-open".to_string())
        .spawn(move || {
            let _ = tx.send(File::open(target));
        })?;

    match rx.recv_timeout(timeout) {
        Ok(opened) => Ok(opened?),
        Err(_) => Err(CansatError::Hardware(format!(
            "No writer on {} after {} ms",
            path.display(),
            timeout.as_millis()
        ))),
    }
}

/// Microphone delivering raw little-endian PCM through a byte stream
///
/// Typically a named pipe fed by the capture daemon.
pub struct PcmMicrophone<R> {
    stream: R,
    bits: u32,
    block_samples: usize,
}

impl<R: Read> PcmMicrophone<R> {
    /// `bits` must be 16 or 32
    pub fn new(stream: R, bits: u32, block_samples: usize) -> Result<Self> {
        if bits != 16 && bits != 32 {
            return Err(CansatError::Hardware(format!(
                "Unsupported sample width: {} bits",
                bits
            )));
        }
        Ok(Self {
            stream,
            bits,
            block_samples,
        })
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }
}

impl<R: Read> AudioSource for PcmMicrophone<R> {
    fn rms_level(&mut self) -> Result<f64> {
        let mut buffer = vec![0u8; self.block_samples * (self.bits as usize / 8)];

        // Short reads are fine; the level is computed over what arrived
        let mut filled = 0;
        while filled < buffer.len() {
            let n = self.stream.read(&mut buffer[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        let samples = decode_pcm(&buffer[..filled], self.bits);
        Ok(rms_level(&samples, self.bits))
    }
}
