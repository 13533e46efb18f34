//! Zero-crossing frequency analyzer
//!
//! Captures a short mono PCM window from an ALSA device via ffmpeg and
//! estimates the dominant frequency from the zero-crossing rate. The whole
//! body is blocking by contract with `run_frequency_loop`, which always
//! calls `analyze` through `spawn_blocking`.

use crate::error::{Error, Result};
use crate::sources::FrequencyAnalyzer;
use std::process::{Command, Stdio};

/// Minimum RMS amplitude (out of i16 range) below which the window is
/// treated as silence and no reading is produced.
const SILENCE_RMS_FLOOR: f64 = 200.0;

pub struct SpectralFrequencyAnalyzer {
    /// ALSA device name, e.g. "default" or "hw:1,0"
    device: String,
    sample_rate: u32,
    window_ms: u64,
}

impl SpectralFrequencyAnalyzer {
    pub fn new(device: impl Into<String>, sample_rate: u32, window_ms: u64) -> Self {
        Self {
            device: device.into(),
            sample_rate,
            window_ms,
        }
    }

    fn capture_window(&self) -> Result<Vec<i16>> {
        let duration = format!("{:.3}", self.window_ms as f64 / 1000.0);
        let rate = self.sample_rate.to_string();

        let output = Command::new("ffmpeg")
            .args([
                "-f", "alsa",
                "-i", &self.device,
                "-t", &duration,
                "-ac", "1",
                "-ar", &rate,
                "-f", "s16le",
                "-loglevel", "error",
                "-",
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| Error::SourcePoll(format!("audio capture spawn failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::SourcePoll(format!(
                "audio capture failed: {}",
                stderr.trim()
            )));
        }

        let samples = output
            .stdout
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect::<Vec<_>>();

        Ok(samples)
    }
}

impl FrequencyAnalyzer for SpectralFrequencyAnalyzer {
    fn analyze(&self) -> Result<Option<f64>> {
        let samples = self.capture_window()?;
        Ok(estimate_dominant_hz(&samples, self.sample_rate))
    }
}

/// Zero-crossing dominant-frequency estimate over one PCM window.
///
/// Returns None for silence or windows too short to measure.
pub fn estimate_dominant_hz(samples: &[i16], sample_rate: u32) -> Option<f64> {
    if samples.len() < 2 || sample_rate == 0 {
        return None;
    }

    let rms = (samples
        .iter()
        .map(|&s| (s as f64) * (s as f64))
        .sum::<f64>()
        / samples.len() as f64)
        .sqrt();
    if rms < SILENCE_RMS_FLOOR {
        return None;
    }

    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0) != (pair[1] >= 0))
        .count();

    let duration_sec = samples.len() as f64 / sample_rate as f64;
    // each full period crosses zero twice
    let hz = crossings as f64 / 2.0 / duration_sec;

    if hz.is_finite() && hz > 0.0 {
        Some(hz)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(hz: f64, sample_rate: u32, samples: usize, amplitude: f64) -> Vec<i16> {
        (0..samples)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                (amplitude * (2.0 * std::f64::consts::PI * hz * t).sin()) as i16
            })
            .collect()
    }

    #[test]
    fn estimates_pure_tone() {
        let samples = sine(1000.0, 8000, 8000, 10_000.0);
        let hz = estimate_dominant_hz(&samples, 8000).unwrap();
        assert!((hz - 1000.0).abs() < 50.0, "estimated {} Hz", hz);
    }

    #[test]
    fn silence_yields_no_reading() {
        let samples = vec![0i16; 8000];
        assert!(estimate_dominant_hz(&samples, 8000).is_none());
    }

    #[test]
    fn low_amplitude_noise_is_silence() {
        let samples = sine(2000.0, 8000, 8000, 50.0);
        assert!(estimate_dominant_hz(&samples, 8000).is_none());
    }

    #[test]
    fn empty_window_yields_no_reading() {
        assert!(estimate_dominant_hz(&[], 8000).is_none());
    }
}
