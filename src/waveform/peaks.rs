// Audio decode to mono and per-column peak analysis

use super::WaveformError;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

/// Envelope of one pixel column
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bucket {
    pub min: f32,
    pub max: f32,
    pub rms: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Peaks {
    pub buckets: Vec<Bucket>,
    pub duration_secs: f64,
}

/// Decodes `bytes` and reduces them to `columns` buckets.
pub fn analyze(bytes: &[u8], ext_hint: Option<&str>, columns: usize) -> Result<Peaks, WaveformError> {
    let (mono, sample_rate) = decode_mono(bytes, ext_hint)?;
    if mono.is_empty() {
        return Err(WaveformError::Empty);
    }
    Ok(Peaks {
        duration_secs: mono.len() as f64 / sample_rate as f64,
        buckets: bucketize(&mono, columns),
    })
}

pub fn decode_mono(bytes: &[u8], ext_hint: Option<&str>) -> Result<(Vec<f32>, u32), WaveformError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = ext_hint {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| WaveformError::Decode(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or(WaveformError::NoTrack)?
        .clone();
    let mut decoder = get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| WaveformError::Decode(e.to_string()))?;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut mono: Vec<f32> = Vec::new();
    let mut decode_errors = 0u32;
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::DecodeError(_)) => {
                decode_errors = decode_errors.saturating_add(1);
                continue;
            }
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(WaveformError::Decode(err.to_string())),
        };
        if packet.track_id() != track.id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(_)) => {
                decode_errors = decode_errors.saturating_add(1);
                continue;
            }
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(WaveformError::Decode(err.to_string())),
        };
        if sample_rate == 0 {
            sample_rate = decoded.spec().rate;
        }
        let channels = decoded.spec().channels.count().max(1);
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buf.copy_interleaved_ref(decoded);
        for frame in buf.samples().chunks(channels) {
            let sum: f32 = frame.iter().sum();
            let value = sum / channels as f32;
            mono.push(if value.is_finite() { value } else { 0.0 });
        }
    }

    if decode_errors > 0 {
        tracing::warn!("Skipped {} undecodable audio packets", decode_errors);
    }
    if sample_rate == 0 {
        return Err(WaveformError::Decode("unknown sample rate".to_string()));
    }
    Ok((mono, sample_rate))
}

/// Min, max and RMS per column. Columns past the end of short input are
/// left silent.
pub fn bucketize(samples: &[f32], columns: usize) -> Vec<Bucket> {
    let mut out = Vec::with_capacity(columns);
    if columns == 0 {
        return out;
    }

    let len = samples.len();
    let step = (len as f64 / columns as f64).max(1.0);
    for col in 0..columns {
        let start = (col as f64 * step) as usize;
        let end = (((col + 1) as f64 * step) as usize).min(len);
        if start >= end {
            out.push(Bucket::default());
            continue;
        }

        let window = &samples[start..end];
        let (mut min, mut max, mut sum_sq) = (f32::INFINITY, f32::NEG_INFINITY, 0.0f64);
        for &v in window {
            min = min.min(v);
            max = max.max(v);
            sum_sq += (v as f64) * (v as f64);
        }
        out.push(Bucket {
            min,
            max,
            rms: (sum_sq / window.len() as f64).sqrt() as f32,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::sine_wav;

    #[test]
    fn test_bucketize_min_max_rms() {
        let samples = [0.5, -0.5, 0.5, -0.5, 0.0, 0.0, 0.0, 0.0];
        let buckets = bucketize(&samples, 2);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].min, -0.5);
        assert_eq!(buckets[0].max, 0.5);
        assert!((buckets[0].rms - 0.5).abs() < 1e-6);
        assert_eq!(buckets[1], Bucket { min: 0.0, max: 0.0, rms: 0.0 });
    }

    #[test]
    fn test_bucketize_short_input_pads_silence() {
        let buckets = bucketize(&[0.25, -0.25], 4);
        assert_eq!(buckets.len(), 4);
        assert_eq!(buckets[0].max, 0.25);
        assert_eq!(buckets[3], Bucket::default());
    }

    #[test]
    fn test_analyze_wav_reports_duration() {
        let wav = sine_wav(8_000, 500, 0.8);
        let peaks = analyze(&wav, Some("wav"), 100).unwrap();
        assert_eq!(peaks.buckets.len(), 100);
        assert!((peaks.duration_secs - 0.5).abs() < 0.01);
        let loudest = peaks.buckets.iter().map(|b| b.max).fold(0.0f32, f32::max);
        assert!(loudest > 0.7 && loudest <= 0.81);
    }

    #[test]
    fn test_garbage_fails_to_decode() {
        assert!(analyze(b"definitely not audio", None, 10).is_err());
    }
}
