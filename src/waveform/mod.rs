// src/waveform/mod.rs
// Waveform renderer - one pixel buffer per audio role, redrawn only when
// the role's source changes

pub mod overlay;
pub mod peaks;

pub use overlay::{format_clock, OverlayFrame, PlaybackEvent, PlaybackFrame};
pub use peaks::{Bucket, Peaks};

use crate::gateway::{AudioRole, MediaBlob};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;
use thiserror::Error;

pub const DEFAULT_WIDTH: u32 = 800;
pub const DEFAULT_HEIGHT: u32 = 120;
const TICK_COUNT: u32 = 5;

const BACKGROUND: Rgba<u8> = Rgba([24, 26, 33, 255]);
const GRID: Rgba<u8> = Rgba([52, 56, 68, 255]);
const CENTER_LINE: Rgba<u8> = Rgba([90, 96, 112, 255]);
const ENVELOPE: Rgba<u8> = Rgba([88, 160, 220, 255]);
const RMS_FILL: Rgba<u8> = Rgba([46, 110, 180, 255]);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum WaveformError {
    #[error("Audio decode failed: {0}")]
    Decode(String),

    #[error("No audio track")]
    NoTrack,

    #[error("Audio contains no samples")]
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickLabel {
    pub x: u32,
    pub text: String,
}

/// What a canvas currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasState {
    Rendered {
        source: String,
        duration_secs: f64,
        duration_label: String,
        ticks: Vec<TickLabel>,
    },
    Blank {
        source: String,
    },
}

impl CanvasState {
    pub fn source(&self) -> &str {
        match self {
            CanvasState::Rendered { source, .. } | CanvasState::Blank { source } => source,
        }
    }
}

struct Canvas {
    state: CanvasState,
    pixels: Option<RgbaImage>,
    duration_secs: f64,
}

pub struct WaveformRenderer {
    width: u32,
    height: u32,
    canvases: HashMap<AudioRole, Canvas>,
    renders: usize,
}

impl Default for WaveformRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT)
    }
}

impl WaveformRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(2),
            canvases: HashMap::new(),
            renders: 0,
        }
    }

    pub fn columns(&self) -> usize {
        self.width as usize
    }

    /// Number of decode-and-draw passes done so far
    pub fn render_count(&self) -> usize {
        self.renders
    }

    pub fn needs_render(&self, role: AudioRole, source: &str) -> bool {
        self.canvases
            .get(&role)
            .map(|canvas| canvas.state.source() != source)
            .unwrap_or(true)
    }

    pub fn state(&self, role: AudioRole) -> Option<&CanvasState> {
        self.canvases.get(&role).map(|canvas| &canvas.state)
    }

    pub fn pixels(&self, role: AudioRole) -> Option<&RgbaImage> {
        self.canvases.get(&role).and_then(|canvas| canvas.pixels.as_ref())
    }

    /// Decodes and draws `blob` for `role`. A decode failure leaves a
    /// blank canvas.
    pub fn render(&mut self, role: AudioRole, source: &str, blob: &MediaBlob) -> CanvasState {
        let analyzed = analyze_source(source, blob, self.columns());
        self.install(role, source, analyzed)
    }

    /// Stores an analysis done elsewhere (e.g. on a blocking thread).
    pub fn install(
        &mut self,
        role: AudioRole,
        source: &str,
        analyzed: Result<Peaks, WaveformError>,
    ) -> CanvasState {
        self.renders += 1;
        let canvas = match analyzed {
            Ok(peaks) => {
                let pixels = self.draw(&peaks);
                Canvas {
                    state: CanvasState::Rendered {
                        source: source.to_string(),
                        duration_secs: peaks.duration_secs,
                        duration_label: format_clock(peaks.duration_secs),
                        ticks: self.ticks(peaks.duration_secs),
                    },
                    pixels: Some(pixels),
                    duration_secs: peaks.duration_secs,
                }
            }
            Err(e) => {
                tracing::warn!("Waveform for {} left blank: {}", role, e);
                Canvas {
                    state: CanvasState::Blank {
                        source: source.to_string(),
                    },
                    pixels: None,
                    duration_secs: 0.0,
                }
            }
        };

        let state = canvas.state.clone();
        self.canvases.insert(role, canvas);
        state
    }

    /// Cursor frame for a playback event; `None` for `Ended` or a canvas
    /// with nothing drawn.
    pub fn overlay(&self, role: AudioRole, event: PlaybackEvent) -> Option<OverlayFrame> {
        let canvas = self.canvases.get(&role)?;
        let pixels = canvas.pixels.as_ref()?;
        let current = event.position()?;
        Some(overlay::draw(pixels, current, canvas.duration_secs))
    }

    /// Drops every cached canvas.
    pub fn clear(&mut self) {
        self.canvases.clear();
    }

    fn ticks(&self, duration: f64) -> Vec<TickLabel> {
        (0..=TICK_COUNT)
            .map(|i| TickLabel {
                x: ((self.width - 1) as u64 * i as u64 / TICK_COUNT as u64) as u32,
                text: format_clock(duration * i as f64 / TICK_COUNT as f64),
            })
            .collect()
    }

    fn draw(&self, peaks: &Peaks) -> RgbaImage {
        let (width, height) = (self.width, self.height);
        let mut image = RgbaImage::from_pixel(width, height, BACKGROUND);
        let mid = height / 2;
        let half = (height / 2) as f32;

        for tick in self.ticks(peaks.duration_secs) {
            for y in 0..height {
                image.put_pixel(tick.x, y, GRID);
            }
        }
        for x in 0..width {
            image.put_pixel(x, mid, CENTER_LINE);
        }

        let to_y = |v: f32| -> u32 {
            let y = mid as f32 - v.clamp(-1.0, 1.0) * half;
            (y.round() as i64).clamp(0, height as i64 - 1) as u32
        };

        for (x, bucket) in peaks.buckets.iter().enumerate().take(width as usize) {
            let x = x as u32;
            for y in to_y(bucket.max)..=to_y(bucket.min) {
                image.put_pixel(x, y, ENVELOPE);
            }
            for y in to_y(bucket.rms)..=to_y(-bucket.rms) {
                image.put_pixel(x, y, RMS_FILL);
            }
        }

        image
    }
}

/// Peaks for `blob`, using the extension of `source` as decoder hint.
pub fn analyze_source(source: &str, blob: &MediaBlob, columns: usize) -> Result<Peaks, WaveformError> {
    let hint = extension_of(source).map(str::to_ascii_lowercase);
    peaks::analyze(blob.as_slice(), hint.as_deref(), columns)
}

/// Decoder hint from a server-side path (`./temp/vocals.wav` -> `wav`)
fn extension_of(source: &str) -> Option<&str> {
    let name = source.rsplit(['/', '\\']).next().unwrap_or(source);
    name.rsplit_once('.').map(|(_, ext)| ext).filter(|e| !e.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fake::sine_wav;

    fn wav_blob() -> MediaBlob {
        MediaBlob::new(sine_wav(8_000, 1_000, 0.6))
    }

    #[test]
    fn test_render_caches_per_source() {
        let mut renderer = WaveformRenderer::new(160, 40);
        assert!(renderer.needs_render(AudioRole::Vocals, "./temp/vocals.wav"));

        let state = renderer.render(AudioRole::Vocals, "./temp/vocals.wav", &wav_blob());
        match &state {
            CanvasState::Rendered {
                duration_label,
                ticks,
                ..
            } => {
                assert_eq!(duration_label, "0:01");
                assert_eq!(ticks.len(), 6);
                assert_eq!(ticks.last().unwrap().x, 159);
            }
            other => panic!("expected rendered canvas, got {:?}", other),
        }
        assert!(!renderer.needs_render(AudioRole::Vocals, "./temp/vocals.wav"));
        assert!(renderer.needs_render(AudioRole::Vocals, "./temp/vocals_v2.wav"));
        assert!(renderer.needs_render(AudioRole::Background, "./temp/vocals.wav"));
        assert_eq!(renderer.render_count(), 1);
        assert_eq!(renderer.pixels(AudioRole::Vocals).unwrap().dimensions(), (160, 40));
    }

    #[test]
    fn test_decode_failure_blanks_canvas() {
        let mut renderer = WaveformRenderer::new(64, 16);
        let state = renderer.render(
            AudioRole::Synthesized,
            "./temp/broken.mp3",
            &MediaBlob::new(b"not audio".to_vec()),
        );
        assert_eq!(
            state,
            CanvasState::Blank {
                source: "./temp/broken.mp3".into()
            }
        );
        assert!(renderer.pixels(AudioRole::Synthesized).is_none());
        assert!(!renderer.needs_render(AudioRole::Synthesized, "./temp/broken.mp3"));
        assert!(renderer
            .overlay(AudioRole::Synthesized, PlaybackEvent::Play { current: 0.0 })
            .is_none());
    }

    #[test]
    fn test_overlay_does_not_rerender() {
        let mut renderer = WaveformRenderer::new(100, 20);
        renderer.render(AudioRole::FinalMixed, "./temp/final.wav", &wav_blob());
        let cached = renderer.pixels(AudioRole::FinalMixed).unwrap().clone();

        let frame = renderer
            .overlay(AudioRole::FinalMixed, PlaybackEvent::TimeUpdate { current: 0.5 })
            .unwrap();
        assert_eq!(frame.cursor_x, 50);
        assert_eq!(frame.label, "0:00 / 0:01");
        assert_eq!(renderer.render_count(), 1);
        assert_eq!(renderer.pixels(AudioRole::FinalMixed).unwrap(), &cached);
        assert!(renderer
            .overlay(AudioRole::FinalMixed, PlaybackEvent::Ended)
            .is_none());
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("./temp/vocals.wav"), Some("wav"));
        assert_eq!(extension_of("C:\\out\\mix.MP3"), Some("MP3"));
        assert_eq!(extension_of("./temp.d/noext"), None);
    }
}
