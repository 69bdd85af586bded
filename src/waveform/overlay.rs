// Playback cursor drawn over a cached waveform buffer

use image::{Rgba, RgbaImage};

const CURSOR_COLOR: Rgba<u8> = Rgba([231, 76, 60, 255]);
const LABEL_BG: Rgba<u8> = Rgba([20, 20, 28, 220]);
const LABEL_WIDTH: u32 = 88;
const LABEL_HEIGHT: u32 = 18;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaybackEvent {
    TimeUpdate { current: f64 },
    Play { current: f64 },
    Pause { current: f64 },
    Ended,
}

impl PlaybackEvent {
    pub fn position(self) -> Option<f64> {
        match self {
            PlaybackEvent::TimeUpdate { current }
            | PlaybackEvent::Play { current }
            | PlaybackEvent::Pause { current } => Some(current),
            PlaybackEvent::Ended => None,
        }
    }
}

/// Cached waveform plus cursor, ready to present.
#[derive(Debug, Clone)]
pub struct OverlayFrame {
    pub image: RgbaImage,
    pub cursor_x: u32,
    pub label: String,
}

/// What a playback event puts on the canvas
#[derive(Debug, Clone)]
pub enum PlaybackFrame {
    Cursor(OverlayFrame),
    /// Playback ended; the cached waveform without a cursor
    Restored(RgbaImage),
}

/// `M:SS`
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.max(0.0).floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Copies `base` and draws the cursor line and a label box for
/// `"current / total"`. The waveform itself is not recomputed.
pub fn draw(base: &RgbaImage, current: f64, total: f64) -> OverlayFrame {
    let mut image = base.clone();
    let (width, height) = image.dimensions();
    let label = format!("{} / {}", format_clock(current), format_clock(total));
    if width == 0 || height == 0 {
        return OverlayFrame {
            image,
            cursor_x: 0,
            label,
        };
    }

    let fraction = if total > 0.0 && current.is_finite() {
        (current / total).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let cursor_x = ((fraction * width as f64) as u32).min(width.saturating_sub(1));

    for y in 0..height {
        image.put_pixel(cursor_x, y, CURSOR_COLOR);
    }

    // label box sits right of the cursor, flipped left near the edge
    let box_x = if cursor_x + 4 + LABEL_WIDTH <= width {
        cursor_x + 4
    } else {
        cursor_x.saturating_sub(4 + LABEL_WIDTH)
    };
    for y in 2..(2 + LABEL_HEIGHT).min(height) {
        for x in box_x..(box_x + LABEL_WIDTH).min(width) {
            image.put_pixel(x, y, LABEL_BG);
        }
    }

    OverlayFrame {
        image,
        cursor_x,
        label,
    }
}
