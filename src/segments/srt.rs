// SRT subtitle codec, same format the server reads and writes

use super::Segment;
use chrono::{DateTime, TimeZone};
use regex::Regex;
use std::sync::OnceLock;

fn block_separator() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\r?\n\s*\r?\n").expect("valid block regex"))
}

fn time_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{2}):(\d{2}):(\d{2}),(\d{3})\s*-->\s*(\d{2}):(\d{2}):(\d{2}),(\d{3})")
            .expect("valid time line regex")
    })
}

/// Parses SRT text into segments. Malformed blocks are skipped.
pub fn parse(content: &str) -> Vec<Segment> {
    let content = content.trim_start_matches('\u{feff}').trim();
    if content.is_empty() {
        return Vec::new();
    }

    let mut segments = Vec::new();
    for block in block_separator().split(content) {
        let lines: Vec<&str> = block.trim().lines().map(|l| l.trim_end_matches('\r')).collect();
        if lines.len() < 3 {
            continue;
        }

        let Ok(sequence) = lines[0].trim().parse::<u32>() else {
            continue;
        };
        let Some(caps) = time_line().captures(lines[1].trim()) else {
            continue;
        };

        let field = |i: usize| caps[i].parse::<u64>().unwrap_or(0);
        let start = clock_to_seconds(field(1), field(2), field(3), field(4));
        let end = clock_to_seconds(field(5), field(6), field(7), field(8));

        let mut segment = Segment::new(sequence);
        segment.timestamp = format!("{:.2}-{:.2}", start, end);
        segment.translated_text = lines[2..].join("\n");
        segments.push(segment);
    }

    tracing::debug!("Parsed {} SRT entries", segments.len());
    segments
}

/// Formats segments as SRT, numbering entries by position.
pub fn format(segments: &[Segment]) -> String {
    segments
        .iter()
        .enumerate()
        .map(|(idx, segment)| {
            let (start, end) = parse_timestamp(&segment.timestamp);
            format!(
                "{}\n{} --> {}\n{}\n",
                idx + 1,
                seconds_to_srt(start),
                seconds_to_srt(end),
                segment.translated_text
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reads `"start-end"` as seconds, or `MM:SS` / `HH:MM:SS` halves.
/// Anything else is `(0.0, 0.0)`.
pub fn parse_timestamp(timestamp: &str) -> (f64, f64) {
    let parts: Vec<&str> = timestamp.split('-').collect();
    if parts.len() != 2 {
        return (0.0, 0.0);
    }

    match (parts[0].trim().parse::<f64>(), parts[1].trim().parse::<f64>()) {
        (Ok(start), Ok(end)) => (start, end),
        _ => match (clock_text_to_seconds(parts[0]), clock_text_to_seconds(parts[1])) {
            (Some(start), Some(end)) => (start, end),
            _ => (0.0, 0.0),
        },
    }
}

fn clock_text_to_seconds(text: &str) -> Option<f64> {
    let fields: Vec<u64> = text
        .trim()
        .split(':')
        .map(|p| p.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    let (hours, minutes, seconds) = match fields.as_slice() {
        [minutes, seconds] => (0, *minutes, *seconds),
        [hours, minutes, seconds] => (*hours, *minutes, *seconds),
        _ => return None,
    };
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_add(seconds)
        .map(|total| total as f64)
}

fn clock_to_seconds(hours: u64, minutes: u64, seconds: u64, millis: u64) -> f64 {
    hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds as f64 + millis as f64 / 1000.0
}

/// `HH:MM:SS,mmm`
pub fn seconds_to_srt(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

/// `translation_<ISO-timestamp>.srt`, with `:` replaced so the name is
/// valid on every filesystem.
pub fn export_file_name<Tz: TimeZone>(now: DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("translation_{}.srt", now.format("%Y-%m-%dT%H-%M-%S"))
}
