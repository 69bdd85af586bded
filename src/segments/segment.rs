use super::TableError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 2.0;
pub const DEFAULT_SPEED: f64 = 1.0;
pub const DEFAULT_TIMESTAMP: &str = "0.00-0.00";

fn default_speed() -> f64 {
    DEFAULT_SPEED
}

/// One translated utterance as the server stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub sequence: u32,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_id: Option<String>,
    #[serde(default)]
    pub original_text: String,
    #[serde(default)]
    pub translated_text: String,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default)]
    pub voice_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_audio_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_audio_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_audio_path: Option<String>,
    /// Server fields this client does not model; kept for read-modify-write.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Segment {
    pub fn new(sequence: u32) -> Self {
        Self {
            sequence,
            timestamp: DEFAULT_TIMESTAMP.to_string(),
            speaker_id: None,
            original_text: String::new(),
            translated_text: String::new(),
            speed: DEFAULT_SPEED,
            voice_id: String::new(),
            ratio: None,
            original_audio_path: None,
            translated_audio_path: None,
            clone_audio_path: None,
            extra: Map::new(),
        }
    }

    pub fn ratio_band(&self) -> Option<RatioBand> {
        self.ratio.map(RatioBand::classify)
    }

    /// Text shown in the table cell for `field`
    pub fn field_text(&self, field: SegmentField) -> String {
        match field {
            SegmentField::Sequence => self.sequence.to_string(),
            SegmentField::Timestamp => self.timestamp.clone(),
            SegmentField::SpeakerId => self.speaker_id.clone().unwrap_or_default(),
            SegmentField::OriginalText => self.original_text.clone(),
            SegmentField::TranslatedText => self.translated_text.clone(),
            SegmentField::Speed => format!("{}", self.speed),
            SegmentField::VoiceId => self.voice_id.clone(),
            SegmentField::Ratio => self
                .ratio
                .map(|r| format!("{:.2}", r))
                .unwrap_or_else(|| "-".to_string()),
        }
    }

    pub fn apply(&mut self, value: &FieldValue) {
        match value {
            FieldValue::Sequence(sequence) => self.sequence = *sequence,
            FieldValue::Speed(speed) => self.speed = *speed,
            FieldValue::Text(field, text) => match field {
                SegmentField::Timestamp => self.timestamp = text.clone(),
                SegmentField::OriginalText => self.original_text = text.clone(),
                SegmentField::TranslatedText => self.translated_text = text.clone(),
                SegmentField::VoiceId => self.voice_id = text.clone(),
                _ => {}
            },
        }
    }

    /// Audio path for inline playback, if the cell has one
    pub fn audio_for(&self, field: SegmentField) -> Option<&str> {
        let path = match field {
            SegmentField::OriginalText => self.original_audio_path.as_deref(),
            SegmentField::TranslatedText => self.translated_audio_path.as_deref(),
            SegmentField::VoiceId => self.clone_audio_path.as_deref(),
            _ => None,
        };
        path.map(str::trim).filter(|p| !p.is_empty())
    }
}

/// Pacing warning derived from the synthesized/target duration ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioBand {
    /// Above 1.1 (red)
    Over,
    /// Below 0.9 (amber)
    Under,
    /// Within tolerance (green)
    Ok,
}

impl RatioBand {
    pub fn classify(ratio: f64) -> Self {
        if ratio > 1.1 {
            RatioBand::Over
        } else if ratio < 0.9 {
            RatioBand::Under
        } else {
            RatioBand::Ok
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SegmentField {
    Sequence,
    Timestamp,
    SpeakerId,
    OriginalText,
    TranslatedText,
    Speed,
    VoiceId,
    Ratio,
}

impl SegmentField {
    pub const EDITABLE: [SegmentField; 6] = [
        SegmentField::Sequence,
        SegmentField::Timestamp,
        SegmentField::OriginalText,
        SegmentField::TranslatedText,
        SegmentField::Speed,
        SegmentField::VoiceId,
    ];

    pub const COLUMNS: [SegmentField; 8] = [
        SegmentField::Sequence,
        SegmentField::Timestamp,
        SegmentField::SpeakerId,
        SegmentField::OriginalText,
        SegmentField::TranslatedText,
        SegmentField::Speed,
        SegmentField::VoiceId,
        SegmentField::Ratio,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SegmentField::Sequence => "sequence",
            SegmentField::Timestamp => "timestamp",
            SegmentField::SpeakerId => "speaker_id",
            SegmentField::OriginalText => "original_text",
            SegmentField::TranslatedText => "translated_text",
            SegmentField::Speed => "speed",
            SegmentField::VoiceId => "voice_id",
            SegmentField::Ratio => "ratio",
        }
    }

    pub fn is_editable(self) -> bool {
        !matches!(self, SegmentField::SpeakerId | SegmentField::Ratio)
    }

    /// Multi-line fields accept Shift+Enter as a newline
    pub fn is_multiline(self) -> bool {
        matches!(self, SegmentField::OriginalText | SegmentField::TranslatedText)
    }

    /// Trims `raw` and converts it to a typed value for this field.
    pub fn coerce(self, raw: &str) -> Result<FieldValue, TableError> {
        let trimmed = raw.trim();
        match self {
            SegmentField::Speed => {
                let speed: f64 = trimmed.parse().map_err(|_| {
                    TableError::Validation(format!("speed '{}' is not a number", trimmed))
                })?;
                if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
                    return Err(TableError::Validation(format!(
                        "speed must be between {} and {}",
                        MIN_SPEED, MAX_SPEED
                    )));
                }
                Ok(FieldValue::Speed(speed))
            }
            SegmentField::Sequence => match trimmed.parse::<u32>() {
                Ok(sequence) if sequence > 0 => Ok(FieldValue::Sequence(sequence)),
                _ => Err(TableError::Validation(format!(
                    "sequence '{}' is not a positive integer",
                    trimmed
                ))),
            },
            SegmentField::SpeakerId | SegmentField::Ratio => Err(TableError::Validation(
                format!("{} is read-only", self.key()),
            )),
            _ => Ok(FieldValue::Text(self, trimmed.to_string())),
        }
    }
}

impl fmt::Display for SegmentField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SegmentField {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SegmentField::COLUMNS
            .iter()
            .copied()
            .find(|field| field.key() == s.trim())
            .ok_or_else(|| TableError::Validation(format!("unknown field '{}'", s.trim())))
    }
}

/// Validated value ready to be written into a segment
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Sequence(u32),
    Speed(f64),
    Text(SegmentField, String),
}
