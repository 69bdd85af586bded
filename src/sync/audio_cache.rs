use crate::gateway::{AudioRole, ProcessingSnapshot};
use std::collections::HashMap;

/// Last source path drawn per audio role
#[derive(Debug, Default)]
pub struct AudioPathCache {
    paths: HashMap<AudioRole, String>,
}

impl AudioPathCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, role: AudioRole) -> Option<&str> {
        self.paths.get(&role).map(String::as_str)
    }

    /// Roles whose available path differs from the cached one. Roles that
    /// became unavailable are left alone.
    pub fn changes(&self, snapshot: &ProcessingSnapshot) -> Vec<(AudioRole, String)> {
        AudioRole::ALL
            .iter()
            .filter_map(|role| {
                let path = snapshot.audio_source(*role)?;
                if self.get(*role) == Some(path) {
                    None
                } else {
                    Some((*role, path.to_string()))
                }
            })
            .collect()
    }

    pub fn record(&mut self, role: AudioRole, path: &str) {
        self.paths.insert(role, path.to_string());
    }

    pub fn reset(&mut self) {
        self.paths.clear();
    }
}
