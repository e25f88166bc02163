//! Score model carried by version 2 containers (`midi.json`)

use serde::{Deserialize, Serialize};

use crate::error::{CcmzError, Result};

/// A musical track. Its position in [`ScoreModel::tracks`] is its output track index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub name: Option<String>,
    /// General MIDI program (0-127)
    #[serde(default)]
    pub program: Option<u8>,
}

/// Tempo entry; only the first one in a score is used
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    /// Microseconds per beat
    #[serde(default)]
    pub tempo: Option<u32>,
}

/// One timed raw event as exported by the score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawScoreEvent {
    #[serde(default)]
    pub track: u32,
    pub tick: u64,
    #[serde(default)]
    pub duration: Option<u64>,
    #[serde(default)]
    pub staff: u32,
    /// Complete MIDI event bytes, status byte included
    #[serde(default, rename = "event")]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreModel {
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub tempos: Vec<Tempo>,
    #[serde(default)]
    pub events: Vec<RawScoreEvent>,
}

impl ScoreModel {
    /// Deserialize and validate a score model from `midi.json` text
    pub fn from_json(json: &str) -> Result<Self> {
        let model: ScoreModel = serde_json::from_str(json)
            .map_err(|e| CcmzError::Format(format!("midi.json is not a valid score model: {}", e)))?;
        model.validate()?;

        log::debug!(
            "Loaded score model: {} tracks, {} tempos, {} events",
            model.tracks.len(),
            model.tempos.len(),
            model.events.len()
        );
        Ok(model)
    }

    /// A model with neither tracks nor events has nothing to synthesize
    pub fn validate(&self) -> Result<()> {
        if self.tracks.is_empty() && self.events.is_empty() {
            return Err(CcmzError::Format(
                "Score model has no track or event data".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of output tracks (at least one)
    pub fn track_count(&self) -> usize {
        self.tracks.len().max(1)
    }

    /// First tempo entry, if present and non-zero
    pub fn initial_tempo(&self) -> Option<u32> {
        self.tempos
            .first()
            .and_then(|t| t.tempo)
            .filter(|&tempo| tempo > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json() {
        let json = r#"{
            "tracks": [{"name": "Right Hand", "program": 0}, {"name": "Left Hand"}],
            "tempos": [{"tempo": 600000}, {"tempo": 500000}],
            "events": [
                {"track": 1, "tick": 480, "duration": 240, "staff": 2, "event": [144, 48, 80]},
                {"tick": 0, "event": [255, 47, 0]}
            ]
        }"#;
        let model = ScoreModel::from_json(json).unwrap();

        assert_eq!(model.track_count(), 2);
        assert_eq!(model.tracks[1].name.as_deref(), Some("Left Hand"));
        assert_eq!(model.tracks[1].program, None);
        assert_eq!(model.initial_tempo(), Some(600_000));

        assert_eq!(
            model.events[0],
            RawScoreEvent {
                track: 1,
                tick: 480,
                duration: Some(240),
                staff: 2,
                bytes: vec![0x90, 48, 80],
            }
        );
        assert_eq!(model.events[1].track, 0);
        assert_eq!(model.events[1].duration, None);
    }

    #[test]
    fn test_nothing_to_synthesize() {
        let result = ScoreModel::from_json(r#"{"tempos": [{"tempo": 500000}]}"#);
        match result {
            Err(CcmzError::Format(msg)) => assert!(msg.contains("no track or event")),
            other => panic!("Expected format error, got {:?}", other),
        }
    }

    #[test]
    fn test_events_without_tracks() {
        let model = ScoreModel::from_json(r#"{"events": [{"tick": 0, "event": [144, 60, 90]}]}"#)
            .unwrap();
        assert_eq!(model.track_count(), 1);
        assert_eq!(model.initial_tempo(), None);
    }

    #[test]
    fn test_zero_tempo_is_ignored() {
        let model = ScoreModel {
            tracks: vec![Track::default()],
            tempos: vec![Tempo { tempo: Some(0) }],
            events: vec![],
        };
        assert_eq!(model.initial_tempo(), None);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ScoreModel::from_json("{\"tracks\": 5}"),
            Err(CcmzError::Format(_))
        ));
        assert!(matches!(
            ScoreModel::from_json(r#"{"events": [{"event": [144]}]}"#),
            Err(CcmzError::Format(_))
        ));
    }
}
