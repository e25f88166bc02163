//! CCMZ container decoding
//!
//! A container is a one-byte version tag followed by a zip archive:
//! - version 1: `data.xml` (score markup) and `data.mid` (a finished MIDI file)
//! - version 2: the archive bytes are scrambled by swapping each even/odd byte
//!   value pair, and hold `score.json` (metadata) and `midi.json` (score model)

pub mod archive;
pub mod source;

pub use archive::Archive;
pub use source::{ContainerSource, FileSource};

use crate::error::{CcmzError, Result};
use crate::midi::ScoreModel;

/// Supported container versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V1,
    V2,
}

impl Version {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Version::V1),
            2 => Some(Version::V2),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            Version::V1 => 1,
            Version::V2 => 2,
        }
    }
}

/// MIDI half of a decoded container
#[derive(Debug, Clone, PartialEq)]
pub enum MidiPayload {
    /// Standard MIDI file bytes, written through verbatim
    Prebuilt(Vec<u8>),
    /// Score model JSON, synthesized into a MIDI file
    ScoreJson(String),
}

/// A decoded container
#[derive(Debug, Clone)]
pub struct Container {
    version: Version,
    score: String,
    midi: MidiPayload,
}

impl Container {
    pub fn version(&self) -> Version {
        self.version
    }

    /// Score payload: XML markup for v1, JSON metadata for v2
    pub fn score_text(&self) -> &str {
        &self.score
    }

    pub fn midi(&self) -> &MidiPayload {
        &self.midi
    }

    /// Parse the v2 `score.json` metadata. Informational only.
    pub fn score_metadata(&self) -> Result<serde_json::Value> {
        match self.version {
            Version::V2 => serde_json::from_str(&self.score)
                .map_err(|e| CcmzError::Format(format!("score.json is not valid JSON: {}", e))),
            Version::V1 => Err(CcmzError::Format(
                "Version 1 containers carry XML score markup, not JSON metadata".to_string(),
            )),
        }
    }

    /// Deserialize the score model, if this container carries one
    pub fn score_model(&self) -> Result<Option<ScoreModel>> {
        match &self.midi {
            MidiPayload::ScoreJson(json) => ScoreModel::from_json(json).map(Some),
            MidiPayload::Prebuilt(_) => Ok(None),
        }
    }
}

/// Swap each byte value with its pair partner: {0,1}, {2,3}, ..., {254,255}.
/// Applying it twice yields the input.
pub fn swap_pairs(data: &[u8]) -> Vec<u8> {
    data.iter().map(|&v| v ^ 1).collect()
}

/// Decode a raw container buffer
pub fn decode(buffer: &[u8]) -> Result<Container> {
    let (&tag, payload) = buffer
        .split_first()
        .ok_or_else(|| CcmzError::Format("Container buffer is empty".to_string()))?;

    let version = Version::from_tag(tag)
        .ok_or_else(|| CcmzError::Format(format!("Unsupported container version {}", tag)))?;

    log::debug!(
        "Decoding version {} container ({} payload bytes)",
        tag,
        payload.len()
    );

    let container = match version {
        Version::V1 => {
            let mut archive = Archive::open(payload)?;
            let score = archive.read_text("data.xml")?;
            let midi = archive.read("data.mid")?;
            Container {
                version,
                score,
                midi: MidiPayload::Prebuilt(midi),
            }
        }
        Version::V2 => {
            let unscrambled = swap_pairs(payload);
            let mut archive = Archive::open(&unscrambled)?;
            let score = archive.read_text("score.json")?;
            let midi = archive.read_text("midi.json")?;
            Container {
                version,
                score,
                midi: MidiPayload::ScoreJson(midi),
            }
        }
    };

    Ok(container)
}
