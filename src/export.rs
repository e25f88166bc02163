//! Container to MIDI file export

use std::fs;
use std::path::{Path, PathBuf};

use crate::container::{Container, MidiPayload};
use crate::error::Result;
use crate::midi::{write_midi, ScoreModel, SynthOptions};

/// Write the MIDI file carried by a container to `dest`.
///
/// Version 1 containers already hold a finished MIDI file, which is copied
/// byte for byte. Version 2 score models are synthesized.
pub fn export_midi(container: &Container, dest: &Path, options: &SynthOptions) -> Result<PathBuf> {
    match container.midi() {
        MidiPayload::Prebuilt(bytes) => {
            fs::write(dest, bytes)?;
            log::info!("Wrote {} ({} bytes, prebuilt)", dest.display(), bytes.len());
            Ok(dest.to_path_buf())
        }
        MidiPayload::ScoreJson(json) => {
            let model = ScoreModel::from_json(json)?;
            write_midi(&model, dest, options)
        }
    }
}
