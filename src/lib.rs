//! CCMZ score containers to Standard MIDI Files
//!
//! [`container::decode`] unpacks a container buffer, [`midi`] parses the raw
//! score events and synthesizes MIDI, and [`export::export_midi`] ties the two
//! together for callers that just want a `.mid` on disk.

pub mod container;
pub mod error;
pub mod export;
pub mod midi;

pub use container::{decode, Container, ContainerSource, FileSource, MidiPayload, Version};
pub use error::{CcmzError, Result};
pub use export::export_midi;
pub use midi::{SynthOptions, SynthStrategy};
