//! MIDI side of the codec
//!
//! Raw score events are parsed into [`ParsedEvent`]s, paired into notes by the
//! synthesizer and written out as a Standard MIDI File.

mod events;
mod file;
mod parser;
mod score;
pub mod synth;

pub use events::{
    ChannelEvent, ChannelKind, MetaEvent, MetaKind, ParsedEvent, SmpteOffset, TextKind,
    TimeSignature, TimedEvent,
};
pub use file::{render_smf, write_midi};
pub use parser::{parse_event, read_vlq};
pub use score::{RawScoreEvent, ScoreModel, Tempo, Track};
pub use synth::{plan_midi, EventStats, MidiPlan, PlannedEvent, SynthOptions, SynthStrategy};
