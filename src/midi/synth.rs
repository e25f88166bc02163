//! Score model to MIDI synthesis plan
//!
//! Planning is pure: it turns a [`ScoreModel`] into per-track notes, controller
//! changes and pitch wheel moves measured in beats. [`super::file`] renders the
//! plan into a Standard MIDI File.
//!
//! Two strategies exist:
//! - [`SynthStrategy::Paired`] pairs note-ons with note-offs per
//!   `(track, channel, note)`, tolerates orphan note-offs, forwards a fixed set
//!   of controllers and normalizes pitch bends. A missing tempo falls back to
//!   120 BPM.
//! - [`SynthStrategy::Direct`] reads the pitch straight out of each raw note-on,
//!   uses the event's own duration, drops duplicate `(track, tick, pitch)` notes
//!   and writes everything with a fixed velocity and program. It refuses scores
//!   without a tempo.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::events::{ChannelKind, TimedEvent};
use super::parser::parse_event;
use super::score::ScoreModel;
use crate::error::{CcmzError, Result};

/// Output resolution. Never read from input.
pub const TICKS_PER_BEAT: u16 = 480;

/// 120 BPM, used when the score has no usable tempo
pub const DEFAULT_TEMPO: u32 = 500_000;

/// Velocity for a paired note whose note-on carried none
pub const DEFAULT_VELOCITY: u8 = 90;

/// Shortest note written, in ticks
pub const MIN_NOTE_TICKS: u64 = 10;

/// Length of an orphan note-off note when the score gives no duration
pub const ORPHAN_NOTE_TICKS: u64 = 10;

/// Controllers passed through: modulation, volume, pan, expression,
/// sustain, portamento, sostenuto, soft pedal, legato
pub const FORWARDED_CONTROLLERS: [u8; 8] = [1, 7, 11, 64, 65, 66, 67, 68];

pub const PITCH_BEND_CENTER: i32 = 8192;
pub const PITCH_BEND_MAX: i32 = 16383;

/// Fixed velocity and program of the direct strategy
pub const DIRECT_VELOCITY: u8 = 100;
pub const DIRECT_PROGRAM: u8 = 0;

/// How note events are turned into notes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthStrategy {
    #[default]
    Paired,
    Direct,
}

/// Synthesis options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthOptions {
    #[serde(default)]
    pub strategy: SynthStrategy,
}

impl SynthOptions {
    pub fn direct() -> Self {
        Self {
            strategy: SynthStrategy::Direct,
        }
    }
}

/// Parsed event counts by channel subtype or event type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStats {
    counts: BTreeMap<&'static str, usize>,
}

impl EventStats {
    pub fn record(&mut self, label: &'static str) {
        *self.counts.entry(label).or_insert(0) += 1;
    }

    pub fn count(&self, label: &str) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.counts.iter().map(|(label, count)| (*label, *count))
    }
}

/// An output event, timed in beats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlannedEvent {
    Note {
        pitch: u8,
        start_beat: f64,
        duration_beats: f64,
        velocity: u8,
    },
    Controller {
        beat: f64,
        controller: u8,
        value: u8,
    },
    /// Normalized pitch wheel value, see [`normalize_pitch_bend`]
    PitchWheel { beat: f64, value: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTrack {
    pub name: String,
    pub program: u8,
    pub events: Vec<PlannedEvent>,
}

/// Everything needed to write the MIDI file
#[derive(Debug, Clone, PartialEq)]
pub struct MidiPlan {
    pub ticks_per_beat: u16,
    /// Resolved initial tempo, microseconds per beat
    pub tempo: u32,
    pub bpm: u32,
    pub tracks: Vec<PlannedTrack>,
    pub stats: EventStats,
}

impl MidiPlan {
    pub fn note_count(&self) -> usize {
        self.count_events(|e| matches!(e, PlannedEvent::Note { .. }))
    }

    pub fn controller_count(&self) -> usize {
        self.count_events(|e| matches!(e, PlannedEvent::Controller { .. }))
    }

    pub fn pitch_wheel_count(&self) -> usize {
        self.count_events(|e| matches!(e, PlannedEvent::PitchWheel { .. }))
    }

    fn count_events(&self, pred: impl Fn(&PlannedEvent) -> bool) -> usize {
        self.tracks
            .iter()
            .map(|t| t.events.iter().filter(|e| pred(e)).count())
            .sum()
    }
}

/// Convert ticks to beats at the fixed resolution
pub fn ticks_to_beats(ticks: u64) -> f64 {
    ticks as f64 / f64::from(TICKS_PER_BEAT)
}

/// Rounded BPM for a tempo in microseconds per beat (at least 1)
pub fn tempo_to_bpm(tempo: u32) -> u32 {
    let bpm = (60_000_000.0 / f64::from(tempo.max(1))).round() as u32;
    bpm.max(1)
}

/// Pitch bend normalization applied before writing: `((value + 8192) * 16383) / 16383`
pub fn normalize_pitch_bend(value: u16) -> i32 {
    ((i32::from(value) + PITCH_BEND_CENTER) * PITCH_BEND_MAX) / PITCH_BEND_MAX
}

/// Out-of-range track indices map to track 0
fn clamp_track(track: u32, track_count: usize) -> usize {
    usize::try_from(track)
        .ok()
        .filter(|&t| t < track_count)
        .unwrap_or(0)
}

/// Parsed events in input order
struct Materialized {
    events: Vec<TimedEvent>,
    /// Parsed event count per output track
    per_track: Vec<usize>,
    stats: EventStats,
}

fn materialize(model: &ScoreModel, track_count: usize) -> Materialized {
    let mut events = Vec::with_capacity(model.events.len());
    let mut per_track = vec![0usize; track_count];
    let mut stats = EventStats::default();

    for raw in &model.events {
        let track = clamp_track(raw.track, track_count);

        let Some(event) = parse_event(&raw.bytes) else {
            log::trace!("Skipping unparseable event {:02X?} at tick {}", raw.bytes, raw.tick);
            continue;
        };

        stats.record(event.label());
        per_track[track] += 1;
        events.push(TimedEvent {
            event,
            tick: raw.tick,
            duration: raw.duration,
            staff: raw.staff,
            track,
        });
    }

    Materialized {
        events,
        per_track,
        stats,
    }
}

fn setup_tracks(model: &ScoreModel, strategy: SynthStrategy) -> Vec<PlannedTrack> {
    (0..model.track_count())
        .map(|idx| {
            let track = model.tracks.get(idx);
            let name = track
                .and_then(|t| t.name.clone())
                .unwrap_or_else(|| format!("Track{}", idx));
            let program = match strategy {
                SynthStrategy::Paired => track.and_then(|t| t.program).unwrap_or(0),
                SynthStrategy::Direct => DIRECT_PROGRAM,
            };
            PlannedTrack {
                name,
                program,
                events: Vec::new(),
            }
        })
        .collect()
}

/// Note-on waiting for its note-off
struct PendingNote {
    tick: u64,
    velocity: Option<u8>,
}

fn pair_notes(events: &[TimedEvent], tracks: &mut [PlannedTrack]) {
    // (track, channel, note) -> latest unmatched note-on
    let mut pending: HashMap<(usize, u8, u8), PendingNote> = HashMap::new();

    for timed in events {
        let Some(channel_event) = timed.channel() else {
            continue;
        };
        let channel = channel_event.channel;
        let out = &mut tracks[timed.track].events;

        match channel_event.kind {
            ChannelKind::NoteOn { note, velocity } => {
                pending.insert(
                    (timed.track, channel, note),
                    PendingNote {
                        tick: timed.tick,
                        velocity,
                    },
                );
            }
            ChannelKind::NoteOff { note, velocity } => {
                if let Some(on) = pending.remove(&(timed.track, channel, note)) {
                    let duration = timed.tick.saturating_sub(on.tick).max(MIN_NOTE_TICKS);
                    out.push(PlannedEvent::Note {
                        pitch: note,
                        start_beat: ticks_to_beats(on.tick),
                        duration_beats: ticks_to_beats(duration),
                        velocity: on.velocity.unwrap_or(DEFAULT_VELOCITY),
                    });
                } else if let Some(velocity) = velocity.filter(|&v| v > 0) {
                    // Streams sometimes lose the note-on; keep the note
                    let duration = timed.duration.unwrap_or(ORPHAN_NOTE_TICKS);
                    out.push(PlannedEvent::Note {
                        pitch: note,
                        start_beat: ticks_to_beats(timed.tick),
                        duration_beats: ticks_to_beats(duration),
                        velocity,
                    });
                } else {
                    log::trace!(
                        "Dropping orphan note-off {} at tick {} on track {}",
                        note,
                        timed.tick,
                        timed.track
                    );
                }
            }
            ChannelKind::Controller { controller, value } => {
                if FORWARDED_CONTROLLERS.contains(&controller) {
                    out.push(PlannedEvent::Controller {
                        beat: ticks_to_beats(timed.tick),
                        controller,
                        value: value.unwrap_or(0),
                    });
                } else {
                    log::trace!("Dropping controller {} at tick {}", controller, timed.tick);
                }
            }
            ChannelKind::PitchBend { value } => {
                out.push(PlannedEvent::PitchWheel {
                    beat: ticks_to_beats(timed.tick),
                    value: normalize_pitch_bend(value),
                });
            }
            _ => {}
        }
    }

    if !pending.is_empty() {
        log::debug!("{} note-ons never received a note-off", pending.len());
    }
}

fn direct_notes(model: &ScoreModel, tracks: &mut [PlannedTrack]) {
    let mut seen: HashSet<(usize, u64, u8)> = HashSet::new();

    for raw in &model.events {
        let bytes = &raw.bytes;
        let is_note_on = bytes.len() >= 2 && bytes[0] & 0xF0 == 0x90 && bytes.get(2) != Some(&0);
        if !is_note_on {
            continue;
        }

        let track = clamp_track(raw.track, tracks.len());
        let pitch = bytes[1];
        if !seen.insert((track, raw.tick, pitch)) {
            continue;
        }

        let duration = raw.duration.unwrap_or(0).max(MIN_NOTE_TICKS);
        tracks[track].events.push(PlannedEvent::Note {
            pitch,
            start_beat: ticks_to_beats(raw.tick),
            duration_beats: ticks_to_beats(duration),
            velocity: DIRECT_VELOCITY,
        });
    }
}

/// Build the synthesis plan for a score model
pub fn plan_midi(model: &ScoreModel, options: &SynthOptions) -> Result<MidiPlan> {
    model.validate()?;

    let tempo = match options.strategy {
        SynthStrategy::Paired => model.initial_tempo().unwrap_or(DEFAULT_TEMPO),
        SynthStrategy::Direct => model.initial_tempo().ok_or_else(|| {
            CcmzError::Format("Score model has no usable tempo".to_string())
        })?,
    };
    let bpm = tempo_to_bpm(tempo);

    let mut tracks = setup_tracks(model, options.strategy);
    let materialized = materialize(model, tracks.len());

    log::debug!(
        "Synthesizing {} tracks at {} us/beat ({} BPM) with {:?} strategy",
        tracks.len(),
        tempo,
        bpm,
        options.strategy
    );
    log::debug!("Parsed events per track: {:?}", materialized.per_track);
    for (label, count) in materialized.stats.iter() {
        log::debug!("  {}: {}", label, count);
    }

    match options.strategy {
        SynthStrategy::Paired => pair_notes(&materialized.events, &mut tracks),
        SynthStrategy::Direct => direct_notes(model, &mut tracks),
    }

    Ok(MidiPlan {
        ticks_per_beat: TICKS_PER_BEAT,
        tempo,
        bpm,
        tracks,
        stats: materialized.stats,
    })
}
