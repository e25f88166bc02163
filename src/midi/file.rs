//! Standard MIDI File output
//!
//! Writes a format 1 file at 480 ticks per beat. Every track starts with its
//! name, the initial tempo and its program, followed by the planned events.

use midly::{
    Format, Header, MetaMessage, MidiMessage, PitchBend, Smf, Timing, Track, TrackEvent,
    TrackEventKind,
};
use std::fs;
use std::path::{Path, PathBuf};

use super::score::ScoreModel;
use super::synth::{
    plan_midi, MidiPlan, PlannedEvent, PlannedTrack, SynthOptions, PITCH_BEND_CENTER,
    PITCH_BEND_MAX,
};
use crate::error::{CcmzError, Result};

/// All output events go to the first channel
const OUTPUT_CHANNEL: u8 = 0;

/// Largest delta time a track event can carry
const MAX_DELTA: u32 = 0x0FFF_FFFF;

/// Largest tempo a set-tempo meta event can carry
const MAX_TEMPO: u32 = 0x00FF_FFFF;

/// Ordering of events sharing a tick: setup first, then note-offs before
/// note-ons so repeated pitches do not cut each other short. The off of a
/// zero-length note comes last so it still closes its own note-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Setup,
    NoteOff,
    Control,
    NoteOn,
    Release,
}

/// Tempo written for a rounded BPM
fn tempo_for_bpm(bpm: u32) -> u32 {
    (60_000_000 / bpm.max(1)).min(MAX_TEMPO)
}

fn beats_to_ticks(beats: f64, ticks_per_beat: u16) -> u32 {
    let ticks = (beats * f64::from(ticks_per_beat)).round();
    if ticks > f64::from(u32::MAX) {
        log::warn!(
            "Event at beat {} is past the last representable tick, clamping to {}",
            beats,
            u32::MAX
        );
        return u32::MAX;
    }
    ticks.max(0.0) as u32
}

fn midi_event<'a>(message: MidiMessage) -> TrackEventKind<'a> {
    TrackEventKind::Midi {
        channel: OUTPUT_CHANNEL.into(),
        message,
    }
}

/// Map a normalized pitch wheel value back onto the 14-bit wire range
fn pitch_bend_raw(value: i32) -> u16 {
    (value - PITCH_BEND_CENTER).clamp(0, PITCH_BEND_MAX) as u16
}

fn build_track<'a>(plan: &MidiPlan, track: &'a PlannedTrack) -> Track<'a> {
    let tpb = plan.ticks_per_beat;
    let mut events: Vec<(u32, Rank, TrackEventKind<'a>)> = Vec::new();

    events.push((
        0,
        Rank::Setup,
        TrackEventKind::Meta(MetaMessage::TrackName(track.name.as_bytes())),
    ));
    events.push((
        0,
        Rank::Setup,
        TrackEventKind::Meta(MetaMessage::Tempo(tempo_for_bpm(plan.bpm).into())),
    ));
    events.push((
        0,
        Rank::Setup,
        midi_event(MidiMessage::ProgramChange {
            program: track.program.min(127).into(),
        }),
    ));

    for event in &track.events {
        match *event {
            PlannedEvent::Note {
                pitch,
                start_beat,
                duration_beats,
                velocity,
            } => {
                let start = beats_to_ticks(start_beat, tpb);
                let end = start.saturating_add(beats_to_ticks(duration_beats, tpb));
                let key = pitch.min(127);
                let off_rank = if end == start {
                    Rank::Release
                } else {
                    Rank::NoteOff
                };

                events.push((
                    start,
                    Rank::NoteOn,
                    midi_event(MidiMessage::NoteOn {
                        key: key.into(),
                        vel: velocity.min(127).into(),
                    }),
                ));
                events.push((
                    end,
                    off_rank,
                    midi_event(MidiMessage::NoteOff {
                        key: key.into(),
                        vel: 0.into(),
                    }),
                ));
            }
            PlannedEvent::Controller {
                beat,
                controller,
                value,
            } => {
                events.push((
                    beats_to_ticks(beat, tpb),
                    Rank::Control,
                    midi_event(MidiMessage::Controller {
                        controller: controller.min(127).into(),
                        value: value.min(127).into(),
                    }),
                ));
            }
            PlannedEvent::PitchWheel { beat, value } => {
                events.push((
                    beats_to_ticks(beat, tpb),
                    Rank::Control,
                    midi_event(MidiMessage::PitchBend {
                        bend: PitchBend(pitch_bend_raw(value).into()),
                    }),
                ));
            }
        }
    }

    // Stable sort keeps input order within a tick and rank
    events.sort_by_key(|(tick, rank, _)| (*tick, *rank));

    // Convert absolute ticks to delta times
    let mut out = Track::with_capacity(events.len() + 1);
    let mut last_tick = 0u32;
    for (tick, _, kind) in events {
        let mut delta = tick.saturating_sub(last_tick);
        if delta > MAX_DELTA {
            log::warn!(
                "Gap of {} ticks before tick {} on track '{}' exceeds the MIDI delta limit, clamping to {}",
                delta,
                tick,
                track.name,
                MAX_DELTA
            );
            delta = MAX_DELTA;
        }
        out.push(TrackEvent {
            delta: delta.into(),
            kind,
        });
        last_tick = tick;
    }

    out.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    out
}

/// Render a plan to Standard MIDI File bytes
pub fn render_smf(plan: &MidiPlan) -> Result<Vec<u8>> {
    let header = Header {
        format: Format::Parallel,
        timing: Timing::Metrical(plan.ticks_per_beat.into()),
    };

    let tracks = plan
        .tracks
        .iter()
        .map(|track| build_track(plan, track))
        .collect();

    let smf = Smf { header, tracks };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| CcmzError::Midi(format!("Failed to write MIDI: {}", e)))?;

    Ok(bytes)
}

/// Synthesize a score model into a MIDI file at `dest`
pub fn write_midi(model: &ScoreModel, dest: &Path, options: &SynthOptions) -> Result<PathBuf> {
    let plan = plan_midi(model, options)?;
    let bytes = render_smf(&plan)?;

    fs::write(dest, &bytes)?;

    log::info!(
        "Wrote {} ({} tracks, {} notes, {} controllers, {} pitch bends)",
        dest.display(),
        plan.tracks.len(),
        plan.note_count(),
        plan.controller_count(),
        plan.pitch_wheel_count()
    );

    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::score::{RawScoreEvent, Tempo, Track as ScoreTrack};
    use crate::midi::synth::EventStats;

    fn plan_with(events: Vec<PlannedEvent>) -> MidiPlan {
        MidiPlan {
            ticks_per_beat: 480,
            tempo: 500_000,
            bpm: 120,
            tracks: vec![PlannedTrack {
                name: "Piano".to_string(),
                program: 5,
                events,
            }],
            stats: EventStats::default(),
        }
    }

    fn midi_messages(track: &[TrackEvent]) -> Vec<(u32, MidiMessage)> {
        let mut tick = 0;
        track
            .iter()
            .filter_map(|event| {
                tick += event.delta.as_int();
                match event.kind {
                    TrackEventKind::Midi { message, .. } => Some((tick, message)),
                    _ => None,
                }
            })
            .collect()
    }

    #[test]
    fn test_render_header_and_setup() {
        let bytes = render_smf(&plan_with(vec![])).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        assert_eq!(smf.header.format, Format::Parallel);
        assert_eq!(smf.header.timing, Timing::Metrical(480.into()));
        assert_eq!(smf.tracks.len(), 1);

        let track = &smf.tracks[0];
        assert_eq!(track.len(), 4);
        assert!(matches!(
            track[0].kind,
            TrackEventKind::Meta(MetaMessage::TrackName(b"Piano"))
        ));
        if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = track[1].kind {
            assert_eq!(tempo.as_int(), 500_000);
        } else {
            panic!("Expected Tempo event");
        }
        assert!(matches!(
            track[3].kind,
            TrackEventKind::Meta(MetaMessage::EndOfTrack)
        ));

        assert_eq!(
            midi_messages(track),
            vec![(0, MidiMessage::ProgramChange { program: 5.into() })]
        );
    }

    #[test]
    fn test_render_note_timing() {
        let plan = plan_with(vec![
            PlannedEvent::Note {
                pitch: 60,
                start_beat: 0.0,
                duration_beats: 0.5,
                velocity: 100,
            },
            PlannedEvent::Note {
                pitch: 60,
                start_beat: 0.5,
                duration_beats: 1.0,
                velocity: 80,
            },
        ]);
        let bytes = render_smf(&plan).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        let messages = midi_messages(&smf.tracks[0]);
        assert_eq!(
            &messages[1..],
            &[
                (
                    0,
                    MidiMessage::NoteOn {
                        key: 60.into(),
                        vel: 100.into()
                    }
                ),
                // Note-off sorts before the note-on sharing its tick
                (
                    240,
                    MidiMessage::NoteOff {
                        key: 60.into(),
                        vel: 0.into()
                    }
                ),
                (
                    240,
                    MidiMessage::NoteOn {
                        key: 60.into(),
                        vel: 80.into()
                    }
                ),
                (
                    720,
                    MidiMessage::NoteOff {
                        key: 60.into(),
                        vel: 0.into()
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_render_controller_and_pitch_bend() {
        let plan = plan_with(vec![
            PlannedEvent::Controller {
                beat: 1.0,
                controller: 7,
                value: 100,
            },
            PlannedEvent::PitchWheel {
                beat: 2.0,
                value: 8192,
            },
        ]);
        let bytes = render_smf(&plan).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        let messages = midi_messages(&smf.tracks[0]);
        assert_eq!(
            messages[1],
            (
                480,
                MidiMessage::Controller {
                    controller: 7.into(),
                    value: 100.into()
                }
            )
        );
        match messages[2] {
            (960, MidiMessage::PitchBend { bend }) => assert_eq!(bend.0.as_int(), 0),
            other => panic!("Expected pitch bend at 960, got {:?}", other),
        }
    }

    #[test]
    fn test_pitch_bend_raw_range() {
        assert_eq!(pitch_bend_raw(8192), 0);
        assert_eq!(pitch_bend_raw(16384), 8192);
        assert_eq!(pitch_bend_raw(24575), 16383);
        assert_eq!(pitch_bend_raw(40000), 16383);
        assert_eq!(pitch_bend_raw(-5), 0);
    }

    #[test]
    fn test_zero_length_note_is_closed() {
        let model = ScoreModel {
            tracks: vec![],
            tempos: vec![],
            events: vec![RawScoreEvent {
                track: 0,
                tick: 480,
                duration: Some(0),
                staff: 0,
                bytes: vec![0x80, 60, 64],
            }],
        };
        let plan = plan_midi(&model, &SynthOptions::default()).unwrap();
        let bytes = render_smf(&plan).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        let messages = midi_messages(&smf.tracks[0]);
        assert_eq!(
            &messages[1..],
            &[
                (
                    480,
                    MidiMessage::NoteOn {
                        key: 60.into(),
                        vel: 64.into()
                    }
                ),
                (
                    480,
                    MidiMessage::NoteOff {
                        key: 60.into(),
                        vel: 0.into()
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_beats_to_ticks_clamps_past_range() {
        assert_eq!(beats_to_ticks(0.5, 480), 240);
        assert_eq!(beats_to_ticks(1.0e10, 480), u32::MAX);
    }

    #[test]
    fn test_oversized_gap_is_clamped() {
        let far_beat = f64::from(MAX_DELTA) / 480.0 + 10.0;
        let plan = plan_with(vec![PlannedEvent::Controller {
            beat: far_beat,
            controller: 7,
            value: 100,
        }]);
        let bytes = render_smf(&plan).unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        let messages = midi_messages(&smf.tracks[0]);
        assert_eq!(messages[1].0, MAX_DELTA);
    }

    #[test]
    fn test_tempo_for_bpm() {
        assert_eq!(tempo_for_bpm(120), 500_000);
        assert_eq!(tempo_for_bpm(100), 600_000);
        assert_eq!(tempo_for_bpm(1), MAX_TEMPO);
    }

    #[test]
    fn test_write_midi_file() {
        let model = ScoreModel {
            tracks: vec![
                ScoreTrack {
                    name: Some("Right".to_string()),
                    program: Some(0),
                },
                ScoreTrack {
                    name: None,
                    program: Some(32),
                },
            ],
            tempos: vec![Tempo {
                tempo: Some(600_000),
            }],
            events: vec![
                RawScoreEvent {
                    track: 1,
                    tick: 0,
                    duration: Some(480),
                    staff: 2,
                    bytes: vec![0x90, 40, 90],
                },
                RawScoreEvent {
                    track: 1,
                    tick: 480,
                    duration: None,
                    staff: 2,
                    bytes: vec![0x80, 40, 0],
                },
            ],
        };

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("song.mid");
        let written = write_midi(&model, &dest, &SynthOptions::default()).unwrap();
        assert_eq!(written, dest);

        let bytes = fs::read(&dest).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        assert_eq!(smf.tracks.len(), 2);

        assert!(matches!(
            smf.tracks[1][0].kind,
            TrackEventKind::Meta(MetaMessage::TrackName(b"Track1"))
        ));
        if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = smf.tracks[1][1].kind {
            assert_eq!(tempo.as_int(), 600_000);
        } else {
            panic!("Expected Tempo event");
        }

        let messages = midi_messages(&smf.tracks[1]);
        assert_eq!(
            messages,
            vec![
                (0, MidiMessage::ProgramChange { program: 32.into() }),
                (
                    0,
                    MidiMessage::NoteOn {
                        key: 40.into(),
                        vel: 90.into()
                    }
                ),
                (
                    480,
                    MidiMessage::NoteOff {
                        key: 40.into(),
                        vel: 0.into()
                    }
                ),
            ]
        );
    }

    #[test]
    fn test_write_midi_io_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("missing-dir").join("song.mid");
        let model = ScoreModel {
            tracks: vec![ScoreTrack::default()],
            ..Default::default()
        };

        assert!(matches!(
            write_midi(&model, &dest, &SynthOptions::default()),
            Err(CcmzError::Io(_))
        ));
        assert!(!dest.exists());
    }
}
