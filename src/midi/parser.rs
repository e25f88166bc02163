//! Decoder for self-contained raw MIDI event byte sequences
//!
//! Every event carries its own status byte (no running status). Short events are
//! tolerated: fields the bytes cannot supply are simply left out, since exported
//! score events are sometimes truncated.

use super::events::{
    ChannelEvent, ChannelKind, MetaEvent, MetaKind, ParsedEvent, SmpteOffset, TextKind,
    TimeSignature,
};

/// SMPTE frame rates keyed by bits 5-6 of the hour byte
pub const SMPTE_FRAME_RATES: [(u8, u8); 4] = [(0x00, 24), (0x20, 25), (0x40, 29), (0x60, 30)];

/// Frame rate used when the hour byte matches no table entry
pub const DEFAULT_SMPTE_FRAME_RATE: u8 = 30;

/// Parse one raw event. Returns `None` for empty input, an unsupported leading
/// byte, or a channel/meta event too short to identify.
pub fn parse_event(bytes: &[u8]) -> Option<ParsedEvent> {
    let status = *bytes.first()?;

    if status & 0xF0 != 0xF0 {
        return parse_channel(status, bytes).map(ParsedEvent::Channel);
    }

    match status {
        0xFF => parse_meta(bytes).map(ParsedEvent::Meta),
        0xF0 => Some(ParsedEvent::SysEx {
            data: read_length_prefixed(bytes, 1),
        }),
        0xF7 => Some(ParsedEvent::DividedSysEx {
            data: read_length_prefixed(bytes, 1),
        }),
        _ => None,
    }
}

fn parse_channel(status: u8, bytes: &[u8]) -> Option<ChannelEvent> {
    if bytes.len() < 2 {
        return None;
    }

    let data1 = bytes[1];
    let data2 = bytes.get(2).copied();

    let kind = match status >> 4 {
        0x8 => ChannelKind::NoteOff {
            note: data1,
            velocity: data2,
        },
        // Note-on with velocity 0 is a note-off
        0x9 if data2 == Some(0) => ChannelKind::NoteOff {
            note: data1,
            velocity: data2,
        },
        0x9 => ChannelKind::NoteOn {
            note: data1,
            velocity: data2,
        },
        0xA => ChannelKind::NoteAftertouch {
            note: data1,
            amount: data2,
        },
        0xB => ChannelKind::Controller {
            controller: data1,
            value: data2,
        },
        0xC => ChannelKind::ProgramChange { program: data1 },
        0xD => ChannelKind::ChannelAftertouch { amount: data1 },
        0xE => ChannelKind::PitchBend {
            value: u16::from(data1) + (u16::from(data2.unwrap_or(0)) << 7),
        },
        _ => ChannelKind::Unknown,
    };

    Some(ChannelEvent {
        channel: status & 0x0F,
        kind,
    })
}

fn parse_meta(bytes: &[u8]) -> Option<MetaEvent> {
    let meta_type = *bytes.get(1)?;
    let (length, pos) = read_vlq(bytes, 2);
    let payload = slice_payload(bytes, pos, length);

    let kind = match meta_type {
        0x00 if length == 2 => MetaKind::SequenceNumber {
            number: payload.map(|p| u16::from_be_bytes([p[0], p[1]])),
        },
        0x01..=0x07 => MetaKind::Text {
            kind: TextKind::from_meta_type(meta_type)?,
            text: payload.map(|p| String::from_utf8_lossy(p).into_owned()),
        },
        0x20 if length == 1 => MetaKind::MidiChannelPrefix {
            channel: payload.map(|p| p[0]),
        },
        0x2F if length == 0 => MetaKind::EndOfTrack,
        0x51 if length == 3 => MetaKind::SetTempo {
            microseconds_per_beat: payload
                .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])),
        },
        0x54 if length == 5 => MetaKind::SmpteOffset(payload.map(|p| SmpteOffset {
            frame_rate: smpte_frame_rate(p[0]),
            hour: p[0] & 0x1F,
            min: p[1],
            sec: p[2],
            frame: p[3],
            subframe: p[4],
        })),
        0x58 if length == 4 => MetaKind::TimeSignature(payload.map(|p| TimeSignature {
            numerator: p[0],
            denominator_power: p[1],
            metronome: p[2],
            thirtyseconds: p[3],
        })),
        0x59 if length == 2 => MetaKind::KeySignature {
            // Sharps are positive, flats negative
            key: payload.map(|p| p[0] as i8),
            scale: payload.map(|p| p[1]),
        },
        0x7F => MetaKind::SequencerSpecific {
            data: payload.map(<[u8]>::to_vec),
        },
        _ => MetaKind::Unknown {
            data: payload.map(<[u8]>::to_vec),
        },
    };

    Some(MetaEvent { meta_type, kind })
}

fn smpte_frame_rate(hour_byte: u8) -> u8 {
    SMPTE_FRAME_RATES
        .iter()
        .find(|(bits, _)| *bits == hour_byte & 0x60)
        .map(|(_, rate)| *rate)
        .unwrap_or(DEFAULT_SMPTE_FRAME_RATE)
}

/// Decode a variable-length quantity starting at `start`.
///
/// Returns `(value, position after the quantity)`. A quantity cut off by the
/// end of the buffer keeps the bits read so far; an empty tail reads as 0.
pub fn read_vlq(bytes: &[u8], start: usize) -> (usize, usize) {
    let mut pos = start;
    let mut value: usize = 0;

    let Some(&first) = bytes.get(pos) else {
        return (0, pos);
    };
    let mut byte = first;
    pos += 1;

    while byte & 0x80 != 0 && pos < bytes.len() {
        value = value.saturating_mul(128).saturating_add(usize::from(byte & 0x7F));
        byte = bytes[pos];
        pos += 1;
    }
    value = value.saturating_mul(128).saturating_add(usize::from(byte & 0x7F));

    (value, pos)
}

/// `length` bytes from `pos`, only if they are all present
fn slice_payload(bytes: &[u8], pos: usize, length: usize) -> Option<&[u8]> {
    let end = pos.checked_add(length)?;
    bytes.get(pos..end)
}

fn read_length_prefixed(bytes: &[u8], start: usize) -> Option<Vec<u8>> {
    let (length, pos) = read_vlq(bytes, start);
    slice_payload(bytes, pos, length).map(<[u8]>::to_vec)
}
