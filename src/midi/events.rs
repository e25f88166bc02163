//! Structured MIDI events decoded from raw score event bytes

/// A single decoded event
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    Channel(ChannelEvent),
    Meta(MetaEvent),
    /// System exclusive (`0xF0`); `data` is absent when the declared length overruns the buffer
    SysEx { data: Option<Vec<u8>> },
    /// Divided system exclusive / escape (`0xF7`)
    DividedSysEx { data: Option<Vec<u8>> },
}

impl ParsedEvent {
    /// Diagnostic label: the channel subtype for channel events, else the event type
    pub fn label(&self) -> &'static str {
        match self {
            ParsedEvent::Channel(event) => event.kind.subtype(),
            ParsedEvent::Meta(_) => "meta",
            ParsedEvent::SysEx { .. } => "sysEx",
            ParsedEvent::DividedSysEx { .. } => "dividedSysEx",
        }
    }
}

/// Channel voice event
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelEvent {
    /// MIDI channel (0-15)
    pub channel: u8,
    pub kind: ChannelKind,
}

/// Channel event payloads. Optional fields are omitted when the source
/// bytes were too short to carry them.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelKind {
    NoteOff { note: u8, velocity: Option<u8> },
    NoteOn { note: u8, velocity: Option<u8> },
    NoteAftertouch { note: u8, amount: Option<u8> },
    Controller { controller: u8, value: Option<u8> },
    ProgramChange { program: u8 },
    ChannelAftertouch { amount: u8 },
    /// 14-bit value, LSB first on the wire
    PitchBend { value: u16 },
    Unknown,
}

impl ChannelKind {
    pub fn subtype(&self) -> &'static str {
        match self {
            ChannelKind::NoteOff { .. } => "noteOff",
            ChannelKind::NoteOn { .. } => "noteOn",
            ChannelKind::NoteAftertouch { .. } => "noteAftertouch",
            ChannelKind::Controller { .. } => "controller",
            ChannelKind::ProgramChange { .. } => "programChange",
            ChannelKind::ChannelAftertouch { .. } => "channelAftertouch",
            ChannelKind::PitchBend { .. } => "pitchBend",
            ChannelKind::Unknown => "unknown",
        }
    }
}

/// Meta event (`0xFF`)
#[derive(Debug, Clone, PartialEq)]
pub struct MetaEvent {
    pub meta_type: u8,
    pub kind: MetaKind,
}

/// Text-carrying meta event types `0x01..=0x07`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextKind {
    Text,
    CopyrightNotice,
    TrackName,
    InstrumentName,
    Lyrics,
    Marker,
    CuePoint,
}

impl TextKind {
    pub fn from_meta_type(meta_type: u8) -> Option<Self> {
        match meta_type {
            0x01 => Some(TextKind::Text),
            0x02 => Some(TextKind::CopyrightNotice),
            0x03 => Some(TextKind::TrackName),
            0x04 => Some(TextKind::InstrumentName),
            0x05 => Some(TextKind::Lyrics),
            0x06 => Some(TextKind::Marker),
            0x07 => Some(TextKind::CuePoint),
            _ => None,
        }
    }

    pub fn subtype(self) -> &'static str {
        match self {
            TextKind::Text => "text",
            TextKind::CopyrightNotice => "copyrightNotice",
            TextKind::TrackName => "trackName",
            TextKind::InstrumentName => "instrumentName",
            TextKind::Lyrics => "lyrics",
            TextKind::Marker => "marker",
            TextKind::CuePoint => "cuePoint",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmpteOffset {
    pub frame_rate: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
    pub frame: u8,
    pub subframe: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub numerator: u8,
    /// Denominator as a power of two, as stored on the wire
    pub denominator_power: u8,
    pub metronome: u8,
    pub thirtyseconds: u8,
}

impl TimeSignature {
    /// Denominator as a note value (2 -> 4 for quarter notes).
    /// `None` if the stored power does not fit in a `u32`.
    pub fn denominator(&self) -> Option<u32> {
        1u32.checked_shl(self.denominator_power.into())
    }
}

/// Meta event payloads. Type-specific fields are `None` when the declared
/// length was right but the buffer ended early.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaKind {
    SequenceNumber { number: Option<u16> },
    Text { kind: TextKind, text: Option<String> },
    MidiChannelPrefix { channel: Option<u8> },
    EndOfTrack,
    SetTempo { microseconds_per_beat: Option<u32> },
    SmpteOffset(Option<SmpteOffset>),
    TimeSignature(Option<TimeSignature>),
    KeySignature { key: Option<i8>, scale: Option<u8> },
    SequencerSpecific { data: Option<Vec<u8>> },
    /// Unrecognized type, or a recognized type whose length check failed
    Unknown { data: Option<Vec<u8>> },
}

impl MetaKind {
    pub fn subtype(&self) -> &'static str {
        match self {
            MetaKind::SequenceNumber { .. } => "sequenceNumber",
            MetaKind::Text { kind, .. } => kind.subtype(),
            MetaKind::MidiChannelPrefix { .. } => "midiChannelPrefix",
            MetaKind::EndOfTrack => "endOfTrack",
            MetaKind::SetTempo { .. } => "setTempo",
            MetaKind::SmpteOffset(_) => "smpteOffset",
            MetaKind::TimeSignature(_) => "timeSignature",
            MetaKind::KeySignature { .. } => "keySignature",
            MetaKind::SequencerSpecific { .. } => "sequencerSpecific",
            MetaKind::Unknown { .. } => "unknown",
        }
    }
}

/// A parsed event placed on the score timeline
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub event: ParsedEvent,
    pub tick: u64,
    /// Duration recorded in the score, in ticks
    pub duration: Option<u64>,
    pub staff: u32,
    /// Output track index, already clamped to the track count
    pub track: usize,
}

impl TimedEvent {
    /// The channel event, if this is one
    pub fn channel(&self) -> Option<&ChannelEvent> {
        match &self.event {
            ParsedEvent::Channel(event) => Some(event),
            _ => None,
        }
    }
}
