// Copyright (c) 2015 William Light <wrl@illest.net>
// 
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
// 
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
// 
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

use std::{mem, ptr, slice};

use libc::c_void;

use alsa_sys::snd_seq_event_t;

use crate::Address;
use crate::address::{
    SND_SEQ_ADDRESS_SUBSCRIBERS,
    SND_SEQ_ADDRESS_UNKNOWN
};

//
// seq_event.h constants that alsa-sys leaves as bare integers
//

pub const SND_SEQ_QUEUE_DIRECT: u8 = 253;

const SND_SEQ_TIME_STAMP_REAL: u8 = 1 << 0;
const SND_SEQ_TIME_MODE_REL: u8 = 1 << 1;
const SND_SEQ_EVENT_LENGTH_MASK: u8 = 3 << 2;
const SND_SEQ_EVENT_LENGTH_FIXED: u8 = 0 << 2;
const SND_SEQ_EVENT_LENGTH_VARIABLE: u8 = 1 << 2;
const SND_SEQ_PRIORITY_HIGH: u8 = 1 << 4;

pub mod types {
    pub const SYSTEM: u8 = 0;
    pub const RESULT: u8 = 1;
    pub const NOTE: u8 = 5;
    pub const NOTEON: u8 = 6;
    pub const NOTEOFF: u8 = 7;
    pub const KEYPRESS: u8 = 8;
    pub const CONTROLLER: u8 = 10;
    pub const PGMCHANGE: u8 = 11;
    pub const CHANPRESS: u8 = 12;
    pub const PITCHBEND: u8 = 13;
    pub const CONTROL14: u8 = 14;
    pub const NONREGPARAM: u8 = 15;
    pub const REGPARAM: u8 = 16;
    pub const SONGPOS: u8 = 20;
    pub const SONGSEL: u8 = 21;
    pub const QFRAME: u8 = 22;
    pub const TIMESIGN: u8 = 23;
    pub const KEYSIGN: u8 = 24;
    pub const START: u8 = 30;
    pub const CONTINUE: u8 = 31;
    pub const STOP: u8 = 32;
    pub const SETPOS_TICK: u8 = 33;
    pub const SETPOS_TIME: u8 = 34;
    pub const TEMPO: u8 = 35;
    pub const CLOCK: u8 = 36;
    pub const TICK: u8 = 37;
    pub const QUEUE_SKEW: u8 = 38;
    pub const SYNC_POS: u8 = 39;
    pub const TUNE_REQUEST: u8 = 40;
    pub const RESET: u8 = 41;
    pub const SENSING: u8 = 42;
    pub const CLIENT_START: u8 = 60;
    pub const CLIENT_EXIT: u8 = 61;
    pub const CLIENT_CHANGE: u8 = 62;
    pub const PORT_START: u8 = 63;
    pub const PORT_EXIT: u8 = 64;
    pub const PORT_CHANGE: u8 = 65;
    pub const PORT_SUBSCRIBED: u8 = 66;
    pub const PORT_UNSUBSCRIBED: u8 = 67;
    pub const SYSEX: u8 = 130;
    pub const NONE: u8 = 255;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealTime {
    pub seconds: u32,
    pub nanoseconds: u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timestamp {
    Tick(u32),
    Real(RealTime)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoteData {
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub off_velocity: u8,
    /// Only meaningful for `EventData::Note`.
    pub duration: u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlData {
    pub channel: u8,
    pub param: u32,
    pub value: i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueParam {
    Value(i32),
    Position(u32),
    Time(RealTime),
    Skew { value: u32, base: u32 }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueControl {
    pub queue: u8,
    pub param: QueueParam
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub sender: Address,
    pub dest: Address
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultData {
    pub event_type: i32,
    pub result: i32
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventData {
    System(ResultData),
    Result(ResultData),

    Note(NoteData),
    NoteOn(NoteData),
    NoteOff(NoteData),
    KeyPressure(NoteData),

    ControlChange(ControlData),
    ProgramChange(ControlData),
    ChannelPressure(ControlData),
    PitchBend(ControlData),
    Control14(ControlData),
    NonRegisteredParameter(ControlData),
    RegisteredParameter(ControlData),
    SongPosition(ControlData),
    SongSelect(ControlData),
    QuarterFrame(ControlData),
    TimeSignature(ControlData),
    KeySignature(ControlData),

    Start(QueueControl),
    Continue(QueueControl),
    Stop(QueueControl),
    SetPositionTick(QueueControl),
    SetPositionTime(QueueControl),
    Tempo(QueueControl),
    Clock(QueueControl),
    Tick(QueueControl),
    QueueSkew(QueueControl),
    SyncPosition(QueueControl),

    TuneRequest,
    Reset,
    ActiveSensing,

    ClientStart(Address),
    ClientExit(Address),
    ClientChange(Address),
    PortStart(Address),
    PortExit(Address),
    PortChange(Address),
    PortSubscribed(Connection),
    PortUnsubscribed(Connection),

    SysEx(Vec<u8>),

    /// Any type we don't decode; only the common fields survive.
    Generic(u8)
}

impl EventData {
    pub fn event_type(&self) -> u8 {
        use self::EventData::*;

        match *self {
            System(_) => types::SYSTEM,
            Result(_) => types::RESULT,
            Note(_) => types::NOTE,
            NoteOn(_) => types::NOTEON,
            NoteOff(_) => types::NOTEOFF,
            KeyPressure(_) => types::KEYPRESS,
            ControlChange(_) => types::CONTROLLER,
            ProgramChange(_) => types::PGMCHANGE,
            ChannelPressure(_) => types::CHANPRESS,
            PitchBend(_) => types::PITCHBEND,
            Control14(_) => types::CONTROL14,
            NonRegisteredParameter(_) => types::NONREGPARAM,
            RegisteredParameter(_) => types::REGPARAM,
            SongPosition(_) => types::SONGPOS,
            SongSelect(_) => types::SONGSEL,
            QuarterFrame(_) => types::QFRAME,
            TimeSignature(_) => types::TIMESIGN,
            KeySignature(_) => types::KEYSIGN,
            Start(_) => types::START,
            Continue(_) => types::CONTINUE,
            Stop(_) => types::STOP,
            SetPositionTick(_) => types::SETPOS_TICK,
            SetPositionTime(_) => types::SETPOS_TIME,
            Tempo(_) => types::TEMPO,
            Clock(_) => types::CLOCK,
            Tick(_) => types::TICK,
            QueueSkew(_) => types::QUEUE_SKEW,
            SyncPosition(_) => types::SYNC_POS,
            TuneRequest => types::TUNE_REQUEST,
            Reset => types::RESET,
            ActiveSensing => types::SENSING,
            ClientStart(_) => types::CLIENT_START,
            ClientExit(_) => types::CLIENT_EXIT,
            ClientChange(_) => types::CLIENT_CHANGE,
            PortStart(_) => types::PORT_START,
            PortExit(_) => types::PORT_EXIT,
            PortChange(_) => types::PORT_CHANGE,
            PortSubscribed(_) => types::PORT_SUBSCRIBED,
            PortUnsubscribed(_) => types::PORT_UNSUBSCRIBED,
            SysEx(_) => types::SYSEX,
            Generic(event_type) => event_type
        }
    }
}

/// A sequencer event, detached from any native buffer.
///
/// `dest: None` means "all subscribers of the source port" and `queue: None`
/// means direct delivery. A time stamp is only meaningful together with a
/// queue.
///
/// Encoding then decoding normalises three things: a missing source comes
/// back as `0:0` (the sequencer fills in the sending client), an explicit
/// `ALL_SUBSCRIBERS` destination comes back as `None`, and a time stamp on a
/// direct event is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub data: EventData,
    pub source: Option<Address>,
    pub dest: Option<Address>,
    pub queue: Option<u8>,
    pub time: Option<Timestamp>,
    pub relative: bool,
    pub high_priority: bool,
    pub tag: u8
}

impl Event {
    pub fn new(data: EventData) -> Self {
        Event {
            data,
            source: None,
            dest: None,
            queue: None,
            time: None,
            relative: false,
            high_priority: false,
            tag: 0
        }
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Event::new(EventData::NoteOn(NoteData { channel, note, velocity, ..NoteData::default() }))
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Event::new(EventData::NoteOff(NoteData { channel, note, velocity, ..NoteData::default() }))
    }

    pub fn control_change(channel: u8, param: u32, value: i32) -> Self {
        Event::new(EventData::ControlChange(ControlData { channel, param, value }))
    }

    pub fn with_dest<A: Into<Address>>(mut self, dest: A) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn with_source<A: Into<Address>>(mut self, source: A) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn scheduled(mut self, queue: u8, time: Timestamp) -> Self {
        self.queue = Some(queue);
        self.time = Some(time);
        self
    }

    pub fn event_type(&self) -> u8 {
        self.data.event_type()
    }
}

/// A native record ready to hand to the sequencer. Owns the payload a
/// variable-length record points at.
pub struct NativeEvent {
    raw: snd_seq_event_t,
    _ext: Option<Box<[u8]>>
}

impl NativeEvent {
    pub fn as_raw(&self) -> &snd_seq_event_t {
        &self.raw
    }

    pub fn as_raw_mut(&mut self) -> &mut snd_seq_event_t {
        &mut self.raw
    }
}

//
// the data union is 12 bytes in every variant; the time union is 8
//

type DataBytes = [u8; 12];

fn data_bytes(ev: &snd_seq_event_t) -> DataBytes {
    unsafe { ptr::read_unaligned(&ev.data as *const _ as *const DataBytes) }
}

fn set_data_bytes(ev: &mut snd_seq_event_t, bytes: DataBytes) {
    unsafe { ptr::write_unaligned(&mut ev.data as *mut _ as *mut DataBytes, bytes) }
}

fn time_bytes(ev: &snd_seq_event_t) -> [u8; 8] {
    unsafe { ptr::read_unaligned(&ev.time as *const _ as *const [u8; 8]) }
}

fn set_time_bytes(ev: &mut snd_seq_event_t, bytes: [u8; 8]) {
    unsafe { ptr::write_unaligned(&mut ev.time as *mut _ as *mut [u8; 8], bytes) }
}

fn u32_at(b: &[u8], at: usize) -> u32 {
    u32::from_ne_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

fn put_u32(b: &mut [u8], at: usize, v: u32) {
    b[at .. at + 4].copy_from_slice(&v.to_ne_bytes());
}

fn decode_note(d: &DataBytes) -> NoteData {
    NoteData {
        channel: d[0],
        note: d[1],
        velocity: d[2],
        off_velocity: d[3],
        duration: u32_at(d, 4)
    }
}

fn encode_note(n: &NoteData) -> DataBytes {
    let mut d = [0; 12];
    d[0] = n.channel;
    d[1] = n.note;
    d[2] = n.velocity;
    d[3] = n.off_velocity;
    put_u32(&mut d, 4, n.duration);
    d
}

fn decode_ctrl(d: &DataBytes) -> ControlData {
    ControlData {
        channel: d[0],
        param: u32_at(d, 4),
        value: u32_at(d, 8) as i32
    }
}

fn encode_ctrl(c: &ControlData) -> DataBytes {
    let mut d = [0; 12];
    d[0] = c.channel;
    put_u32(&mut d, 4, c.param);
    put_u32(&mut d, 8, c.value as u32);
    d
}

fn decode_queue_ctrl(event_type: u8, d: &DataBytes) -> QueueControl {
    let param = match event_type {
        types::SETPOS_TICK => QueueParam::Position(u32_at(d, 4)),
        types::SETPOS_TIME => QueueParam::Time(RealTime {
            seconds: u32_at(d, 4),
            nanoseconds: u32_at(d, 8)
        }),
        types::QUEUE_SKEW => QueueParam::Skew {
            value: u32_at(d, 4),
            base: u32_at(d, 8)
        },
        _ => QueueParam::Value(u32_at(d, 4) as i32)
    };

    QueueControl {
        queue: d[0],
        param
    }
}

fn encode_queue_ctrl(q: &QueueControl) -> DataBytes {
    let mut d = [0; 12];
    d[0] = q.queue;

    match q.param {
        QueueParam::Value(value) => put_u32(&mut d, 4, value as u32),
        QueueParam::Position(tick) => put_u32(&mut d, 4, tick),
        QueueParam::Time(t) => {
            put_u32(&mut d, 4, t.seconds);
            put_u32(&mut d, 8, t.nanoseconds);
        }
        QueueParam::Skew { value, base } => {
            put_u32(&mut d, 4, value);
            put_u32(&mut d, 8, base);
        }
    }

    d
}

fn decode_addr(d: &DataBytes, at: usize) -> Address {
    Address::new(d[at], d[at + 1])
}

fn encode_addr(d: &mut DataBytes, at: usize, addr: Address) {
    d[at] = addr.client_id;
    d[at + 1] = addr.port_id;
}

fn decode_result(d: &DataBytes) -> ResultData {
    ResultData {
        event_type: u32_at(d, 0) as i32,
        result: u32_at(d, 4) as i32
    }
}

fn encode_result(r: &ResultData) -> DataBytes {
    let mut d = [0; 12];
    put_u32(&mut d, 0, r.event_type as u32);
    put_u32(&mut d, 4, r.result as u32);
    d
}

const PTR_SIZE: usize = mem::size_of::<usize>();

unsafe fn decode_ext(ev: &snd_seq_event_t) -> Vec<u8> {
    if ev.flags & SND_SEQ_EVENT_LENGTH_MASK != SND_SEQ_EVENT_LENGTH_VARIABLE {
        return Vec::new();
    }

    let d = data_bytes(ev);
    let len = u32_at(&d, 0) as usize;
    let mut addr = [0u8; PTR_SIZE];
    addr.copy_from_slice(&d[4 .. 4 + PTR_SIZE]);
    let ptr = usize::from_ne_bytes(addr) as *const u8;

    if ptr.is_null() || len == 0 {
        return Vec::new();
    }

    slice::from_raw_parts(ptr, len).to_vec()
}

fn encode_ext(buf: &[u8]) -> DataBytes {
    let mut d = [0; 12];
    put_u32(&mut d, 0, buf.len() as u32);
    let ptr = buf.as_ptr() as *const c_void as usize;
    d[4 .. 4 + PTR_SIZE].copy_from_slice(&ptr.to_ne_bytes());
    d
}

/// Decode a native record. Types without a decoder become
/// `EventData::Generic`.
///
/// # Safety
///
/// If `ev` is flagged variable length, its data union must hold a pointer
/// valid for reads of the stated length: a record from `encode` whose
/// `NativeEvent` is still alive, or one libasound just handed out.
pub unsafe fn decode(ev: &snd_seq_event_t) -> Event {
    let event_type = ev.type_ as u8;
    let d = data_bytes(ev);

    let data = match event_type {
        types::SYSTEM => EventData::System(decode_result(&d)),
        types::RESULT => EventData::Result(decode_result(&d)),

        types::NOTE => EventData::Note(decode_note(&d)),
        types::NOTEON => EventData::NoteOn(decode_note(&d)),
        types::NOTEOFF => EventData::NoteOff(decode_note(&d)),
        types::KEYPRESS => EventData::KeyPressure(decode_note(&d)),

        types::CONTROLLER => EventData::ControlChange(decode_ctrl(&d)),
        types::PGMCHANGE => EventData::ProgramChange(decode_ctrl(&d)),
        types::CHANPRESS => EventData::ChannelPressure(decode_ctrl(&d)),
        types::PITCHBEND => EventData::PitchBend(decode_ctrl(&d)),
        types::CONTROL14 => EventData::Control14(decode_ctrl(&d)),
        types::NONREGPARAM => EventData::NonRegisteredParameter(decode_ctrl(&d)),
        types::REGPARAM => EventData::RegisteredParameter(decode_ctrl(&d)),
        types::SONGPOS => EventData::SongPosition(decode_ctrl(&d)),
        types::SONGSEL => EventData::SongSelect(decode_ctrl(&d)),
        types::QFRAME => EventData::QuarterFrame(decode_ctrl(&d)),
        types::TIMESIGN => EventData::TimeSignature(decode_ctrl(&d)),
        types::KEYSIGN => EventData::KeySignature(decode_ctrl(&d)),

        types::START => EventData::Start(decode_queue_ctrl(event_type, &d)),
        types::CONTINUE => EventData::Continue(decode_queue_ctrl(event_type, &d)),
        types::STOP => EventData::Stop(decode_queue_ctrl(event_type, &d)),
        types::SETPOS_TICK => EventData::SetPositionTick(decode_queue_ctrl(event_type, &d)),
        types::SETPOS_TIME => EventData::SetPositionTime(decode_queue_ctrl(event_type, &d)),
        types::TEMPO => EventData::Tempo(decode_queue_ctrl(event_type, &d)),
        types::CLOCK => EventData::Clock(decode_queue_ctrl(event_type, &d)),
        types::TICK => EventData::Tick(decode_queue_ctrl(event_type, &d)),
        types::QUEUE_SKEW => EventData::QueueSkew(decode_queue_ctrl(event_type, &d)),
        types::SYNC_POS => EventData::SyncPosition(decode_queue_ctrl(event_type, &d)),

        types::TUNE_REQUEST => EventData::TuneRequest,
        types::RESET => EventData::Reset,
        types::SENSING => EventData::ActiveSensing,

        types::CLIENT_START => EventData::ClientStart(decode_addr(&d, 0)),
        types::CLIENT_EXIT => EventData::ClientExit(decode_addr(&d, 0)),
        types::CLIENT_CHANGE => EventData::ClientChange(decode_addr(&d, 0)),
        types::PORT_START => EventData::PortStart(decode_addr(&d, 0)),
        types::PORT_EXIT => EventData::PortExit(decode_addr(&d, 0)),
        types::PORT_CHANGE => EventData::PortChange(decode_addr(&d, 0)),
        types::PORT_SUBSCRIBED => EventData::PortSubscribed(Connection {
            sender: decode_addr(&d, 0),
            dest: decode_addr(&d, 2)
        }),
        types::PORT_UNSUBSCRIBED => EventData::PortUnsubscribed(Connection {
            sender: decode_addr(&d, 0),
            dest: decode_addr(&d, 2)
        }),

        types::SYSEX => EventData::SysEx(decode_ext(ev)),

        other => EventData::Generic(other)
    };

    let dest = Address::from_raw(ev.dest);
    let queue = match ev.queue as u8 {
        SND_SEQ_QUEUE_DIRECT => None,
        queue => Some(queue)
    };

    let time = queue.map(|_| {
        let t = time_bytes(ev);
        if ev.flags & SND_SEQ_TIME_STAMP_REAL != 0 {
            Timestamp::Real(RealTime {
                seconds: u32_at(&t, 0),
                nanoseconds: u32_at(&t, 4)
            })
        } else {
            Timestamp::Tick(u32_at(&t, 0))
        }
    });

    Event {
        data,
        source: Some(Address::from_raw(ev.source)),
        dest: if dest.client_id == SND_SEQ_ADDRESS_SUBSCRIBERS { None } else { Some(dest) },
        queue,
        time,
        relative: ev.flags & SND_SEQ_TIME_MODE_REL != 0,
        high_priority: ev.flags & SND_SEQ_PRIORITY_HIGH != 0,
        tag: ev.tag as u8
    }
}

/// Build a native record. `queue`, `port` and `dest` take precedence over
/// the event's own queue, source port and destination.
pub fn encode(event: &Event, queue: Option<u8>, port: Option<u8>, dest: Option<Address>)
    -> NativeEvent {
    let mut raw: snd_seq_event_t = unsafe { mem::zeroed() };
    let mut ext = None;

    raw.type_ = event.event_type() as _;
    raw.tag = event.tag as _;
    raw.flags = SND_SEQ_EVENT_LENGTH_FIXED;

    let d = match event.data {
        EventData::System(ref r) | EventData::Result(ref r) => encode_result(r),

        EventData::Note(ref n)
        | EventData::NoteOn(ref n)
        | EventData::NoteOff(ref n)
        | EventData::KeyPressure(ref n) => encode_note(n),

        EventData::ControlChange(ref c)
        | EventData::ProgramChange(ref c)
        | EventData::ChannelPressure(ref c)
        | EventData::PitchBend(ref c)
        | EventData::Control14(ref c)
        | EventData::NonRegisteredParameter(ref c)
        | EventData::RegisteredParameter(ref c)
        | EventData::SongPosition(ref c)
        | EventData::SongSelect(ref c)
        | EventData::QuarterFrame(ref c)
        | EventData::TimeSignature(ref c)
        | EventData::KeySignature(ref c) => encode_ctrl(c),

        EventData::Start(ref q)
        | EventData::Continue(ref q)
        | EventData::Stop(ref q)
        | EventData::SetPositionTick(ref q)
        | EventData::SetPositionTime(ref q)
        | EventData::Tempo(ref q)
        | EventData::Clock(ref q)
        | EventData::Tick(ref q)
        | EventData::QueueSkew(ref q)
        | EventData::SyncPosition(ref q) => encode_queue_ctrl(q),

        EventData::ClientStart(a)
        | EventData::ClientExit(a)
        | EventData::ClientChange(a)
        | EventData::PortStart(a)
        | EventData::PortExit(a)
        | EventData::PortChange(a) => {
            let mut d = [0; 12];
            encode_addr(&mut d, 0, a);
            d
        }

        EventData::PortSubscribed(c) | EventData::PortUnsubscribed(c) => {
            let mut d = [0; 12];
            encode_addr(&mut d, 0, c.sender);
            encode_addr(&mut d, 2, c.dest);
            d
        }

        EventData::SysEx(ref bytes) => {
            let buf: Box<[u8]> = bytes.clone().into_boxed_slice();
            let d = encode_ext(&buf);
            raw.flags = SND_SEQ_EVENT_LENGTH_VARIABLE;
            ext = Some(buf);
            d
        }

        EventData::TuneRequest
        | EventData::Reset
        | EventData::ActiveSensing
        | EventData::Generic(_) => [0; 12]
    };
    set_data_bytes(&mut raw, d);

    if event.relative {
        raw.flags |= SND_SEQ_TIME_MODE_REL;
    }

    if event.high_priority {
        raw.flags |= SND_SEQ_PRIORITY_HIGH;
    }

    raw.queue = queue.or(event.queue).unwrap_or(SND_SEQ_QUEUE_DIRECT) as _;

    let mut t = [0u8; 8];
    match event.time {
        Some(Timestamp::Tick(tick)) => put_u32(&mut t, 0, tick),
        Some(Timestamp::Real(real)) => {
            raw.flags |= SND_SEQ_TIME_STAMP_REAL;
            put_u32(&mut t, 0, real.seconds);
            put_u32(&mut t, 4, real.nanoseconds);
        }
        None => {}
    }
    set_time_bytes(&mut raw, t);

    let mut source = event.source.unwrap_or(Address::new(0, 0));
    if let Some(port) = port {
        source.port_id = port;
    }
    raw.source = source.to_raw();

    raw.dest = dest.or(event.dest)
        .unwrap_or(Address::new(SND_SEQ_ADDRESS_SUBSCRIBERS, SND_SEQ_ADDRESS_UNKNOWN))
        .to_raw();

    NativeEvent {
        raw,
        _ext: ext
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(event: &Event) -> Event {
        unsafe { decode(encode(event, None, None, None).as_raw()) }
    }

    #[test]
    fn note_round_trip() {
        let event = Event::note_on(3, 60, 100)
            .with_source((128, 0))
            .with_dest((129, 2));

        assert_eq!(round_trip(&event), event);
    }

    #[test]
    fn scheduled_control_round_trip() {
        let mut event = Event::control_change(9, 7, -3)
            .with_source((130, 1))
            .scheduled(2, Timestamp::Real(RealTime { seconds: 5, nanoseconds: 250 }));
        event.relative = true;
        event.high_priority = true;
        event.tag = 17;

        assert_eq!(round_trip(&event), event);
    }

    #[test]
    fn queue_control_keeps_its_param_shape() {
        let skew = Event::new(EventData::QueueSkew(QueueControl {
            queue: 1,
            param: QueueParam::Skew { value: 0x10000, base: 0x10000 }
        })).with_source((128, 0)).with_dest((0, 0));

        let pos = Event::new(EventData::SetPositionTime(QueueControl {
            queue: 1,
            param: QueueParam::Time(RealTime { seconds: 1, nanoseconds: 2 })
        })).with_source((128, 0)).with_dest((0, 0));

        assert_eq!(round_trip(&skew), skew);
        assert_eq!(round_trip(&pos), pos);
    }

    #[test]
    fn sysex_payload_is_copied_out() {
        let event = Event::new(EventData::SysEx(vec![0xf0, 0x7e, 0x7f, 0x06, 0x01, 0xf7]))
            .with_source((128, 0));

        let native = encode(&event, None, None, None);
        let decoded = unsafe { decode(native.as_raw()) };
        drop(native);

        assert_eq!(decoded, event);
    }

    #[test]
    fn context_overrides_event_fields() {
        let event = Event::note_off(0, 64, 0)
            .with_source((128, 4))
            .with_dest((20, 0))
            .scheduled(1, Timestamp::Tick(96));

        let native = encode(&event, Some(3), Some(7), Some(Address::new(21, 1)));
        let decoded = unsafe { decode(native.as_raw()) };

        assert_eq!(decoded.queue, Some(3));
        assert_eq!(decoded.source, Some(Address::new(128, 7)));
        assert_eq!(decoded.dest, Some(Address::new(21, 1)));
        assert_eq!(decoded.time, Some(Timestamp::Tick(96)));
        assert_eq!(decoded.data, event.data);
    }

    #[test]
    fn defaults_are_direct_to_subscribers() {
        let native = encode(&Event::note_on(0, 60, 1), None, Some(2), None);
        let raw = native.as_raw();

        assert_eq!(raw.queue as u8, SND_SEQ_QUEUE_DIRECT);
        assert_eq!(raw.dest.client, SND_SEQ_ADDRESS_SUBSCRIBERS);
        assert_eq!(raw.dest.port, SND_SEQ_ADDRESS_UNKNOWN);
        assert_eq!(raw.source.port, 2);

        let decoded = unsafe { decode(raw) };
        assert_eq!(decoded.dest, None);
        assert_eq!(decoded.queue, None);
        assert_eq!(decoded.time, None);
    }

    #[test]
    fn unknown_type_decodes_to_generic() {
        let mut raw: snd_seq_event_t = unsafe { mem::zeroed() };
        raw.type_ = 92;
        raw.queue = SND_SEQ_QUEUE_DIRECT as _;
        raw.source = Address::new(128, 0).to_raw();
        raw.dest = Address::new(129, 0).to_raw();

        let event = unsafe { decode(&raw) };
        assert_eq!(event.data, EventData::Generic(92));
        assert_eq!(event.event_type(), 92);
        assert_eq!(event.dest, Some(Address::new(129, 0)));
    }

    #[test]
    fn subscription_notice_carries_both_ends() {
        let event = Event::new(EventData::PortSubscribed(Connection {
            sender: Address::new(14, 0),
            dest: Address::new(128, 0)
        })).with_source((0, 1)).with_dest((128, 0));

        assert_eq!(round_trip(&event), event);
    }

    #[test]
    fn sysex_without_payload_is_empty() {
        let mut raw: snd_seq_event_t = unsafe { mem::zeroed() };
        raw.type_ = types::SYSEX as _;
        raw.flags = SND_SEQ_EVENT_LENGTH_VARIABLE;
        raw.queue = SND_SEQ_QUEUE_DIRECT as _;

        let mut d = [0; 12];
        put_u32(&mut d, 0, 16);
        set_data_bytes(&mut raw, d);

        assert_eq!(unsafe { decode(&raw) }.data, EventData::SysEx(Vec::new()));
    }

    #[test]
    fn unset_fields_come_back_normalised() {
        // no source: the kernel stamps our client, locally it reads as 0:0
        let event = Event::note_on(0, 60, 1);
        assert_eq!(round_trip(&event).source, Some(Address::new(0, 0)));

        // an explicit subscribers destination is the same as none
        let event = Event::note_on(0, 60, 1).with_dest(crate::ALL_SUBSCRIBERS);
        assert_eq!(round_trip(&event).dest, None);

        // a time stamp without a queue is delivered directly and dropped
        let mut event = Event::note_on(0, 60, 1);
        event.time = Some(Timestamp::Tick(480));
        let decoded = round_trip(&event);
        assert_eq!(decoded.queue, None);
        assert_eq!(decoded.time, None);

        // once normalised, the event is a fixed point
        assert_eq!(round_trip(&decoded), decoded);
    }
}
