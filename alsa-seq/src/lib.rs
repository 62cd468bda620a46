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

//! Client library for the ALSA sequencer.
//!
//! A `SequencerHandle` owns one connection to the kernel sequencer. Ports
//! and queues are created against it and borrow it. Event I/O that waits for
//! the sequencer's descriptor comes in two flavours that must not be mixed
//! on one connection: `SequencerClient` blocks the calling thread in
//! `poll(2)`, `AsyncSequencerClient` suspends on a tokio reactor.

#[macro_use]
extern crate bitflags;

#[macro_use]
extern crate tracing;

extern crate alsa_sys;
extern crate libc;

use std::cell::{
    Cell,
    RefCell
};

use std::os::unix::io::RawFd;

use libc::c_int;

pub struct SequencerHandle {
    backend: RefCell<Option<Box<dyn Backend>>>,
    client_id: c_int,
    fd: RawFd
}

pub struct SequencerPort<'handle> {
    port_id: c_int,
    client_id: c_int,
    handle: &'handle SequencerHandle,
    closed: Cell<bool>
}

pub struct Queue<'handle> {
    queue_id: c_int,
    handle: &'handle SequencerHandle,
    closed: Cell<bool>
}

mod error;
mod address;
mod backend;
mod alsa;
mod handle;
mod port;
mod queue;
mod query;
mod subscribe;
mod wait;
mod aio;

pub mod event;

pub use error::{
    Error,
    Result
};

pub use address::{
    Address,
    ALL_SUBSCRIBERS,
    BROADCAST,
    SYSTEM_ANNOUNCE,
    SYSTEM_TIMER
};

pub use backend::{
    Backend,
    Status
};

pub use alsa::AlsaBackend;

pub use handle::{
    HandleOpenStreams,
    OpenMode,
    Route,
    SequencerConfig
};

pub use port::{
    AsPortId,
    PortCapabilities,
    PortInfo,
    PortType,

    DEFAULT_PORT_TYPE,
    READ_PORT,
    RW_PORT,
    WRITE_PORT
};

pub use queue::AsQueueId;

pub use query::{
    ClientInfo,
    ClientIter,
    ClientType,
    PortFilter,
    PortIter,
    PortRef,
    Previous,

    READ_PORT_PREFERRED_TYPES,
    RW_PORT_PREFERRED_TYPES,
    WRITE_PORT_PREFERRED_TYPES
};

pub use subscribe::{
    SubscribeOptions,
    Subscription
};

pub use wait::{
    Interest,
    Readiness,
    SequencerClient
};

pub use aio::AsyncSequencerClient;

pub use event::{
    Event,
    EventData
};

#[cfg(test)]
mod mock;
