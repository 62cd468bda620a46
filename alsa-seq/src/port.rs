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

use libc::c_int;

use serde::Serialize;

use crate::{
    Address,
    Error,
    Result,
    SequencerPort,
    SubscribeOptions
};

use crate::error::check;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct PortCapabilities: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const SYNC_READ = 1 << 2;
        const SYNC_WRITE = 1 << 3;
        const DUPLEX = 1 << 4;
        const SUBS_READ = 1 << 5;
        const SUBS_WRITE = 1 << 6;
        const NO_EXPORT = 1 << 7;
    }
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
    pub struct PortType: u32 {
        const SPECIFIC = 1 << 0;
        const MIDI_GENERIC = 1 << 1;
        const MIDI_GM = 1 << 2;
        const MIDI_GS = 1 << 3;
        const MIDI_XG = 1 << 4;
        const MIDI_MT32 = 1 << 5;
        const MIDI_GM2 = 1 << 6;
        const SYNTH = 1 << 10;
        const DIRECT_SAMPLE = 1 << 11;
        const SAMPLE = 1 << 12;
        const HARDWARE = 1 << 16;
        const SOFTWARE = 1 << 17;
        const SYNTHESIZER = 1 << 18;
        const PORT = 1 << 19;
        const APPLICATION = 1 << 20;
    }
}

/// Other clients can read from (subscribe to) this port.
pub const READ_PORT: PortCapabilities =
    PortCapabilities::READ.union(PortCapabilities::SUBS_READ);

/// Other clients can write to this port.
pub const WRITE_PORT: PortCapabilities =
    PortCapabilities::WRITE.union(PortCapabilities::SUBS_WRITE);

pub const RW_PORT: PortCapabilities = READ_PORT.union(WRITE_PORT);

pub const DEFAULT_PORT_TYPE: PortType =
    PortType::MIDI_GENERIC.union(PortType::SOFTWARE).union(PortType::APPLICATION);

/// Snapshot of a port's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    pub client_id: c_int,
    pub port_id: c_int,
    pub name: String,
    pub capability: PortCapabilities,
    pub port_type: PortType,
    pub midi_channels: c_int,
    pub midi_voices: c_int,
    pub synth_voices: c_int,
    pub read_use: c_int,
    pub write_use: c_int,
    pub port_specified: bool,
    pub timestamping: bool,
    pub timestamp_real: bool,
    pub timestamp_queue: c_int,

    /// Filled in by `list_ports`, empty otherwise.
    pub client_name: String
}

impl PortInfo {
    pub fn address(&self) -> Address {
        Address::new(self.client_id as u8, self.port_id as u8)
    }

    pub fn can_read(&self) -> bool {
        self.capability.contains(PortCapabilities::READ)
    }

    pub fn can_write(&self) -> bool {
        self.capability.contains(PortCapabilities::WRITE)
    }
}

/// Anything that names one of our own ports.
pub trait AsPortId {
    fn port_id(&self) -> c_int;
}

impl AsPortId for c_int {
    fn port_id(&self) -> c_int {
        *self
    }
}

impl AsPortId for u8 {
    fn port_id(&self) -> c_int {
        *self as c_int
    }
}

impl<'handle> AsPortId for SequencerPort<'handle> {
    fn port_id(&self) -> c_int {
        self.port_id
    }
}

impl<'a, T: AsPortId + ?Sized> AsPortId for &'a T {
    fn port_id(&self) -> c_int {
        (**self).port_id()
    }
}

impl<'handle> SequencerPort<'handle> {
    pub fn client_id(&self) -> c_int {
        self.client_id
    }

    pub fn port_id(&self) -> c_int {
        self.port_id
    }

    pub fn address(&self) -> Address {
        Address::new(self.client_id as u8, self.port_id as u8)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.get() {
            Err(Error::closed())
        } else {
            Ok(())
        }
    }

    pub fn info(&self) -> Result<PortInfo> {
        self.check_open()?;
        self.handle.get_port_info(self.address())
    }

    pub fn set_info(&self, info: &PortInfo) -> Result<()> {
        self.check_open()?;
        self.handle.set_port_info(self, info)
    }

    /// Subscribe `dest` to events leaving this port.
    pub fn connect_to<A: Into<Address>>(&self, dest: A) -> Result<()> {
        self.check_open()?;
        self.handle.subscribe_port(self.address(), dest, &SubscribeOptions::default())
    }

    /// Subscribe this port to events leaving `sender`.
    pub fn connect_from<A: Into<Address>>(&self, sender: A) -> Result<()> {
        self.check_open()?;
        self.handle.subscribe_port(sender, self.address(), &SubscribeOptions::default())
    }

    pub fn disconnect_to<A: Into<Address>>(&self, dest: A) -> Result<()> {
        self.check_open()?;
        self.handle.unsubscribe_port(self.address(), dest, &SubscribeOptions::default())
    }

    pub fn disconnect_from<A: Into<Address>>(&self, sender: A) -> Result<()> {
        self.check_open()?;
        self.handle.unsubscribe_port(sender, self.address(), &SubscribeOptions::default())
    }

    /// Delete the port. Closing twice, or after the handle was closed, does
    /// nothing.
    pub fn close(&self) -> Result<()> {
        if self.closed.replace(true) {
            return Ok(());
        }

        let port_id = self.port_id;
        match self.handle.with_backend(|backend| backend.delete_simple_port(port_id)) {
            Ok(status) => {
                debug!(port = %self.address(), "deleted port");
                check("snd_seq_delete_simple_port", status).map(|_| ())
            }

            Err(Error::State(_)) => Ok(()),
            Err(err) => Err(err)
        }
    }
}

impl<'a, 'handle> From<&'a SequencerPort<'handle>> for Address {
    fn from(port: &'a SequencerPort<'handle>) -> Self {
        port.address()
    }
}

impl<'handle> Drop for SequencerPort<'handle> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(port = %self.address(), %err, "couldn't delete port on drop");
        }
    }
}
