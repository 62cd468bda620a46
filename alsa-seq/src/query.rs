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

//! Client and port enumeration.
//!
//! The sequencer hands out metadata one record at a time: each query names
//! the previous record (-1 for "from the start") and gets the next one, or
//! `-ENOENT` once there are no more.

use std::cmp::Ordering;

use libc::c_int;

use serde::Serialize;

use crate::{
    Address,
    AsPortId,
    Error,
    PortCapabilities,
    PortInfo,
    PortType,
    Result,
    SequencerHandle,
    SequencerPort
};

use crate::backend::Status;
use crate::error::{
    check,
    check_exhausted
};

const MIDI_THROUGH: &str = "Midi Through";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClientType {
    User,
    Kernel
}

impl ClientType {
    pub(crate) fn from_raw(raw: c_int) -> Option<Self> {
        match raw {
            1 => Some(ClientType::User),
            2 => Some(ClientType::Kernel),
            _ => None
        }
    }
}

/// Snapshot of a client's metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientInfo {
    pub client_id: c_int,
    pub name: String,
    pub broadcast_filter: bool,
    pub error_bounce: bool,
    pub client_type: Option<ClientType>,
    pub num_ports: c_int,
    pub event_lost: c_int,

    /// Sound card of a kernel client, if it has one.
    pub card_id: Option<c_int>,
    /// Process of a user client, when the kernel knows it.
    pub pid: Option<c_int>
}

impl ClientInfo {
    pub(crate) fn card_from_raw(raw: c_int) -> Option<c_int> {
        Some(raw).filter(|card| *card >= 0)
    }

    pub(crate) fn pid_from_raw(raw: c_int) -> Option<c_int> {
        Some(raw).filter(|pid| *pid > 0)
    }
}

/// Where a "query next" call continues from. A port snapshot remembers
/// which client it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Previous {
    Start,
    Id(c_int),
    Port {
        client_id: c_int,
        port_id: c_int
    }
}

impl From<c_int> for Previous {
    fn from(id: c_int) -> Self {
        Previous::Id(id)
    }
}

impl<'a> From<&'a ClientInfo> for Previous {
    fn from(info: &'a ClientInfo) -> Self {
        Previous::Id(info.client_id)
    }
}

impl<'a> From<&'a PortInfo> for Previous {
    fn from(info: &'a PortInfo) -> Self {
        Previous::Port {
            client_id: info.client_id,
            port_id: info.port_id
        }
    }
}

impl<T: Into<Previous>> From<Option<T>> for Previous {
    fn from(previous: Option<T>) -> Self {
        previous.map_or(Previous::Start, Into::into)
    }
}

/// A port to look up: one of ours by number, or anybody's by address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRef {
    Own(c_int),
    Any(Address)
}

impl From<c_int> for PortRef {
    fn from(port: c_int) -> Self {
        PortRef::Own(port)
    }
}

impl From<Address> for PortRef {
    fn from(addr: Address) -> Self {
        PortRef::Any(addr)
    }
}

impl<'a, 'handle> From<&'a SequencerPort<'handle>> for PortRef {
    fn from(port: &'a SequencerPort<'handle>) -> Self {
        PortRef::Any(port.address())
    }
}

pub const READ_PORT_PREFERRED_TYPES: &[PortType] = &[
    PortType::MIDI_GENERIC.union(PortType::HARDWARE),
    PortType::MIDI_GENERIC.union(PortType::APPLICATION),
    PortType::MIDI_GENERIC.union(PortType::SOFTWARE),
    PortType::MIDI_GENERIC
];

pub const WRITE_PORT_PREFERRED_TYPES: &[PortType] = &[
    PortType::MIDI_GENERIC.union(PortType::SYNTHESIZER).union(PortType::HARDWARE),
    PortType::MIDI_GENERIC.union(PortType::SYNTHESIZER),
    PortType::MIDI_GENERIC.union(PortType::HARDWARE),
    PortType::MIDI_GENERIC.union(PortType::SOFTWARE),
    PortType::MIDI_GENERIC
];

pub const RW_PORT_PREFERRED_TYPES: &[PortType] = &[
    PortType::MIDI_GENERIC.union(PortType::HARDWARE),
    PortType::MIDI_GENERIC.union(PortType::SYNTHESIZER),
    PortType::MIDI_GENERIC.union(PortType::APPLICATION),
    PortType::MIDI_GENERIC.union(PortType::SOFTWARE),
    PortType::MIDI_GENERIC
];

/// Which ports `list_ports` returns, and whether it sorts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortFilter {
    /// Ports we can read events from.
    pub input: bool,
    /// Ports we can write events to.
    pub output: bool,
    /// Every bit here must be set in the port's type.
    pub port_type: PortType,
    pub include_system: bool,
    pub include_midi_through: bool,
    pub include_no_export: bool,
    pub only_connectable: bool,
    pub sort: bool
}

impl Default for PortFilter {
    fn default() -> Self {
        PortFilter {
            input: false,
            output: false,
            port_type: PortType::MIDI_GENERIC,
            include_system: false,
            include_midi_through: true,
            include_no_export: true,
            only_connectable: true,
            sort: true
        }
    }
}

impl PortFilter {
    pub fn input() -> Self {
        PortFilter { input: true, ..PortFilter::default() }
    }

    pub fn output() -> Self {
        PortFilter { output: true, ..PortFilter::default() }
    }

    /// Port-level checks; client-level ones happen while iterating.
    pub fn accepts(&self, port: &PortInfo) -> bool {
        if !port.port_type.contains(self.port_type) {
            return false;
        }

        let caps = port.capability;
        if caps.contains(PortCapabilities::NO_EXPORT) && !self.include_no_export {
            return false;
        }

        let can_read = caps.contains(PortCapabilities::READ);
        let can_sub_read = caps.contains(PortCapabilities::SUBS_READ);
        let can_write = caps.contains(PortCapabilities::WRITE);
        let can_sub_write = caps.contains(PortCapabilities::SUBS_WRITE);

        match (self.input, self.output) {
            (true, false) => can_read && (can_sub_read || !self.only_connectable),
            (false, true) => can_write && (can_sub_write || !self.only_connectable),

            _ if self.only_connectable =>
                (can_read && can_sub_read) || (can_write && can_sub_write),
            _ => can_read || can_write
        }
    }

    /// First match wins: output-only, then input-only, then both.
    pub fn preferred_types(&self) -> &'static [PortType] {
        if self.output && !self.input {
            WRITE_PORT_PREFERRED_TYPES
        } else if self.input && !self.output {
            READ_PORT_PREFERRED_TYPES
        } else {
            RW_PORT_PREFERRED_TYPES
        }
    }
}

fn type_rank(preferred: &[PortType], port: &PortInfo) -> usize {
    preferred.iter()
        .position(|t| port.port_type.contains(*t))
        .unwrap_or(preferred.len())
}

/// Default ordering: preferred types first, "Midi Through" after real
/// devices, then by address.
pub fn default_port_order(preferred: &[PortType], a: &PortInfo, b: &PortInfo) -> Ordering {
    let key = |p: &PortInfo| {
        (type_rank(preferred, p), p.client_name == MIDI_THROUGH, p.client_id, p.port_id)
    };

    key(a).cmp(&key(b))
}

fn exhausted<T>(call: &'static str, status: Status) -> Result<Option<T>> {
    check_exhausted(call, status).map(|_| None)
}

impl SequencerHandle {
    pub fn query_next_client<P: Into<Previous>>(&self, previous: P)
        -> Result<Option<ClientInfo>> {
        let previous = match previous.into() {
            Previous::Start => -1,
            Previous::Id(id) => id,
            Previous::Port { .. } =>
                return Err(Error::Usage("a port can't continue a client query".into()))
        };

        match self.with_backend(|backend| backend.query_next_client(previous))? {
            Ok(info) => Ok(Some(info)),
            Err(status) => exhausted("snd_seq_query_next_client", status)
        }
    }

    /// `previous` may be a port number of `client_id` or a snapshot of one of
    /// its ports; a snapshot from another client is a usage error.
    pub fn query_next_port<P: Into<Previous>>(&self, client_id: c_int, previous: P)
        -> Result<Option<PortInfo>> {
        let previous = match previous.into() {
            Previous::Start => -1,
            Previous::Id(id) => id,
            Previous::Port { client_id: owner, port_id } => {
                if owner != client_id {
                    return Err(Error::Usage(format!(
                        "previous port belongs to client {}, not {}", owner, client_id)));
                }

                port_id
            }
        };

        match self.with_backend(|backend| backend.query_next_port(client_id, previous))? {
            Ok(info) => Ok(Some(info)),
            Err(status) => exhausted("snd_seq_query_next_port", status)
        }
    }

    pub fn get_client_info(&self, client_id: c_int) -> Result<ClientInfo> {
        self.with_backend(|backend| backend.get_client_info(client_id))?
            .map_err(|status| Error::Service { call: "snd_seq_get_any_client_info", status })
    }

    pub fn get_port_info<P: Into<PortRef>>(&self, port: P) -> Result<PortInfo> {
        let (client_id, port_id) = match port.into() {
            PortRef::Own(port_id) => (self.client_id(), port_id),
            PortRef::Any(addr) => (addr.client_id as c_int, addr.port_id as c_int)
        };

        self.with_backend(|backend| backend.get_port_info(client_id, port_id))?
            .map_err(|status| Error::Service { call: "snd_seq_get_any_port_info", status })
    }

    pub fn set_port_info<P: AsPortId>(&self, port: P, info: &PortInfo) -> Result<()> {
        let port_id = port.port_id();
        let status = self.with_backend(|backend| backend.set_port_info(port_id, info))?;
        check("snd_seq_set_port_info", status).map(|_| ())
    }

    pub fn clients(&self) -> ClientIter {
        ClientIter {
            handle: self,
            previous: Previous::Start,
            done: false
        }
    }

    pub fn ports(&self, client_id: c_int) -> PortIter {
        PortIter {
            handle: self,
            client_id,
            previous: Previous::Start,
            done: false
        }
    }

    /// Walk every port of every client and keep the ones `filter` accepts.
    pub fn list_ports(&self, filter: &PortFilter) -> Result<Vec<PortInfo>> {
        let mut ports = self.collect_ports(filter)?;

        if filter.sort {
            let preferred = filter.preferred_types();
            ports.sort_by(|a, b| default_port_order(preferred, a, b));
        }

        Ok(ports)
    }

    /// Like `list_ports`, ordered by `compare` instead.
    pub fn list_ports_by<F>(&self, filter: &PortFilter, compare: F) -> Result<Vec<PortInfo>>
        where F: FnMut(&PortInfo, &PortInfo) -> Ordering {
        let mut ports = self.collect_ports(filter)?;
        ports.sort_by(compare);
        Ok(ports)
    }

    fn collect_ports(&self, filter: &PortFilter) -> Result<Vec<PortInfo>> {
        let mut result = Vec::new();

        for client in self.clients() {
            let client = client?;

            if client.client_id == 0 && !filter.include_system {
                continue;
            }

            if client.name == MIDI_THROUGH && !filter.include_midi_through {
                continue;
            }

            for port in self.ports(client.client_id) {
                let mut port = port?;

                if !filter.accepts(&port) {
                    continue;
                }

                port.client_name = client.name.clone();
                result.push(port);
            }
        }

        trace!(count = result.len(), "listed ports");
        Ok(result)
    }
}

/// Every client known to the sequencer, kernel clients included.
pub struct ClientIter<'handle> {
    handle: &'handle SequencerHandle,
    previous: Previous,
    done: bool
}

impl<'handle> Iterator for ClientIter<'handle> {
    type Item = Result<ClientInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.handle.query_next_client(self.previous) {
            Ok(Some(info)) => {
                self.previous = Previous::from(&info);
                Some(Ok(info))
            }

            Ok(None) => {
                self.done = true;
                None
            }

            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// The ports of one client.
pub struct PortIter<'handle> {
    handle: &'handle SequencerHandle,
    client_id: c_int,
    previous: Previous,
    done: bool
}

impl<'handle> Iterator for PortIter<'handle> {
    type Item = Result<PortInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.handle.query_next_port(self.client_id, self.previous) {
            Ok(Some(info)) => {
                self.previous = Previous::from(&info);
                Some(Ok(info))
            }

            Ok(None) => {
                self.done = true;
                None
            }

            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
