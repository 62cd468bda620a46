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

use std::cell::{
    Cell,
    RefCell
};

use std::ffi::CString;
use std::os::unix::io::RawFd;

use libc::{
    c_int,
    c_short,
    POLLIN,
    POLLOUT
};

use crate::{
    AlsaBackend,
    AsPortId,
    AsQueueId,
    Address,
    Backend,
    ClientInfo,
    Error,
    PortCapabilities,
    PortType,
    Queue,
    Result,
    SequencerHandle,
    SequencerPort
};

use crate::error::check;
use crate::event::{
    self,
    Event,
    NativeEvent
};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOpenStreams {
    Output = 1,
    Input = 2,
    Duplex = 3
}

impl HandleOpenStreams {
    /// What the sequencer descriptor has to report for these streams.
    pub fn poll_events(self) -> c_short {
        match self {
            HandleOpenStreams::Output => POLLOUT,
            HandleOpenStreams::Input => POLLIN,
            HandleOpenStreams::Duplex => POLLIN | POLLOUT
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenMode: c_int {
        /// I/O calls report "would block" instead of sleeping inside
        /// libasound.
        const NONBLOCK = 0x0001;
    }
}

/// Everything needed to open a connection.
#[derive(Debug, Clone)]
pub struct SequencerConfig {
    pub client_name: String,
    pub streams: HandleOpenStreams,
    pub mode: OpenMode,
    pub sequencer_name: String
}

impl Default for SequencerConfig {
    fn default() -> Self {
        SequencerConfig {
            client_name: String::from("alsa-seq.rs"),
            streams: HandleOpenStreams::Duplex,
            mode: OpenMode::NONBLOCK,
            sequencer_name: String::from("default")
        }
    }
}

impl SequencerConfig {
    pub fn new(client_name: &str) -> Self {
        SequencerConfig {
            client_name: client_name.to_owned(),
            ..SequencerConfig::default()
        }
    }

    pub fn open(&self) -> Result<SequencerHandle> {
        SequencerHandle::open(&self.client_name, self.streams, self.mode, &self.sequencer_name)
    }
}

/// Where an outgoing event goes. Unset fields fall back to what the event
/// itself carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Route {
    pub queue: Option<u8>,
    pub port: Option<u8>,
    pub dest: Option<Address>
}

impl Route {
    pub fn new() -> Self {
        Route::default()
    }

    pub fn from_port<P: AsPortId>(port: P) -> Self {
        Route::new().port(port)
    }

    pub fn port<P: AsPortId>(mut self, port: P) -> Self {
        self.port = Some(port.port_id() as u8);
        self
    }

    pub fn queue<Q: AsQueueId>(mut self, queue: Q) -> Self {
        self.queue = Some(queue.queue_id() as u8);
        self
    }

    pub fn dest<A: Into<Address>>(mut self, dest: A) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub(crate) fn encode(&self, ev: &Event) -> NativeEvent {
        event::encode(ev, self.queue, self.port, self.dest)
    }
}

impl SequencerHandle {
    pub fn open(client_name: &str, streams: HandleOpenStreams, mode: OpenMode,
                sequencer_name: &str) -> Result<Self> {
        let sequencer_name = CString::new(sequencer_name)?;
        let backend = AlsaBackend::open(&sequencer_name, streams as c_int, mode.bits())?;

        SequencerHandle::from_backend(Box::new(backend), client_name, streams)
    }

    /// Take over an already opened backend. Its one poll descriptor must
    /// carry the interest `streams` needs: both directions for a duplex
    /// handle.
    pub fn from_backend(mut backend: Box<dyn Backend>, client_name: &str,
                        streams: HandleOpenStreams) -> Result<Self> {
        let name = CString::new(client_name)?;
        check("snd_seq_set_client_name", backend.set_client_name(&name))?;

        let client_id = check("snd_seq_client_id", backend.client_id())?;

        let pfds = backend.poll_descriptors()
            .map_err(|status| Error::Service { call: "snd_seq_poll_descriptors", status })?;

        // everything downstream waits on a single descriptor
        if pfds.len() != 1 {
            return Err(Error::PollDescriptors(pfds.len()));
        }

        let pfd = pfds[0];
        let wanted = streams.poll_events();
        if pfd.events & wanted != wanted {
            return Err(Error::PollEvents { wanted, got: pfd.events });
        }

        debug!(client_id, fd = pfd.fd, name = client_name, "opened sequencer");

        Ok(SequencerHandle {
            backend: RefCell::new(Some(backend)),
            client_id,
            fd: pfd.fd
        })
    }

    pub fn client_id(&self) -> c_int {
        self.client_id
    }

    /// The one descriptor to wait on, for input and output alike.
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    pub fn is_closed(&self) -> bool {
        self.backend.borrow().is_none()
    }

    /// Close the connection. Further calls do nothing; every other operation
    /// fails with `Error::State` from now on.
    pub fn close(&self) {
        if let Some(backend) = self.backend.borrow_mut().take() {
            drop(backend);
            debug!(client_id = self.client_id, "closed sequencer");
        }
    }

    pub(crate) fn with_backend<F, T>(&self, f: F) -> Result<T>
        where F: FnOnce(&mut dyn Backend) -> T {
        let mut backend = self.backend.borrow_mut();
        match backend.as_mut() {
            Some(backend) => Ok(f(&mut **backend)),
            None => Err(Error::closed())
        }
    }

    pub fn set_client_name(&self, name: &str) -> Result<()> {
        let name = CString::new(name)?;
        let status = self.with_backend(|backend| backend.set_client_name(&name))?;
        check("snd_seq_set_client_name", status).map(|_| ())
    }

    pub fn client_info(&self) -> Result<ClientInfo> {
        self.get_client_info(self.client_id)
    }

    pub fn create_port(&self, name: &str, capabilities: PortCapabilities, port_type: PortType)
        -> Result<SequencerPort> {
        let name = CString::new(name)?;
        let status = self.with_backend(|backend| {
            backend.create_simple_port(&name, capabilities.bits(), port_type.bits())
        })?;
        let port_id = check("snd_seq_create_simple_port", status)?;

        debug!(client_id = self.client_id, port_id, ?capabilities, "created port");

        Ok(SequencerPort {
            port_id,
            client_id: self.client_id,
            handle: self,
            closed: Cell::new(false)
        })
    }

    /// Allocate a queue, named if `name` is given.
    pub fn create_queue(&self, name: Option<&str>) -> Result<Queue> {
        let name = name.map(CString::new).transpose()?;
        let status = self.with_backend(|backend| backend.alloc_queue(name.as_deref()))?;
        let queue_id = check("snd_seq_alloc_queue", status)?;

        debug!(client_id = self.client_id, queue_id, "allocated queue");

        Ok(Queue {
            queue_id,
            handle: self,
            closed: Cell::new(false)
        })
    }

    pub fn drop_input(&self) -> Result<()> {
        let status = self.with_backend(|backend| backend.drop_input())?;
        check("snd_seq_drop_input", status).map(|_| ())
    }

    pub fn drop_input_buffer(&self) -> Result<()> {
        let status = self.with_backend(|backend| backend.drop_input_buffer())?;
        check("snd_seq_drop_input_buffer", status).map(|_| ())
    }

    pub fn drop_output(&self) -> Result<()> {
        let status = self.with_backend(|backend| backend.drop_output())?;
        check("snd_seq_drop_output", status).map(|_| ())
    }

    //
    // single attempts; "would block" comes back as a service error
    //

    pub fn try_event_input(&self) -> Result<Event> {
        self.with_backend(|backend| backend.event_input())?
            .map_err(|status| Error::Service { call: "snd_seq_event_input", status })
    }

    /// Queue the event in the output buffer. Returns the bytes still
    /// buffered.
    pub fn try_event_output(&self, ev: &Event, route: &Route) -> Result<c_int> {
        self.output_native(&mut route.encode(ev), false)
    }

    /// Send the event without going through the output buffer.
    pub fn try_event_output_direct(&self, ev: &Event, route: &Route) -> Result<c_int> {
        self.output_native(&mut route.encode(ev), true)
    }

    pub fn try_drain_output(&self) -> Result<c_int> {
        let status = self.with_backend(|backend| backend.drain_output())?;
        check("snd_seq_drain_output", status)
    }

    pub(crate) fn output_native(&self, ev: &mut NativeEvent, direct: bool) -> Result<c_int> {
        let status = self.with_backend(|backend| {
            if direct {
                backend.event_output_direct(ev.as_raw_mut())
            } else {
                backend.event_output(ev.as_raw_mut())
            }
        })?;

        check(if direct { "snd_seq_event_output_direct" } else { "snd_seq_event_output" },
              status)
    }
}

impl Drop for SequencerHandle {
    fn drop(&mut self) {
        self.close();
    }
}
