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

//! A scripted `Backend` for tests that don't need a kernel sequencer.
//!
//! Readiness comes from one end of a socket pair: write to `peer` to make
//! the handle's descriptor readable.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::CStr;
use std::io::{
    ErrorKind,
    Write
};
use std::os::unix::io::{
    AsRawFd,
    RawFd
};
use std::os::unix::net::UnixStream;
use std::rc::Rc;

use libc::{
    c_int,
    c_short,
    pollfd,
    EAGAIN,
    EBUSY,
    EINVAL,
    ENOENT,
    POLLIN,
    POLLOUT
};

use alsa_sys::snd_seq_event_t;

use crate::{
    Address,
    ClientInfo,
    ClientType,
    Event,
    HandleOpenStreams,
    PortCapabilities,
    PortInfo,
    PortType,
    SequencerHandle,
    Subscription
};

use crate::backend::{
    Backend,
    Status
};

use crate::event;

pub const CLIENT_ID: c_int = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueState {
    pub queue_id: c_int,
    pub tempo: u32,
    pub ppq: c_int,
    pub controls: usize
}

pub struct MockState {
    pub client_id: c_int,
    pub clients: Vec<ClientInfo>,
    pub ports: Vec<PortInfo>,
    pub queues: Vec<QueueState>,
    pub subscriptions: Vec<Subscription>,

    /// Delivered by `event_input`, oldest first.
    pub input: VecDeque<Event>,
    /// Everything accepted by either output call.
    pub output: Vec<Event>,

    /// How many I/O calls report "would block" before the next success.
    pub would_block: usize,
    pub io_calls: usize,
    pub descriptors: usize,
    /// Interest the descriptor reports.
    pub events: c_short,
    pub dropped_input: usize,
    pub closed: bool,

    pub peer: UnixStream,
    next_port: c_int,
    next_queue: c_int
}

impl MockState {
    pub fn add_client(&mut self, client_id: c_int, name: &str, client_type: ClientType) {
        self.clients.push(ClientInfo {
            client_id,
            name: name.into(),
            client_type: Some(client_type),
            ..ClientInfo::default()
        });
        self.clients.sort_by_key(|c| c.client_id);
    }

    pub fn add_port(&mut self, client_id: c_int, port_id: c_int, name: &str,
                    capability: PortCapabilities, port_type: PortType) {
        self.ports.push(PortInfo {
            client_id,
            port_id,
            name: name.into(),
            capability,
            port_type,
            midi_channels: 16,
            ..PortInfo::default()
        });
        self.ports.sort_by_key(|p| (p.client_id, p.port_id));
    }

    /// Make the handle's descriptor readable.
    pub fn wake(&mut self) {
        let _ = self.peer.write(&[0]);
    }

    fn io(&mut self) -> Option<Status> {
        self.io_calls += 1;

        if self.would_block > 0 {
            self.would_block -= 1;
            Some(-EAGAIN)
        } else {
            None
        }
    }

    fn port_mut(&mut self, client_id: c_int, port_id: c_int) -> Option<&mut PortInfo> {
        self.ports.iter_mut().find(|p| p.client_id == client_id && p.port_id == port_id)
    }
}

pub struct MockBackend {
    state: Rc<RefCell<MockState>>,
    ours: UnixStream
}

impl MockBackend {
    pub fn new() -> (Self, Rc<RefCell<MockState>>) {
        let (ours, peer) = UnixStream::pair().unwrap();
        ours.set_nonblocking(true).unwrap();
        peer.set_nonblocking(true).unwrap();

        let mut state = MockState {
            client_id: CLIENT_ID,
            clients: Vec::new(),
            ports: Vec::new(),
            queues: Vec::new(),
            subscriptions: Vec::new(),
            input: VecDeque::new(),
            output: Vec::new(),
            would_block: 0,
            io_calls: 0,
            descriptors: 1,
            events: POLLIN | POLLOUT,
            dropped_input: 0,
            closed: false,
            peer,
            next_port: 0,
            next_queue: 0
        };

        state.add_client(0, "System", ClientType::Kernel);
        state.add_port(0, 0, "Timer", PortCapabilities::READ | PortCapabilities::WRITE,
                       PortType::empty());
        state.add_port(0, 1, "Announce", crate::READ_PORT, PortType::empty());
        state.add_client(CLIENT_ID, "", ClientType::User);

        let state = Rc::new(RefCell::new(state));
        (MockBackend { state: state.clone(), ours }, state)
    }

    pub fn fd(&self) -> RawFd {
        self.ours.as_raw_fd()
    }

    /// Stuff our send buffer until the descriptor stops being writable.
    pub fn fill_send_buffer(&self) {
        let chunk = [0u8; 4096];
        let mut ours = &self.ours;

        loop {
            match ours.write(&chunk) {
                Ok(_) => continue,
                Err(ref err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) => panic!("filling send buffer: {}", err)
            }
        }
    }
}

/// A duplex handle over `backend`, named "mock".
pub fn adopt(backend: MockBackend) -> SequencerHandle {
    SequencerHandle::from_backend(Box::new(backend), "mock", HandleOpenStreams::Duplex).unwrap()
}

/// A handle over a fresh mock.
pub fn open() -> (SequencerHandle, Rc<RefCell<MockState>>) {
    let (backend, state) = MockBackend::new();
    (adopt(backend), state)
}

impl Backend for MockBackend {
    fn client_id(&self) -> Status {
        self.state.borrow().client_id
    }

    fn set_client_name(&mut self, name: &CStr) -> Status {
        let mut state = self.state.borrow_mut();
        let id = state.client_id;

        match state.clients.iter_mut().find(|c| c.client_id == id) {
            Some(client) => {
                client.name = name.to_string_lossy().into_owned();
                0
            }
            None => -ENOENT
        }
    }

    fn poll_descriptors(&self) -> Result<Vec<pollfd>, Status> {
        let state = self.state.borrow();
        let pfd = pollfd {
            fd: self.fd(),
            events: state.events,
            revents: 0
        };

        Ok(vec![pfd; state.descriptors])
    }

    fn create_simple_port(&mut self, name: &CStr, caps: u32, port_type: u32) -> Status {
        let mut state = self.state.borrow_mut();
        let (client_id, port_id) = (state.client_id, state.next_port);
        state.next_port += 1;

        state.add_port(client_id, port_id, &name.to_string_lossy(),
                       PortCapabilities::from_bits_truncate(caps),
                       PortType::from_bits_truncate(port_type));
        port_id
    }

    fn delete_simple_port(&mut self, port: c_int) -> Status {
        let mut state = self.state.borrow_mut();
        let client_id = state.client_id;
        let before = state.ports.len();

        state.ports.retain(|p| !(p.client_id == client_id && p.port_id == port));
        if state.ports.len() == before { -ENOENT } else { 0 }
    }

    fn alloc_queue(&mut self, _name: Option<&CStr>) -> Status {
        let mut state = self.state.borrow_mut();
        let queue_id = state.next_queue;
        state.next_queue += 1;

        state.queues.push(QueueState { queue_id, tempo: 0, ppq: 0, controls: 0 });
        queue_id
    }

    fn free_queue(&mut self, queue: c_int) -> Status {
        let mut state = self.state.borrow_mut();
        let before = state.queues.len();

        state.queues.retain(|q| q.queue_id != queue);
        if state.queues.len() == before { -EINVAL } else { 0 }
    }

    fn set_queue_tempo(&mut self, queue: c_int, tempo: u32, ppq: c_int) -> Status {
        match self.state.borrow_mut().queues.iter_mut().find(|q| q.queue_id == queue) {
            Some(q) => {
                q.tempo = tempo;
                q.ppq = ppq;
                0
            }
            None => -EINVAL
        }
    }

    fn control_queue(&mut self, queue: c_int, _event_type: u8, _value: c_int) -> Status {
        match self.state.borrow_mut().queues.iter_mut().find(|q| q.queue_id == queue) {
            Some(q) => {
                q.controls += 1;
                0
            }
            None => -EINVAL
        }
    }

    fn event_input(&mut self) -> Result<Event, Status> {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.io() {
            return Err(status);
        }

        state.input.pop_front().ok_or(-EAGAIN)
    }

    fn event_output(&mut self, ev: &mut snd_seq_event_t) -> Status {
        let mut state = self.state.borrow_mut();
        if let Some(status) = state.io() {
            return status;
        }

        // only ever handed records built by `encode`, still owned by the caller
        state.output.push(unsafe { event::decode(ev) });
        0
    }

    fn event_output_direct(&mut self, ev: &mut snd_seq_event_t) -> Status {
        self.event_output(ev)
    }

    fn drain_output(&mut self) -> Status {
        self.state.borrow_mut().io().unwrap_or(0)
    }

    fn drop_input(&mut self) -> Status {
        let mut state = self.state.borrow_mut();
        state.dropped_input += state.input.len();
        state.input.clear();
        0
    }

    fn drop_input_buffer(&mut self) -> Status {
        self.drop_input()
    }

    fn drop_output(&mut self) -> Status {
        0
    }

    fn query_next_client(&mut self, previous: c_int) -> Result<ClientInfo, Status> {
        self.state.borrow().clients.iter()
            .find(|c| c.client_id > previous)
            .cloned()
            .ok_or(-ENOENT)
    }

    fn query_next_port(&mut self, client: c_int, previous: c_int) -> Result<PortInfo, Status> {
        self.state.borrow().ports.iter()
            .find(|p| p.client_id == client && p.port_id > previous)
            .cloned()
            .ok_or(-ENOENT)
    }

    fn get_client_info(&mut self, client: c_int) -> Result<ClientInfo, Status> {
        self.state.borrow().clients.iter()
            .find(|c| c.client_id == client)
            .cloned()
            .ok_or(-ENOENT)
    }

    fn get_port_info(&mut self, client: c_int, port: c_int) -> Result<PortInfo, Status> {
        self.state.borrow().ports.iter()
            .find(|p| p.client_id == client && p.port_id == port)
            .cloned()
            .ok_or(-ENOENT)
    }

    fn set_port_info(&mut self, port: c_int, info: &PortInfo) -> Status {
        let mut state = self.state.borrow_mut();
        let client_id = state.client_id;

        match state.port_mut(client_id, port) {
            Some(p) => {
                *p = PortInfo {
                    client_id,
                    port_id: port,
                    client_name: String::new(),
                    ..info.clone()
                };
                0
            }
            None => -ENOENT
        }
    }

    fn subscribe_port(&mut self, sub: &Subscription) -> Status {
        let mut state = self.state.borrow_mut();
        let same_ends = |s: &Subscription| s.sender == sub.sender && s.dest == sub.dest;

        if state.subscriptions.iter().any(same_ends) {
            return -EBUSY;
        }

        state.subscriptions.push(*sub);
        0
    }

    fn unsubscribe_port(&mut self, sub: &Subscription) -> Status {
        let mut state = self.state.borrow_mut();
        let before = state.subscriptions.len();

        state.subscriptions.retain(|s| !(s.sender == sub.sender && s.dest == sub.dest));
        if state.subscriptions.len() == before { -ENOENT } else { 0 }
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.state.borrow_mut().closed = true;
    }
}

pub fn addr(client_id: c_int, port_id: c_int) -> Address {
    Address::new(client_id as u8, port_id as u8)
}
