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

//! The boundary to the kernel sequencer.
//!
//! Every method maps onto one libasound call and hands back its raw status:
//! non-negative on success, `-errno` on failure. Turning statuses into
//! `Error`s is the handle's job, so a backend never interprets them.

use std::ffi::CStr;

use libc::{
    c_int,
    pollfd
};

use alsa_sys::snd_seq_event_t;

use crate::{
    ClientInfo,
    Event,
    PortInfo,
    Subscription
};

pub type Status = c_int;

pub trait Backend {
    fn client_id(&self) -> Status;
    fn set_client_name(&mut self, name: &CStr) -> Status;

    /// Descriptors covering both input and output interest.
    fn poll_descriptors(&self) -> Result<Vec<pollfd>, Status>;

    fn create_simple_port(&mut self, name: &CStr, caps: u32, port_type: u32) -> Status;
    fn delete_simple_port(&mut self, port: c_int) -> Status;

    fn alloc_queue(&mut self, name: Option<&CStr>) -> Status;
    fn free_queue(&mut self, queue: c_int) -> Status;
    fn set_queue_tempo(&mut self, queue: c_int, tempo: u32, ppq: c_int) -> Status;
    fn control_queue(&mut self, queue: c_int, event_type: u8, value: c_int) -> Status;

    /// Take the next event out of the input buffer, decoded.
    fn event_input(&mut self) -> Result<Event, Status>;
    fn event_output(&mut self, ev: &mut snd_seq_event_t) -> Status;
    fn event_output_direct(&mut self, ev: &mut snd_seq_event_t) -> Status;
    fn drain_output(&mut self) -> Status;
    fn drop_input(&mut self) -> Status;
    fn drop_input_buffer(&mut self) -> Status;
    fn drop_output(&mut self) -> Status;

    /// `previous` of -1 starts from the first client.
    fn query_next_client(&mut self, previous: c_int) -> Result<ClientInfo, Status>;
    /// `previous` of -1 starts from the first port of `client`.
    fn query_next_port(&mut self, client: c_int, previous: c_int) -> Result<PortInfo, Status>;

    fn get_client_info(&mut self, client: c_int) -> Result<ClientInfo, Status>;
    fn get_port_info(&mut self, client: c_int, port: c_int) -> Result<PortInfo, Status>;
    fn set_port_info(&mut self, port: c_int, info: &PortInfo) -> Status;

    fn subscribe_port(&mut self, sub: &Subscription) -> Status;
    fn unsubscribe_port(&mut self, sub: &Subscription) -> Status;
}
