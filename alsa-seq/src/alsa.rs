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

//! `Backend` over libasound.

use std::ffi::CStr;
use std::ptr::{
    self,
    null_mut
};

use libc::{
    c_char,
    c_int,
    c_short,
    c_uint,
    pollfd,
    POLLIN,
    POLLOUT
};

use alsa_sys::*;

use crate::{
    ClientInfo,
    ClientType,
    Error,
    PortCapabilities,
    PortInfo,
    PortType,
    Status,
    Subscription
};

use crate::backend::Backend;
use crate::event::{
    self,
    Event
};

/// A libasound allocation, freed on drop.
struct Owned<T> {
    ptr: *mut T,
    free: unsafe extern "C" fn(*mut T)
}

impl<T> Owned<T> {
    fn alloc(malloc: unsafe extern "C" fn(*mut *mut T) -> c_int,
             free: unsafe extern "C" fn(*mut T)) -> Result<Self, Status> {
        let mut ptr = null_mut();
        let status = unsafe { malloc(&mut ptr) };

        if status < 0 {
            Err(status)
        } else {
            Ok(Owned { ptr, free })
        }
    }
}

impl<T> Drop for Owned<T> {
    fn drop(&mut self) {
        unsafe { (self.free)(self.ptr) }
    }
}

fn client_info() -> Result<Owned<snd_seq_client_info_t>, Status> {
    Owned::alloc(snd_seq_client_info_malloc, snd_seq_client_info_free)
}

fn port_info() -> Result<Owned<snd_seq_port_info_t>, Status> {
    Owned::alloc(snd_seq_port_info_malloc, snd_seq_port_info_free)
}

unsafe fn string_from(ptr: *const c_char) -> String {
    if ptr.is_null() {
        String::new()
    } else {
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

unsafe fn read_client_info(info: *const snd_seq_client_info_t) -> ClientInfo {
    ClientInfo {
        client_id: snd_seq_client_info_get_client(info),
        name: string_from(snd_seq_client_info_get_name(info as *mut _)),
        broadcast_filter: snd_seq_client_info_get_broadcast_filter(info) == 1,
        error_bounce: snd_seq_client_info_get_error_bounce(info) == 1,
        client_type: ClientType::from_raw(snd_seq_client_info_get_type(info) as c_int),
        num_ports: snd_seq_client_info_get_num_ports(info),
        event_lost: snd_seq_client_info_get_event_lost(info),
        card_id: ClientInfo::card_from_raw(snd_seq_client_info_get_card(info)),
        pid: ClientInfo::pid_from_raw(snd_seq_client_info_get_pid(info))
    }
}

unsafe fn read_port_info(info: *const snd_seq_port_info_t) -> PortInfo {
    PortInfo {
        client_id: snd_seq_port_info_get_client(info),
        port_id: snd_seq_port_info_get_port(info),
        name: string_from(snd_seq_port_info_get_name(info)),
        capability: PortCapabilities::from_bits_truncate(
            snd_seq_port_info_get_capability(info) as u32),
        port_type: PortType::from_bits_truncate(snd_seq_port_info_get_type(info) as u32),
        midi_channels: snd_seq_port_info_get_midi_channels(info),
        midi_voices: snd_seq_port_info_get_midi_voices(info),
        synth_voices: snd_seq_port_info_get_synth_voices(info),
        read_use: snd_seq_port_info_get_read_use(info),
        write_use: snd_seq_port_info_get_write_use(info),
        port_specified: snd_seq_port_info_get_port_specified(info) == 1,
        timestamping: snd_seq_port_info_get_timestamping(info) == 1,
        timestamp_real: snd_seq_port_info_get_timestamp_real(info) == 1,
        timestamp_queue: snd_seq_port_info_get_timestamp_queue(info),
        client_name: String::new()
    }
}

unsafe fn write_port_info(info: *mut snd_seq_port_info_t, from: &PortInfo) -> Result<(), Error> {
    let name = ::std::ffi::CString::new(from.name.as_str())?;

    snd_seq_port_info_set_name(info, name.as_ptr());
    snd_seq_port_info_set_capability(info, from.capability.bits() as c_uint);
    snd_seq_port_info_set_type(info, from.port_type.bits() as c_uint);
    snd_seq_port_info_set_midi_channels(info, from.midi_channels);
    snd_seq_port_info_set_midi_voices(info, from.midi_voices);
    snd_seq_port_info_set_synth_voices(info, from.synth_voices);
    snd_seq_port_info_set_port_specified(info, from.port_specified as c_int);
    snd_seq_port_info_set_timestamping(info, from.timestamping as c_int);
    snd_seq_port_info_set_timestamp_real(info, from.timestamp_real as c_int);
    snd_seq_port_info_set_timestamp_queue(info, from.timestamp_queue);
    Ok(())
}

pub struct AlsaBackend {
    raw_handle: *mut snd_seq_t
}

impl AlsaBackend {
    /// `streams` and `mode` are the `SND_SEQ_OPEN_*` and `SND_SEQ_NONBLOCK`
    /// values.
    pub fn open(sequencer_name: &CStr, streams: c_int, mode: c_int) -> Result<Self, Error> {
        let mut raw_handle = null_mut();
        let status = unsafe { snd_seq_open(&mut raw_handle, sequencer_name.as_ptr(), streams, mode) };

        if status < 0 {
            return Err(Error::Service { call: "snd_seq_open", status });
        }

        Ok(AlsaBackend { raw_handle })
    }

    fn subunsub(&mut self, sub: &Subscription,
                apply: unsafe extern "C" fn(*mut snd_seq_t, *mut snd_seq_port_subscribe_t) -> c_int)
        -> Status {
        let desc = match Owned::alloc(snd_seq_port_subscribe_malloc, snd_seq_port_subscribe_free) {
            Ok(desc) => desc,
            Err(status) => return status
        };

        let sender = sub.sender.to_raw();
        let dest = sub.dest.to_raw();

        unsafe {
            snd_seq_port_subscribe_set_sender(desc.ptr, &sender);
            snd_seq_port_subscribe_set_dest(desc.ptr, &dest);

            if let Some(queue) = sub.queue {
                snd_seq_port_subscribe_set_queue(desc.ptr, queue as c_int);
            }

            snd_seq_port_subscribe_set_exclusive(desc.ptr, sub.exclusive as c_int);
            snd_seq_port_subscribe_set_time_update(desc.ptr, sub.time_update as c_int);
            snd_seq_port_subscribe_set_time_real(desc.ptr, sub.time_real as c_int);

            apply(self.raw_handle, desc.ptr)
        }
    }
}

impl Backend for AlsaBackend {
    fn client_id(&self) -> Status {
        unsafe { snd_seq_client_id(self.raw_handle) }
    }

    fn set_client_name(&mut self, name: &CStr) -> Status {
        unsafe { snd_seq_set_client_name(self.raw_handle, name.as_ptr()) }
    }

    fn poll_descriptors(&self) -> Result<Vec<pollfd>, Status> {
        let events = (POLLIN | POLLOUT) as c_short;

        unsafe {
            let count = snd_seq_poll_descriptors_count(self.raw_handle, events);
            if count < 0 {
                return Err(count);
            }

            let mut pfds = vec![pollfd { fd: -1, events: 0, revents: 0 }; count as usize];
            let filled = snd_seq_poll_descriptors(self.raw_handle, pfds.as_mut_ptr(),
                                                  count as c_uint, events);
            if filled < 0 {
                return Err(filled);
            }

            pfds.truncate(filled as usize);
            Ok(pfds)
        }
    }

    fn create_simple_port(&mut self, name: &CStr, caps: u32, port_type: u32) -> Status {
        unsafe {
            snd_seq_create_simple_port(self.raw_handle, name.as_ptr(), caps as c_uint,
                                       port_type as c_uint)
        }
    }

    fn delete_simple_port(&mut self, port: c_int) -> Status {
        unsafe { snd_seq_delete_simple_port(self.raw_handle, port) }
    }

    fn alloc_queue(&mut self, name: Option<&CStr>) -> Status {
        unsafe {
            match name {
                Some(name) => snd_seq_alloc_named_queue(self.raw_handle, name.as_ptr()),
                None => snd_seq_alloc_queue(self.raw_handle)
            }
        }
    }

    fn free_queue(&mut self, queue: c_int) -> Status {
        unsafe { snd_seq_free_queue(self.raw_handle, queue) }
    }

    fn set_queue_tempo(&mut self, queue: c_int, tempo: u32, ppq: c_int) -> Status {
        let q_tempo = match Owned::alloc(snd_seq_queue_tempo_malloc, snd_seq_queue_tempo_free) {
            Ok(q_tempo) => q_tempo,
            Err(status) => return status
        };

        unsafe {
            snd_seq_queue_tempo_set_tempo(q_tempo.ptr, tempo as c_uint);
            snd_seq_queue_tempo_set_ppq(q_tempo.ptr, ppq);
            snd_seq_set_queue_tempo(self.raw_handle, queue, q_tempo.ptr)
        }
    }

    fn control_queue(&mut self, queue: c_int, event_type: u8, value: c_int) -> Status {
        unsafe {
            snd_seq_control_queue(self.raw_handle, queue, event_type as c_int, value,
                                  ptr::null_mut())
        }
    }

    fn event_input(&mut self) -> Result<Event, Status> {
        let mut ev = null_mut();
        let status = unsafe { snd_seq_event_input(self.raw_handle, &mut ev) };

        if status < 0 {
            return Err(status);
        }

        if ev.is_null() {
            return Err(-::libc::ENOSPC);
        }

        // libasound keeps the record, and any payload it points at, valid
        // until the next input call on this handle
        Ok(unsafe { event::decode(&*ev) })
    }

    fn event_output(&mut self, ev: &mut snd_seq_event_t) -> Status {
        unsafe { snd_seq_event_output(self.raw_handle, ev) }
    }

    fn event_output_direct(&mut self, ev: &mut snd_seq_event_t) -> Status {
        unsafe { snd_seq_event_output_direct(self.raw_handle, ev) }
    }

    fn drain_output(&mut self) -> Status {
        unsafe { snd_seq_drain_output(self.raw_handle) }
    }

    fn drop_input(&mut self) -> Status {
        unsafe { snd_seq_drop_input(self.raw_handle) }
    }

    fn drop_input_buffer(&mut self) -> Status {
        unsafe { snd_seq_drop_input_buffer(self.raw_handle) }
    }

    fn drop_output(&mut self) -> Status {
        unsafe { snd_seq_drop_output(self.raw_handle) }
    }

    fn query_next_client(&mut self, previous: c_int) -> Result<ClientInfo, Status> {
        let info = client_info()?;

        unsafe {
            snd_seq_client_info_set_client(info.ptr, previous);

            match snd_seq_query_next_client(self.raw_handle, info.ptr) {
                status if status < 0 => Err(status),
                _ => Ok(read_client_info(info.ptr))
            }
        }
    }

    fn query_next_port(&mut self, client: c_int, previous: c_int) -> Result<PortInfo, Status> {
        let info = port_info()?;

        unsafe {
            snd_seq_port_info_set_client(info.ptr, client);
            snd_seq_port_info_set_port(info.ptr, previous);

            match snd_seq_query_next_port(self.raw_handle, info.ptr) {
                status if status < 0 => Err(status),
                _ => Ok(read_port_info(info.ptr))
            }
        }
    }

    fn get_client_info(&mut self, client: c_int) -> Result<ClientInfo, Status> {
        let info = client_info()?;

        unsafe {
            match snd_seq_get_any_client_info(self.raw_handle, client, info.ptr) {
                status if status < 0 => Err(status),
                _ => Ok(read_client_info(info.ptr))
            }
        }
    }

    fn get_port_info(&mut self, client: c_int, port: c_int) -> Result<PortInfo, Status> {
        let info = port_info()?;

        unsafe {
            match snd_seq_get_any_port_info(self.raw_handle, client, port, info.ptr) {
                status if status < 0 => Err(status),
                _ => Ok(read_port_info(info.ptr))
            }
        }
    }

    fn set_port_info(&mut self, port: c_int, from: &PortInfo) -> Status {
        let info = match port_info() {
            Ok(info) => info,
            Err(status) => return status
        };

        unsafe {
            if write_port_info(info.ptr, from).is_err() {
                return -::libc::EINVAL;
            }

            snd_seq_set_port_info(self.raw_handle, port, info.ptr)
        }
    }

    fn subscribe_port(&mut self, sub: &Subscription) -> Status {
        self.subunsub(sub, snd_seq_subscribe_port)
    }

    fn unsubscribe_port(&mut self, sub: &Subscription) -> Status {
        self.subunsub(sub, snd_seq_unsubscribe_port)
    }
}

impl Drop for AlsaBackend {
    fn drop(&mut self) {
        if self.raw_handle.is_null() {
            return;
        }

        unsafe {
            snd_seq_close(self.raw_handle);
        }
    }
}
