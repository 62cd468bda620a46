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

//! Event I/O for a single-threaded tokio runtime.
//!
//! Same retry protocol as `SequencerClient`, but "would block" suspends the
//! task on the reactor instead of blocking the thread. The descriptor is
//! registered once for both directions; a read and a write may be pending at
//! the same time, but not two of either.

use std::cmp::Ordering;
use std::os::unix::io::{
    BorrowedFd,
    OwnedFd
};
use std::time::Duration;

use libc::c_int;

use tokio::io::unix::AsyncFd;
use tokio::io::Interest as TokioInterest;
use tokio::time;

use crate::{
    Address,
    ClientInfo,
    ClientIter,
    Error,
    Event,
    HandleOpenStreams,
    Interest,
    OpenMode,
    PortCapabilities,
    PortFilter,
    PortInfo,
    PortIter,
    PortRef,
    PortType,
    Queue,
    Result,
    Route,
    SequencerHandle,
    SequencerPort,
    SubscribeOptions
};

use crate::wait::deadline;

/// Sequencer connection whose I/O suspends instead of blocking. Must be
/// created and used inside a tokio runtime.
///
/// The reactor watches a duplicate of the sequencer descriptor, so the
/// registration never outlives the descriptor it names. The handle itself is
/// not handed out; only `close` here shuts the connection.
pub struct AsyncSequencerClient {
    fd: Option<AsyncFd<OwnedFd>>,
    handle: SequencerHandle
}

impl AsyncSequencerClient {
    pub fn open(client_name: &str, streams: HandleOpenStreams, mode: OpenMode,
                sequencer_name: &str) -> Result<Self> {
        let handle = SequencerHandle::open(client_name, streams, mode, sequencer_name)?;
        AsyncSequencerClient::new(handle)
    }

    pub fn new(handle: SequencerHandle) -> Result<Self> {
        if handle.is_closed() {
            return Err(Error::closed());
        }

        // the handle is open, so its descriptor is too
        let dup = unsafe { BorrowedFd::borrow_raw(handle.fd()) }.try_clone_to_owned()?;
        let fd = AsyncFd::try_with_interest(dup, TokioInterest::READABLE | TokioInterest::WRITABLE)
            .map_err(|err| err.into_parts().1)?;

        Ok(AsyncSequencerClient {
            fd: Some(fd),
            handle
        })
    }

    /// Drop the reactor registration, then close the connection. Idempotent.
    pub fn close(&mut self) {
        self.fd.take();
        self.handle.close();
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    pub fn client_id(&self) -> c_int {
        self.handle.client_id()
    }

    pub fn set_client_name(&self, name: &str) -> Result<()> {
        self.handle.set_client_name(name)
    }

    pub fn client_info(&self) -> Result<ClientInfo> {
        self.handle.client_info()
    }

    pub fn create_port(&self, name: &str, capabilities: PortCapabilities, port_type: PortType)
        -> Result<SequencerPort> {
        self.handle.create_port(name, capabilities, port_type)
    }

    pub fn create_queue(&self, name: Option<&str>) -> Result<Queue> {
        self.handle.create_queue(name)
    }

    pub fn drop_input(&self) -> Result<()> {
        self.handle.drop_input()
    }

    pub fn drop_input_buffer(&self) -> Result<()> {
        self.handle.drop_input_buffer()
    }

    pub fn drop_output(&self) -> Result<()> {
        self.handle.drop_output()
    }

    pub fn subscribe_port<S, D>(&self, sender: S, dest: D, options: &SubscribeOptions)
        -> Result<()>
        where S: Into<Address>, D: Into<Address> {
        self.handle.subscribe_port(sender, dest, options)
    }

    pub fn unsubscribe_port<S, D>(&self, sender: S, dest: D, options: &SubscribeOptions)
        -> Result<()>
        where S: Into<Address>, D: Into<Address> {
        self.handle.unsubscribe_port(sender, dest, options)
    }

    pub fn get_client_info(&self, client_id: c_int) -> Result<ClientInfo> {
        self.handle.get_client_info(client_id)
    }

    pub fn get_port_info<P: Into<PortRef>>(&self, port: P) -> Result<PortInfo> {
        self.handle.get_port_info(port)
    }

    pub fn clients(&self) -> ClientIter {
        self.handle.clients()
    }

    pub fn ports(&self, client_id: c_int) -> PortIter {
        self.handle.ports(client_id)
    }

    pub fn list_ports(&self, filter: &PortFilter) -> Result<Vec<PortInfo>> {
        self.handle.list_ports(filter)
    }

    pub fn list_ports_by<F>(&self, filter: &PortFilter, compare: F) -> Result<Vec<PortInfo>>
        where F: FnMut(&PortInfo, &PortInfo) -> Ordering {
        self.handle.list_ports_by(filter, compare)
    }

    /// Wait for the next event. `Ok(None)` means the timeout expired.
    pub async fn event_input(&self, timeout: Option<Duration>) -> Result<Option<Event>> {
        self.wait_for(Interest::Read, timeout, || self.handle.try_event_input()).await
    }

    pub async fn event_output(&self, ev: &Event, route: &Route, timeout: Option<Duration>)
        -> Result<Option<c_int>> {
        let mut native = route.encode(ev);
        self.wait_for(Interest::Write, timeout, || self.handle.output_native(&mut native, false))
            .await
    }

    pub async fn event_output_direct(&self, ev: &Event, route: &Route,
                                     timeout: Option<Duration>) -> Result<Option<c_int>> {
        let mut native = route.encode(ev);
        self.wait_for(Interest::Write, timeout, || self.handle.output_native(&mut native, true))
            .await
    }

    pub async fn drain_output(&self, timeout: Option<Duration>) -> Result<Option<c_int>> {
        self.wait_for(Interest::Write, timeout, || self.handle.try_drain_output()).await
    }

    async fn wait_for<T, F>(&self, interest: Interest, timeout: Option<Duration>, mut call: F)
        -> Result<Option<T>>
        where F: FnMut() -> Result<T> {
        let deadline = deadline(timeout);

        match call() {
            Err(ref err) if err.is_would_block() => {}
            res => return res.map(Some)
        }

        let fd = self.fd.as_ref().ok_or_else(Error::closed)?;

        match deadline {
            None => retry(fd, interest, &mut call).await.map(Some),

            // dropping the retry future on expiry also drops its readiness
            // waiter, so nothing fires for it later
            Some(deadline) => {
                match time::timeout_at(deadline.into(), retry(fd, interest, &mut call)).await {
                    Ok(res) => res.map(Some),
                    Err(_) => {
                        debug!(?interest, "timed out waiting for sequencer");
                        Ok(None)
                    }
                }
            }
        }
    }
}

async fn retry<T, F>(fd: &AsyncFd<OwnedFd>, interest: Interest, call: &mut F) -> Result<T>
    where F: FnMut() -> Result<T> {
    loop {
        let mut guard = match interest {
            Interest::Read => fd.readable().await?,
            Interest::Write => fd.writable().await?
        };

        match call() {
            Err(ref err) if err.is_would_block() => {
                trace!(?interest, "would block");
                guard.clear_ready();
            }

            res => return res
        }
    }
}
