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

//! Blocking event I/O.
//!
//! Every call runs the same loop around one non-blocking sequencer call:
//! try it; on "would block" sleep in `poll(2)` until the descriptor is ready
//! for the right direction or the deadline passes, then try again. Any other
//! error ends the loop.

use std::ops::Deref;
use std::os::unix::io::RawFd;
use std::time::{
    Duration,
    Instant
};

use libc::c_int;

use nix::errno::Errno;
use nix::poll::{
    poll,
    PollFd,
    PollFlags
};

use crate::{
    Event,
    HandleOpenStreams,
    OpenMode,
    Result,
    Route,
    SequencerHandle
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Read,
    Write
}

/// One direction of interest on the shared sequencer descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Readiness {
    fd: RawFd,
    interest: Interest
}

impl Readiness {
    pub fn new(fd: RawFd, interest: Interest) -> Self {
        Readiness { fd, interest }
    }

    pub fn interest(&self) -> Interest {
        self.interest
    }

    fn flags(&self) -> PollFlags {
        match self.interest {
            Interest::Read => PollFlags::POLLIN,
            Interest::Write => PollFlags::POLLOUT
        }
    }

    /// Block until ready or `timeout` passes (`None` waits forever). Returns
    /// whether the descriptor reported ready; a signal counts as not ready.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<bool> {
        let mut fds = [PollFd::new(self.fd, self.flags())];

        match poll(&mut fds, poll_timeout(timeout)) {
            Ok(n) => Ok(n > 0),
            Err(Errno::EINTR) => Ok(false),
            Err(err) => Err(err.into())
        }
    }
}

/// Milliseconds for `poll(2)`, rounded up so short waits don't spin.
fn poll_timeout(timeout: Option<Duration>) -> c_int {
    match timeout {
        None => -1,
        Some(t) => {
            let ms = (t.as_micros() + 999) / 1000;
            ms.min(c_int::max_value() as u128) as c_int
        }
    }
}

/// A zero timeout means no deadline, and so does one too far out to
/// represent.
pub(crate) fn deadline(timeout: Option<Duration>) -> Option<Instant> {
    timeout
        .filter(|t| !t.is_zero())
        .and_then(|t| Instant::now().checked_add(t))
}

/// Sequencer connection whose I/O blocks the calling thread.
pub struct SequencerClient {
    handle: SequencerHandle,
    read: Readiness,
    write: Readiness
}

impl SequencerClient {
    pub fn open(client_name: &str, streams: HandleOpenStreams, mode: OpenMode,
                sequencer_name: &str) -> Result<Self> {
        SequencerHandle::open(client_name, streams, mode, sequencer_name)
            .map(SequencerClient::new)
    }

    pub fn new(handle: SequencerHandle) -> Self {
        let fd = handle.fd();

        SequencerClient {
            handle,
            read: Readiness::new(fd, Interest::Read),
            write: Readiness::new(fd, Interest::Write)
        }
    }

    pub fn handle(&self) -> &SequencerHandle {
        &self.handle
    }

    /// Wait for the next event. `Ok(None)` means the timeout expired.
    pub fn event_input(&self, timeout: Option<Duration>) -> Result<Option<Event>> {
        wait_for(&self.read, timeout, || self.handle.try_event_input())
    }

    pub fn event_output(&self, ev: &Event, route: &Route, timeout: Option<Duration>)
        -> Result<Option<c_int>> {
        let mut native = route.encode(ev);
        wait_for(&self.write, timeout, || self.handle.output_native(&mut native, false))
    }

    pub fn event_output_direct(&self, ev: &Event, route: &Route, timeout: Option<Duration>)
        -> Result<Option<c_int>> {
        let mut native = route.encode(ev);
        wait_for(&self.write, timeout, || self.handle.output_native(&mut native, true))
    }

    pub fn drain_output(&self, timeout: Option<Duration>) -> Result<Option<c_int>> {
        wait_for(&self.write, timeout, || self.handle.try_drain_output())
    }
}

impl Deref for SequencerClient {
    type Target = SequencerHandle;

    fn deref(&self) -> &SequencerHandle {
        &self.handle
    }
}

fn wait_for<T, F>(readiness: &Readiness, timeout: Option<Duration>, mut call: F)
    -> Result<Option<T>>
    where F: FnMut() -> Result<T> {
    let deadline = deadline(timeout);

    loop {
        match call() {
            Err(ref err) if err.is_would_block() => {}
            res => return res.map(Some)
        }

        let remaining = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    debug!(interest = ?readiness.interest(), "timed out waiting for sequencer");
                    return Ok(None);
                }

                Some(deadline - now)
            }

            None => None
        };

        trace!(interest = ?readiness.interest(), ?remaining, "would block");
        readiness.wait(remaining)?;
    }
}
