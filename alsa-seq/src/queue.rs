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

use crate::{
    Error,
    Queue,
    Result
};

use crate::error::check;
use crate::event::types;

/// Anything that names a queue.
pub trait AsQueueId {
    fn queue_id(&self) -> c_int;
}

impl AsQueueId for c_int {
    fn queue_id(&self) -> c_int {
        *self
    }
}

impl AsQueueId for u8 {
    fn queue_id(&self) -> c_int {
        *self as c_int
    }
}

impl<'handle> AsQueueId for Queue<'handle> {
    fn queue_id(&self) -> c_int {
        self.queue_id
    }
}

impl<'a, T: AsQueueId + ?Sized> AsQueueId for &'a T {
    fn queue_id(&self) -> c_int {
        (**self).queue_id()
    }
}

impl<'handle> Queue<'handle> {
    pub fn queue_id(&self) -> c_int {
        self.queue_id
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.get() {
            Err(Error::closed())
        } else {
            Ok(())
        }
    }

    /// `tempo` is in microseconds per quarter note.
    pub fn set_tempo(&self, tempo: u32, ppq: c_int) -> Result<()> {
        self.check_open()?;
        let queue = self.queue_id;
        let status = self.handle.with_backend(|backend| backend.set_queue_tempo(queue, tempo, ppq))?;
        check("snd_seq_set_queue_tempo", status).map(|_| ())
    }

    pub fn set_default_tempo(&self) -> Result<()> {
        self.set_tempo(500000, 96)
    }

    /// Send a queue control event of `event_type` straight to the system
    /// timer.
    pub fn control(&self, event_type: u8, value: c_int) -> Result<()> {
        self.check_open()?;
        let queue = self.queue_id;
        let status = self.handle.with_backend(|backend| {
            backend.control_queue(queue, event_type, value)
        })?;
        check("snd_seq_control_queue", status).map(|_| ())
    }

    pub fn start(&self) -> Result<()> {
        self.control(types::START, 0)
    }

    pub fn stop(&self) -> Result<()> {
        self.control(types::STOP, 0)
    }

    pub fn continue_(&self) -> Result<()> {
        self.control(types::CONTINUE, 0)
    }

    /// Free the queue. Idempotent; a no-op once the handle is closed.
    pub fn close(&self) -> Result<()> {
        if self.closed.replace(true) {
            return Ok(());
        }

        let queue = self.queue_id;
        match self.handle.with_backend(|backend| backend.free_queue(queue)) {
            Ok(status) => {
                debug!(queue_id = queue, "freed queue");
                check("snd_seq_free_queue", status).map(|_| ())
            }

            Err(Error::State(_)) => Ok(()),
            Err(err) => Err(err)
        }
    }
}

impl<'handle> Drop for Queue<'handle> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(queue_id = self.queue_id, %err, "couldn't free queue on drop");
        }
    }
}
