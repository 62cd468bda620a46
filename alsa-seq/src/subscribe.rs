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

use crate::{
    Address,
    AsQueueId,
    Result,
    SequencerHandle
};

use crate::error::check;

/// Flags for a connection between two ports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Queue used for time stamping delivered events.
    pub queue: Option<u8>,
    pub exclusive: bool,
    pub time_update: bool,
    pub time_real: bool
}

impl SubscribeOptions {
    pub fn with_queue<Q: AsQueueId>(mut self, queue: Q) -> Self {
        self.queue = Some(queue.queue_id() as u8);
        self
    }
}

/// The descriptor handed to the sequencer for one subscribe or unsubscribe
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub sender: Address,
    pub dest: Address,
    pub queue: Option<u8>,
    pub exclusive: bool,
    pub time_update: bool,
    pub time_real: bool
}

impl Subscription {
    pub fn new(sender: Address, dest: Address, options: &SubscribeOptions) -> Self {
        Subscription {
            sender,
            dest,
            queue: options.queue,
            exclusive: options.exclusive,
            time_update: options.time_update,
            time_real: options.time_real
        }
    }
}

impl SequencerHandle {
    /// Route events leaving `sender` to `dest`.
    pub fn subscribe_port<S, D>(&self, sender: S, dest: D, options: &SubscribeOptions)
        -> Result<()>
        where S: Into<Address>, D: Into<Address> {
        let sub = Subscription::new(sender.into(), dest.into(), options);
        let status = self.with_backend(|backend| backend.subscribe_port(&sub))?;
        check("snd_seq_subscribe_port", status)?;

        debug!(sender = %sub.sender, dest = %sub.dest, exclusive = sub.exclusive, "subscribed");
        Ok(())
    }

    pub fn unsubscribe_port<S, D>(&self, sender: S, dest: D, options: &SubscribeOptions)
        -> Result<()>
        where S: Into<Address>, D: Into<Address> {
        let sub = Subscription::new(sender.into(), dest.into(), options);
        let status = self.with_backend(|backend| backend.unsubscribe_port(&sub))?;
        check("snd_seq_unsubscribe_port", status)?;

        debug!(sender = %sub.sender, dest = %sub.dest, "unsubscribed");
        Ok(())
    }
}
