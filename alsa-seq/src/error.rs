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

use std::ffi::NulError;
use std::io;

use libc::{
    c_int,
    c_short,
    EAGAIN,
    ENOENT
};

use nix::errno::Errno;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The handle, port or queue was already closed.
    #[error("{0}")]
    State(&'static str),

    /// A sequencer call returned a negative status.
    #[error("{call} failed: {} ({status})", describe(.status))]
    Service {
        call: &'static str,
        status: c_int
    },

    /// The caller passed arguments that cannot be used together.
    #[error("invalid argument: {0}")]
    Usage(String),

    #[error("expected exactly one poll descriptor, sequencer reported {0}")]
    PollDescriptors(usize),

    #[error("poll descriptor reports events {got:#x}, needs {wanted:#x}")]
    PollEvents {
        wanted: c_short,
        got: c_short
    },

    #[error("poll failed: {0}")]
    Poll(#[from] Errno),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error)
}

pub type Result<T> = ::std::result::Result<T, Error>;

fn describe(status: &c_int) -> &'static str {
    Errno::from_i32(-*status).desc()
}

impl Error {
    pub fn closed() -> Self {
        Error::State("already closed")
    }

    /// The status the service uses for "try again later".
    pub fn is_would_block(&self) -> bool {
        matches!(*self, Error::Service { status, .. } if status == -EAGAIN)
    }

    pub fn status(&self) -> Option<c_int> {
        match *self {
            Error::Service { status, .. } => Some(status),
            _ => None
        }
    }
}

impl From<NulError> for Error {
    fn from(_: NulError) -> Self {
        Error::Usage("name contains an interior nul byte".into())
    }
}

/// Turn a raw status into a `Result`, keeping the non-negative value.
pub(crate) fn check(call: &'static str, status: c_int) -> Result<c_int> {
    if status < 0 {
        Err(Error::Service { call, status })
    } else {
        Ok(status)
    }
}

/// Like `check`, but the end-of-iteration status maps to `None`.
pub(crate) fn check_exhausted(call: &'static str, status: c_int) -> Result<Option<c_int>> {
    if status == -ENOENT {
        Ok(None)
    } else {
        check(call, status).map(Some)
    }
}
