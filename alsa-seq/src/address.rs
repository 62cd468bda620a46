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

use std::fmt;
use std::str::FromStr;

use alsa_sys::snd_seq_addr_t;
use serde::Serialize;

use crate::Error;

pub const SND_SEQ_CLIENT_SYSTEM: u8 = 0;
pub const SND_SEQ_PORT_SYSTEM_TIMER: u8 = 0;
pub const SND_SEQ_PORT_SYSTEM_ANNOUNCE: u8 = 1;

pub const SND_SEQ_ADDRESS_UNKNOWN: u8 = 253;
pub const SND_SEQ_ADDRESS_SUBSCRIBERS: u8 = 254;
pub const SND_SEQ_ADDRESS_BROADCAST: u8 = 255;

/// A `client:port` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Address {
    pub client_id: u8,
    pub port_id: u8
}

pub const SYSTEM_TIMER: Address = Address {
    client_id: SND_SEQ_CLIENT_SYSTEM,
    port_id: SND_SEQ_PORT_SYSTEM_TIMER
};

pub const SYSTEM_ANNOUNCE: Address = Address {
    client_id: SND_SEQ_CLIENT_SYSTEM,
    port_id: SND_SEQ_PORT_SYSTEM_ANNOUNCE
};

/// Everybody subscribed to the sending port.
pub const ALL_SUBSCRIBERS: Address = Address {
    client_id: SND_SEQ_ADDRESS_SUBSCRIBERS,
    port_id: SND_SEQ_ADDRESS_UNKNOWN
};

pub const BROADCAST: Address = Address {
    client_id: SND_SEQ_ADDRESS_BROADCAST,
    port_id: SND_SEQ_ADDRESS_BROADCAST
};

impl Address {
    pub const fn new(client_id: u8, port_id: u8) -> Self {
        Address { client_id, port_id }
    }

    pub(crate) fn from_raw(raw: snd_seq_addr_t) -> Self {
        Address::new(raw.client, raw.port)
    }

    pub(crate) fn to_raw(self) -> snd_seq_addr_t {
        snd_seq_addr_t {
            client: self.client_id,
            port: self.port_id
        }
    }
}

impl From<(u8, u8)> for Address {
    fn from((client_id, port_id): (u8, u8)) -> Self {
        Address::new(client_id, port_id)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.client_id, self.port_id)
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Accepts `client:port` or a bare `client` (port 0), plus the symbolic
    /// names `subscribers` and `broadcast`.
    fn from_str(s: &str) -> Result<Self, Error> {
        let s = s.trim();

        match s {
            "subscribers" => return Ok(ALL_SUBSCRIBERS),
            "broadcast" => return Ok(BROADCAST),
            _ => {}
        }

        let invalid = || Error::Usage(format!("invalid address {:?}", s));
        let (client, port) = match s.split_once(':') {
            Some((client, port)) => (client, port),
            None => (s, "0")
        };

        Ok(Address {
            client_id: client.parse().map_err(|_| invalid())?,
            port_id: port.parse().map_err(|_| invalid())?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let addr: Address = "128:3".parse().unwrap();
        assert_eq!(addr, Address::new(128, 3));
        assert_eq!(addr.to_string(), "128:3");

        assert_eq!("14".parse::<Address>().unwrap(), Address::new(14, 0));
        assert_eq!("subscribers".parse::<Address>().unwrap(), ALL_SUBSCRIBERS);
        assert!("128:x".parse::<Address>().is_err());
        assert!("300:0".parse::<Address>().is_err());
    }

    #[test]
    fn structural_equality() {
        assert_eq!(Address::from((0, 1)), SYSTEM_ANNOUNCE);
        assert_ne!(SYSTEM_TIMER, SYSTEM_ANNOUNCE);
    }
}
