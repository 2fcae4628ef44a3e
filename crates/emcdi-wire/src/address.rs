//! Link-layer addressing for eMCDI frames.

use crate::{FrameError, FrameResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit hardware address. Serialized as `aa:bb:cc:dd:ee:ff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = FrameError;

    fn from_str(s: &str) -> FrameResult<Self> {
        let mut out = [0u8; 6];
        let mut parts = s.split(':');
        for slot in out.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| FrameError::InvalidMac(s.to_string()))?;
            if part.len() != 2 {
                return Err(FrameError::InvalidMac(s.to_string()));
            }
            *slot = u8::from_str_radix(part, 16)
                .map_err(|_| FrameError::InvalidMac(s.to_string()))?;
        }
        if parts.next().is_some() {
            return Err(FrameError::InvalidMac(s.to_string()));
        }
        Ok(Self(out))
    }
}

impl TryFrom<String> for MacAddr {
    type Error = FrameError;

    fn try_from(value: String) -> FrameResult<Self> {
        value.parse()
    }
}

impl From<MacAddr> for String {
    fn from(mac: MacAddr) -> Self {
        mac.to_string()
    }
}

/// Addressing used to stamp outbound frames and validate inbound ones.
///
/// `local` is this engine's address and `remote` is the companion
/// processor. Outbound frames go `local -> remote`; inbound frames must
/// arrive `remote -> local`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Addressing {
    pub local: MacAddr,
    pub remote: MacAddr,
    /// VLAN id carried in the outer (service) tag.
    pub outer_vlan: u16,
    /// VLAN id carried in the inner (customer) tag.
    pub inner_vlan: u16,
}

impl Addressing {
    /// The same link seen from the companion processor's side.
    pub fn reversed(&self) -> Self {
        Self {
            local: self.remote,
            remote: self.local,
            ..*self
        }
    }
}
