//! Header kinds and the logical channel types they map to.
//!
//! Several header kinds alias onto one channel type (a counter frame and its
//! acknowledgement both belong to the counter channel). Every channel type
//! has exactly one canonical kind used when transmitting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Header-kind byte carried in every eMCDI frame.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    Control = 0x01,
    CounterStream = 0x02,
    CounterAck = 0x03,
    FlashUpgrade = 0x04,
    ControllerSpawn = 0x05,
    ImageUpgrade = 0x06,
    Logger = 0x07,
    Firewall = 0x08,
    Ipsec = 0x09,
}

impl HeaderKind {
    /// All header kinds, in wire order.
    pub const ALL: [HeaderKind; 9] = [
        Self::Control,
        Self::CounterStream,
        Self::CounterAck,
        Self::FlashUpgrade,
        Self::ControllerSpawn,
        Self::ImageUpgrade,
        Self::Logger,
        Self::Firewall,
        Self::Ipsec,
    ];

    /// Convert from raw byte value.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| *kind as u8 == value)
    }

    /// Logical channel this kind is routed to.
    pub fn channel(self) -> ChannelType {
        match self {
            Self::Control | Self::Firewall | Self::Ipsec => ChannelType::Control,
            Self::CounterStream | Self::CounterAck => ChannelType::Counter,
            Self::FlashUpgrade | Self::ImageUpgrade => ChannelType::Upgrade,
            Self::ControllerSpawn => ChannelType::Spawn,
            Self::Logger => ChannelType::Logger,
        }
    }
}

/// A logical target service on the companion processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Control,
    Counter,
    Upgrade,
    Spawn,
    Logger,
}

impl ChannelType {
    /// Number of channel types; the registry holds one slot per type.
    pub const COUNT: usize = 5;

    /// All channel types, in registry order.
    pub const ALL: [ChannelType; Self::COUNT] = [
        Self::Control,
        Self::Counter,
        Self::Upgrade,
        Self::Spawn,
        Self::Logger,
    ];

    /// Registry slot for this channel.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Header kind stamped on frames sent on this channel.
    pub fn tx_kind(self) -> HeaderKind {
        match self {
            Self::Control => HeaderKind::Control,
            Self::Counter => HeaderKind::CounterStream,
            Self::Upgrade => HeaderKind::ImageUpgrade,
            Self::Spawn => HeaderKind::ControllerSpawn,
            Self::Logger => HeaderKind::Logger,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Counter => "counter",
            Self::Upgrade => "upgrade",
            Self::Spawn => "spawn",
            Self::Logger => "logger",
        }
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_rejected() {
        assert_eq!(HeaderKind::from_u8(0x00), None);
        assert_eq!(HeaderKind::from_u8(0x0a), None);
        assert_eq!(HeaderKind::from_u8(0xff), None);
    }

    #[test]
    fn test_from_u8_matches_discriminant() {
        for kind in HeaderKind::ALL {
            assert_eq!(HeaderKind::from_u8(kind as u8), Some(kind));
        }
    }

    #[test]
    fn test_aliases_share_channel() {
        assert_eq!(HeaderKind::CounterAck.channel(), ChannelType::Counter);
        assert_eq!(HeaderKind::CounterStream.channel(), ChannelType::Counter);
        assert_eq!(HeaderKind::Firewall.channel(), ChannelType::Control);
        assert_eq!(HeaderKind::Ipsec.channel(), ChannelType::Control);
        assert_eq!(HeaderKind::FlashUpgrade.channel(), ChannelType::Upgrade);
    }

    #[test]
    fn test_tx_kind_routes_back_to_channel() {
        for channel in ChannelType::ALL {
            assert_eq!(channel.tx_kind().channel(), channel);
        }
    }

    #[test]
    fn test_index_is_dense() {
        for (i, channel) in ChannelType::ALL.iter().enumerate() {
            assert_eq!(channel.index(), i);
        }
    }

    #[test]
    fn test_channel_serde_snake_case() {
        let json = serde_json::to_string(&ChannelType::Upgrade).unwrap();
        assert_eq!(json, "\"upgrade\"");
        let parsed: ChannelType = serde_json::from_str("\"spawn\"").unwrap();
        assert_eq!(parsed, ChannelType::Spawn);
    }
}
