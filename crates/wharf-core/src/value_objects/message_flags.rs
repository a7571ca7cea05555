//! Message flags, sent as a plain integer

use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MessageFlags: u64 {
        const CROSSPOSTED    = 1 << 0;
        const IS_CROSSPOST   = 1 << 1;
        const SUPPRESS_EMBEDS = 1 << 2;
        /// Only the invoking user sees an interaction response
        const EPHEMERAL      = 1 << 6;
    }
}

impl Serialize for MessageFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.bits())
    }
}

impl<'de> Deserialize<'de> for MessageFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Unknown bits are kept so a round trip never loses them
        Ok(Self::from_bits_retain(u64::deserialize(deserializer)?))
    }
}
