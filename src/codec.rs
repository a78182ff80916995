//! Voice codec identifiers and the bounded codec list exchanged via AT+BAC.

use crate::constants::MAX_CODECS;
use heapless::Vec;

/// Voice codec identifiers as carried in AT+BAC / +BCS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Codec {
    /// CVSD, 8 kHz narrowband, mandatory baseline
    Cvsd,
    /// mSBC, 16 kHz wideband, requires eSCO and transparent air mode
    Msbc,
    /// LC3-SWB, 32 kHz super-wideband
    Lc3Swb,
}

impl Codec {
    /// Codec id as used on the wire
    #[must_use]
    pub const fn id(self) -> u8 {
        match self {
            Codec::Cvsd => 0x01,
            Codec::Msbc => 0x02,
            Codec::Lc3Swb => 0x03,
        }
    }

    /// Parse a wire codec id; unknown ids are not representable
    #[must_use]
    pub const fn from_id(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(Codec::Cvsd),
            0x02 => Some(Codec::Msbc),
            0x03 => Some(Codec::Lc3Swb),
            _ => None,
        }
    }

    /// Whether this codec can run over a plain SCO link
    #[must_use]
    pub const fn works_without_esco(self) -> bool {
        matches!(self, Codec::Cvsd)
    }
}

/// Bounded set of codec ids; insertion order is preserved, duplicates rejected
#[derive(Debug, Clone, Default)]
pub struct CodecList {
    codecs: Vec<u8, MAX_CODECS>,
}

impl CodecList {
    /// Empty codec list
    #[must_use]
    pub const fn new() -> Self {
        Self { codecs: Vec::new() }
    }

    /// Insert a codec id. Full or duplicate insertions are rejected; the
    /// caller decides whether that matters (excess peer codecs are dropped).
    pub fn insert(&mut self, id: u8) -> bool {
        if self.codecs.contains(&id) {
            return false;
        }
        self.codecs.push(id).is_ok()
    }

    /// Whether the list contains the given codec
    #[must_use]
    pub fn contains(&self, codec: Codec) -> bool {
        self.codecs.contains(&codec.id())
    }

    /// Raw codec ids in insertion order
    #[must_use]
    pub fn ids(&self) -> &[u8] {
        &self.codecs
    }

    /// Number of codecs stored
    #[must_use]
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Whether the list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Remove all codecs
    pub fn clear(&mut self) {
        self.codecs.clear();
    }
}
