//! Channel identifiers.
//!
//! A channel is addressed by its subdetector and an (ieta, iphi, depth)
//! coordinate triple, packed into a single `u32`. The raw value 0 is
//! reserved as the null id, used by algorithms to signal "no hit".

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const DET_CALO: u32 = 4 << 28;
const SUBDET_SHIFT: u32 = 25;
const SUBDET_MASK: u32 = 0x7;
const DEPTH_SHIFT: u32 = 14;
const DEPTH_MASK: u32 = 0x1F;
const ETA_POSITIVE: u32 = 0x2000;
const ETA_SHIFT: u32 = 7;
const ETA_MASK: u32 = 0x3F;
const PHI_MASK: u32 = 0x7F;

/// Calorimeter subdetector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Subdetector {
    /// Barrel (HB).
    #[cfg_attr(feature = "serde", serde(rename = "HB"))]
    Barrel = 1,
    /// Endcap (HE).
    #[cfg_attr(feature = "serde", serde(rename = "HE"))]
    Endcap = 2,
    /// Outer barrel (HO).
    #[cfg_attr(feature = "serde", serde(rename = "HO"))]
    Outer = 3,
    /// Forward (HF).
    #[cfg_attr(feature = "serde", serde(rename = "HF"))]
    Forward = 4,
}

impl Subdetector {
    /// Short detector label, e.g. `"HB"`.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Barrel => "HB",
            Self::Endcap => "HE",
            Self::Outer => "HO",
            Self::Forward => "HF",
        }
    }

    fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Barrel),
            2 => Some(Self::Endcap),
            3 => Some(Self::Outer),
            4 => Some(Self::Forward),
            _ => None,
        }
    }
}

/// Packed calorimeter channel identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "ChannelCoords", into = "ChannelCoords")
)]
pub struct ChannelId(u32);

impl ChannelId {
    /// The null id. Hits carrying it are never stored.
    pub const NULL: Self = Self(0);

    /// Creates a channel id from its coordinates.
    ///
    /// # Errors
    /// Returns [`Error::InvalidCoordinates`] if `ieta` is zero or any
    /// coordinate does not fit its bit field.
    pub fn new(subdet: Subdetector, ieta: i32, iphi: u32, depth: u32) -> Result<Self> {
        let abs_eta = ieta.unsigned_abs();
        if abs_eta == 0
            || abs_eta > ETA_MASK
            || iphi == 0
            || iphi > PHI_MASK
            || depth == 0
            || depth > DEPTH_MASK
        {
            return Err(Error::InvalidCoordinates { ieta, iphi, depth });
        }
        let mut raw = DET_CALO | ((subdet as u32) << SUBDET_SHIFT);
        raw |= depth << DEPTH_SHIFT;
        raw |= abs_eta << ETA_SHIFT;
        if ieta > 0 {
            raw |= ETA_POSITIVE;
        }
        raw |= iphi;
        Ok(Self(raw))
    }

    /// Reconstructs an id from its packed form.
    ///
    /// # Errors
    /// Returns [`Error::InvalidChannelId`] for values that do not decode to a
    /// calorimeter channel. Zero decodes to [`ChannelId::NULL`].
    pub fn from_raw(raw: u32) -> Result<Self> {
        if raw == 0 {
            return Ok(Self::NULL);
        }
        let id = Self(raw);
        if raw & 0xF000_0000 != DET_CALO
            || Subdetector::from_code((raw >> SUBDET_SHIFT) & SUBDET_MASK).is_none()
            || id.ieta() == 0
            || id.iphi() == 0
            || id.depth() == 0
        {
            return Err(Error::InvalidChannelId(raw));
        }
        Ok(id)
    }

    /// Returns the packed value.
    #[inline]
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// True for the null id.
    #[inline]
    #[must_use]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Subdetector, `None` for the null id.
    #[inline]
    #[must_use]
    pub fn subdet(self) -> Option<Subdetector> {
        Subdetector::from_code((self.0 >> SUBDET_SHIFT) & SUBDET_MASK)
    }

    /// Signed eta index.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn ieta(self) -> i32 {
        let abs = ((self.0 >> ETA_SHIFT) & ETA_MASK) as i32;
        if self.0 & ETA_POSITIVE != 0 {
            abs
        } else {
            -abs
        }
    }

    /// Phi index.
    #[inline]
    #[must_use]
    pub fn iphi(self) -> u32 {
        self.0 & PHI_MASK
    }

    /// Longitudinal depth segment.
    #[inline]
    #[must_use]
    pub fn depth(self) -> u32 {
        (self.0 >> DEPTH_SHIFT) & DEPTH_MASK
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.subdet() {
            Some(subdet) => write!(
                f,
                "({} {},{},{})",
                subdet.label(),
                self.ieta(),
                self.iphi(),
                self.depth()
            ),
            None => write!(f, "(null)"),
        }
    }
}

/// Human-readable form of [`ChannelId`] used for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelCoords {
    pub subdet: Subdetector,
    pub ieta: i32,
    pub iphi: u32,
    pub depth: u32,
}

impl TryFrom<ChannelCoords> for ChannelId {
    type Error = Error;

    fn try_from(c: ChannelCoords) -> Result<Self> {
        Self::new(c.subdet, c.ieta, c.iphi, c.depth)
    }
}

impl From<ChannelId> for ChannelCoords {
    /// The null id maps to an all-zero barrel coordinate, which does not
    /// round-trip; null ids are never written out.
    fn from(id: ChannelId) -> Self {
        Self {
            subdet: id.subdet().unwrap_or(Subdetector::Barrel),
            ieta: id.ieta(),
            iphi: id.iphi(),
            depth: id.depth(),
        }
    }
}
