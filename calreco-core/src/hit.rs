//! Reconstructed hit types.

use crate::channel::ChannelId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Time value meaning "not computed".
pub const UNKNOWN_TIME: f32 = -9999.0;

/// Common interface of reconstructed hits.
///
/// A hit whose id is null is a "no hit" marker and is never stored in an
/// output collection.
pub trait RecHit: Send + Sync {
    /// Channel the hit belongs to.
    fn id(&self) -> ChannelId;

    /// Reconstructed energy.
    fn energy(&self) -> f32;

    /// Reconstructed time (ns).
    fn time(&self) -> f32;

    /// True if the hit carries a real channel id.
    #[inline]
    fn is_valid(&self) -> bool {
        !self.id().is_null()
    }
}

/// Reconstructed hit for the barrel, endcap and outer subdetectors.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HbheRecHit {
    pub id: ChannelId,
    pub energy: f32,
    /// Time in ns, [`UNKNOWN_TIME`] if it could not be computed.
    pub time: f32,
}

impl Default for HbheRecHit {
    fn default() -> Self {
        Self {
            id: ChannelId::NULL,
            energy: 0.0,
            time: UNKNOWN_TIME,
        }
    }
}

impl HbheRecHit {
    #[inline]
    #[must_use]
    pub fn new(id: ChannelId, energy: f32, time: f32) -> Self {
        Self { id, energy, time }
    }

    /// True if the timing algorithm produced a time.
    #[inline]
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn has_time(&self) -> bool {
        self.time != UNKNOWN_TIME
    }
}

impl RecHit for HbheRecHit {
    #[inline]
    fn id(&self) -> ChannelId {
        self.id
    }

    #[inline]
    fn energy(&self) -> f32 {
        self.energy
    }

    #[inline]
    fn time(&self) -> f32 {
        self.time
    }
}

/// Reconstructed quantities of one forward-calorimeter anode.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HfAnodeInfo {
    pub energy: f32,
    /// TDC rising-edge time (ns).
    pub time_rising: f32,
    /// TDC falling-edge time (ns).
    pub time_falling: f32,
}

/// Forward-calorimeter channel before anode combination.
///
/// Each forward tower is read out by two anodes; either may be missing from
/// the data.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HfPreHit {
    pub id: ChannelId,
    pub anodes: [Option<HfAnodeInfo>; 2],
}

impl HfPreHit {
    #[must_use]
    pub fn new(id: ChannelId, first: Option<HfAnodeInfo>, second: Option<HfAnodeInfo>) -> Self {
        Self {
            id,
            anodes: [first, second],
        }
    }

    /// Anode `i` (0 or 1), if present.
    #[inline]
    #[must_use]
    pub fn anode(&self, i: usize) -> Option<&HfAnodeInfo> {
        self.anodes.get(i).and_then(Option::as_ref)
    }
}

/// Reconstructed forward-calorimeter hit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HfRecHit {
    pub id: ChannelId,
    pub energy: f32,
    pub time: f32,
    pub time_falling: f32,
}

impl HfRecHit {
    #[inline]
    #[must_use]
    pub fn new(id: ChannelId, energy: f32, time: f32, time_falling: f32) -> Self {
        Self {
            id,
            energy,
            time,
            time_falling,
        }
    }
}

impl RecHit for HfRecHit {
    #[inline]
    fn id(&self) -> ChannelId {
        self.id
    }

    #[inline]
    fn energy(&self) -> f32 {
        self.energy
    }

    #[inline]
    fn time(&self) -> f32 {
        self.time
    }
}
