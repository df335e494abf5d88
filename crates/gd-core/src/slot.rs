use core::fmt;
use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

/// Compact, stable position identifier used across the dock.
///
/// Identifies an installed-component bay on the instrument and, for gas
/// end points, the solenoid valve position feeding it.
///
/// - `u32` keeps memory small
/// - `NonZero` enables `Option<Slot>` to be pointer-optimized, which is
///   exactly the shape of "which valve is open right now, if any"
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot(NonZeroU32);

impl Slot {
    /// Create a Slot from a 0-based bay index by storing index+1.
    pub fn from_index(index: u32) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index))
    }

    /// Recover the 0-based bay index.
    pub fn index(self) -> u32 {
        self.0.get() - 1
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({})", self.index())
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.index())
    }
}
