//! Mutable per-instance, per-layer state machine cursor.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct LayerStateFlags: u8 {
        const INITIALIZED = 1 << 0;
        const IN_TRANSITION = 1 << 1;
        const ACTIVE_TRANSITION_GLOBAL = 1 << 2;
        const ACTIVE_TRANSITION_FROM_DESTINATION = 1 << 3;
        const CURRENT_STATE_CHANGED = 1 << 4;
        const DESTINATION_STATE_CHANGED = 1 << 5;

        /// Cleared at the start of every update.
        const UPDATE_FLAGS = Self::CURRENT_STATE_CHANGED.bits() | Self::DESTINATION_STATE_CHANGED.bits();
        const TRANSITION_FLAGS = Self::IN_TRANSITION.bits()
            | Self::ACTIVE_TRANSITION_GLOBAL.bits()
            | Self::ACTIVE_TRANSITION_FROM_DESTINATION.bits();
    }
}

/// Zeroed on attach; initialized lazily on the first update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerState {
    pub current_state: u16,
    pub destination_state: u16,
    /// Seconds, unbounded for looping motions.
    pub current_time: f32,
    pub destination_time: f32,
    /// Seconds elapsed in the active transition.
    pub transition_time: f32,
    /// Index of the active transition in the list that owns it.
    pub active_transition: u16,
    /// State whose transition list holds the active transition, unless it is global.
    pub transition_owner: u16,
    weight: f32,
    pub flags: LayerStateFlags,
}

impl LayerState {
    #[inline]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    #[inline]
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.flags.contains(LayerStateFlags::INITIALIZED)
    }

    #[inline]
    pub fn in_transition(&self) -> bool {
        self.flags.contains(LayerStateFlags::IN_TRANSITION)
    }

    #[inline]
    pub fn is_active_transition_global(&self) -> bool {
        self.flags.contains(LayerStateFlags::ACTIVE_TRANSITION_GLOBAL)
    }

    #[inline]
    pub fn is_active_transition_from_destination(&self) -> bool {
        self.flags
            .contains(LayerStateFlags::ACTIVE_TRANSITION_FROM_DESTINATION)
    }

    #[inline]
    pub fn current_state_changed(&self) -> bool {
        self.flags.contains(LayerStateFlags::CURRENT_STATE_CHANGED)
    }

    #[inline]
    pub fn destination_state_changed(&self) -> bool {
        self.flags
            .contains(LayerStateFlags::DESTINATION_STATE_CHANGED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weight_is_clamped() {
        let mut s = LayerState::default();
        s.set_weight(3.0);
        assert_eq!(s.weight(), 1.0);
        s.set_weight(-1.0);
        assert_eq!(s.weight(), 0.0);
    }

    #[test]
    fn composite_flags() {
        let mut f = LayerStateFlags::INITIALIZED
            | LayerStateFlags::IN_TRANSITION
            | LayerStateFlags::CURRENT_STATE_CHANGED;
        f.remove(LayerStateFlags::TRANSITION_FLAGS | LayerStateFlags::UPDATE_FLAGS);
        assert_eq!(f, LayerStateFlags::INITIALIZED);
    }
}
