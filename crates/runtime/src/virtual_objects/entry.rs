//! Per-object storage entry: residency tier plus the offload record.

use chrono::{DateTime, Utc};

use super::state::{ObjectState, StateSnapshot};
use crate::storage::BlobPointer;

/// Where an object's domain state currently lives.
///
/// The two variants are mutually exclusive: an offloaded object holds no
/// domain keys, a resident object holds no pointer.
#[derive(Debug, Clone, PartialEq)]
pub enum Tier {
    /// Domain state is held by the host.
    Resident(ObjectState),
    /// Domain state was externalized; the pointer addresses the blob.
    Offloaded(BlobPointer),
}

impl Default for Tier {
    fn default() -> Self {
        Self::Resident(ObjectState::new())
    }
}

impl Tier {
    /// Check if the state is resident.
    #[must_use]
    pub const fn is_resident(&self) -> bool {
        matches!(self, Self::Resident(_))
    }

    /// Check if the state is offloaded.
    #[must_use]
    pub const fn is_offloaded(&self) -> bool {
        matches!(self, Self::Offloaded(_))
    }

    /// Resident state, if any.
    #[must_use]
    pub const fn state(&self) -> Option<&ObjectState> {
        match self {
            Self::Resident(state) => Some(state),
            Self::Offloaded(_) => None,
        }
    }

    /// Offload pointer, if any.
    #[must_use]
    pub const fn pointer(&self) -> Option<&BlobPointer> {
        match self {
            Self::Offloaded(pointer) => Some(pointer),
            Self::Resident(_) => None,
        }
    }
}

/// Everything the host stores for one object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectEntry {
    tier: Tier,
    last_access: Option<DateTime<Utc>>,
}

impl ObjectEntry {
    /// Create an empty, resident entry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Residency tier.
    #[must_use]
    pub const fn tier(&self) -> &Tier {
        &self.tier
    }

    /// Time of the last successful exclusive access, if any.
    #[must_use]
    pub const fn last_access(&self) -> Option<DateTime<Utc>> {
        self.last_access
    }

    /// Check if the state is offloaded.
    #[must_use]
    pub const fn is_offloaded(&self) -> bool {
        self.tier.is_offloaded()
    }

    /// Domain keys currently held, sorted. Empty when offloaded.
    #[must_use]
    pub fn domain_keys(&self) -> Vec<String> {
        self.tier.state().map(ObjectState::keys).unwrap_or_default()
    }

    pub(crate) fn state_mut(&mut self) -> Option<&mut ObjectState> {
        match &mut self.tier {
            Tier::Resident(state) => Some(state),
            Tier::Offloaded(_) => None,
        }
    }

    pub(crate) fn set_last_access(&mut self, at: DateTime<Utc>) {
        self.last_access = Some(at);
    }

    /// Drop all domain keys and the last access, keeping only the pointer.
    pub(crate) fn offload(&mut self, pointer: BlobPointer) {
        self.tier = Tier::Offloaded(pointer);
        self.last_access = None;
    }

    /// Write a snapshot back, merging over any resident keys.
    ///
    /// Restoring an offloaded entry drops its pointer.
    pub(crate) fn restore(&mut self, snapshot: StateSnapshot) {
        match &mut self.tier {
            Tier::Resident(state) => state.restore(snapshot),
            Tier::Offloaded(_) => self.tier = Tier::Resident(ObjectState::from(snapshot)),
        }
    }
}
