//! The professional-facility linkage relation.
//!
//! Rather than two mirrored sets kept on each actor (which drift without
//! a transactional dual-write), the relation lives in one shared index
//! keyed by the pair. `link` and `unlink` are single operations; both
//! actor types query the same index, so the two sides can never disagree.

use std::collections::HashSet;
use std::sync::RwLock;

use carekey_core::{FacilityId, ProfessionalId};

/// The shared professional-facility link index.
///
/// Interior-mutable so actors can consult it while holding their own
/// locks. Reads vastly outnumber writes.
#[derive(Debug, Default)]
pub struct LinkageIndex {
    pairs: RwLock<HashSet<(ProfessionalId, FacilityId)>>,
}

impl LinkageIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Link a professional to a facility. Idempotent.
    pub fn link(&self, professional: ProfessionalId, facility: FacilityId) {
        self.pairs.write().unwrap().insert((professional, facility));
    }

    /// Remove a link. Idempotent; returns whether a link existed.
    pub fn unlink(&self, professional: ProfessionalId, facility: FacilityId) -> bool {
        self.pairs.write().unwrap().remove(&(professional, facility))
    }

    /// Is this professional linked to this facility?
    pub fn is_linked(&self, professional: &ProfessionalId, facility: &FacilityId) -> bool {
        self.pairs
            .read()
            .unwrap()
            .contains(&(*professional, *facility))
    }

    /// All facilities a professional is linked to.
    pub fn facilities_for(&self, professional: &ProfessionalId) -> Vec<FacilityId> {
        self.pairs
            .read()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == professional)
            .map(|(_, f)| *f)
            .collect()
    }

    /// All professionals linked to a facility.
    pub fn professionals_for(&self, facility: &FacilityId) -> Vec<ProfessionalId> {
        self.pairs
            .read()
            .unwrap()
            .iter()
            .filter(|(_, f)| f == facility)
            .map(|(p, _)| *p)
            .collect()
    }

    /// Total number of links.
    pub fn len(&self) -> usize {
        self.pairs.read().unwrap().len()
    }

    /// Is the index empty?
    pub fn is_empty(&self) -> bool {
        self.pairs.read().unwrap().is_empty()
    }
}
