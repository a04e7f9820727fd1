//! Duplicate detection index keyed by semantic fingerprint.

use rustc_hash::FxHashMap;

use crate::models::{Contributor, DuplicateGroup, Fingerprint, NormalizedTrack};

/// Fingerprint -> position in `DuplicateIndex::groups`
type FingerprintIndex = FxHashMap<Fingerprint, usize>;

/// Groups every recorded track by fingerprint, in first-seen order.
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    groups: Vec<DuplicateGroup>,
    index: FingerprintIndex,
}

impl DuplicateIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sighting. The first track with a fingerprint names the group;
    /// later ones only append a contributor, in recording order.
    pub fn record(&mut self, track: &NormalizedTrack) {
        let contributor = Contributor {
            user: track.added_by_user_id.clone(),
            added_at: track.added_at,
        };

        if let Some(&idx) = self.index.get(&track.fingerprint) {
            self.groups[idx].contributors.push(contributor);
            return;
        }

        self.index
            .insert(track.fingerprint.clone(), self.groups.len());
        self.groups.push(DuplicateGroup {
            fingerprint: track.fingerprint.clone(),
            song: track.name.clone(),
            artist: track.artist.clone(),
            contributors: vec![contributor],
        });
    }

    /// Groups with more than one contributor, in first-seen order.
    pub fn duplicates(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.groups.iter().filter(|group| group.is_duplicate())
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates().count()
    }

    /// Every group including singletons.
    pub fn groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    /// Consume the index, keeping only the duplicates.
    pub fn into_duplicates(self) -> Vec<DuplicateGroup> {
        self.groups
            .into_iter()
            .filter(DuplicateGroup::is_duplicate)
            .collect()
    }
}
