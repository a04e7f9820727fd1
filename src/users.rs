//! Per-user accumulation and display-name resolution.

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::warn;

use crate::error::ResolveError;
use crate::models::{EntryItem, NormalizedTrack, Page, UserAggregate, UserTable};

// ============================================================================
// Display Name Resolution
// ============================================================================

/// External lookup for users whose entries carry no display name.
///
/// An `Ok("")` counts as "returned nothing" and degrades like an error.
pub trait DisplayNameResolver: Sync {
    fn resolve(&self, user_id: &str) -> Result<String, ResolveError>;
}

/// Resolver that knows nobody. Every lookup degrades to the user id.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResolver;

impl DisplayNameResolver for NoResolver {
    fn resolve(&self, user_id: &str) -> Result<String, ResolveError> {
        Err(ResolveError::NotFound(user_id.to_string()))
    }
}

/// Adapter for closures.
pub struct FnResolver<F>(pub F);

impl<F> FnResolver<F>
where
    F: Fn(&str) -> Result<String, ResolveError> + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> DisplayNameResolver for FnResolver<F>
where
    F: Fn(&str) -> Result<String, ResolveError> + Sync,
{
    fn resolve(&self, user_id: &str) -> Result<String, ResolveError> {
        (self.0)(user_id)
    }
}

/// Static id → name table, e.g. a previously exported user listing.
#[derive(Debug, Default, Clone)]
pub struct NameDirectory {
    names: FxHashMap<String, String>,
}

impl NameDirectory {
    pub fn new(names: FxHashMap<String, String>) -> Self {
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(String, String)> for NameDirectory {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl DisplayNameResolver for NameDirectory {
    fn resolve(&self, user_id: &str) -> Result<String, ResolveError> {
        self.names
            .get(user_id)
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(user_id.to_string()))
    }
}

/// Lookups done ahead of the pass, concurrently, then served from memory.
///
/// Only users whose first available entry carries no name are looked up.
/// Results are applied during the sequential pass, so resolution order
/// never affects accumulator order.
#[derive(Debug, Default)]
pub struct PrefetchedNames {
    results: FxHashMap<String, Result<String, ResolveError>>,
}

impl PrefetchedNames {
    /// Resolve on the current rayon pool; its size bounds concurrency.
    pub fn resolve_all<R: DisplayNameResolver + ?Sized>(pages: &[Page], resolver: &R) -> Self {
        let pending = users_needing_lookup(pages);
        let results = pending
            .into_par_iter()
            .map(|user_id| {
                let result = resolver.resolve(&user_id);
                (user_id, result)
            })
            .collect();
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

impl DisplayNameResolver for PrefetchedNames {
    fn resolve(&self, user_id: &str) -> Result<String, ResolveError> {
        match self.results.get(user_id) {
            Some(result) => result.clone(),
            None => Err(ResolveError::NotFound(user_id.to_string())),
        }
    }
}

/// User ids, in first-sighting order, whose first available entry has no name.
pub fn users_needing_lookup(pages: &[Page]) -> Vec<String> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    let mut pending = Vec::new();

    for entry in pages.iter().flat_map(|page| page.entries.iter()) {
        if matches!(entry.item, EntryItem::Unavailable) {
            continue;
        }
        if !seen.insert(entry.added_by_user_id.as_str()) {
            continue;
        }
        if entry.display_name().is_none() {
            pending.push(entry.added_by_user_id.clone());
        }
    }

    pending
}

// ============================================================================
// User Aggregator
// ============================================================================

/// Where a user's display name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    /// User was already known; nothing changed.
    Known,
    FromEntry,
    Resolved,
    /// Resolver failed or returned nothing; the user id stands in.
    Degraded,
}

/// Accumulates tracks per user, keyed in first-sighting order.
#[derive(Debug, Default)]
pub struct UserAggregator {
    users: Vec<(String, UserAggregate)>,
    index: FxHashMap<String, usize>,
}

impl UserAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the user on first sighting. The name is fixed at that point:
    /// the entry's own name wins, then the resolver, then the raw id.
    pub fn ensure_user<R: DisplayNameResolver + ?Sized>(
        &mut self,
        user_id: &str,
        entry_name: Option<&str>,
        resolver: &R,
    ) -> NameSource {
        if self.index.contains_key(user_id) {
            return NameSource::Known;
        }

        let (display_name, source) = match entry_name.filter(|name| !name.is_empty()) {
            Some(name) => (name.to_string(), NameSource::FromEntry),
            None => match resolver.resolve(user_id) {
                Ok(name) if !name.is_empty() => (name, NameSource::Resolved),
                Ok(_) => {
                    warn!(user_id = %user_id, "display name lookup returned nothing, using user id");
                    (user_id.to_string(), NameSource::Degraded)
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "display name unavailable, using user id");
                    (user_id.to_string(), NameSource::Degraded)
                }
            },
        };

        self.insert(user_id, display_name);
        source
    }

    /// Create the user with a known name if unseen.
    pub fn ensure_user_named(&mut self, user_id: &str, display_name: String) {
        if !self.index.contains_key(user_id) {
            self.insert(user_id, display_name);
        }
    }

    fn insert(&mut self, user_id: &str, display_name: String) {
        self.index.insert(user_id.to_string(), self.users.len());
        self.users
            .push((user_id.to_string(), UserAggregate::new(display_name)));
    }

    /// Append a track to a user's list and totals.
    ///
    /// # Panics
    /// If `ensure_user` was never called for `user_id`.
    pub fn record(&mut self, user_id: &str, track: NormalizedTrack) {
        let idx = self.index[user_id];
        self.users[idx].1.push(track);
    }

    pub fn get(&self, user_id: &str) -> Option<&UserAggregate> {
        self.index.get(user_id).map(|&idx| &self.users[idx].1)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Read-only view in first-sighting order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UserAggregate)> {
        self.users.iter().map(|(id, user)| (id.as_str(), user))
    }

    pub fn into_table(self) -> UserTable {
        UserTable(self.users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawEntry, RawItem};
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn track(user: &str, name: &str, ms: u64) -> NormalizedTrack {
        let item = RawItem {
            id: name.to_string(),
            name: name.to_string(),
            duration_ms: ms,
            album_name: "Album".to_string(),
            artist_names: vec!["Artist".to_string()],
        };
        NormalizedTrack::from_item(&item, user, Utc::now(), 5)
    }

    fn entry(user: &str, name: Option<&str>, available: bool) -> RawEntry {
        RawEntry {
            added_by_user_id: user.to_string(),
            added_by_display_name: name.map(str::to_string),
            added_at: Utc::now(),
            item: if available {
                EntryItem::Available(RawItem {
                    id: "t".to_string(),
                    name: "Song".to_string(),
                    duration_ms: 1000,
                    album_name: "A".to_string(),
                    artist_names: vec![],
                })
            } else {
                EntryItem::Unavailable
            },
        }
    }

    #[test]
    fn test_entry_name_wins_over_resolver() {
        let calls = AtomicUsize::new(0);
        let resolver = FnResolver::new(|_: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok("Resolved".to_string())
        });
        let mut users = UserAggregator::new();
        let source = users.ensure_user("u1", Some("Alice"), &resolver);
        assert_eq!(source, NameSource::FromEntry);
        assert_eq!(users.get("u1").unwrap().display_name, "Alice");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resolver_used_when_entry_has_no_name() {
        let directory: NameDirectory = [("u1".to_string(), "Alice".to_string())]
            .into_iter()
            .collect();
        let mut users = UserAggregator::new();
        assert_eq!(users.ensure_user("u1", None, &directory), NameSource::Resolved);
        assert_eq!(users.ensure_user("u2", Some(""), &directory), NameSource::Degraded);
        assert_eq!(users.get("u1").unwrap().display_name, "Alice");
        assert_eq!(users.get("u2").unwrap().display_name, "u2");
    }

    #[test]
    fn test_failed_or_empty_lookup_degrades_to_id() {
        let failing = FnResolver::new(|id: &str| {
            Err(ResolveError::Failed {
                user_id: id.to_string(),
                reason: "503".to_string(),
            })
        });
        let empty = FnResolver::new(|_: &str| Ok(String::new()));
        let mut users = UserAggregator::new();
        assert_eq!(users.ensure_user("u1", None, &failing), NameSource::Degraded);
        assert_eq!(users.ensure_user("u2", None, &empty), NameSource::Degraded);
        assert_eq!(users.get("u1").unwrap().display_name, "u1");
        assert_eq!(users.get("u2").unwrap().display_name, "u2");
    }

    #[test]
    fn test_name_fixed_at_first_sighting() {
        let mut users = UserAggregator::new();
        users.ensure_user("u1", Some("Alice"), &NoResolver);
        assert_eq!(users.ensure_user("u1", Some("Alicia"), &NoResolver), NameSource::Known);
        assert_eq!(users.get("u1").unwrap().display_name, "Alice");
    }

    #[test]
    fn test_record_keeps_order_and_totals() {
        let mut users = UserAggregator::new();
        users.ensure_user("u1", Some("Alice"), &NoResolver);
        users.record("u1", track("u1", "First", 100_000));
        users.record("u1", track("u1", "Second", 50_500));

        let user = users.get("u1").unwrap();
        assert_eq!(user.song_count, 2);
        assert_eq!(user.total_duration_ms, 150_500);
        let names: Vec<_> = user.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
    }

    #[test]
    fn test_iter_in_first_sighting_order() {
        let mut users = UserAggregator::new();
        for id in ["zed", "amy", "zed", "bob"] {
            users.ensure_user(id, Some(id), &NoResolver);
        }
        let ids: Vec<_> = users.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["zed", "amy", "bob"]);
        assert_eq!(users.into_table().len(), 3);
    }

    #[test]
    fn test_users_needing_lookup() {
        let pages = vec![
            Page::new(0, vec![
                entry("u1", None, false),
                entry("u1", None, true),
                entry("u2", Some("Bob"), true),
            ]),
            Page::new(100, vec![entry("u2", None, true), entry("u3", Some(""), true)]),
        ];
        assert_eq!(users_needing_lookup(&pages), vec!["u1", "u3"]);
    }

    #[test]
    fn test_prefetched_names_serve_cached_results() {
        let pages = vec![Page::new(0, vec![entry("u1", None, true), entry("u2", None, true)])];
        let calls = AtomicUsize::new(0);
        let resolver = FnResolver::new(|id: &str| {
            calls.fetch_add(1, Ordering::SeqCst);
            if id == "u1" {
                Ok("Alice".to_string())
            } else {
                Err(ResolveError::NotFound(id.to_string()))
            }
        });

        let prefetched = PrefetchedNames::resolve_all(&pages, &resolver);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(prefetched.len(), 2);
        assert_eq!(prefetched.resolve("u1"), Ok("Alice".to_string()));
        assert!(prefetched.resolve("u2").is_err());
        assert!(prefetched.resolve("nobody").is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
