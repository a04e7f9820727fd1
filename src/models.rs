//! Core data models for playlist aggregation.
//!
//! This module contains the input records as delivered by the catalog,
//! the normalized per-entry track, the two accumulator records and the
//! published aggregate. Serialized field names match the JSON consumed by
//! the existing renderers and must not change.

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::summary::format_duration;

// ============================================================================
// Input Models
// ============================================================================

/// Catalog item behind a playlist entry.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RawItem {
    pub id: String,
    pub name: String,
    pub duration_ms: u64,
    #[serde(rename = "album", deserialize_with = "de::album_name")]
    pub album_name: String,
    #[serde(rename = "artists", deserialize_with = "de::artist_names")]
    pub artist_names: Vec<String>,
}

impl RawItem {
    /// First credited artist, or "" for an item with no credits.
    pub fn primary_artist(&self) -> &str {
        self.artist_names.first().map(String::as_str).unwrap_or("")
    }
}

/// Whether the catalog still serves the item behind an entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntryItem {
    Available(RawItem),
    /// The underlying item was removed or region-locked; the catalog sends `null`.
    Unavailable,
}

/// One playlist entry as returned by the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(from = "de::WireEntry")]
pub struct RawEntry {
    pub added_by_user_id: String,
    pub added_by_display_name: Option<String>,
    pub added_at: DateTime<Utc>,
    pub item: EntryItem,
}

impl RawEntry {
    /// Display name carried on the entry itself. Empty strings count as absent.
    pub fn display_name(&self) -> Option<&str> {
        self.added_by_display_name
            .as_deref()
            .filter(|name| !name.is_empty())
    }
}

/// One fetched page of entries plus the offset it was requested at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub offset: u32,
    pub entries: Vec<RawEntry>,
}

impl Page {
    pub fn new(offset: u32, entries: Vec<RawEntry>) -> Self {
        Self { offset, entries }
    }
}

/// Run metadata handed over by the fetch collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaylistMetadata {
    pub name: String,
    pub image_url: String,
    pub snapshot_id: String,
}

/// Playlist metadata response from the catalog:
/// `snapshot_id`, `name`, `images[]`, `tracks.total`.
#[derive(Clone, Debug, Deserialize)]
pub struct MetadataResponse {
    pub snapshot_id: String,
    pub name: String,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    pub tracks: TrackTotal,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ImageRef {
    pub url: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrackTotal {
    pub total: u32,
}

impl From<MetadataResponse> for PlaylistMetadata {
    fn from(response: MetadataResponse) -> Self {
        Self {
            image_url: response
                .images
                .into_iter()
                .next()
                .map(|image| image.url)
                .unwrap_or_default(),
            name: response.name,
            snapshot_id: response.snapshot_id,
        }
    }
}

// ============================================================================
// Fingerprint
// ============================================================================

/// Semantic identity key: `artist|title|bucket`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Normalized Track
// ============================================================================

/// Per-entry track derived once from an available item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTrack {
    pub id: String,
    pub name: String,
    pub duration_ms: u64,
    #[serde(rename = "durationTimestamp")]
    pub duration_display: String,
    pub album: String,
    /// All credited artists joined by ", " in credit order.
    pub artist: String,
    #[serde(rename = "addedBy")]
    pub added_by_user_id: String,
    #[serde(serialize_with = "ser::millis")]
    pub added_at: DateTime<Utc>,
    #[serde(skip)]
    pub fingerprint: Fingerprint,
}

impl NormalizedTrack {
    /// Normalize an item. The fingerprint uses the primary artist only.
    pub fn from_item(
        item: &RawItem,
        added_by_user_id: &str,
        added_at: DateTime<Utc>,
        bucket_seconds: u64,
    ) -> Self {
        let fingerprint = crate::fingerprint::semantic_key_with(
            &item.name,
            item.primary_artist(),
            item.duration_ms,
            bucket_seconds,
        );
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            duration_ms: item.duration_ms,
            duration_display: format_duration(item.duration_ms),
            album: item.album_name.clone(),
            artist: item.artist_names.join(", "),
            added_by_user_id: added_by_user_id.to_string(),
            added_at,
            fingerprint,
        }
    }
}

// ============================================================================
// Accumulator Records
// ============================================================================

/// Everything one user contributed, in processing order.
///
/// Invariants: `song_count == tracks.len()` and
/// `total_duration_ms == sum(tracks[i].duration_ms)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAggregate {
    pub display_name: String,
    pub song_count: usize,
    // Misspelling is part of the published format.
    #[serde(rename = "totalLenghtMs")]
    pub total_duration_ms: u64,
    pub tracks: Vec<NormalizedTrack>,
}

impl UserAggregate {
    pub fn new(display_name: String) -> Self {
        Self {
            display_name,
            song_count: 0,
            total_duration_ms: 0,
            tracks: Vec::new(),
        }
    }

    pub fn push(&mut self, track: NormalizedTrack) {
        self.song_count += 1;
        self.total_duration_ms += track.duration_ms;
        self.tracks.push(track);
    }
}

/// One sighting of a fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Contributor {
    pub user: String,
    // Capitalization is part of the published format.
    #[serde(rename = "AddedAt", serialize_with = "ser::millis")]
    pub added_at: DateTime<Utc>,
}

/// All entries sharing a fingerprint. Display identity comes from the
/// first-seen track. A duplicate only when `contributors.len() > 1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    #[serde(skip)]
    pub fingerprint: Fingerprint,
    pub song: String,
    pub artist: String,
    #[serde(rename = "addedBy")]
    pub contributors: Vec<Contributor>,
}

impl DuplicateGroup {
    pub fn is_duplicate(&self) -> bool {
        self.contributors.len() > 1
    }
}

// ============================================================================
// Output Models
// ============================================================================

/// Whole-collection statistics. Serialized as the `metadata` object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSummary {
    pub playlist_name: String,
    #[serde(rename = "playlistImage")]
    pub playlist_image_url: String,
    pub snapshot_id: String,
    pub total_songs: usize,
    #[serde(rename = "totalDuration")]
    pub total_duration_display: String,
    pub user_count: usize,
    pub duplicates_found: usize,
    #[serde(serialize_with = "ser::millis")]
    pub last_updated: DateTime<Utc>,
}

/// Users in first-sighting order. Serialized as a JSON object keyed by user id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserTable(pub Vec<(String, UserAggregate)>);

impl UserTable {
    pub fn get(&self, user_id: &str) -> Option<&UserAggregate> {
        self.0
            .iter()
            .find(|(id, _)| id == user_id)
            .map(|(_, user)| user)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UserAggregate)> {
        self.0.iter().map(|(id, user)| (id.as_str(), user))
    }
}

impl Serialize for UserTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, user) in &self.0 {
            map.serialize_entry(id, user)?;
        }
        map.end()
    }
}

/// The published aggregate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlaylistAggregate {
    pub metadata: PlaylistSummary,
    pub users: UserTable,
    /// Only groups with more than one contributor, in first-seen order.
    pub duplicates: Vec<DuplicateGroup>,
}

impl PlaylistAggregate {
    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Per-run counters. Logged and optionally written to disk by the CLI; never published.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub pages: usize,
    pub entries_seen: usize,
    pub entries_unavailable: usize,
    pub tracks_recorded: usize,
    pub names_from_entry: usize,
    pub names_resolved: usize,
    pub names_degraded: usize,
    pub fingerprint_groups: usize,
}

impl RunStats {
    /// One structured `info` event carrying every counter.
    pub fn log(&self) {
        tracing::info!(
            pages = self.pages,
            entries_seen = self.entries_seen,
            entries_unavailable = self.entries_unavailable,
            tracks_recorded = self.tracks_recorded,
            names_from_entry = self.names_from_entry,
            names_resolved = self.names_resolved,
            names_degraded = self.names_degraded,
            fingerprint_groups = self.fingerprint_groups,
            "run statistics"
        );
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// Wire Shapes
// ============================================================================

mod ser {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::Serializer;

    /// RFC 3339 UTC with millisecond precision: `2024-01-01T00:00:00.000Z`.
    pub fn millis<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

mod de {
    use super::*;
    use serde::Deserializer;

    #[derive(Deserialize)]
    pub struct WireUser {
        pub id: String,
        #[serde(default)]
        pub display_name: Option<String>,
    }

    #[derive(Deserialize)]
    pub struct WireEntry {
        pub added_at: DateTime<Utc>,
        pub added_by: WireUser,
        #[serde(default)]
        pub track: Option<RawItem>,
    }

    impl From<WireEntry> for RawEntry {
        fn from(wire: WireEntry) -> Self {
            Self {
                added_by_user_id: wire.added_by.id,
                added_by_display_name: wire.added_by.display_name,
                added_at: wire.added_at,
                item: wire.track.map_or(EntryItem::Unavailable, EntryItem::Available),
            }
        }
    }

    #[derive(Deserialize)]
    struct Named {
        name: String,
    }

    pub fn album_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Named::deserialize(deserializer).map(|album| album.name)
    }

    pub fn artist_names<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<String>, D::Error> {
        Vec::<Named>::deserialize(deserializer)
            .map(|artists| artists.into_iter().map(|artist| artist.name).collect())
    }
}
