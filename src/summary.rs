//! Whole-collection statistics folded from the two accumulators.

use chrono::{DateTime, Utc};

use crate::duplicates::DuplicateIndex;
use crate::models::{PlaylistMetadata, PlaylistSummary};
use crate::users::UserAggregator;

/// Format milliseconds as `H:MM:SS` when there is an hour component, else `M:SS`.
/// Sub-second remainders are truncated.
pub fn format_duration(duration_ms: u64) -> String {
    let total_seconds = duration_ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Pure fold over the accumulators. Holds no state of its own.
pub struct SummaryComputer;

impl SummaryComputer {
    /// `captured_at` is the caller's capture time, published as `lastUpdated`.
    pub fn compute(
        users: &UserAggregator,
        duplicates: &DuplicateIndex,
        metadata: &PlaylistMetadata,
        captured_at: DateTime<Utc>,
    ) -> PlaylistSummary {
        let total_songs = users.iter().map(|(_, user)| user.song_count).sum();
        let total_duration_ms: u64 = users.iter().map(|(_, user)| user.total_duration_ms).sum();

        PlaylistSummary {
            playlist_name: metadata.name.clone(),
            playlist_image_url: metadata.image_url.clone(),
            snapshot_id: metadata.snapshot_id.clone(),
            total_songs,
            total_duration_display: format_duration(total_duration_ms),
            user_count: users.len(),
            duplicates_found: duplicates.duplicate_count(),
            last_updated: captured_at,
        }
    }
}
