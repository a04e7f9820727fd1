//! Plain-text run report printed by the CLI.

use std::fmt;

use crate::models::PlaylistAggregate;
use crate::summary::format_duration;

/// Heading of the duplicate list section.
pub const DUPLICATE_SECTION: &str = "Duplicate groups:";

/// Totals, per-user lines in first-sighting order, then the duplicate list.
pub struct TextReport<'a>(pub &'a PlaylistAggregate);

impl fmt::Display for TextReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let aggregate = self.0;
        let meta = &aggregate.metadata;

        writeln!(f, "{:=<60}", "")?;
        writeln!(f, "{} (snapshot {})", meta.playlist_name, meta.snapshot_id)?;
        writeln!(f, "  Songs: {}", meta.total_songs)?;
        writeln!(f, "  Duration: {}", meta.total_duration_display)?;
        writeln!(f, "  Users: {}", meta.user_count)?;
        writeln!(f, "  Duplicates: {}", meta.duplicates_found)?;
        writeln!(f, "{:=<60}", "")?;

        for (id, user) in aggregate.users.iter() {
            writeln!(
                f,
                "{:<24} {:>5} songs  {:>10}  ({})",
                user.display_name,
                user.song_count,
                format_duration(user.total_duration_ms),
                id
            )?;
        }

        if aggregate.duplicates.is_empty() {
            return Ok(());
        }

        writeln!(f, "\n{}", DUPLICATE_SECTION)?;
        for group in &aggregate.duplicates {
            write!(f, "  {} - {} [{}x:", group.artist, group.song, group.contributors.len())?;
            for (i, contributor) in group.contributors.iter().enumerate() {
                let sep = if i == 0 { " " } else { ", " };
                write!(f, "{}{}", sep, contributor.user)?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}

pub fn render_text(aggregate: &PlaylistAggregate) -> String {
    TextReport(aggregate).to_string()
}
