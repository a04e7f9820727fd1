//! The aggregation pass: one sequential walk over offset-ordered pages
//! feeding the user accumulator and the duplicate index, then one fold.
//!
//! Per-user track order and duplicate contributor order both follow
//! `(page offset, index within page)`. Pages fetched concurrently must be
//! sorted before they reach this module; out-of-order input is rejected
//! rather than silently producing a different aggregate.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::duplicates::DuplicateIndex;
use crate::error::AggregateError;
use crate::fingerprint::DEFAULT_BUCKET_SECONDS;
use crate::models::{EntryItem, NormalizedTrack, Page, PlaylistAggregate, PlaylistMetadata, RunStats};
use crate::summary::SummaryComputer;
use crate::users::{DisplayNameResolver, NameSource, UserAggregator};

/// Tunables for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationConfig {
    /// Width of the duration bucket used in fingerprints.
    pub bucket_seconds: u64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            bucket_seconds: DEFAULT_BUCKET_SECONDS,
        }
    }
}

/// Run-scoped context. Exclusively owns both accumulators; dropped (or
/// consumed by `finish`) at the end of the run.
#[derive(Debug)]
pub struct Aggregation {
    config: AggregationConfig,
    users: UserAggregator,
    duplicates: DuplicateIndex,
    last_offset: Option<u32>,
    stats: RunStats,
    failed: bool,
}

impl Aggregation {
    pub fn new(config: AggregationConfig) -> Result<Self, AggregateError> {
        if config.bucket_seconds == 0 {
            return Err(AggregateError::InvalidConfig(
                "bucket_seconds must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            config,
            users: UserAggregator::new(),
            duplicates: DuplicateIndex::new(),
            last_offset: None,
            stats: RunStats::default(),
            failed: false,
        })
    }

    /// Feed the next page. Its offset must be greater than every offset seen so far.
    ///
    /// A rejected page leaves the accumulators untouched, but the run is
    /// poisoned: later pushes and `finish` return `AggregateError::Aborted`.
    pub fn push_page<R: DisplayNameResolver + ?Sized>(
        &mut self,
        page: &Page,
        resolver: &R,
    ) -> Result<(), AggregateError> {
        if self.failed {
            return Err(AggregateError::Aborted);
        }
        if let Err(e) = self.check_page(page) {
            self.failed = true;
            return Err(e);
        }

        self.last_offset = Some(page.offset);
        self.stats.pages += 1;

        for entry in &page.entries {
            self.stats.entries_seen += 1;

            let item = match &entry.item {
                EntryItem::Available(item) => item,
                EntryItem::Unavailable => {
                    self.stats.entries_unavailable += 1;
                    continue;
                }
            };

            let user_id = entry.added_by_user_id.as_str();
            match self.users.ensure_user(user_id, entry.display_name(), resolver) {
                NameSource::Known => {}
                NameSource::FromEntry => self.stats.names_from_entry += 1,
                NameSource::Resolved => self.stats.names_resolved += 1,
                NameSource::Degraded => self.stats.names_degraded += 1,
            }

            let track = NormalizedTrack::from_item(
                item,
                user_id,
                entry.added_at,
                self.config.bucket_seconds,
            );
            self.duplicates.record(&track);
            self.users.record(user_id, track);
            self.stats.tracks_recorded += 1;
        }

        debug!(
            offset = page.offset,
            entries = page.entries.len(),
            users = self.users.len(),
            "page aggregated"
        );
        Ok(())
    }

    /// Order and shape checks, run before anything is recorded.
    fn check_page(&self, page: &Page) -> Result<(), AggregateError> {
        if let Some(previous) = self.last_offset {
            if page.offset <= previous {
                return Err(AggregateError::PagesOutOfOrder {
                    previous,
                    found: page.offset,
                });
            }
        }

        let empty_id = page.entries.iter().position(|entry| {
            matches!(entry.item, EntryItem::Available(_)) && entry.added_by_user_id.is_empty()
        });
        if let Some(index) = empty_id {
            return Err(AggregateError::MalformedInput {
                offset: page.offset,
                index,
                reason: "entry has an empty added_by id".to_string(),
            });
        }
        Ok(())
    }

    pub fn users(&self) -> &UserAggregator {
        &self.users
    }

    pub fn duplicates(&self) -> &DuplicateIndex {
        &self.duplicates
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Fold the accumulators into the published aggregate.
    /// Fails if any earlier `push_page` was rejected.
    pub fn finish(
        mut self,
        metadata: &PlaylistMetadata,
        captured_at: DateTime<Utc>,
    ) -> Result<(PlaylistAggregate, RunStats), AggregateError> {
        if self.failed {
            return Err(AggregateError::Aborted);
        }

        let summary = SummaryComputer::compute(&self.users, &self.duplicates, metadata, captured_at);
        self.stats.fingerprint_groups = self.duplicates.groups().len();

        info!(
            songs = summary.total_songs,
            users = summary.user_count,
            duplicates = summary.duplicates_found,
            "aggregation complete"
        );

        let aggregate = PlaylistAggregate {
            metadata: summary,
            users: self.users.into_table(),
            duplicates: self.duplicates.into_duplicates(),
        };
        Ok((aggregate, self.stats))
    }
}

/// Aggregate a full, offset-sorted page sequence in one call.
pub fn aggregate<R: DisplayNameResolver + ?Sized>(
    pages: &[Page],
    metadata: &PlaylistMetadata,
    resolver: &R,
    captured_at: DateTime<Utc>,
) -> Result<PlaylistAggregate, AggregateError> {
    aggregate_with(pages, metadata, resolver, captured_at, AggregationConfig::default())
        .map(|(aggregate, _)| aggregate)
}

/// Like `aggregate`, with explicit config and the run statistics returned.
pub fn aggregate_with<R: DisplayNameResolver + ?Sized>(
    pages: &[Page],
    metadata: &PlaylistMetadata,
    resolver: &R,
    captured_at: DateTime<Utc>,
    config: AggregationConfig,
) -> Result<(PlaylistAggregate, RunStats), AggregateError> {
    let mut run = Aggregation::new(config)?;
    for page in pages {
        run.push_page(page, resolver)?;
    }
    run.finish(metadata, captured_at)
}
