//! Playlist deduplication and aggregation - shared modules for all binaries.

pub mod aggregate;
pub mod duplicates;
pub mod error;
pub mod fingerprint;
pub mod input;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod report;
pub mod store;
pub mod summary;
pub mod users;

pub use aggregate::{aggregate, aggregate_with, Aggregation, AggregationConfig};
pub use error::{AggregateError, InputError, ResolveError, StoreError};
pub use models::{
    EntryItem, Fingerprint, Page, PlaylistAggregate, PlaylistMetadata, RawEntry, RawItem, RunStats,
};
pub use users::{DisplayNameResolver, NoResolver};
