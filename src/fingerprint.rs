//! Semantic fingerprints: the identity key used to spot the same work
//! uploaded under different metadata.
//!
//! Track ids only catch literally identical catalog entries. The same song
//! added from a single, an album and a compilation gets three ids, so the key
//! is built from (primary artist, title, duration bucket) instead.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::Fingerprint;
use crate::normalize::normalize;

/// Default width of a duration bucket, in seconds.
pub const DEFAULT_BUCKET_SECONDS: u64 = 5;

/// Joins the three key components. `normalize` never emits it.
pub const KEY_SEPARATOR: char = '|';

/// Featured-artist clause: the first standalone `feat`, `feat.`, `featuring`
/// or `with` and everything after it.
///
/// "with" also trims legitimate titles such as "Concerto with Strings".
/// Known false-positive source, kept deliberately.
pub static FEAT_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:feat\.?|featuring|with)\b.*$").expect("valid regex"));

/// Strip a trailing featuring clause, then normalize.
/// e.g., "Song A (feat. Y)" → "song a"
pub fn canonical_title(raw: &str) -> String {
    normalize(&FEAT_CLAUSE.replace(raw, ""))
}

/// Normalize the primary artist as supplied. Callers pass the first credited
/// artist only, never the joined credit list.
pub fn canonical_artist(primary: &str) -> String {
    normalize(primary)
}

/// Bucket a duration with the default width.
pub fn duration_bucket(duration_ms: u64) -> u64 {
    duration_bucket_with(duration_ms, DEFAULT_BUCKET_SECONDS)
}

/// Bucket a duration into half-open windows `[k * width, (k + 1) * width)`
/// seconds, reported as the window start.
///
/// 184_999 ms and 180_000 ms share bucket 180; 185_000 ms opens bucket 185.
/// `bucket_seconds` must be non-zero.
pub fn duration_bucket_with(duration_ms: u64, bucket_seconds: u64) -> u64 {
    let seconds = duration_ms / 1000;
    seconds / bucket_seconds * bucket_seconds
}

/// Build the semantic key with the default bucket width.
pub fn semantic_key(title: &str, primary_artist: &str, duration_ms: u64) -> Fingerprint {
    semantic_key_with(title, primary_artist, duration_ms, DEFAULT_BUCKET_SECONDS)
}

/// Build the semantic key `artist|title|bucket`.
pub fn semantic_key_with(
    title: &str,
    primary_artist: &str,
    duration_ms: u64,
    bucket_seconds: u64,
) -> Fingerprint {
    Fingerprint::new(format!(
        "{}{sep}{}{sep}{}",
        canonical_artist(primary_artist),
        canonical_title(title),
        duration_bucket_with(duration_ms, bucket_seconds),
        sep = KEY_SEPARATOR,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_title_strips_featuring() {
        assert_eq!(canonical_title("Song A (feat. Y)"), "song a");
        assert_eq!(canonical_title("Song A"), "song a");
        assert_eq!(canonical_title("Song A feat Y"), "song a");
        assert_eq!(canonical_title("Song A FEATURING Y & Z"), "song a");
        assert_eq!(canonical_title("Song A [with Y]"), "song a");
    }

    #[test]
    fn test_canonical_title_needs_standalone_word() {
        assert_eq!(canonical_title("Without You"), "without you");
        assert_eq!(canonical_title("Featherweight"), "featherweight");
        assert_eq!(canonical_title("Withering"), "withering");
    }

    #[test]
    fn test_canonical_title_with_overtrims() {
        // Documented false positive
        assert_eq!(canonical_title("Concerto with Strings"), "concerto");
    }

    #[test]
    fn test_canonical_title_first_occurrence_only() {
        assert_eq!(canonical_title("Dance With Me (feat. X)"), "dance");
    }

    #[test]
    fn test_canonical_artist_is_plain_normalize() {
        assert_eq!(canonical_artist("Artist X"), "artist x");
        assert_eq!(canonical_artist("artist x"), "artist x");
        assert_eq!(canonical_artist("Simon & Garfunkel"), "simon and garfunkel");
    }

    #[test]
    fn test_duration_bucket_boundaries() {
        assert_eq!(duration_bucket(180_000), 180);
        assert_eq!(duration_bucket(184_999), 180);
        assert_eq!(duration_bucket(185_000), 185);
        assert_eq!(duration_bucket(200_000), 200);
        assert_eq!(duration_bucket(201_000), 200);
        assert_eq!(duration_bucket(203_000), 200);
        assert_eq!(duration_bucket(0), 0);
    }

    #[test]
    fn test_duration_bucket_half_width_points() {
        // Exactly midway between bucket starts: stays in the lower window
        assert_eq!(duration_bucket(182_500), 180);
        assert_eq!(duration_bucket(187_500), 185);
        assert_eq!(
            semantic_key("Song A", "Artist X", 182_500),
            semantic_key("Song A", "Artist X", 180_000)
        );
        assert_ne!(
            semantic_key("Song A", "Artist X", 182_500),
            semantic_key("Song A", "Artist X", 187_500)
        );
    }

    #[test]
    fn test_duration_bucket_custom_width() {
        assert_eq!(duration_bucket_with(184_999, 10), 180);
        assert_eq!(duration_bucket_with(190_000, 10), 190);
        assert_eq!(duration_bucket_with(184_999, 1), 184);
    }

    #[test]
    fn test_semantic_key_shape() {
        assert_eq!(semantic_key("Song A", "Artist X", 200_000).as_str(), "artist x|song a|200");
    }

    #[test]
    fn test_semantic_key_case_and_diacritics_insensitive() {
        assert_eq!(
            semantic_key("Café", "Ärtïst", 200_000),
            semantic_key("cafe", "artist", 200_000)
        );
    }

    #[test]
    fn test_semantic_key_featuring_and_bucket() {
        assert_eq!(
            semantic_key("Song A (feat. Y)", "artist x", 201_000),
            semantic_key("Song A", "Artist X", 200_000)
        );
    }

    #[test]
    fn test_semantic_key_keeps_distinct_tracks_apart() {
        assert_ne!(
            semantic_key("Song A", "Artist X", 200_000),
            semantic_key("Song A", "Artist X", 205_000)
        );
        assert_ne!(
            semantic_key("Song A", "Artist X", 200_000),
            semantic_key("Song B", "Artist X", 200_000)
        );
        assert_ne!(
            semantic_key("Song A", "Artist X", 200_000),
            semantic_key("Song A", "Artist Y", 200_000)
        );
    }

    #[test]
    fn test_semantic_key_deterministic() {
        let a = semantic_key("Hoppípolla", "Sigur Rós", 268_000);
        let b = semantic_key("Hoppípolla", "Sigur Rós", 268_000);
        assert_eq!(a, b);
    }
}
