//! Loading fetched pages and run metadata from disk.
//!
//! Page files are parsed concurrently, then sorted by offset before anything
//! is aggregated. Completion order of the parallel parse never leaks into
//! the aggregation order.

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::InputError;
use crate::models::{MetadataResponse, Page, PlaylistMetadata, RawEntry};
use crate::users::NameDirectory;

/// Page size the catalog serves; offsets are multiples of it.
pub const PAGE_LIMIT: u32 = 100;

/// Trailing digits of a file stem: "page-0300" → 300
static TRAILING_DIGITS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)$").expect("valid regex"));

/// Tracks page as returned by the catalog. `offset` is optional because the
/// catalog echoes it only when the request asked for it.
#[derive(Debug, Deserialize)]
struct PageFile {
    #[serde(default)]
    offset: Option<u32>,
    items: Vec<RawEntry>,
}

/// Offsets the fetch collaborator has to request for a playlist of `total` entries.
pub fn page_offsets(total: u32) -> Vec<u32> {
    (0..total).step_by(PAGE_LIMIT as usize).collect()
}

/// Restore ascending offset order after a concurrent fetch.
pub fn sort_pages(pages: &mut [Page]) {
    pages.sort_by_key(|page| page.offset);
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, InputError> {
    let text = fs::read_to_string(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| InputError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn offset_from_name(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    TRAILING_DIGITS
        .captures(stem)
        .and_then(|caps| caps[1].parse().ok())
}

/// Parse one page file.
pub fn load_page(path: &Path) -> Result<Page, InputError> {
    let file: PageFile = read_json(path)?;
    let offset = file
        .offset
        .or_else(|| offset_from_name(path))
        .ok_or_else(|| InputError::MissingOffset(path.to_path_buf()))?;
    Ok(Page::new(offset, file.items))
}

/// All `*.json` files directly inside `dir`, sorted by name.
pub fn list_page_files(dir: &Path) -> Result<Vec<PathBuf>, InputError> {
    let io_err = |source| InputError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Parse every file in parallel, then sort by offset.
///
/// `on_loaded` is called once per parsed file, from worker threads.
/// Two files claiming the same offset are rejected.
pub fn load_pages<F>(files: &[PathBuf], on_loaded: F) -> Result<Vec<Page>, InputError>
where
    F: Fn() + Sync,
{
    let loaded: Vec<(PathBuf, Page)> = files
        .par_iter()
        .map(|path| -> Result<(PathBuf, Page), InputError> {
            let page = load_page(path)?;
            on_loaded();
            Ok((path.clone(), page))
        })
        .collect::<Result<_, _>>()?;

    let mut owners: FxHashMap<u32, &PathBuf> = FxHashMap::default();
    for (path, page) in &loaded {
        if let Some(first) = owners.insert(page.offset, path) {
            return Err(InputError::DuplicateOffset {
                offset: page.offset,
                first: first.clone(),
                second: path.clone(),
            });
        }
    }

    let mut pages: Vec<Page> = loaded.into_iter().map(|(_, page)| page).collect();
    sort_pages(&mut pages);
    Ok(pages)
}

/// Playlist metadata response, as saved by the fetch collaborator.
pub fn load_metadata(path: &Path) -> Result<(PlaylistMetadata, u32), InputError> {
    let response: MetadataResponse = read_json(path)?;
    let total = response.tracks.total;
    Ok((PlaylistMetadata::from(response), total))
}

/// JSON object mapping user id to display name.
pub fn load_names(path: &Path) -> Result<NameDirectory, InputError> {
    let names: FxHashMap<String, String> = read_json(path)?;
    Ok(NameDirectory::new(names))
}
