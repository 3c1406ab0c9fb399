//! Decides whether the cached list is still good enough to import from.

use std::path::Path;
use std::time::{Duration, SystemTime};

const SECS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Download regardless of the cache.
    Force,
    /// Reuse the cache unless it has gone stale.
    UseCacheIfFresh,
}

/// Modification time of the cache file, or `None` if it can't be stat'ed.
pub fn cache_modified(path: impl AsRef<Path>) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// A stale cache forces a download even when the caller asked to reuse it.
///
/// `refresh_days <= 0` means every import downloads. A modification time in
/// the future counts as age zero.
pub fn should_refetch(
    cache_modified: Option<SystemTime>,
    mode: FetchMode,
    refresh_days: i64,
    now: SystemTime,
) -> bool {
    let Some(modified) = cache_modified else {
        return true;
    };
    if mode == FetchMode::Force || refresh_days <= 0 {
        return true;
    }

    let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
    let max_age = Duration::from_secs((refresh_days as u64).saturating_mul(SECS_PER_DAY));
    age >= max_age
}
