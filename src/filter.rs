//! The address filter the host consults for admission control.

use crate::error::FilterStoreError;
use crate::range::AddressRange;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex, RwLock};
use tracing::debug;

/// Staging contract used by the importer.
///
/// `reset` starts a fresh staged set, `add_range` appends to it and `commit`
/// makes it the live set. Whether staged ranges are enforced before `commit`
/// is up to the implementation.
pub trait FilterStore: Send + Sync {
    fn reset(&self) -> Result<(), FilterStoreError>;
    fn add_range(&self, range: AddressRange) -> Result<(), FilterStoreError>;
    fn commit(&self) -> Result<(), FilterStoreError>;
}

/// Immutable, sorted and merged set of ranges used on the hot path.
#[derive(Debug, Default)]
pub struct RangeSet {
    // Inclusive (start, end), sorted by start, non-overlapping, non-adjacent
    ranges: Vec<(u32, u32)>,
}

impl RangeSet {
    pub fn build(input: &[AddressRange]) -> Self {
        let mut sorted: Vec<(u32, u32)> = input
            .iter()
            .map(|r| (u32::from(r.start), u32::from(r.end)))
            .collect();
        sorted.sort_unstable();

        let mut ranges: Vec<(u32, u32)> = Vec::with_capacity(sorted.len());
        for (start, end) in sorted {
            match ranges.last_mut() {
                Some(last) if start <= last.1.saturating_add(1) => {
                    last.1 = last.1.max(end);
                }
                _ => ranges.push((start, end)),
            }
        }
        Self { ranges }
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let ip = u32::from(ip);
        let idx = self.ranges.partition_point(|&(start, _)| start <= ip);
        idx > 0 && self.ranges[idx - 1].1 >= ip
    }

    /// Number of disjoint ranges after merging.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// In-memory filter store.
///
/// Live matching keeps answering from the last committed set until the next
/// `commit` swaps in the staged ranges.
#[derive(Debug, Default)]
pub struct RangeFilter {
    staged: Mutex<Vec<AddressRange>>,
    live: RwLock<Arc<RangeSet>>,
}

impl RangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blocked(&self, ip: Ipv4Addr) -> bool {
        self.live.read().unwrap().contains(ip)
    }

    /// Cheap handle to the live set for callers doing many lookups.
    pub fn live(&self) -> Arc<RangeSet> {
        self.live.read().unwrap().clone()
    }

    /// Ranges added since the last `reset`, in arrival order.
    pub fn staged(&self) -> Vec<AddressRange> {
        self.staged.lock().unwrap().clone()
    }
}

impl FilterStore for RangeFilter {
    fn reset(&self) -> Result<(), FilterStoreError> {
        self.staged.lock().unwrap().clear();
        Ok(())
    }

    fn add_range(&self, range: AddressRange) -> Result<(), FilterStoreError> {
        if range.start > range.end {
            return Err(FilterStoreError::InvertedRange {
                start: range.start,
                end: range.end,
            });
        }
        self.staged.lock().unwrap().push(range);
        Ok(())
    }

    fn commit(&self) -> Result<(), FilterStoreError> {
        let set = {
            let staged = self.staged.lock().unwrap();
            RangeSet::build(&staged)
        };
        debug!("Committing filter with {} merged ranges", set.len());
        *self.live.write().unwrap() = Arc::new(set);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(a: [u8; 4], b: [u8; 4]) -> AddressRange {
        AddressRange::new(Ipv4Addr::from(a), Ipv4Addr::from(b))
    }

    #[test]
    fn test_range_set_merges_overlaps() {
        let set = RangeSet::build(&[
            range([10, 0, 0, 10], [10, 0, 0, 20]),
            range([10, 0, 0, 0], [10, 0, 0, 9]),
            range([10, 0, 0, 15], [10, 0, 0, 30]),
            range([192, 168, 0, 1], [192, 168, 0, 1]),
            range([255, 255, 255, 0], [255, 255, 255, 255]),
        ]);

        assert_eq!(set.len(), 3);
        assert!(set.contains(Ipv4Addr::new(10, 0, 0, 0)));
        assert!(set.contains(Ipv4Addr::new(10, 0, 0, 30)));
        assert!(!set.contains(Ipv4Addr::new(10, 0, 0, 31)));
        assert!(set.contains(Ipv4Addr::new(192, 168, 0, 1)));
        assert!(!set.contains(Ipv4Addr::new(192, 168, 0, 2)));
        assert!(set.contains(Ipv4Addr::new(255, 255, 255, 255)));
        assert!(!set.contains(Ipv4Addr::new(9, 255, 255, 255)));
    }

    #[test]
    fn test_live_set_changes_only_on_commit() {
        let filter = RangeFilter::new();
        let ip = Ipv4Addr::new(1, 2, 3, 4);

        filter.reset().unwrap();
        filter.add_range(range([1, 2, 3, 0], [1, 2, 3, 255])).unwrap();
        assert!(!filter.is_blocked(ip));

        filter.commit().unwrap();
        assert!(filter.is_blocked(ip));

        // A new staging round leaves the old set live
        filter.reset().unwrap();
        assert!(filter.staged().is_empty());
        assert!(filter.is_blocked(ip));

        filter.commit().unwrap();
        assert!(!filter.is_blocked(ip));
        assert!(filter.live().is_empty());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let filter = RangeFilter::new();
        let err = filter
            .add_range(range([9, 9, 9, 9], [1, 1, 1, 1]))
            .unwrap_err();
        assert!(matches!(err, FilterStoreError::InvertedRange { .. }));
        assert!(filter.staged().is_empty());
    }
}
