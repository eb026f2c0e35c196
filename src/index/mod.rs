//! Sorted range index for membership queries.
//!
//! Built once from a deduplicated entry set and never mutated afterwards,
//! so it can be shared across threads and queried without locking.

mod shared;

pub use shared::SharedIndex;

use std::cmp::Ordering;
use std::fs::File;
use std::io::Read;
use std::net::Ipv4Addr;
use std::path::Path;

use crate::address::parse_addr;
use crate::dedup::{deduplicate, Candidate};
use crate::source::text::read_tokens;
use crate::Result;

/// Inclusive address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddrRange {
    pub start: u32,
    pub end: u32,
}

impl AddrRange {
    /// Number of addresses in the range.
    pub fn size(&self) -> u64 {
        (self.end - self.start) as u64 + 1
    }

    /// Check whether `addr` lies within the range.
    pub fn contains(&self, addr: u32) -> bool {
        self.start <= addr && addr <= self.end
    }
}

/// Read-only index of disjoint address ranges.
///
/// # Examples
/// ```
/// use ipdeny::RangeIndex;
///
/// let index = RangeIndex::load("1.1.1.0/24\n".as_bytes()).unwrap();
/// assert!(index.is_blocked_str("1.1.1.5").unwrap());
/// assert!(!index.is_blocked_str("1.1.2.5").unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RangeIndex {
    /// Sorted by start, pairwise disjoint
    ranges: Vec<AddrRange>,
    /// Sum of range sizes
    total: u64,
}

impl RangeIndex {
    /// Create an empty index. Every query answers "not blocked".
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary candidates.
    ///
    /// Candidates are deduplicated first, so overlapping or nested input is
    /// accepted; the index only ever holds disjoint ranges.
    pub fn from_candidates<I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = Candidate>,
    {
        let mut ranges: Vec<AddrRange> = deduplicate(candidates)
            .iter()
            .map(|c| AddrRange {
                start: c.first(),
                end: c.last(),
            })
            .collect();
        ranges.sort_unstable_by_key(|r| r.start);
        let total = ranges.iter().map(AddrRange::size).sum();

        Self { ranges, total }
    }

    /// Load a persisted token list, failing on the first malformed line.
    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let candidates = read_tokens(reader)?
            .into_iter()
            .collect::<Result<Vec<Candidate>>>()?;
        Ok(Self::from_candidates(candidates))
    }

    /// Load a persisted token list, skipping malformed lines with a warning.
    pub fn load_lossy<R: Read>(reader: R) -> Result<Self> {
        let mut skipped = 0usize;
        let candidates: Vec<Candidate> = read_tokens(reader)?
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(c) => Some(c),
                Err(e) => {
                    log::warn!("skipping entry: {}", e);
                    skipped += 1;
                    None
                }
            })
            .collect();
        if skipped > 0 {
            log::warn!("skipped {} malformed entries", skipped);
        }
        Ok(Self::from_candidates(candidates))
    }

    /// Open a persisted list from disk (strict).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let index = Self::load(File::open(path)?)?;
        log::info!(
            "Loaded {} ranges ({} addresses) from {:?}",
            index.range_count(),
            index.total_address_count(),
            path
        );
        Ok(index)
    }

    /// Check whether an address is covered by any range.
    ///
    /// Accepts `u32`, `Ipv4Addr` or `[u8; 4]`.
    pub fn is_blocked(&self, addr: impl Into<Ipv4Addr>) -> bool {
        let addr = u32::from(addr.into());
        self.ranges
            .binary_search_by(|range| {
                if addr < range.start {
                    Ordering::Greater
                } else if addr > range.end {
                    Ordering::Less
                } else {
                    Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Parse a dotted quad and check it.
    pub fn is_blocked_str(&self, addr: &str) -> Result<bool> {
        Ok(self.is_blocked(parse_addr(addr)?))
    }

    /// Total number of addresses covered.
    pub fn total_address_count(&self) -> u64 {
        self.total
    }

    /// Number of disjoint ranges.
    pub fn range_count(&self) -> usize {
        self.ranges.len()
    }

    /// Check if the index holds no ranges.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The ranges, ascending by start.
    pub fn ranges(&self) -> &[AddrRange] {
        &self.ranges
    }
}
