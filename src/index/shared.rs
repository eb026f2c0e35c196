//! Atomically replaceable index handle.

use arc_swap::ArcSwap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::RangeIndex;
use crate::Result;

/// A [`RangeIndex`] shared between query threads.
///
/// Rebuilt indexes are published with [`SharedIndex::replace`]; queries
/// already running keep the snapshot they started with. The index itself is
/// never modified in place.
///
/// # Example
///
/// ```ignore
/// use ipdeny::{RangeIndex, SharedIndex};
///
/// let shared = SharedIndex::new(RangeIndex::open("blocklist.txt")?);
/// assert!(!shared.is_blocked([127, 0, 0, 1]));
///
/// // Later, after a new build
/// shared.reload("blocklist.txt")?;
/// ```
pub struct SharedIndex {
    inner: ArcSwap<RangeIndex>,
    /// Bumped on every replacement.
    generation: AtomicU64,
}

impl SharedIndex {
    /// Wrap an already built index.
    pub fn new(index: RangeIndex) -> Self {
        Self {
            inner: ArcSwap::from_pointee(index),
            generation: AtomicU64::new(0),
        }
    }

    /// Start with an empty index.
    pub fn empty() -> Self {
        Self::new(RangeIndex::new())
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<RangeIndex> {
        self.inner.load_full()
    }

    /// Query the current snapshot.
    pub fn is_blocked(&self, addr: impl Into<Ipv4Addr>) -> bool {
        self.inner.load().is_blocked(addr)
    }

    /// Publish a new index.
    pub fn replace(&self, index: RangeIndex) {
        let ranges = index.range_count();
        self.inner.store(Arc::new(index));
        self.generation.fetch_add(1, Ordering::SeqCst);
        log::debug!("Published index with {} ranges", ranges);
    }

    /// Load a persisted list from disk and publish it.
    ///
    /// On error the current index stays in place.
    pub fn reload(&self, path: impl AsRef<Path>) -> Result<()> {
        let index = RangeIndex::open(path.as_ref())?;
        self.replace(index);
        log::info!("Reloaded index from {:?}", path.as_ref());
        Ok(())
    }

    /// Number of replacements since creation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl Default for SharedIndex {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_replace_swaps_snapshot() {
        let shared = SharedIndex::empty();
        assert!(!shared.is_blocked([10, 1, 2, 3]));

        let old = shared.snapshot();
        shared.replace(RangeIndex::load("10.0.0.0/8".as_bytes()).unwrap());

        assert!(shared.is_blocked([10, 1, 2, 3]));
        assert!(!old.is_blocked([10, 1, 2, 3]));
        assert_eq!(shared.generation(), 1);
    }

    #[test]
    fn test_reload_keeps_old_index_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        fs::write(&path, "192.0.2.0/24\n").unwrap();

        let shared = SharedIndex::empty();
        shared.reload(&path).unwrap();
        assert!(shared.is_blocked([192, 0, 2, 9]));

        fs::write(&path, "192.0.2.0/24\ngarbage\n").unwrap();
        assert!(shared.reload(&path).is_err());
        assert!(shared.is_blocked([192, 0, 2, 9]));
        assert_eq!(shared.generation(), 1);

        assert!(shared.reload(dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_concurrent_readers() {
        let shared = SharedIndex::new(RangeIndex::load("172.16.0.0/12".as_bytes()).unwrap());

        std::thread::scope(|s| {
            for t in 0..4u32 {
                let shared = &shared;
                s.spawn(move || {
                    for i in 0..10_000u32 {
                        let addr = 0xAC10_0000 | ((i * 7 + t) & 0x000F_FFFF);
                        assert!(shared.is_blocked(addr));
                    }
                });
            }
            shared.replace(RangeIndex::load("172.16.0.0/12\n10.0.0.0/8".as_bytes()).unwrap());
        });

        assert!(shared.is_blocked([10, 0, 0, 1]));
    }
}
