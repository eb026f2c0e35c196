//! Trie-driven deduplication of candidate blocks.
//!
//! Any two CIDR blocks are either disjoint or nested, never partially
//! overlapping. Visiting candidates broadest first and consulting the trie
//! before inserting therefore drops every block already covered by a kept
//! one in a single pass, with no interval merging.

use std::fmt;
use std::str::FromStr;

use crate::address::{format_addr, parse_addr, split_cidr, CidrBlock, ADDRESS_BITS};
use crate::progress::{NoProgress, Progress};
use crate::trie::PrefixTrie;
use crate::{Error, Result};

const STAGE: &str = "dedup";

/// A deny-list entry: a bare address or an explicit CIDR block.
///
/// The two forms are kept apart so the persisted list reproduces what the
/// feeds published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Candidate {
    /// Single address, an implicit /32.
    Address(u32),
    /// Explicit network.
    Block(CidrBlock),
}

impl Candidate {
    /// The block this entry covers.
    pub fn block(&self) -> CidrBlock {
        match self {
            Candidate::Address(addr) => CidrBlock::host(*addr),
            Candidate::Block(block) => *block,
        }
    }

    /// Prefix length; 32 for a bare address.
    pub fn prefix_len(&self) -> u8 {
        match self {
            Candidate::Address(_) => ADDRESS_BITS,
            Candidate::Block(block) => block.prefix_len(),
        }
    }

    /// First covered address.
    pub fn first(&self) -> u32 {
        self.block().first()
    }

    /// Last covered address (inclusive).
    pub fn last(&self) -> u32 {
        self.block().last()
    }
}

impl From<CidrBlock> for Candidate {
    fn from(block: CidrBlock) -> Self {
        Candidate::Block(block)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidate::Address(addr) => f.write_str(&format_addr(*addr)),
            Candidate::Block(block) => fmt::Display::fmt(block, f),
        }
    }
}

impl FromStr for Candidate {
    type Err = Error;

    /// Parse `a.b.c.d` or `a.b.c.d/n`.
    ///
    /// Host bits below the prefix are cleared rather than rejected, since
    /// feeds routinely publish `203.0.113.9/24` meaning the whole /24.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.contains('/') {
            let (addr, len) = split_cidr(s)?;
            let block = CidrBlock::truncated(addr, len)?;
            if block.base() != addr {
                log::debug!("normalized {} to {}", s, block);
            }
            Ok(Candidate::Block(block))
        } else {
            parse_addr(s).map(Candidate::Address)
        }
    }
}

/// Counters from one deduplication pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DedupStats {
    /// Candidates examined.
    pub input: usize,
    /// Candidates kept.
    pub kept: usize,
    /// Candidates dropped as covered by a kept entry.
    pub discarded: usize,
}

/// Result of a deduplication pass.
#[derive(Debug, Clone, Default)]
pub struct Deduplicated {
    /// Surviving entries in emission order: ascending prefix length, then
    /// input order.
    pub entries: Vec<Candidate>,
    pub stats: DedupStats,
}

/// Reduces a candidate collection to its minimal non-redundant subset.
///
/// # Examples
/// ```
/// use ipdeny::dedup::{Candidate, Deduplicator};
///
/// let input: Vec<Candidate> = ["192.168.1.0/24", "192.168.0.0/16"]
///     .iter()
///     .map(|s| s.parse().unwrap())
///     .collect();
/// let out = Deduplicator::new().run(input);
/// assert_eq!(out.entries.len(), 1);
/// assert_eq!(out.entries[0].to_string(), "192.168.0.0/16");
/// ```
pub struct Deduplicator<'a> {
    progress: &'a dyn Progress,
}

impl Deduplicator<'static> {
    /// Create a deduplicator that reports no progress.
    pub fn new() -> Self {
        Self {
            progress: &NoProgress,
        }
    }
}

impl Default for Deduplicator<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Deduplicator<'a> {
    /// Create a deduplicator reporting to `progress`.
    pub fn with_progress(progress: &'a dyn Progress) -> Self {
        Self { progress }
    }

    /// Run one pass over `candidates`.
    pub fn run<I>(&self, candidates: I) -> Deduplicated
    where
        I: IntoIterator<Item = Candidate>,
    {
        let mut entries: Vec<Candidate> = candidates.into_iter().collect();
        let total = entries.len();
        self.progress.on_start(STAGE, total);

        // Stable: equal prefix lengths keep their input order.
        entries.sort_by_key(Candidate::prefix_len);

        let mut trie = PrefixTrie::new();
        let mut kept = Vec::new();

        for (i, entry) in entries.into_iter().enumerate() {
            let key = entry.block().bit_prefix();
            if !trie.search(key) {
                trie.insert(key);
                kept.push(entry);
            }
            self.progress.on_advance(STAGE, i + 1, total);
        }

        let stats = DedupStats {
            input: total,
            kept: kept.len(),
            discarded: total - kept.len(),
        };
        self.progress.on_finish(
            STAGE,
            &format!(
                "kept {} of {} entries ({} trie nodes)",
                stats.kept,
                stats.input,
                trie.node_count()
            ),
        );

        Deduplicated {
            entries: kept,
            stats,
        }
    }
}

/// Deduplicate without progress reporting.
pub fn deduplicate<I>(candidates: I) -> Vec<Candidate>
where
    I: IntoIterator<Item = Candidate>,
{
    Deduplicator::new().run(candidates).entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::tests::RecordingProgress;

    fn candidates(items: &[&str]) -> Vec<Candidate> {
        items.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn strings(items: &[Candidate]) -> Vec<String> {
        items.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_parse_candidate() {
        assert_eq!(
            "10.0.0.1".parse::<Candidate>().unwrap(),
            Candidate::Address(0x0A00_0001)
        );
        let block = " 10.0.0.0/8 ".parse::<Candidate>().unwrap();
        assert_eq!(block.to_string(), "10.0.0.0/8");
        assert_eq!(block.prefix_len(), 8);
    }

    #[test]
    fn test_parse_candidate_normalizes_host_bits() {
        let block = "203.0.113.9/24".parse::<Candidate>().unwrap();
        assert_eq!(block.to_string(), "203.0.113.0/24");
    }

    #[test]
    fn test_parse_candidate_errors() {
        assert!(matches!(
            "10.0.0.0/40".parse::<Candidate>(),
            Err(Error::InvalidPrefixLength(_))
        ));
        assert!(matches!(
            "10.0.0.256".parse::<Candidate>(),
            Err(Error::InvalidAddressFormat(_))
        ));
    }

    #[test]
    fn test_nested_block_removed() {
        let out = deduplicate(candidates(&["192.168.0.0/16", "192.168.1.0/24"]));
        assert_eq!(strings(&out), vec!["192.168.0.0/16"]);
    }

    #[test]
    fn test_nested_block_removed_regardless_of_order() {
        let out = deduplicate(candidates(&["192.168.1.0/24", "192.168.0.0/16"]));
        assert_eq!(strings(&out), vec!["192.168.0.0/16"]);
    }

    #[test]
    fn test_disjoint_blocks_kept() {
        let out = deduplicate(candidates(&["10.0.0.0/24", "10.0.1.0/24"]));
        assert_eq!(strings(&out), vec!["10.0.0.0/24", "10.0.1.0/24"]);
    }

    #[test]
    fn test_addresses_and_duplicates() {
        let out = deduplicate(candidates(&[
            "10.0.0.5",
            "10.0.0.0/24",
            "8.8.8.8",
            "8.8.8.8",
            "8.8.8.8/32",
            "1.1.1.0/24",
            "1.1.1.0/24",
        ]));
        assert_eq!(strings(&out), vec!["10.0.0.0/24", "1.1.1.0/24", "8.8.8.8"]);
    }

    #[test]
    fn test_emission_order() {
        let out = deduplicate(candidates(&[
            "9.9.9.9",
            "20.0.0.0/8",
            "5.5.0.0/16",
            "10.0.0.0/8",
        ]));
        assert_eq!(
            strings(&out),
            vec!["20.0.0.0/8", "10.0.0.0/8", "5.5.0.0/16", "9.9.9.9"]
        );
    }

    #[test]
    fn test_default_route_swallows_everything() {
        let out = deduplicate(candidates(&["1.2.3.4", "0.0.0.0/0", "10.0.0.0/8"]));
        assert_eq!(strings(&out), vec!["0.0.0.0/0"]);
    }

    #[test]
    fn test_idempotent() {
        let once = deduplicate(candidates(&[
            "172.16.0.0/12",
            "172.16.4.0/22",
            "172.31.255.255",
            "100.64.0.0/10",
            "100.64.1.1",
            "192.0.2.0/24",
            "192.0.2.128/25",
            "198.51.100.7",
        ]));
        let twice = deduplicate(once.clone());
        assert_eq!(once, twice);
        assert_eq!(
            strings(&once),
            vec!["100.64.0.0/10", "172.16.0.0/12", "192.0.2.0/24", "198.51.100.7"]
        );
    }

    #[test]
    fn test_survivors_are_pairwise_disjoint() {
        let input: Vec<Candidate> = (0u32..500)
            .map(|i| {
                let addr = i.wrapping_mul(0x0101_3579) & 0x0FFF_FFFF;
                let len = 4 + (i % 29) as u8;
                Candidate::Block(CidrBlock::truncated(addr, len).unwrap())
            })
            .collect();
        let out = deduplicate(input.clone());

        for (i, a) in out.iter().enumerate() {
            for b in &out[i + 1..] {
                assert!(a.last() < b.first() || b.last() < a.first(), "{} overlaps {}", a, b);
            }
        }
        // Every input is still covered by some survivor.
        for c in &input {
            assert!(out.iter().any(|k| k.block().contains_block(&c.block())));
        }
    }

    #[test]
    fn test_stats_and_progress() {
        let progress = RecordingProgress::default();
        let out = Deduplicator::with_progress(&progress)
            .run(candidates(&["10.0.0.0/8", "10.1.0.0/16", "11.0.0.1"]));

        assert_eq!(
            out.stats,
            DedupStats {
                input: 3,
                kept: 2,
                discarded: 1
            }
        );
        let events = progress.events.lock().unwrap();
        assert_eq!(events.first().unwrap(), "start dedup 3");
        assert_eq!(events.len(), 5);
        assert!(events.last().unwrap().starts_with("finish dedup kept 2 of 3"));
    }
}
