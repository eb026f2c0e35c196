//! ipdeny - IPv4 deny-list aggregation and lookup.
//!
//! This crate merges IPv4 deny-list feeds (single addresses, CIDR blocks and
//! numeric start/end ranges) into one minimal, non-redundant list, and answers
//! "is this address blocked?" queries against the result.
//!
//! # Features
//!
//! - **Range decomposition**: Arbitrary inclusive ranges become the minimal
//!   sequence of aligned CIDR blocks
//! - **Deduplication**: A path-compressed binary trie drops every entry
//!   already covered by a broader one, in a single pass
//! - **Lookup**: Binary search over sorted disjoint ranges
//! - **Hot reload**: [`SharedIndex`] swaps in a rebuilt index without
//!   blocking readers
//! - **Feeds**: Remote or local lists, plain or gzip, with bounded retries
//!
//! # Quick Start
//!
//! ```
//! use ipdeny::{Candidate, RangeIndex};
//!
//! let entries: Vec<Candidate> = ["10.0.0.0/8", "10.1.0.0/16", "203.0.113.7"]
//!     .iter()
//!     .map(|s| s.parse().unwrap())
//!     .collect();
//!
//! let index = RangeIndex::from_candidates(entries);
//! assert_eq!(index.range_count(), 2);
//! assert!(index.is_blocked([10, 200, 0, 1]));
//! assert!(!index.is_blocked([11, 0, 0, 1]));
//! ```
//!
//! # Building a list
//!
//! ```ignore
//! use ipdeny::{BuildConfig, Builder, LogProgress};
//!
//! let config = BuildConfig::load("feeds.yml")?;
//! let progress = LogProgress::default();
//! let output = Builder::from_config(&config, &progress).build()?;
//! output.save("blocklist.txt")?;
//! ```
//!
//! # List format
//!
//! One entry per line: `a.b.c.d` for a single address, `a.b.c.d/n` for a
//! block. Blank lines and `#` comments are ignored on input.

mod error;

pub mod address;
pub mod build;
pub mod config;
pub mod decompose;
pub mod dedup;
pub mod index;
pub mod metadata;
pub mod progress;
pub mod source;
pub mod trie;

// Re-export core types
pub use address::{BitPrefix, CidrBlock};
pub use decompose::decompose;
pub use dedup::{deduplicate, Candidate, DedupStats, Deduplicator};
pub use error::{Error, Result};
pub use trie::PrefixTrie;

// Re-export lookup types
pub use index::{AddrRange, RangeIndex, SharedIndex};

// Re-export build pipeline
pub use build::{write_list, BuildOutput, Builder};
pub use config::{BuildConfig, FailurePolicy, FeedConfig};
pub use metadata::{BuildMetadata, SourceReport};
pub use progress::{LogProgress, NoProgress, Progress};
pub use source::{FeedFormat, TokenSource};
