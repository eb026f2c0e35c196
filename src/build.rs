//! Build pipeline: sources -> candidates -> deduplication -> persisted list.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::config::{BuildConfig, FailurePolicy};
use crate::dedup::{Candidate, DedupStats, Deduplicator};
use crate::index::RangeIndex;
use crate::metadata::{BuildMetadata, SourceReport};
use crate::progress::Progress;
use crate::source::{FeedSource, TokenSource};
use crate::{Error, Result};

const FETCH_STAGE: &str = "fetch";

/// Aggregates sources into one deduplicated deny-list.
///
/// # Example
///
/// ```
/// use ipdeny::build::Builder;
/// use ipdeny::progress::NoProgress;
/// use ipdeny::source::{RangeListSource, TextListSource};
///
/// let output = Builder::new(&NoProgress)
///     .with_source(TextListSource::new("dc", "192.168.0.0/16\n"))
///     .with_source(RangeListSource::new("asn", "3232235776\t3232236031\n"))
///     .build()
///     .unwrap();
///
/// assert_eq!(output.to_list(), "192.168.0.0/16\n");
/// ```
pub struct Builder<'a> {
    sources: Vec<Box<dyn TokenSource + 'a>>,
    on_failure: FailurePolicy,
    on_invalid_entry: FailurePolicy,
    progress: &'a dyn Progress,
}

impl<'a> Builder<'a> {
    /// Create a builder with no sources and skip policies.
    pub fn new(progress: &'a dyn Progress) -> Self {
        Self {
            sources: Vec::new(),
            on_failure: FailurePolicy::Skip,
            on_invalid_entry: FailurePolicy::Skip,
            progress,
        }
    }

    /// Create a builder with one [`FeedSource`] per configured feed.
    pub fn from_config(config: &BuildConfig, progress: &'a dyn Progress) -> Self {
        let fetcher = config.fetcher();
        let mut builder = Self::new(progress)
            .on_failure(config.on_failure)
            .on_invalid_entry(config.on_invalid_entry);
        for feed in &config.feeds {
            builder = builder.with_source(FeedSource::new(feed.clone(), fetcher.clone()));
        }
        builder
    }

    /// Set the policy for sources that cannot be fetched.
    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Set the policy for malformed entries.
    pub fn on_invalid_entry(mut self, policy: FailurePolicy) -> Self {
        self.on_invalid_entry = policy;
        self
    }

    /// Add a source.
    pub fn with_source(mut self, source: impl TokenSource + 'a) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Number of sources added.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Collect every source and deduplicate the result.
    ///
    /// Fails when a policy says abort, or when every source is unavailable.
    pub fn build(&self) -> Result<BuildOutput> {
        let total = self.sources.len();
        self.progress.on_start(FETCH_STAGE, total);

        let mut candidates = Vec::new();
        let mut reports = Vec::with_capacity(total);
        let mut last_failure = None;

        for (i, source) in self.sources.iter().enumerate() {
            let mut report = SourceReport {
                name: source.name().to_string(),
                ..Default::default()
            };

            match source.candidates() {
                Ok(entries) => {
                    for entry in entries {
                        match entry {
                            Ok(candidate) => {
                                candidates.push(candidate);
                                report.accepted += 1;
                            }
                            Err(e) => {
                                if self.on_invalid_entry == FailurePolicy::Abort {
                                    return Err(e);
                                }
                                log::warn!("{}: skipping entry: {}", source.name(), e);
                                report.rejected += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    if self.on_failure == FailurePolicy::Abort {
                        return Err(e);
                    }
                    log::warn!("Skipping source {}: {}", source.name(), e);
                    report.failed = true;
                    last_failure = Some(e);
                }
            }

            self.progress.on_advance(FETCH_STAGE, i + 1, total);
            reports.push(report);
        }

        if total > 0 && reports.iter().all(|r| r.failed) {
            return Err(Error::SourceUnavailable {
                name: "all sources".to_string(),
                reason: last_failure.map(|e| e.to_string()).unwrap_or_default(),
            });
        }

        self.progress.on_finish(
            FETCH_STAGE,
            &format!("{} candidates from {} sources", candidates.len(), total),
        );

        let deduped = Deduplicator::with_progress(self.progress).run(candidates);
        Ok(BuildOutput {
            entries: deduped.entries,
            stats: deduped.stats,
            sources: reports,
        })
    }
}

/// Result of a build.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// Minimal entry set in emission order
    pub entries: Vec<Candidate>,
    pub stats: DedupStats,
    pub sources: Vec<SourceReport>,
}

impl BuildOutput {
    /// Render the persisted list format.
    pub fn to_list(&self) -> String {
        let mut list = Vec::new();
        write_list(&mut list, &self.entries)
            .ok()
            .and_then(|_| String::from_utf8(list).ok())
            .unwrap_or_default()
    }

    /// Addresses covered. Entries are disjoint, so sizes simply add up.
    pub fn address_count(&self) -> u64 {
        self.entries.iter().map(|c| c.block().size()).sum()
    }

    /// Build a query index over the entries.
    pub fn index(&self) -> RangeIndex {
        RangeIndex::from_candidates(self.entries.iter().copied())
    }

    /// Write the list to `path` atomically, plus its `.meta` sidecar.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<BuildMetadata> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let mut list = Vec::new();
        write_list(&mut list, &self.entries)?;
        let mut temp_name = path.as_os_str().to_os_string();
        temp_name.push(".tmp");
        let temp_path = std::path::PathBuf::from(temp_name);

        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&list)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp_path, path)?;

        let meta = BuildMetadata::for_list(
            &list,
            self.entries.len(),
            self.address_count(),
            self.sources.clone(),
        );
        meta.save_for(path)?;

        log::info!(
            "Saved {} entries ({} addresses) to {:?}",
            meta.entries,
            meta.addresses,
            path
        );
        Ok(meta)
    }
}

/// Write entries in the persisted list format.
pub fn write_list<W: Write>(mut writer: W, entries: &[Candidate]) -> Result<()> {
    for entry in entries {
        writeln!(writer, "{}", entry)?;
    }
    writer.flush()?;
    Ok(())
}
