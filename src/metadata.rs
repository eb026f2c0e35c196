//! Build metadata stored next to a persisted list.
//!
//! Every list file `blocklist.txt` gets a JSON sidecar `blocklist.txt.meta`
//! recording when it was built, what it covers and a checksum of its bytes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::Result;

/// Per-source counts from a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub name: String,
    /// Entries parsed successfully
    pub accepted: usize,
    /// Malformed entries skipped
    pub rejected: usize,
    /// The source could not be fetched and was skipped
    pub failed: bool,
}

/// Metadata describing one persisted build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildMetadata {
    /// Build time in Unix seconds
    #[serde(default)]
    pub built_at: Option<u64>,
    /// Entries in the list
    pub entries: usize,
    /// Addresses covered by the list
    pub addresses: u64,
    /// Hex SHA-256 of the list file
    pub checksum: String,
    #[serde(default)]
    pub sources: Vec<SourceReport>,
}

/// Hex-encoded SHA-256 of `data`.
pub fn checksum_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Path of the metadata sidecar for a list file: `<list>.meta`.
pub fn metadata_path(list_path: &Path) -> PathBuf {
    let mut name = list_path.as_os_str().to_os_string();
    name.push(".meta");
    PathBuf::from(name)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl BuildMetadata {
    /// Describe list bytes built now.
    pub fn for_list(
        list: &[u8],
        entries: usize,
        addresses: u64,
        sources: Vec<SourceReport>,
    ) -> Self {
        Self {
            built_at: Some(unix_now()),
            entries,
            addresses,
            checksum: checksum_hex(list),
            sources,
        }
    }

    /// Read the sidecar of the list at `list_path`.
    ///
    /// A list without a sidecar gets default metadata, which is always stale
    /// and never verifies.
    pub fn load_for(list_path: impl AsRef<Path>) -> Result<Self> {
        let path = metadata_path(list_path.as_ref());
        match fs::read(&path) {
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the sidecar of the list at `list_path`.
    pub fn save_for(&self, list_path: impl AsRef<Path>) -> Result<()> {
        let path = metadata_path(list_path.as_ref());
        fs::write(&path, serde_json::to_vec_pretty(self)?)?;
        log::debug!("Wrote build metadata to {:?}", path);
        Ok(())
    }

    /// Check that `list` is the content this metadata was written for.
    pub fn verify(&self, list: &[u8]) -> bool {
        !self.checksum.is_empty() && self.checksum == checksum_hex(list)
    }

    /// Check the list file at `list_path` against the recorded checksum.
    pub fn verify_file(&self, list_path: impl AsRef<Path>) -> Result<bool> {
        Ok(self.verify(&fs::read(list_path)?))
    }

    /// When the list was built, if recorded.
    pub fn built_time(&self) -> Option<SystemTime> {
        self.built_at.map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
    }

    /// Check whether the build is older than `max_age`, or was never recorded.
    pub fn is_stale(&self, max_age: Duration) -> bool {
        match self.built_at {
            None => true,
            Some(built) => unix_now().saturating_sub(built) >= max_age.as_secs(),
        }
    }
}
