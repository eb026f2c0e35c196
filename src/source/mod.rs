//! Feed adapters producing candidate token streams.
//!
//! Every feed, whatever its wire format, is reduced to the same thing: a
//! list of per-line results, each a [`Candidate`] or the error for that
//! line. Failing to obtain the feed at all is reported separately as
//! [`crate::Error::SourceUnavailable`].

pub mod range;
pub mod remote;
pub mod text;

pub use range::RangeListSource;
pub use remote::{decode_body, FeedSource, HttpFetcher};
pub use text::TextListSource;

use serde::Deserialize;

use crate::dedup::Candidate;
use crate::Result;

/// A producer of candidate entries.
pub trait TokenSource {
    /// Name used in logs and build reports.
    fn name(&self) -> &str;

    /// Produce all entries.
    ///
    /// The outer error means the source itself is unavailable; inner errors
    /// are malformed individual entries.
    fn candidates(&self) -> Result<Vec<Result<Candidate>>>;
}

/// Wire format of a feed body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    /// One address or CIDR block per line.
    #[default]
    Cidr,
    /// Decimal `start end` pairs, one range per line.
    Range,
}

impl FeedFormat {
    /// Parse a decoded feed body in this format.
    pub fn parse(&self, body: &str) -> Vec<Result<Candidate>> {
        match self {
            FeedFormat::Cidr => text::parse_tokens(body),
            FeedFormat::Range => range::parse_ranges(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_format_from_yaml() {
        let format: FeedFormat = serde_yaml::from_str("range").unwrap();
        assert_eq!(format, FeedFormat::Range);
        assert_eq!(FeedFormat::default(), FeedFormat::Cidr);
    }

    #[test]
    fn test_feed_format_dispatch() {
        let cidr = FeedFormat::Cidr.parse("10.0.0.0/8\n");
        assert_eq!(cidr.len(), 1);

        let range = FeedFormat::Range.parse("167772160\t167772415\n");
        let blocks: Vec<String> = range
            .into_iter()
            .map(|c| c.unwrap().to_string())
            .collect();
        assert_eq!(blocks, vec!["10.0.0.0/24"]);
    }
}
