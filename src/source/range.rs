//! Numeric range feeds.
//!
//! Lines hold a start and an end address as decimal 32-bit integers,
//! separated by tabs, commas or spaces. Further columns (ASN, owner name)
//! are ignored. Each range is expanded to its minimal CIDR cover.

use super::text::strip_comment;
use super::TokenSource;
use crate::address::CidrBlock;
use crate::decompose::decompose_decimal;
use crate::dedup::Candidate;
use crate::{Error, Result};

/// Parse one range line into its CIDR blocks.
pub fn parse_range_line(line: &str) -> Result<Vec<CidrBlock>> {
    let mut fields = line
        .split(|c: char| c == '\t' || c == ',' || c.is_whitespace())
        .filter(|f| !f.is_empty());

    match (fields.next(), fields.next()) {
        (Some(start), Some(end)) => decompose_decimal(start, end),
        _ => Err(Error::InvalidRange(format!("expected start and end: {:?}", line))),
    }
}

/// Parse a whole range feed body.
///
/// A malformed line yields one error entry; a good line yields one entry
/// per block of its decomposition.
pub fn parse_ranges(body: &str) -> Vec<Result<Candidate>> {
    let mut out = Vec::new();
    for line in body.lines().map(strip_comment).filter(|l| !l.is_empty()) {
        match parse_range_line(line) {
            Ok(blocks) => out.extend(blocks.into_iter().map(|b| Ok(Candidate::Block(b)))),
            Err(e) => out.push(Err(e)),
        }
    }
    out
}

/// A numeric range feed held in memory.
pub struct RangeListSource {
    name: String,
    body: String,
}

impl RangeListSource {
    /// Create a source from a name and feed text.
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }
}

impl TokenSource for RangeListSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(&self) -> Result<Vec<Result<Candidate>>> {
        Ok(parse_ranges(&self.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(blocks: &[CidrBlock]) -> Vec<String> {
        blocks.iter().map(|b| b.to_string()).collect()
    }

    #[test]
    fn test_parse_range_line_separators() {
        let expected = vec!["192.168.0.0/23"];
        assert_eq!(strings(&parse_range_line("3232235520\t3232236031").unwrap()), expected);
        assert_eq!(strings(&parse_range_line("3232235520,3232236031").unwrap()), expected);
        assert_eq!(strings(&parse_range_line("3232235520  3232236031").unwrap()), expected);
        assert_eq!(
            strings(&parse_range_line("3232235520\t3232236031\t64496\tExample Hosting").unwrap()),
            expected
        );
    }

    #[test]
    fn test_parse_range_line_errors() {
        assert!(matches!(parse_range_line("12345"), Err(Error::InvalidRange(_))));
        assert!(matches!(parse_range_line("20\t10"), Err(Error::InvalidRange(_))));
        assert!(matches!(parse_range_line("x\t10"), Err(Error::InvalidRange(_))));
    }

    #[test]
    fn test_parse_ranges_expands() {
        let body = "# start\tend\n167772161\t167772170\nbroken\n";
        let out = parse_ranges(body);
        assert_eq!(out.len(), 6);
        assert_eq!(out[0].as_ref().unwrap().to_string(), "10.0.0.1/32");
        assert_eq!(out[4].as_ref().unwrap().to_string(), "10.0.0.10/32");
        assert!(out[5].is_err());
    }

    #[test]
    fn test_range_source() {
        let source = RangeListSource::new("asn", "0\t4294967295\n");
        let out = source.candidates().unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_ref().unwrap().to_string(), "0.0.0.0/0");
    }
}
