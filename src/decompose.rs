//! Range to CIDR decomposition.
//!
//! Converts an arbitrary inclusive address range into the smallest ordered
//! set of aligned CIDR blocks covering exactly that range.

use std::iter::FusedIterator;

use crate::address::{format_addr, parse_addr, CidrBlock, ADDRESS_BITS};
use crate::{Error, Result};

/// Decompose `[start, end]` into a minimal ordered list of CIDR blocks.
///
/// # Examples
/// ```
/// use ipdeny::decompose::decompose;
/// use ipdeny::address::parse_addr;
///
/// let blocks = decompose(
///     parse_addr("192.168.0.0").unwrap(),
///     parse_addr("192.168.1.255").unwrap(),
/// )
/// .unwrap();
/// assert_eq!(blocks.len(), 1);
/// assert_eq!(blocks[0].to_string(), "192.168.0.0/23");
/// ```
pub fn decompose(start: u32, end: u32) -> Result<Vec<CidrBlock>> {
    Ok(RangeBlocks::new(start, end)?.collect())
}

/// Decompose a range given as two decimal 32-bit unsigned integers.
pub fn decompose_decimal(start: &str, end: &str) -> Result<Vec<CidrBlock>> {
    decompose(parse_decimal(start)?, parse_decimal(end)?)
}

/// Parse a range bound written either as a dotted quad or a decimal integer.
pub fn parse_bound(text: &str) -> Result<u32> {
    let text = text.trim();
    if text.contains('.') {
        parse_addr(text)
    } else {
        parse_decimal(text)
    }
}

fn parse_decimal(text: &str) -> Result<u32> {
    let text = text.trim();
    text.parse::<u32>()
        .map_err(|_| Error::InvalidRange(format!("not a 32-bit address: {:?}", text)))
}

/// Lazy iterator over the minimal CIDR cover of an inclusive range.
///
/// Cursor arithmetic is done in `u64` so a range ending at
/// `255.255.255.255` terminates without overflow.
#[derive(Debug, Clone)]
pub struct RangeBlocks {
    next: u64,
    end: u64,
}

impl RangeBlocks {
    /// Create the iterator. Fails with [`Error::InvalidRange`] when `start > end`.
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange(format!(
                "{} > {}",
                format_addr(start),
                format_addr(end)
            )));
        }
        Ok(Self {
            next: start as u64,
            end: end as u64,
        })
    }
}

impl Iterator for RangeBlocks {
    type Item = CidrBlock;

    fn next(&mut self) -> Option<CidrBlock> {
        if self.next > self.end {
            return None;
        }
        let start = self.next;
        let remaining = self.end - start + 1;

        // Largest block aligned at `start`, then shrink until it fits.
        let align_bits = if start == 0 {
            ADDRESS_BITS as u32
        } else {
            start.trailing_zeros().min(ADDRESS_BITS as u32)
        };
        let fit_bits = 63 - remaining.leading_zeros();
        let host_bits = align_bits.min(fit_bits);

        self.next = start + (1u64 << host_bits);
        Some(CidrBlock::aligned(
            start as u32,
            ADDRESS_BITS - host_bits as u8,
        ))
    }
}

impl FusedIterator for RangeBlocks {}

#[cfg(test)]
mod tests {
    use super::*;
    use ipnet::Ipv4Subnets;
    use std::net::Ipv4Addr;

    fn ip(s: &str) -> u32 {
        parse_addr(s).unwrap()
    }

    fn strings(blocks: &[CidrBlock]) -> Vec<String> {
        blocks.iter().map(|b| b.to_string()).collect()
    }

    /// Blocks must be contiguous, start at `start` and end at `end`.
    fn assert_exact_cover(blocks: &[CidrBlock], start: u32, end: u32) {
        assert_eq!(blocks.first().unwrap().first(), start);
        assert_eq!(blocks.last().unwrap().last(), end);
        for pair in blocks.windows(2) {
            assert_eq!(pair[0].last() as u64 + 1, pair[1].first() as u64);
        }
    }

    fn assert_minimal(blocks: &[CidrBlock]) {
        for pair in blocks.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if a.prefix_len() == b.prefix_len() && a.prefix_len() > 0 {
                let parent = CidrBlock::truncated(a.base(), a.prefix_len() - 1).unwrap();
                assert!(
                    !(parent.base() == a.base() && parent.last() == b.last()),
                    "{} and {} could merge into {}",
                    a,
                    b,
                    parent
                );
            }
        }
    }

    #[test]
    fn test_aligned_pair_of_24s() {
        let blocks = decompose(ip("192.168.0.0"), ip("192.168.1.255")).unwrap();
        assert_eq!(strings(&blocks), vec!["192.168.0.0/23"]);
    }

    #[test]
    fn test_single_address() {
        let blocks = decompose(ip("10.0.0.1"), ip("10.0.0.1")).unwrap();
        assert_eq!(strings(&blocks), vec!["10.0.0.1/32"]);
    }

    #[test]
    fn test_unaligned_range() {
        let blocks = decompose(ip("10.0.0.1"), ip("10.0.0.10")).unwrap();
        assert_eq!(
            strings(&blocks),
            vec!["10.0.0.1/32", "10.0.0.2/31", "10.0.0.4/30", "10.0.0.8/31", "10.0.0.10/32"]
        );
    }

    #[test]
    fn test_whole_address_space() {
        let blocks = decompose(0, u32::MAX).unwrap();
        assert_eq!(strings(&blocks), vec!["0.0.0.0/0"]);
    }

    #[test]
    fn test_top_of_address_space() {
        let blocks = decompose(ip("255.255.255.0"), u32::MAX).unwrap();
        assert_eq!(strings(&blocks), vec!["255.255.255.0/24"]);

        let blocks = decompose(u32::MAX, u32::MAX).unwrap();
        assert_eq!(strings(&blocks), vec!["255.255.255.255/32"]);

        let blocks = decompose(ip("128.0.0.1"), u32::MAX).unwrap();
        assert_exact_cover(&blocks, ip("128.0.0.1"), u32::MAX);
        assert_eq!(blocks.len(), 31);
    }

    #[test]
    fn test_worst_case_block_count() {
        let blocks = decompose(1, u32::MAX - 1).unwrap();
        assert_eq!(blocks.len(), 62);
        assert!(blocks.len() <= 2 * ADDRESS_BITS as usize);
        assert_exact_cover(&blocks, 1, u32::MAX - 1);
        assert_minimal(&blocks);
    }

    #[test]
    fn test_invalid_range() {
        assert!(matches!(
            decompose(ip("10.0.0.2"), ip("10.0.0.1")),
            Err(Error::InvalidRange(_))
        ));
    }

    #[test]
    fn test_matches_ipnet_aggregation() {
        let cases = [
            ("0.0.0.0", "0.0.0.0"),
            ("1.2.3.4", "1.2.3.200"),
            ("10.0.0.0", "10.255.255.254"),
            ("23.129.64.0", "23.129.64.255"),
            ("45.8.0.17", "46.0.0.3"),
            ("100.64.0.0", "100.127.255.255"),
            ("203.0.113.7", "223.255.255.255"),
        ];
        for (start, end) in cases {
            let blocks = decompose(ip(start), ip(end)).unwrap();
            assert_exact_cover(&blocks, ip(start), ip(end));
            assert_minimal(&blocks);

            let expected: Vec<CidrBlock> = Ipv4Subnets::new(
                start.parse::<Ipv4Addr>().unwrap(),
                end.parse::<Ipv4Addr>().unwrap(),
                0,
            )
            .map(CidrBlock::from)
            .collect();
            assert_eq!(blocks, expected, "range {}-{}", start, end);
        }
    }

    #[test]
    fn test_every_small_range_is_exact() {
        let base = ip("198.51.100.0");
        for offset in 0..40u32 {
            for len in 0..40u32 {
                let (start, end) = (base + offset, base + offset + len);
                let blocks = decompose(start, end).unwrap();
                assert_exact_cover(&blocks, start, end);
                assert_minimal(&blocks);
                let covered: u64 = blocks.iter().map(|b| b.size()).sum();
                assert_eq!(covered, (len + 1) as u64);
            }
        }
    }

    #[test]
    fn test_decimal_input() {
        let blocks = decompose_decimal("3232235520", "3232236031").unwrap();
        assert_eq!(strings(&blocks), vec!["192.168.0.0/23"]);

        assert!(matches!(
            decompose_decimal("4294967296", "4294967297"),
            Err(Error::InvalidRange(_))
        ));
        assert!(decompose_decimal("abc", "1").is_err());
    }

    #[test]
    fn test_parse_bound() {
        assert_eq!(parse_bound("10.0.0.1").unwrap(), 0x0A00_0001);
        assert_eq!(parse_bound("167772161").unwrap(), 0x0A00_0001);
        assert!(parse_bound("10.0.0").is_err());
    }
}
