//! IPv4 address codec and the value types built on it.
//!
//! Addresses are plain `u32` values in host order. A [`CidrBlock`] is an
//! aligned power-of-two range, and a [`BitPrefix`] is the top bits of a
//! block's base, which is what the prefix trie is keyed on.

use ipnet::Ipv4Net;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::{Error, Result};

/// Number of bits in an IPv4 address.
pub const ADDRESS_BITS: u8 = 32;

/// Parse a dotted-quad IPv4 address into its integer form.
///
/// Exactly four dot-separated decimal octets in `0..=255` are accepted.
/// Surrounding whitespace is ignored.
pub fn parse_addr(text: &str) -> Result<u32> {
    let text = text.trim();
    text.parse::<Ipv4Addr>()
        .map(u32::from)
        .map_err(|_| Error::InvalidAddressFormat(text.to_string()))
}

/// Format an integer address as a dotted quad.
pub fn format_addr(addr: u32) -> String {
    Ipv4Addr::from(addr).to_string()
}

/// Render an address as 32 '0'/'1' characters, most significant bit first.
pub fn to_bits(addr: u32) -> String {
    format!("{:032b}", addr)
}

/// Render the network bits of a block, `prefix_len` characters long.
pub fn block_bits(block: &CidrBlock) -> String {
    block.bit_prefix().to_string()
}

/// Mask selecting the top `len` bits.
#[inline]
fn prefix_mask(len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        u32::MAX << (ADDRESS_BITS - len)
    }
}

/// An aligned IPv4 network: base address plus prefix length.
///
/// The low `32 - prefix_len` bits of `base` are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CidrBlock {
    base: u32,
    prefix_len: u8,
}

impl CidrBlock {
    /// Create a block, rejecting prefix lengths over 32 and bases with host bits set.
    pub fn new(base: u32, prefix_len: u8) -> Result<Self> {
        if prefix_len > ADDRESS_BITS {
            return Err(Error::InvalidPrefixLength(prefix_len.to_string()));
        }
        if base & !prefix_mask(prefix_len) != 0 {
            return Err(Error::MisalignedBlock(format!(
                "{}/{}",
                format_addr(base),
                prefix_len
            )));
        }
        Ok(Self { base, prefix_len })
    }

    /// Create the block of length `prefix_len` containing `addr`, clearing host bits.
    pub fn truncated(addr: u32, prefix_len: u8) -> Result<Self> {
        if prefix_len > ADDRESS_BITS {
            return Err(Error::InvalidPrefixLength(prefix_len.to_string()));
        }
        Ok(Self {
            base: addr & prefix_mask(prefix_len),
            prefix_len,
        })
    }

    /// Build a block the caller has already aligned.
    pub(crate) const fn aligned(base: u32, prefix_len: u8) -> Self {
        Self { base, prefix_len }
    }

    /// The /32 block holding a single address.
    pub fn host(addr: u32) -> Self {
        Self {
            base: addr,
            prefix_len: ADDRESS_BITS,
        }
    }

    /// Base (network) address.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Prefix length in bits.
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// First address in the block.
    pub fn first(&self) -> u32 {
        self.base
    }

    /// Last address in the block (inclusive).
    pub fn last(&self) -> u32 {
        self.base | !prefix_mask(self.prefix_len)
    }

    /// Number of addresses covered. A /0 covers 2^32, hence `u64`.
    pub fn size(&self) -> u64 {
        1u64 << (ADDRESS_BITS - self.prefix_len)
    }

    /// Check whether `addr` lies inside the block.
    pub fn contains(&self, addr: u32) -> bool {
        addr & prefix_mask(self.prefix_len) == self.base
    }

    /// Check whether `other` lies entirely inside this block.
    pub fn contains_block(&self, other: &CidrBlock) -> bool {
        self.prefix_len <= other.prefix_len && self.contains(other.base)
    }

    /// The network bits of this block, used as the trie key.
    pub fn bit_prefix(&self) -> BitPrefix {
        BitPrefix {
            bits: self.base,
            len: self.prefix_len,
        }
    }
}

impl fmt::Display for CidrBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", Ipv4Addr::from(self.base), self.prefix_len)
    }
}

impl FromStr for CidrBlock {
    type Err = Error;

    /// Parse strict `a.b.c.d/n` notation. Host bits must be clear.
    fn from_str(s: &str) -> Result<Self> {
        let (addr, len) = split_cidr(s)?;
        CidrBlock::new(addr, len)
    }
}

impl From<Ipv4Net> for CidrBlock {
    fn from(net: Ipv4Net) -> Self {
        Self {
            base: u32::from(net.network()),
            prefix_len: net.prefix_len(),
        }
    }
}

/// Split `a.b.c.d/n` into its address and prefix length.
pub(crate) fn split_cidr(s: &str) -> Result<(u32, u8)> {
    let s = s.trim();
    let (addr, len) = s
        .split_once('/')
        .ok_or_else(|| Error::InvalidAddressFormat(s.to_string()))?;
    let addr = parse_addr(addr)?;
    let len = parse_prefix_len(len)?;
    Ok((addr, len))
}

/// Parse a decimal prefix length in `0..=32`.
pub(crate) fn parse_prefix_len(text: &str) -> Result<u8> {
    let text = text.trim();
    match text.parse::<u8>() {
        Ok(len) if len <= ADDRESS_BITS => Ok(len),
        _ => Err(Error::InvalidPrefixLength(text.to_string())),
    }
}

/// Up to 32 bits, most significant first, stored left-aligned in a `u32`.
///
/// Bits beyond `len` are always zero, so equality and hashing work on the
/// raw fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BitPrefix {
    bits: u32,
    len: u8,
}

impl BitPrefix {
    /// The empty prefix.
    pub const EMPTY: BitPrefix = BitPrefix { bits: 0, len: 0 };

    /// Create a prefix from left-aligned bits. Bits past `len` are cleared.
    pub fn new(bits: u32, len: u8) -> Result<Self> {
        if len > ADDRESS_BITS {
            return Err(Error::InvalidPrefixLength(len.to_string()));
        }
        Ok(Self {
            bits: bits & prefix_mask(len),
            len,
        })
    }

    /// All 32 bits of an address.
    pub fn from_addr(addr: u32) -> Self {
        Self {
            bits: addr,
            len: ADDRESS_BITS,
        }
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the prefix holds no bits.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Left-aligned raw bits.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// The bit at `index` (0 = most significant), if in range.
    pub fn bit(&self, index: usize) -> Option<u8> {
        if index >= self.len() {
            return None;
        }
        Some(((self.bits >> (31 - index)) & 1) as u8)
    }

    /// Number of leading bits shared with `other`.
    pub fn common_prefix_len(&self, other: &BitPrefix) -> usize {
        let differing = (self.bits ^ other.bits).leading_zeros() as usize;
        differing.min(self.len()).min(other.len())
    }

    /// Whether `other` is a prefix of `self` (every prefix starts with the empty one).
    pub fn starts_with(&self, other: &BitPrefix) -> bool {
        other.len <= self.len && self.bits & prefix_mask(other.len) == other.bits
    }

    /// The first `n` bits (saturating at `len`).
    pub fn take(&self, n: usize) -> BitPrefix {
        let n = n.min(self.len()) as u8;
        BitPrefix {
            bits: self.bits & prefix_mask(n),
            len: n,
        }
    }

    /// Everything after the first `n` bits (saturating at `len`).
    pub fn skip(&self, n: usize) -> BitPrefix {
        let n = n.min(self.len()) as u8;
        BitPrefix {
            bits: self.bits.checked_shl(n as u32).unwrap_or(0),
            len: self.len - n,
        }
    }

    /// `self` followed by `other`, or `None` when the result would exceed 32 bits.
    pub fn concat(&self, other: &BitPrefix) -> Option<BitPrefix> {
        if self.len() + other.len() > ADDRESS_BITS as usize {
            return None;
        }
        Some(BitPrefix {
            bits: self.bits | other.bits.checked_shr(self.len as u32).unwrap_or(0),
            len: self.len + other.len,
        })
    }

    /// The block whose network bits are this prefix.
    pub fn to_block(&self) -> CidrBlock {
        CidrBlock {
            base: self.bits,
            prefix_len: self.len,
        }
    }
}

impl fmt::Display for BitPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.len() {
            let c = if self.bit(i) == Some(1) { '1' } else { '0' };
            fmt::Write::write_char(f, c)?;
        }
        Ok(())
    }
}

impl FromStr for BitPrefix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() > ADDRESS_BITS as usize {
            return Err(Error::InvalidBitString(s.to_string()));
        }
        let mut bits = 0u32;
        for (i, c) in s.chars().enumerate() {
            match c {
                '0' => {}
                '1' => bits |= 1 << (31 - i),
                _ => return Err(Error::InvalidBitString(s.to_string())),
            }
        }
        Ok(BitPrefix {
            bits,
            len: s.len() as u8,
        })
    }
}
