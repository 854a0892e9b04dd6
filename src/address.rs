use crate::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::Range;
use std::str::FromStr;

/// Lowest address accepted as a buffer start. Debug adapters answer with
/// `0x0`, `0x8` and similar values for null or uninitialized containers.
pub const MIN_VALID_ADDRESS: u64 = 0x1000;

/// Validated address in the debuggee address space.
///
/// Always rendered as `0x` followed by lowercase hex digits, this is the form
/// used as a `memoryReference` in read requests.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Address(u64);

impl Address {
    /// Create an address, rejecting null and near-null values.
    pub fn new(addr: u64) -> Result<Self, Error> {
        if addr < MIN_VALID_ADDRESS {
            return Err(Error::NearNullAddress(Address(addr)));
        }
        Ok(Address(addr))
    }

    /// Address `offset` bytes further, [`None`] past the end of the address space.
    pub fn offset(self, offset: u64) -> Option<Address> {
        self.0.checked_add(offset).map(Address)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl FromStr for Address {
    type Err = Error;

    /// Parse `0x`-prefixed (or bare) hexadecimal text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() {
            return Err(Error::AddressSyntax(s.to_string()));
        }
        let addr =
            u64::from_str_radix(digits, 16).map_err(|_| Error::AddressSyntax(s.to_string()))?;
        Address::new(addr)
    }
}

impl From<Address> for u64 {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Contiguous region of debuggee memory. The length is always computed by the
/// caller from element count and element width.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ByteRange {
    pub base: Address,
    pub length: u64,
}

impl ByteRange {
    /// Create a range, rejecting one that runs past the end of the address space.
    pub fn new(base: Address, length: u64) -> Result<Self, Error> {
        if base.offset(length).is_none() {
            return Err(Error::RangeOverflow { base, len: length });
        }
        Ok(Self { base, length })
    }

    pub fn chunk_count(&self, chunk_size: u64) -> u64 {
        self.length.div_ceil(chunk_size.max(1))
    }

    /// Split range into `[offset, offset + count)` pieces of at most `chunk_size` bytes,
    /// offsets are relative to the range base.
    pub fn chunks(&self, chunk_size: u64) -> impl Iterator<Item = Range<u64>> {
        let chunk_size = chunk_size.max(1);
        let length = self.length;
        (0..self.chunk_count(chunk_size)).map(move |idx| {
            let start = idx * chunk_size;
            start..start.saturating_add(chunk_size).min(length)
        })
    }
}
