//! Parsing of free-form adapter replies.
//!
//! Adapters render pointers in many ways (`(float *) 0x5555556aeb0`,
//! `0x000001c8a1b2c3d0 {1.0}`, `$1 = 0x...`), nothing but validated
//! [`Address`] values leaves this module.

use crate::address::Address;
use crate::muted_error;
use once_cell::sync::Lazy;
use regex::Regex;

static HEX_ADDRESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b0[xX][0-9a-fA-F]+\b").expect("valid address regex"));

static INTEGER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:0[xX][0-9a-fA-F]+|[0-9]+)\b").expect("valid integer regex")
});

/// Return the address printed in an evaluation result.
///
/// Only the first hex literal is considered, a reply printing a null pointer
/// followed by some other number must not yield that number.
pub fn address_in_text(text: &str) -> Option<Address> {
    let literal = HEX_ADDRESS.find(text)?;
    muted_error!("resolve", literal.as_str().parse::<Address>())
}

/// Validate a raw `memoryReference` field.
pub fn memory_reference(reference: Option<&str>) -> Option<Address> {
    let reference = reference?;
    muted_error!("resolve", reference.parse::<Address>())
}

/// Return the integer (decimal or hex) printed in an evaluation result.
///
/// LLDB prefixes values with a `$N = ` history variable, the value follows the last `=`.
pub fn integer_in_text(text: &str) -> Option<u64> {
    let value = text.rsplit_once('=').map_or(text, |(_, value)| value);
    let literal = INTEGER.find(value)?.as_str();
    match literal
        .strip_prefix("0x")
        .or_else(|| literal.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => literal.parse().ok(),
    }
}
