//! Bijective base62 codec between non-negative integers and minified ids.
//!
//! The alphabet is fixed and deliberately scrambled so that ids are not
//! trivially enumerable. Encoding emits the most significant symbol first;
//! zero encodes to the single index-0 symbol rather than the empty string.
//! The codec is pure and safe for concurrent use without synchronization.

use crate::error::CodecError;
use crate::id::MinifiedId;
use num_bigint::BigUint;

/// The 62-symbol alphabet, in value order (index = symbol value).
pub const ALPHABET: &[u8; 62] = b"2FQYNEJAUsbGu41zndZTeocMai5H7OIjXkKg8qyt3WC9hLplxfVBm0wSRr6vPD";

const BASE: u32 = ALPHABET.len() as u32;

/// Returns whether `c` is a symbol of the codec alphabet.
pub fn in_alphabet(c: char) -> bool {
    c.is_ascii() && ALPHABET.contains(&(c as u8))
}

fn symbol_value(c: char) -> Option<u32> {
    if !c.is_ascii() {
        return None;
    }
    ALPHABET
        .iter()
        .position(|&a| a == c as u8)
        .map(|idx| idx as u32)
}

/// Encodes an arbitrary-precision non-negative integer as a minified id.
///
/// Identifiers grow without bound over the system's lifetime, so the
/// codec must not assume the value fits a machine word.
pub fn encode(n: &BigUint) -> MinifiedId {
    let zero = BigUint::from(0u32);
    if *n == zero {
        return MinifiedId::new_unchecked(char::from(ALPHABET[0]).to_string());
    }

    let mut n = n.clone();
    let mut symbols = Vec::new();
    while n != zero {
        let rem = &n % BASE;
        let idx = rem.to_u32_digits().first().copied().unwrap_or(0) as usize;
        symbols.push(ALPHABET[idx]);
        n /= BASE;
    }
    symbols.reverse();
    MinifiedId::new_unchecked(symbols.iter().map(|&b| char::from(b)).collect::<String>())
}

/// Encodes a `u64`, the common case for ids allocated by a durable tier.
pub fn encode_u64(n: u64) -> MinifiedId {
    if n == 0 {
        return MinifiedId::new_unchecked(char::from(ALPHABET[0]).to_string());
    }

    let mut n = n;
    let mut symbols = Vec::new();
    while n != 0 {
        symbols.push(ALPHABET[(n % u64::from(BASE)) as usize]);
        n /= u64::from(BASE);
    }
    symbols.reverse();
    MinifiedId::new_unchecked(symbols.iter().map(|&b| char::from(b)).collect::<String>())
}

/// Encodes a signed integer, rejecting negative input.
///
/// Callers holding values from external sources that may be signed should
/// go through this entry point; internal allocation paths use
/// [`encode_u64`] directly.
pub fn encode_i64(n: i64) -> Result<MinifiedId, CodecError> {
    if n < 0 {
        return Err(CodecError::NegativeInput(n));
    }
    Ok(encode_u64(n as u64))
}

/// Decodes a minified id back to its integer value.
///
/// Fails if the text is empty or contains any character outside the
/// alphabet. Satisfies `decode(encode(n)) == n` for all non-negative `n`.
pub fn decode(text: &str) -> Result<BigUint, CodecError> {
    if text.is_empty() {
        return Err(CodecError::Empty);
    }

    let mut acc = BigUint::from(0u32);
    for c in text.chars() {
        let value = symbol_value(c).ok_or(CodecError::InvalidCharacter(c))?;
        acc = acc * BASE + value;
    }
    Ok(acc)
}
