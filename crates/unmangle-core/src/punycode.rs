//! Punycode for identifiers that cannot be written verbatim.
//!
//! This is RFC 3492 with two twists used by mangled names:
//!
//! - the basic/extended delimiter is `_` rather than `-`
//! - digits 26..=35 are written `A`..=`J` instead of `0`..=`9`
//!
//! ASCII characters that are not valid symbol characters are shifted into
//! `0xD800 + c` before encoding and shifted back after decoding.

use crate::error::{Result, UnmangleError};
use crate::tables::is_valid_symbol_char;

const BASE: u32 = 36;
const TMIN: u32 = 1;
const TMAX: u32 = 26;
const SKEW: u32 = 38;
const DAMP: u32 = 700;
const INITIAL_BIAS: u32 = 72;
const INITIAL_N: u32 = 128;
const DELIMITER: char = '_';

const MAPPED_ASCII_START: u32 = 0xD800;
const MAPPED_ASCII_END: u32 = 0xD880;

fn adapt(delta: u32, num_points: u32, first_time: bool) -> u32
{
    let mut delta = if first_time { delta / DAMP } else { delta / 2 };
    delta += delta / num_points;
    let mut k = 0;
    while delta > ((BASE - TMIN) * TMAX) / 2 {
        delta /= BASE - TMIN;
        k += BASE;
    }
    k + (((BASE - TMIN + 1) * delta) / (delta + SKEW))
}

fn threshold(k: u32, bias: u32) -> u32
{
    if k <= bias {
        TMIN
    } else if k >= bias + TMAX {
        TMAX
    } else {
        k - bias
    }
}

fn digit_value(ch: char, position: usize) -> Result<u32>
{
    match ch {
        'a'..='z' => Ok(ch as u32 - 'a' as u32),
        'A'..='Z' => Ok(ch as u32 - 'A' as u32 + TMAX),
        _ => Err(UnmangleError::InvalidDigit { position, found: ch }),
    }
}

fn digit_char(digit: u32) -> char
{
    debug_assert!(digit < BASE, "invalid punycode digit");
    if digit < 26 {
        char::from(b'a' + digit as u8)
    } else {
        char::from(b'A' + (digit - 26) as u8)
    }
}

fn scalar_from_decoded(value: u32) -> Result<char>
{
    let value = if (MAPPED_ASCII_START..MAPPED_ASCII_END).contains(&value) {
        value - MAPPED_ASCII_START
    } else {
        value
    };
    char::from_u32(value).ok_or(UnmangleError::InvalidCodePoint(value))
}

/// Decode a Punycode payload back into text.
///
/// ```rust
/// use unmangle_core::punycode;
///
/// assert_eq!(punycode::decode("caf_dma").unwrap(), "café");
/// ```
///
/// ## Errors
///
/// - [`UnmangleError::InvalidDigit`] for a character outside `[A-Za-z]` in a digit position
/// - [`UnmangleError::TruncatedInput`] when the payload stops inside a number
/// - [`UnmangleError::PunycodeOverflow`] / [`UnmangleError::InvalidCodePoint`] for bogus values
pub fn decode(input: &str) -> Result<String>
{
    let chars: Vec<char> = input.chars().collect();
    let mut output: Vec<char> = Vec::with_capacity(chars.len());

    let mut pos = 0;
    if let Some(delim) = chars.iter().rposition(|&ch| ch == DELIMITER) {
        output.extend_from_slice(&chars[..delim]);
        pos = delim + 1;
    }

    let mut n = INITIAL_N;
    let mut i: u32 = 0;
    let mut bias = INITIAL_BIAS;

    while pos < chars.len() {
        let old_i = i;
        let mut w: u32 = 1;
        let mut k = BASE;
        loop {
            let ch = *chars.get(pos).ok_or(UnmangleError::TruncatedInput)?;
            let digit = digit_value(ch, pos)?;
            pos += 1;

            i = digit
                .checked_mul(w)
                .and_then(|step| i.checked_add(step))
                .ok_or(UnmangleError::PunycodeOverflow)?;
            let t = threshold(k, bias);
            if digit < t {
                break;
            }
            w = w.checked_mul(BASE - t).ok_or(UnmangleError::PunycodeOverflow)?;
            k += BASE;
        }

        let len = u32::try_from(output.len() + 1).map_err(|_| UnmangleError::PunycodeOverflow)?;
        bias = adapt(i - old_i, len, old_i == 0);
        n = n.checked_add(i / len).ok_or(UnmangleError::PunycodeOverflow)?;
        i %= len;

        output.insert(i as usize, scalar_from_decoded(n)?);
        i += 1;
    }

    Ok(output.into_iter().collect())
}

fn is_valid_code_point(value: u32) -> bool
{
    (MAPPED_ASCII_START..MAPPED_ASCII_END).contains(&value) || value <= 0xD7FF || (0xE000..=0x10FFFF).contains(&value)
}

/// Encode text as Punycode.
///
/// Non-symbol ASCII characters (anything but letters, digits, `_` and `$`)
/// are shifted into the private range first so that the basic part of the
/// output only ever contains valid symbol characters.
///
/// ## Errors
///
/// [`UnmangleError::PunycodeOverflow`] if the deltas do not fit in 32 bits.
pub fn encode(input: &str) -> Result<String>
{
    let code_points: Vec<u32> = input
        .chars()
        .map(|ch| {
            let value = ch as u32;
            if value < 0x80 && !is_valid_symbol_char(ch) {
                MAPPED_ASCII_START + value
            } else {
                value
            }
        })
        .collect();
    encode_code_points(&code_points)
}

fn encode_code_points(input: &[u32]) -> Result<String>
{
    let mut output = String::new();
    let mut n = INITIAL_N;
    let mut delta: u32 = 0;
    let mut bias = INITIAL_BIAS;

    let mut h: u32 = 0;
    for &cp in input {
        if !is_valid_code_point(cp) {
            return Err(UnmangleError::InvalidCodePoint(cp));
        }
        if cp < 0x80 {
            h += 1;
            output.push(char::from(cp as u8));
        }
    }
    let b = h;
    if b > 0 {
        output.push(DELIMITER);
    }

    let total = u32::try_from(input.len()).map_err(|_| UnmangleError::PunycodeOverflow)?;
    while h < total {
        let m = input.iter().copied().filter(|&cp| cp >= n).min().unwrap_or(n);
        delta = (m - n)
            .checked_mul(h + 1)
            .and_then(|step| delta.checked_add(step))
            .ok_or(UnmangleError::PunycodeOverflow)?;
        n = m;

        for &cp in input {
            if cp < n {
                delta = delta.checked_add(1).ok_or(UnmangleError::PunycodeOverflow)?;
            }
            if cp == n {
                let mut q = delta;
                let mut k = BASE;
                loop {
                    let t = threshold(k, bias);
                    if q < t {
                        break;
                    }
                    output.push(digit_char(t + (q - t) % (BASE - t)));
                    q = (q - t) / (BASE - t);
                    k += BASE;
                }
                output.push(digit_char(q));
                bias = adapt(delta, h + 1, h == b);
                delta = 0;
                h += 1;
            }
        }

        delta += 1;
        n += 1;
    }

    Ok(output)
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_decode_basic_only()
    {
        assert_eq!(decode("abc_").unwrap(), "abc");
    }

    #[test]
    fn test_decode_mixed()
    {
        assert_eq!(decode("caf_dma").unwrap(), "café");
    }

    #[test]
    fn test_encode_matches_decode()
    {
        for text in ["café", "Straße", "ünïcödé", "日本語", "a+b", "x y"] {
            let encoded = encode(text).unwrap();
            assert!(encoded.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_'), "{encoded}");
            assert_eq!(decode(&encoded).unwrap(), text);
        }
    }

    #[test]
    fn test_non_symbol_ascii_is_mapped()
    {
        let encoded = encode("a+b").unwrap();
        assert!(encoded.starts_with("ab_"));
    }

    #[test]
    fn test_invalid_digit_is_reported()
    {
        match decode("abc_d9") {
            Err(UnmangleError::InvalidDigit { position, found }) => {
                assert_eq!(found, '9');
                assert_eq!(position, 5);
            }
            other => panic!("expected InvalidDigit, got {other:?}"),
        }
    }

    #[test]
    fn test_truncated_number_is_reported()
    {
        // `z` (25) is above every threshold, so the number never terminates.
        assert!(matches!(decode("a_z"), Err(UnmangleError::TruncatedInput)));
    }
}
