//! Balanced ternary digit strings.
//!
//! Values render most-significant digit first with `1`, `0` and `T`
//! (T is the conventional glyph for -1). Parsing additionally accepts
//! `+` for +1 and `t` or `-` for -1, the full digit alphabet the T3 file
//! format permits.

use thiserror::Error;

/// A digit string failed to parse back into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DigitError {
    #[error("empty digit string")]
    Empty,
    #[error("invalid balanced ternary digit {0:?}")]
    InvalidDigit(char),
    #[error("value does not fit in 32 bits")]
    OutOfRange,
}

/// Encode a value as a balanced ternary digit string.
///
/// Zero encodes as `"0"`; any other value has no leading zero digits.
/// Digits are chosen so the remaining quotient stays exact: a remainder
/// of 2 becomes digit -1 with a carry into the next position.
pub fn encode_value(value: i32) -> String {
    if value == 0 {
        return "0".to_string();
    }

    let mut n = i64::from(value);
    let mut digits = Vec::new();
    while n != 0 {
        match n.rem_euclid(3) {
            0 => digits.push('0'),
            1 => {
                digits.push('1');
                n -= 1;
            }
            _ => {
                digits.push('T');
                n += 1;
            }
        }
        n /= 3;
    }
    digits.iter().rev().collect()
}

/// Decode a balanced ternary digit string, most-significant digit first.
pub fn decode_value(s: &str) -> Result<i32, DigitError> {
    if s.is_empty() {
        return Err(DigitError::Empty);
    }

    // 63 digits exceed i64, so accumulate wider and narrow at the end.
    let mut acc: i128 = 0;
    for c in s.chars() {
        let digit = match c {
            'T' | 't' | '-' => -1,
            '0' => 0,
            '1' | '+' => 1,
            other => return Err(DigitError::InvalidDigit(other)),
        };
        acc = acc * 3 + digit;
    }
    i32::try_from(acc).map_err(|_| DigitError::OutOfRange)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_small_values() {
        assert_eq!(encode_value(0), "0");
        assert_eq!(encode_value(1), "1");
        assert_eq!(encode_value(-1), "T");
        assert_eq!(encode_value(2), "1T");
        assert_eq!(encode_value(-2), "T1");
        assert_eq!(encode_value(3), "10");
        assert_eq!(encode_value(4), "11");
        assert_eq!(encode_value(5), "1TT");
        assert_eq!(encode_value(13), "111");
        assert_eq!(encode_value(-13), "TTT");
    }

    #[test]
    fn test_encode_negative_carry_cases() {
        // Values congruent to 1 mod 3 on the negative side need the carry
        assert_eq!(encode_value(-5), "T11");
        assert_eq!(decode_value("T11").unwrap(), -5);
        assert_eq!(decode_value("T1").unwrap(), -2);
    }

    #[test]
    fn test_decode_digit_aliases() {
        assert_eq!(decode_value("T1"), decode_value("t1"));
        assert_eq!(decode_value("T1"), decode_value("-1"));
        assert_eq!(decode_value("+0"), Ok(3));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(decode_value(""), Err(DigitError::Empty));
        assert_eq!(decode_value("1x0"), Err(DigitError::InvalidDigit('x')));
        assert_eq!(decode_value("2"), Err(DigitError::InvalidDigit('2')));
    }

    #[test]
    fn test_decode_range_check() {
        // 21 ones is well past i32::MAX
        let too_big: String = "1".repeat(21);
        assert_eq!(decode_value(&too_big), Err(DigitError::OutOfRange));
    }

    #[test]
    fn test_extremes_round_trip() {
        for v in [i32::MIN, i32::MIN + 1, -1, 0, 1, i32::MAX - 1, i32::MAX] {
            assert_eq!(decode_value(&encode_value(v)), Ok(v));
        }
    }

    proptest! {
        #[test]
        fn prop_round_trip(v in any::<i32>()) {
            prop_assert_eq!(decode_value(&encode_value(v)), Ok(v));
        }

        #[test]
        fn prop_no_leading_zero(v in any::<i32>()) {
            let s = encode_value(v);
            if v != 0 {
                prop_assert_ne!(s.chars().next(), Some('0'));
            }
            prop_assert!(s.len() <= 21);
        }
    }
}
