//! Ternary logic primitives.
//!
//! Balanced ternary reads -1 as false, 0 as unknown and +1 as true, which
//! makes these the strong Kleene connectives: AND is minimum, OR is
//! maximum, NOT is negation. The definitions extend to arbitrary integers
//! unchanged.

/// Ternary AND: the minimum of both operands.
#[inline]
pub fn tand(a: i32, b: i32) -> i32 {
    a.min(b)
}

/// Ternary OR: the maximum of both operands.
#[inline]
pub fn tor(a: i32, b: i32) -> i32 {
    a.max(b)
}

/// Ternary NOT: negation. Wraps at `i32::MIN`.
#[inline]
pub fn tnot(a: i32) -> i32 {
    a.wrapping_neg()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRITS: [i32; 3] = [-1, 0, 1];

    #[test]
    fn test_tand_is_min() {
        for a in TRITS {
            for b in TRITS {
                assert_eq!(tand(a, b), a.min(b));
            }
        }
        assert_eq!(tand(100, -100), -100);
    }

    #[test]
    fn test_tor_is_max() {
        for a in TRITS {
            for b in TRITS {
                assert_eq!(tor(a, b), a.max(b));
            }
        }
        assert_eq!(tor(100, -100), 100);
    }

    #[test]
    fn test_tnot() {
        assert_eq!(tnot(-1), 1);
        assert_eq!(tnot(0), 0);
        assert_eq!(tnot(1), -1);
        assert_eq!(tnot(i32::MIN), i32::MIN);
    }

    #[test]
    fn test_de_morgan_on_trits() {
        // not(a and b) == (not a) or (not b)
        for a in TRITS {
            for b in TRITS {
                assert_eq!(tnot(tand(a, b)), tor(tnot(a), tnot(b)));
            }
        }
    }
}
