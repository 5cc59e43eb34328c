//! Balanced ternary primitives.
//!
//! Machine values are plain `i32`s interpreted as balanced ternary by
//! convention, so everything here is scalar:
//! - [`arith`] - sign, magnitude, shift-by-3 and three-way compare
//! - [`logic`] - Kleene AND/OR/NOT over trit-valued integers
//! - [`text`] - balanced ternary digit strings (`1`, `0`, `T`)

pub mod arith;
pub mod logic;
pub mod text;

pub use arith::{tabs, tcmpr, tshl3, tshr3, tsign};
pub use logic::{tand, tnot, tor};
pub use text::{decode_value, encode_value, DigitError};
