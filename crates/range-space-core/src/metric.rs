// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! # Metrics
//!
//! A [`Metric`] is the key type a range is defined over: totally ordered,
//! discrete, finite valued, and cheap to copy. Every primitive integer is a
//! metric out of the box; `char` is a metric that steps across the surrogate
//! gap, which makes code-point range tables work without special casing.

use num_traits::{CheckedAdd, CheckedSub};
use std::fmt::{Debug, Display};

/// A totally ordered, discrete, finite-valued key type.
///
/// The stepping operations are partial: [`successor`](Metric::successor) is
/// undefined at [`max_value`](Metric::max_value) and
/// [`predecessor`](Metric::predecessor) at
/// [`min_value`](Metric::min_value). The range algorithms only step a value
/// when a strictly larger (or smaller) value is known to exist, so a panic
/// out of these methods always indicates a caller bug rather than an input
/// problem.
///
/// # Examples
///
/// ```
/// use range_space_core::Metric;
///
/// assert_eq!(7u32.successor(), 8);
/// assert_eq!(7u32.predecessor(), 6);
/// assert_eq!(<u8 as Metric>::max_value(), 255);
/// assert_eq!(<i16 as Metric>::min_value(), i16::MIN);
/// ```
pub trait Metric: Copy + Ord + Debug + Display {
    /// The least representable value.
    fn min_value() -> Self;

    /// The greatest representable value.
    fn max_value() -> Self;

    /// The unique immediate successor.
    ///
    /// # Panics
    ///
    /// If `self` is [`max_value`](Metric::max_value).
    fn successor(self) -> Self;

    /// The unique immediate predecessor.
    ///
    /// # Panics
    ///
    /// If `self` is [`min_value`](Metric::min_value).
    fn predecessor(self) -> Self;
}

macro_rules! impl_metric_for_prim_int {
    ($($t:ty),+ $(,)?) => {
        $(
            impl Metric for $t {
                #[inline]
                fn min_value() -> Self {
                    <$t as num_traits::Bounded>::min_value()
                }

                #[inline]
                fn max_value() -> Self {
                    <$t as num_traits::Bounded>::max_value()
                }

                #[inline]
                fn successor(self) -> Self {
                    CheckedAdd::checked_add(&self, &<$t as num_traits::One>::one())
                        .expect("metric increment past the maximum value")
                }

                #[inline]
                fn predecessor(self) -> Self {
                    CheckedSub::checked_sub(&self, &<$t as num_traits::One>::one())
                        .expect("metric decrement past the minimum value")
                }
            }
        )+
    };
}

impl_metric_for_prim_int!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

/// `char` is discrete once the surrogate gap is treated as a single step:
/// `U+D7FF` and `U+E000` are immediate neighbors.
impl Metric for char {
    #[inline]
    fn min_value() -> Self {
        '\0'
    }

    #[inline]
    fn max_value() -> Self {
        char::MAX
    }

    #[inline]
    fn successor(self) -> Self {
        let next = match self as u32 {
            0xD7FF => 0xE000,
            cp => cp + 1,
        };
        char::from_u32(next).expect("metric increment past the maximum value")
    }

    #[inline]
    fn predecessor(self) -> Self {
        let prev = match self as u32 {
            0xE000 => 0xD7FF,
            cp => cp
                .checked_sub(1)
                .expect("metric decrement past the minimum value"),
        };
        char::from_u32(prev).expect("metric decrement past the minimum value")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_bounds() {
        assert_eq!(<u8 as Metric>::min_value(), 0);
        assert_eq!(<u8 as Metric>::max_value(), 255);
        assert_eq!(<i8 as Metric>::min_value(), -128);
        assert_eq!(<i8 as Metric>::max_value(), 127);
    }

    #[test]
    fn integer_stepping() {
        assert_eq!(0u32.successor(), 1);
        assert_eq!(u32::MAX.predecessor(), u32::MAX - 1);
        assert_eq!((-1i64).successor(), 0);
        assert_eq!(0i64.predecessor(), -1);
    }

    #[test]
    #[should_panic(expected = "metric increment past the maximum value")]
    fn integer_successor_panics_at_max() {
        let _ = u8::MAX.successor();
    }

    #[test]
    #[should_panic(expected = "metric decrement past the minimum value")]
    fn integer_predecessor_panics_at_min() {
        let _ = i32::MIN.predecessor();
    }

    #[test]
    fn char_bounds() {
        assert_eq!(<char as Metric>::min_value(), '\0');
        assert_eq!(<char as Metric>::max_value(), char::MAX);
    }

    #[test]
    fn char_steps_over_surrogate_gap() {
        assert_eq!('\u{D7FF}'.successor(), '\u{E000}');
        assert_eq!('\u{E000}'.predecessor(), '\u{D7FF}');
        assert_eq!('a'.successor(), 'b');
        assert_eq!('b'.predecessor(), 'a');
    }

    #[test]
    #[should_panic(expected = "metric increment past the maximum value")]
    fn char_successor_panics_at_max() {
        let _ = char::MAX.successor();
    }

    #[test]
    #[should_panic(expected = "metric decrement past the minimum value")]
    fn char_predecessor_panics_at_min() {
        let _ = '\0'.predecessor();
    }
}
