//! Every random draw in this crate goes through a [`RandomSource`], a
//! capability producing uniform values in `[0, 1)`. Production code uses a
//! [`RngSource`] backed by a `rand` generator, while tests can replay fixed
//! draws with a [`SequenceSource`].
//!
//! # Rounding
//!
//! Sensor values are rounded to the nearest hundredth of their exact binary
//! value, with exact halfway points rounded away from zero. The decimal
//! representation plays no role: `2.675` is stored as `2.67499999…`, so it
//! becomes `2.67`, `1.005` becomes `1.0` and `0.145` becomes `0.14`, while
//! `0.125`, which is exactly representable, becomes `0.13`.
//!
//! Scaling by `100` rounds once by itself (`2.675 * 100.0` is exactly
//! `267.5`), so the product error is recovered with a fused multiply-add
//! and decides the direction when the scaled value lands on a halfway point.
//!
//! The result is the closest `f64` to a number with at most two decimal
//! digits, hence it always prints and serializes with at most two of them.
//! A negative value rounding to zero yields `0.0`, never `-0.0`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::device::SensorType;

// Largest value a source may return.
const MAX_UNIT: f64 = 1.0 - f64::EPSILON;

/// A source of uniformly distributed values in `[0, 1)`.
pub trait RandomSource {
    /// Returns the next value in `[0, 1)`.
    fn next_unit(&mut self) -> f64;
}

impl<T: RandomSource + ?Sized> RandomSource for &mut T {
    fn next_unit(&mut self) -> f64 {
        (**self).next_unit()
    }
}

/// A [`RandomSource`] backed by a [`rand`] generator.
#[derive(Debug, Clone)]
pub struct RngSource<R = StdRng>(R);

impl<R: Rng> RngSource<R> {
    /// Creates a [`RngSource`] from any [`rand`] generator.
    #[must_use]
    pub const fn new(rng: R) -> Self {
        Self(rng)
    }
}

impl RngSource<StdRng> {
    /// Creates a reproducible [`RngSource`] from a seed.
    #[must_use]
    #[inline]
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    /// Creates a [`RngSource`] seeded by the operating system.
    #[must_use]
    #[inline]
    pub fn from_os_rng() -> Self {
        Self(StdRng::from_os_rng())
    }
}

impl<R: Rng> RandomSource for RngSource<R> {
    fn next_unit(&mut self) -> f64 {
        self.0.random::<f64>()
    }
}

/// A [`RandomSource`] replaying a fixed sequence of draws.
///
/// The sequence restarts from its first value once exhausted.
/// Values outside `[0, 1)` are clamped into it, and an empty sequence
/// always returns `0`.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceSource {
    values: Vec<f64>,
    position: usize,
}

impl SequenceSource {
    /// Creates a [`SequenceSource`] from a sequence of draws.
    #[must_use]
    #[inline]
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            position: 0,
        }
    }

    /// Creates a [`SequenceSource`] that always returns the same draw.
    #[must_use]
    #[inline]
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }
}

impl RandomSource for SequenceSource {
    fn next_unit(&mut self) -> f64 {
        let Some(value) = self.values.get(self.position).copied() else {
            return 0.0;
        };
        self.position = (self.position + 1) % self.values.len();
        value.clamp(0.0, MAX_UNIT)
    }
}

/// Rounds a value to two decimal places, half away from zero.
///
/// See the module documentation for the exact policy.
#[must_use]
#[inline]
pub fn round_hundredths(value: f64) -> f64 {
    let scaled = value * 100.0;
    // Exact difference between `value * 100` and its rounded product.
    let error = value.mul_add(100.0, -scaled);

    let rounded = if (scaled - scaled.trunc()).abs() == 0.5
        && error != 0.0
        && error.is_sign_negative() != scaled.is_sign_negative()
    {
        // The exact value lies before the halfway point.
        scaled.trunc()
    } else {
        scaled.round()
    };

    // Adding a positive zero turns `-0.0` into `0.0`.
    rounded / 100.0 + 0.0
}

/// Produces bounded random numbers for the semantic ranges of a reading.
///
/// Every method consumes exactly one draw from the underlying
/// [`RandomSource`].
#[derive(Debug, Clone)]
pub struct RandomValueGenerator<R = RngSource> {
    source: R,
}

impl RandomValueGenerator<RngSource> {
    /// Creates a [`RandomValueGenerator`] seeded by the operating system.
    #[must_use]
    #[inline]
    pub fn from_os_rng() -> Self {
        Self::new(RngSource::from_os_rng())
    }
}

impl<R: RandomSource> RandomValueGenerator<R> {
    /// Creates a [`RandomValueGenerator`] drawing from the given source.
    #[must_use]
    pub const fn new(source: R) -> Self {
        Self { source }
    }

    /// Returns an integer uniformly distributed in `[min, max]`.
    ///
    /// When `min == max` that single value is returned. Swapped bounds
    /// are reordered.
    ///
    /// A draw `u` maps to `min + floor(u * (max - min + 1))`, so `u = 0.3`
    /// on `[1, 5]` yields `2`.
    pub fn uniform_int(&mut self, min: u32, max: u32) -> u32 {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let span = f64::from(max - min) + 1.0;
        let offset = (self.source.next_unit() * span).floor();
        // `offset` lies in `[0, span)` and is integral.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let offset = offset as u32;
        min.saturating_add(offset).min(max)
    }

    /// Returns a value for the given [`SensorType`], rounded to two decimal
    /// places and lying in the half-open interval of
    /// [`SensorType::bounds`].
    ///
    /// A draw rounding up to the excluded upper bound is mapped to the
    /// largest representable hundredth below it.
    pub fn sensor_value(&mut self, sensor_type: SensorType) -> f64 {
        let (min, max) = sensor_type.bounds();
        let value = round_hundredths(self.source.next_unit() * (max - min) + min);
        if value >= max {
            (max * 100.0 - 1.0) / 100.0
        } else {
            value
        }
    }

    /// Returns a [`SensorType`] chosen with equal probability.
    pub fn sensor_type(&mut self) -> SensorType {
        if self.source.next_unit() < 0.5 {
            SensorType::Pressure
        } else {
            SensorType::Temperature
        }
    }

    /// Returns a mutable reference to the underlying [`RandomSource`].
    #[must_use]
    pub const fn source_mut(&mut self) -> &mut R {
        &mut self.source
    }
}
