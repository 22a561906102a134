//! Strongly-typed numeric primitives.
//!
//! - `Length`: world units (TikZ centimetres), validated on entry
//! - `Angle`: degrees, counter-clockwise from east
//! - `Scaler`: world → device conversion, the only place y gets flipped

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use glam::{DVec2, dvec2};

/// Error type for invalid numeric values
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumericError {
    NaN,
    Infinite,
    Zero,
    Negative,
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericError::NaN => write!(f, "value is NaN"),
            NumericError::Infinite => write!(f, "value is infinite"),
            NumericError::Zero => write!(f, "value is zero"),
            NumericError::Negative => write!(f, "value is negative"),
        }
    }
}

impl std::error::Error for NumericError {}

fn check_finite(val: f64) -> Result<f64, NumericError> {
    if val.is_nan() {
        Err(NumericError::NaN)
    } else if val.is_infinite() {
        Err(NumericError::Infinite)
    } else {
        Ok(val)
    }
}

/// Length in world units
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default)]
#[repr(transparent)]
pub struct Length(pub f64);

impl Length {
    pub const ZERO: Length = Length(0.0);

    /// Unchecked constructor for constants.
    #[inline]
    pub(crate) const fn units(val: f64) -> Length {
        Length(val)
    }

    /// Create a Length with validation (rejects NaN/infinite)
    #[inline]
    pub fn try_new(val: f64) -> Result<Length, NumericError> {
        check_finite(val).map(Length)
    }

    /// Create a non-negative Length with validation
    #[inline]
    pub fn try_non_negative(val: f64) -> Result<Length, NumericError> {
        let val = check_finite(val)?;
        if val < 0.0 {
            Err(NumericError::Negative)
        } else {
            Ok(Length(val))
        }
    }

    /// Create a strictly positive Length with validation
    #[inline]
    pub fn try_positive(val: f64) -> Result<Length, NumericError> {
        let val = Length::try_non_negative(val)?.0;
        if val == 0.0 {
            Err(NumericError::Zero)
        } else {
            Ok(Length(val))
        }
    }

    #[inline]
    pub fn raw(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn max(self, other: Length) -> Length {
        Length(self.0.max(other.0))
    }
}

impl Add for Length {
    type Output = Length;
    fn add(self, rhs: Length) -> Length { Length(self.0 + rhs.0) }
}
impl Sub for Length {
    type Output = Length;
    fn sub(self, rhs: Length) -> Length { Length(self.0 - rhs.0) }
}
impl Mul<f64> for Length {
    type Output = Length;
    fn mul(self, rhs: f64) -> Length { Length(self.0 * rhs) }
}
impl Neg for Length {
    type Output = Length;
    fn neg(self) -> Length { Length(-self.0) }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", fmt_num(self.0))
    }
}

/// Angle in degrees
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default)]
#[repr(transparent)]
pub struct Angle(pub f64);

impl Angle {
    pub const ZERO: Angle = Angle(0.0);

    pub fn try_new(degrees: f64) -> Result<Angle, NumericError> {
        check_finite(degrees).map(Angle)
    }

    #[inline]
    pub fn degrees(self) -> f64 {
        self.0
    }

    #[inline]
    pub fn radians(self) -> f64 {
        self.0.to_radians()
    }

    /// Direction of a vector, in `[0, 360)`.
    pub fn of_vector(v: DVec2) -> Angle {
        Angle(v.y.atan2(v.x).to_degrees()).normalized()
    }

    /// Fold into `[0, 360)`.
    pub fn normalized(self) -> Angle {
        let a = self.0.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negatives
        if a >= 360.0 { Angle(0.0) } else { Angle(a) }
    }

    /// Keep text readable: anything pointing leftwards is turned half a turn.
    pub fn upright(self) -> Angle {
        let a = self.normalized().0;
        if a > 90.0 && a < 270.0 {
            Angle(a + 180.0).normalized()
        } else {
            Angle(a)
        }
    }

    /// Unit vector pointing along this angle.
    pub fn unit(self) -> DVec2 {
        DVec2::from_angle(self.radians())
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", fmt_num(self.0))
    }
}

/// Format a number the way TikZ likes it: no trailing zeros, no `-0`.
pub fn fmt_num(v: f64) -> String {
    let rounded = (v * 10_000.0).round() / 10_000.0;
    if rounded == 0.0 {
        return "0".to_string();
    }
    let s = format!("{rounded:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    s.to_string()
}

/// Convert world units → device pixels, flipping y (device y grows downward).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scaler {
    pub scale: f64,
    /// World point that maps to the device origin.
    pub origin: DVec2,
}

impl Scaler {
    /// Create a Scaler with validation (rejects NaN, infinite, zero, negative)
    pub fn try_new(scale: f64) -> Result<Self, NumericError> {
        let scale = check_finite(scale)?;
        if scale == 0.0 {
            Err(NumericError::Zero)
        } else if scale < 0.0 {
            Err(NumericError::Negative)
        } else {
            Ok(Scaler {
                scale,
                origin: DVec2::ZERO,
            })
        }
    }

    pub fn with_origin(self, origin: DVec2) -> Self {
        Scaler { origin, ..self }
    }

    /// World point → device point.
    pub fn point(&self, p: DVec2) -> DVec2 {
        let d = (p - self.origin) * self.scale;
        dvec2(d.x, -d.y)
    }

    /// World length → device length.
    pub fn len(&self, l: f64) -> f64 {
        l * self.scale
    }

    /// World angle (counter-clockwise) → device angle (clockwise, y down).
    pub fn angle(&self, a: Angle) -> Angle {
        Angle(-a.0).normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Length tests ====================

    #[test]
    fn length_try_new_rejects_nan() {
        assert_eq!(Length::try_new(f64::NAN), Err(NumericError::NaN));
    }

    #[test]
    fn length_try_new_rejects_infinity() {
        assert_eq!(Length::try_new(f64::INFINITY), Err(NumericError::Infinite));
        assert_eq!(Length::try_new(f64::NEG_INFINITY), Err(NumericError::Infinite));
    }

    #[test]
    fn length_try_non_negative() {
        assert!(Length::try_non_negative(0.0).is_ok());
        assert_eq!(Length::try_non_negative(-1.0), Err(NumericError::Negative));
    }

    #[test]
    fn length_try_positive_rejects_zero() {
        assert_eq!(Length::try_positive(0.0), Err(NumericError::Zero));
        assert_eq!(Length::try_positive(2.0), Ok(Length(2.0)));
    }

    #[test]
    fn length_arithmetic() {
        let a = Length(3.0);
        let b = Length(2.0);
        assert_eq!(a + b, Length(5.0));
        assert_eq!(a - b, Length(1.0));
        assert_eq!(a * 2.0, Length(6.0));
        assert_eq!(-a, Length(-3.0));
        assert_eq!(a.max(b), a);
    }

    // ==================== Angle tests ====================

    #[test]
    fn angle_normalizes_negative() {
        assert_eq!(Angle(-90.0).normalized(), Angle(270.0));
        assert_eq!(Angle(720.0).normalized(), Angle(0.0));
    }

    #[test]
    fn angle_upright_flips_leftward() {
        assert_eq!(Angle(180.0).upright(), Angle(0.0));
        assert_eq!(Angle(135.0).upright(), Angle(315.0));
        assert_eq!(Angle(45.0).upright(), Angle(45.0));
        // boundaries are exclusive
        assert_eq!(Angle(90.0).upright(), Angle(90.0));
        assert_eq!(Angle(270.0).upright(), Angle(270.0));
    }

    #[test]
    fn angle_of_vector() {
        assert!((Angle::of_vector(dvec2(0.0, 1.0)).0 - 90.0).abs() < 1e-9);
        assert!((Angle::of_vector(dvec2(0.0, -1.0)).0 - 270.0).abs() < 1e-9);
    }

    #[test]
    fn fmt_num_trims() {
        assert_eq!(fmt_num(1.0), "1");
        assert_eq!(fmt_num(1.25), "1.25");
        assert_eq!(fmt_num(-0.00001), "0");
        assert_eq!(fmt_num(0.1 + 0.2), "0.3");
    }

    // ==================== Scaler tests ====================

    #[test]
    fn scaler_try_new_rejects_bad_values() {
        assert_eq!(Scaler::try_new(0.0), Err(NumericError::Zero));
        assert_eq!(Scaler::try_new(-1.0), Err(NumericError::Negative));
        assert_eq!(Scaler::try_new(f64::NAN), Err(NumericError::NaN));
    }

    #[test]
    fn scaler_flips_y() {
        let s = Scaler::try_new(10.0).unwrap().with_origin(dvec2(1.0, 1.0));
        assert_eq!(s.point(dvec2(2.0, 3.0)), dvec2(10.0, -20.0));
        assert_eq!(s.len(0.5), 5.0);
        assert_eq!(s.angle(Angle(30.0)), Angle(330.0));
    }
}
