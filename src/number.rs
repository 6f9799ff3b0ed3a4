//! Component A: the numeric value carried by diagram leaves and by the
//! final valuation. Two representations share one interface: an exact
//! arbitrary-precision rational, or an `f64` standing in for the original's
//! long double (Rust has no portable 80-bit float; see DESIGN.md).
//!
//! Linear-space and log10-space arithmetic are both exposed as methods;
//! which one a caller uses is a property of the caller's counting mode, not
//! of `Number` itself — `+` is always linear addition, `log_sum_exp` is
//! always the log-space analogue of `+`, and callers pick per §4.A.
use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub};
use std::str::FromStr;

/// Either an exact rational or a binary float. The choice is fixed for the
/// lifetime of one evaluation (the `multiplePrecision` flag).
#[derive(Clone, Debug)]
pub enum Number {
    Exact(BigRational),
    Float(f64),
}

impl Number {
    pub fn zero(exact: bool) -> Self {
        if exact {
            Number::Exact(BigRational::zero())
        } else {
            Number::Float(0.0)
        }
    }

    pub fn one(exact: bool) -> Self {
        if exact {
            Number::Exact(BigRational::one())
        } else {
            Number::Float(1.0)
        }
    }

    /// The additive identity of log10-space: represents linear zero.
    pub fn log_zero() -> Self {
        Number::Float(f64::NEG_INFINITY)
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, Number::Exact(_))
    }

    /// Parses either a `p/q` rational literal or a decimal float, matching
    /// the grammar accepted for CLI/weight literals.
    pub fn parse(s: &str, exact: bool) -> Result<Self, crate::error::DpveError> {
        let bad = || crate::error::DpveError::InputError(format!("malformed number: {}", s));
        if exact {
            if let Some((num, den)) = s.split_once('/') {
                let n = BigInt::from_str(num.trim()).map_err(|_| bad())?;
                let d = BigInt::from_str(den.trim()).map_err(|_| bad())?;
                if d.is_zero() {
                    return Err(bad());
                }
                Ok(Number::Exact(BigRational::new(n, d)))
            } else if let Ok(f) = f64::from_str(s.trim()) {
                Ok(Number::Exact(
                    BigRational::from_float(f).ok_or_else(bad)?,
                ))
            } else {
                Err(bad())
            }
        } else {
            f64::from_str(s.trim()).map(Number::Float).map_err(|_| bad())
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            Number::Exact(r) => r.to_f64().unwrap_or(f64::NAN),
            Number::Float(f) => *f,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Number::Exact(r) => r.is_zero(),
            Number::Float(f) => *f == 0.0,
        }
    }

    pub fn abs(&self) -> Self {
        match self {
            Number::Exact(r) => Number::Exact(r.abs()),
            Number::Float(f) => Number::Float(f.abs()),
        }
    }

    /// base-10 logarithm, via mantissa/exponent extraction for the exact
    /// variant so arbitrarily large numerators/denominators never overflow
    /// an intermediate float conversion.
    pub fn log10(&self) -> f64 {
        match self {
            Number::Float(f) => f.log10(),
            Number::Exact(r) => {
                if r.is_zero() {
                    return f64::NEG_INFINITY;
                }
                let sign = if r.is_negative() { -1.0 } else { 1.0 };
                let _ = sign; // sign is not representable in log10-space; callers track it separately
                log10_bigint(&r.numer().abs()) - log10_bigint(&r.denom().abs())
            }
        }
    }

    /// `self * 2^k`, exact for the rational variant (renormalizes the
    /// numerator by a bit shift rather than via floating exponentiation).
    pub fn mul_exp2(&self, k: i32) -> Self {
        match self {
            Number::Exact(r) => {
                if k >= 0 {
                    Number::Exact(r * BigRational::from_integer(BigInt::from(1u32) << (k as u32)))
                } else {
                    Number::Exact(r / BigRational::from_integer(BigInt::from(1u32) << ((-k) as u32)))
                }
            }
            Number::Float(f) => Number::Float(f * 2f64.powi(k)),
        }
    }

    /// Log-space addition: `log10(10^a + 10^b)`, computed with the usual
    /// max-shift trick to avoid overflow. `-inf` is the absorbing zero.
    pub fn log_sum_exp(a: f64, b: f64) -> f64 {
        if a == f64::NEG_INFINITY {
            return b;
        }
        if b == f64::NEG_INFINITY {
            return a;
        }
        let m = a.max(b);
        m + (10f64.powf(a - m) + 10f64.powf(b - m)).log10()
    }
}

/// `log10` of a non-negative [`BigInt`], via mantissa/exponent extraction so
/// numerators/denominators with thousands of bits never need a direct (and
/// overflowing, or precision-destroying) float conversion.
fn log10_bigint(v: &BigInt) -> f64 {
    debug_assert!(!v.is_negative());
    if v.is_zero() {
        return f64::NEG_INFINITY;
    }
    let bits = v.bits();
    if bits <= 53 {
        return v.to_f64().unwrap_or(0.0).log10();
    }
    let shift = (bits - 53) as u32;
    let mantissa = (v >> shift).to_f64().unwrap_or(0.0);
    mantissa.log10() + (shift as f64) * 2f64.log10()
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Exact(a), Number::Exact(b)) => a == b,
            (Number::Float(a), Number::Float(b)) => a == b,
            _ => self.to_f64() == other.to_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::Exact(a), Number::Exact(b)) => a.partial_cmp(b),
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }
}

impl Add for Number {
    type Output = Number;
    fn add(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Number::Exact(a), Number::Exact(b)) => Number::Exact(a + b),
            (a, b) => Number::Float(a.to_f64() + b.to_f64()),
        }
    }
}

impl AddAssign for Number {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.clone() + rhs;
    }
}

impl Sub for Number {
    type Output = Number;
    fn sub(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Number::Exact(a), Number::Exact(b)) => Number::Exact(a - b),
            (a, b) => Number::Float(a.to_f64() - b.to_f64()),
        }
    }
}

impl Mul for Number {
    type Output = Number;
    fn mul(self, rhs: Self) -> Self::Output {
        match (self, rhs) {
            (Number::Exact(a), Number::Exact(b)) => Number::Exact(a * b),
            (a, b) => Number::Float(a.to_f64() * b.to_f64()),
        }
    }
}

impl MulAssign for Number {
    fn mul_assign(&mut self, rhs: Self) {
        *self = self.clone() * rhs;
    }
}

impl Neg for Number {
    type Output = Number;
    fn neg(self) -> Self::Output {
        match self {
            Number::Exact(a) => Number::Exact(-a),
            Number::Float(a) => Number::Float(-a),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Number::Exact(r) => write!(f, "{}/{}", r.numer(), r.denom()),
            Number::Float(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_arithmetic() {
        let a = Number::parse("1/3", true).unwrap();
        let b = Number::parse("1/6", true).unwrap();
        let sum = a + b;
        assert_eq!(sum, Number::parse("1/2", true).unwrap());
    }

    #[test]
    fn log_sum_exp_identity() {
        assert_eq!(Number::log_sum_exp(f64::NEG_INFINITY, 2.0), 2.0);
        let r = Number::log_sum_exp(0.0, 0.0);
        assert!((r - 10f64.powf(0.30103)).abs() < 1e-6 || (r - (2f64).log10()).abs() < 1e-9);
    }

    #[test]
    fn mul_exp2_exact() {
        let a = Number::parse("3/4", true).unwrap();
        let scaled = a.mul_exp2(2);
        assert_eq!(scaled, Number::parse("3/1", true).unwrap());
    }

    #[test]
    fn float_log10() {
        let n = Number::Float(100.0);
        assert!((n.log10() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn exact_log10_small_integer() {
        let n = Number::parse("3", true).unwrap();
        assert!((n.log10() - 3f64.log10()).abs() < 1e-9);
    }

    #[test]
    fn exact_log10_fraction_below_one() {
        let n = Number::parse("7/10", true).unwrap();
        assert!((n.log10() - 0.7f64.log10()).abs() < 1e-9);
    }

    #[test]
    fn exact_log10_matches_float_for_large_values() {
        let n = Number::parse("123456789/987", true).unwrap();
        let expected = (123456789f64 / 987f64).log10();
        assert!((n.log10() - expected).abs() < 1e-6);
    }
}
