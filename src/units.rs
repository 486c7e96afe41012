//! This module defines various unit types and their conversions.
use serde::{Deserialize, Serialize};

macro_rules! unit_struct {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug,
            Clone,
            Copy,
            Default,
            PartialEq,
            PartialOrd,
            Serialize,
            Deserialize,
            derive_more::Add,
            derive_more::Sub,
            derive_more::Display,
        )]
        #[serde(transparent)]
        pub struct $name(pub f64);

        impl $name {
            /// Creates a new instance of the unit type from a f64 value.
            pub const fn new(val: f64) -> Self {
                Self(val)
            }

            /// Returns the value of the unit type as a f64.
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Whether the underlying value is finite
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl std::ops::Mul<Dimensionless> for $name {
            type Output = $name;
            fn mul(self, rhs: Dimensionless) -> $name {
                $name(self.0 * rhs.0)
            }
        }

        impl std::ops::Div<Dimensionless> for $name {
            type Output = $name;
            fn div(self, rhs: Dimensionless) -> $name {
                $name(self.0 / rhs.0)
            }
        }

        impl std::iter::Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                $name(iter.map(|x| x.0).sum())
            }
        }
    };
}

macro_rules! impl_mul {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Mul<$Rhs> for $Lhs {
            type Output = $Out;
            fn mul(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 * rhs.0)
            }
        }
        impl std::ops::Mul<$Lhs> for $Rhs {
            type Output = $Out;
            fn mul(self, lhs: $Lhs) -> $Out {
                <$Out>::new(self.0 * lhs.0)
            }
        }
    };
}

macro_rules! impl_div {
    ($Lhs:ty, $Rhs:ty, $Out:ty) => {
        impl std::ops::Div<$Rhs> for $Lhs {
            type Output = $Out;
            fn div(self, rhs: $Rhs) -> $Out {
                <$Out>::new(self.0 / rhs.0)
            }
        }
    };
}

/// Represents a dimensionless quantity (fractions, weights, commitment levels).
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    PartialOrd,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::Sub,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct Dimensionless(pub f64);

impl Dimensionless {
    /// Creates a new dimensionless value
    pub const fn new(val: f64) -> Self {
        Self(val)
    }

    /// Returns the value as a f64.
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Whether the underlying value is finite
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }
}

impl std::ops::Mul for Dimensionless {
    type Output = Dimensionless;

    fn mul(self, rhs: Dimensionless) -> Self::Output {
        Dimensionless(self.0 * rhs.0)
    }
}

// Base quantities
unit_struct!(Hours, "A duration in hours.");
unit_struct!(Power, "A power level in MW.");
unit_struct!(Energy, "An amount of energy in MWh.");
unit_struct!(Money, "An amount of money.");
unit_struct!(Fuel, "An amount of fuel in MMBtu.");

// Derived quantities
unit_struct!(MoneyPerEnergy, "A cost per MWh.");
unit_struct!(MoneyPerPower, "A cost per MW (e.g. startup cost per MW of capacity).");
unit_struct!(FuelPerPower, "Fuel burn per MW of capacity.");
unit_struct!(
    RampRate,
    "A ramp rate expressed as a fraction of capacity per minute."
);

impl_mul!(Power, Hours, Energy);
impl_mul!(MoneyPerEnergy, Energy, Money);
impl_mul!(MoneyPerPower, Power, Money);
impl_mul!(FuelPerPower, Power, Fuel);
impl_div!(Energy, Hours, Power);
impl_div!(Power, Power, Dimensionless);

impl RampRate {
    /// The change in power this rate allows over the given duration for a unit of given capacity.
    ///
    /// Rates are per minute, so a rate of `1/60` lets a unit traverse its full capacity in an hour.
    pub fn limit_over(self, duration: Hours, capacity: Power) -> Power {
        Power(self.0 * 60.0 * duration.0 * capacity.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_ramp_limit_over() {
        let rate = RampRate(0.01);
        assert_approx_eq!(
            f64,
            rate.limit_over(Hours(0.5), Power(200.0)).value(),
            60.0
        );
    }

    #[test]
    fn test_power_times_hours() {
        let energy: Energy = Power(10.0) * Hours(2.5);
        assert_eq!(energy, Energy(25.0));
        assert_eq!(Power(10.0) / Power(40.0), Dimensionless(0.25));
    }
}
