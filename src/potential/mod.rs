mod critical;
mod lobe;

pub use critical::{critical_potentials, rotating_critical_potential, CriticalPotentials};
pub use lobe::{contact_neck, eggleton_radius, ContactNeck, LobeIntegrals, LobeQuadrature};
pub(crate) use lobe::radial_crossing;

use crate::error::{PotentialError, Result};
use crate::math::{Matrix3, Point3, UnitVector3, Vector3};

/// A smooth scalar field whose level sets are meshed.
///
/// Implementations must be cheap to share across threads.
pub trait Equipotential: Sync {
    /// Evaluates the field at `p`.
    fn value(&self, p: &Point3) -> f64;

    /// Evaluates the analytic gradient at `p`.
    fn gradient(&self, p: &Point3) -> Vector3;

    /// Evaluates the analytic Hessian at `p`.
    fn hessian(&self, p: &Point3) -> Matrix3;
}

/// Orientation of the primary's spin axis relative to the orbital axis `+z`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Misalignment {
    /// Spin parallel to the orbital angular momentum.
    #[default]
    Aligned,
    /// Obliquity `θ` in radians, tilting the spin axis towards `+x`.
    Obliquity(f64),
    /// Arbitrary spin axis.
    SpinAxis(UnitVector3),
}

impl Misalignment {
    /// Returns the spin axis as a unit vector.
    #[must_use]
    pub fn spin_axis(&self) -> UnitVector3 {
        match self {
            Self::Aligned => Vector3::z_axis(),
            Self::Obliquity(theta) => {
                UnitVector3::new_unchecked(Vector3::new(theta.sin(), 0.0, theta.cos()))
            }
            Self::SpinAxis(axis) => *axis,
        }
    }

    /// Returns `true` when the spin axis coincides with the orbital axis.
    #[must_use]
    pub fn is_aligned(&self) -> bool {
        (self.spin_axis().into_inner() - Vector3::z()).norm() <= f64::EPSILON
    }
}

/// Orbital and rotational parameters of a binary.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RocheParams {
    /// Mass ratio `M₂ / M₁`.
    pub q: f64,
    /// Synchronicity parameter of the primary.
    pub f: f64,
    /// Instantaneous separation of the centres.
    pub d: f64,
    /// Spin-orbit misalignment of the primary.
    pub misalignment: Misalignment,
}

impl RocheParams {
    /// Creates validated binary parameters.
    ///
    /// # Errors
    ///
    /// Returns `PotentialError::InvalidParameter` unless `q`, `f` and `d`
    /// are finite and positive.
    pub fn new(q: f64, f: f64, d: f64, misalignment: Misalignment) -> Result<Self> {
        let params = Self {
            q,
            f,
            d,
            misalignment,
        };
        params.validate()?;
        Ok(params)
    }

    /// Aligned, synchronous binary at unit separation.
    ///
    /// # Errors
    ///
    /// Returns an error if `q` is not finite and positive.
    pub fn synchronous(q: f64) -> Result<Self> {
        Self::new(q, 1.0, 1.0, Misalignment::Aligned)
    }

    /// Checks that all parameters are physically meaningful.
    ///
    /// # Errors
    ///
    /// Returns `PotentialError::InvalidParameter` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        for (parameter, value) in [("q", self.q), ("F", self.f), ("d", self.d)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(PotentialError::InvalidParameter { parameter, value }.into());
            }
        }
        if let Misalignment::Obliquity(theta) = self.misalignment {
            if !theta.is_finite() {
                return Err(PotentialError::InvalidParameter {
                    parameter: "obliquity",
                    value: theta,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Position of the secondary's centre.
    #[must_use]
    pub fn secondary_center(&self) -> Point3 {
        Point3::new(self.d, 0.0, 0.0)
    }
}

/// The generalised Roche potential for one parameter set.
///
/// In the rotating frame centred on the primary, with the secondary at
/// `(d, 0, 0)` and the primary spinning about the unit axis `s`:
///
/// `Ω(p) = 1/r₁ + q (1/r₂ − x/d²) + ½ (1 + q) F² (|p|² − (p·s)²)`
///
/// For `s = (sin θ, 0, cos θ)` the last term is
/// `½ (1 + q) F² [(x cos θ − z sin θ)² + y²]`.
#[derive(Debug, Clone, Copy)]
pub struct RochePotential {
    q: f64,
    d: f64,
    /// `(1 + q) F²`, the centrifugal coefficient.
    omega_sq: f64,
    spin: UnitVector3,
}

impl RochePotential {
    /// Potential of a binary.
    #[must_use]
    pub fn binary(params: &RocheParams) -> Self {
        Self {
            q: params.q,
            d: params.d,
            omega_sq: (1.0 + params.q) * params.f * params.f,
            spin: params.misalignment.spin_axis(),
        }
    }

    /// Potential of an isolated star rotating with angular velocity `omega`
    /// (in units where `GM = 1`) about `spin`.
    #[must_use]
    pub fn rotating(omega: f64, spin: UnitVector3) -> Self {
        Self {
            q: 0.0,
            d: 1.0,
            omega_sq: omega * omega,
            spin,
        }
    }

    /// Mass ratio.
    #[must_use]
    pub fn q(&self) -> f64 {
        self.q
    }

    /// Separation of the centres.
    #[must_use]
    pub fn d(&self) -> f64 {
        self.d
    }

    /// Spin axis of the primary.
    #[must_use]
    pub fn spin(&self) -> &UnitVector3 {
        &self.spin
    }

    /// Evaluates the potential, rejecting the point-mass singularities.
    ///
    /// # Errors
    ///
    /// Returns `PotentialError::Singular` when `p` coincides with a centre.
    pub fn checked_value(&self, p: &Point3) -> Result<f64> {
        let value = self.value(p);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(PotentialError::Singular.into())
        }
    }

    /// Potential along the line of centres (`y = z = 0`).
    #[must_use]
    pub fn on_axis(&self, x: f64) -> f64 {
        self.value(&Point3::new(x, 0.0, 0.0))
    }

    /// Derivative of [`Self::on_axis`] with respect to `x`.
    #[must_use]
    pub fn on_axis_slope(&self, x: f64) -> f64 {
        self.gradient(&Point3::new(x, 0.0, 0.0)).x
    }

    fn perpendicular(&self, p: &Vector3) -> Vector3 {
        let s = self.spin.into_inner();
        p - s * p.dot(&s)
    }
}

impl Equipotential for RochePotential {
    fn value(&self, p: &Point3) -> f64 {
        let r1 = p.coords.norm();
        let perp = self.perpendicular(&p.coords);
        let mut value = 1.0 / r1 + 0.5 * self.omega_sq * perp.norm_squared();
        if self.q > 0.0 {
            let r2 = (p.coords - Vector3::new(self.d, 0.0, 0.0)).norm();
            value += self.q * (1.0 / r2 - p.x / (self.d * self.d));
        }
        value
    }

    fn gradient(&self, p: &Point3) -> Vector3 {
        let r1 = p.coords.norm();
        let mut grad = -p.coords / (r1 * r1 * r1) + self.perpendicular(&p.coords) * self.omega_sq;
        if self.q > 0.0 {
            let rel = p.coords - Vector3::new(self.d, 0.0, 0.0);
            let r2 = rel.norm();
            grad -= rel * (self.q / (r2 * r2 * r2));
            grad.x -= self.q / (self.d * self.d);
        }
        grad
    }

    fn hessian(&self, p: &Point3) -> Matrix3 {
        let s = self.spin.into_inner();
        let mut h = (Matrix3::identity() - s * s.transpose()) * self.omega_sq;
        h += inverse_distance_hessian(&p.coords);
        if self.q > 0.0 {
            let rel = p.coords - Vector3::new(self.d, 0.0, 0.0);
            h += inverse_distance_hessian(&rel) * self.q;
        }
        h
    }
}

/// Hessian of `1/|r|`: `(3 r rᵀ − |r|² I) / |r|⁵`.
fn inverse_distance_hessian(r: &Vector3) -> Matrix3 {
    let r2 = r.norm_squared();
    let r5 = r2 * r2 * r2.sqrt();
    (r * r.transpose() * 3.0 - Matrix3::identity() * r2) / r5
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tilted() -> RochePotential {
        let params = RocheParams::new(0.6, 1.3, 1.1, Misalignment::Obliquity(0.4)).unwrap();
        RochePotential::binary(&params)
    }

    #[test]
    fn matches_closed_form_obliquity() {
        let (q, f, d, theta) = (0.6, 1.3, 1.1, 0.4_f64);
        let pot = tilted();
        let p = Point3::new(0.2, -0.15, 0.1);
        let r1 = p.coords.norm();
        let r2 = ((p.x - d).powi(2) + p.y * p.y + p.z * p.z).sqrt();
        let expected = 1.0 / r1
            + q * (1.0 / r2 - p.x / (d * d))
            + 0.5 * (1.0 + q) * f * f * ((p.x * theta.cos() - p.z * theta.sin()).powi(2) + p.y * p.y);
        assert_relative_eq!(pot.value(&p), expected, epsilon = 1e-12);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let pot = tilted();
        let p = Point3::new(0.31, 0.12, -0.2);
        let h = 1e-6;
        let grad = pot.gradient(&p);
        for axis in 0..3 {
            let mut e = Vector3::zeros();
            e[axis] = h;
            let fd = (pot.value(&(p + e)) - pot.value(&(p - e))) / (2.0 * h);
            assert_relative_eq!(grad[axis], fd, epsilon = 1e-6);
        }
    }

    #[test]
    fn hessian_matches_finite_differences() {
        let pot = tilted();
        let p = Point3::new(0.31, 0.12, -0.2);
        let h = 1e-6;
        let hess = pot.hessian(&p);
        for axis in 0..3 {
            let mut e = Vector3::zeros();
            e[axis] = h;
            let column = (pot.gradient(&(p + e)) - pot.gradient(&(p - e))) / (2.0 * h);
            for row in 0..3 {
                assert_relative_eq!(hess[(row, axis)], column[row], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn hessian_is_symmetric() {
        let hess = tilted().hessian(&Point3::new(-0.4, 0.3, 0.25));
        assert_relative_eq!(hess, hess.transpose(), epsilon = 1e-12);
    }

    #[test]
    fn spin_axis_variants_agree() {
        let theta = 0.7_f64;
        let a = Misalignment::Obliquity(theta).spin_axis();
        let b = Misalignment::SpinAxis(UnitVector3::new_normalize(Vector3::new(
            theta.sin(),
            0.0,
            theta.cos(),
        )))
        .spin_axis();
        assert_relative_eq!(a.into_inner(), b.into_inner(), epsilon = 1e-12);
        assert_eq!(Misalignment::Aligned.spin_axis(), Vector3::z_axis());
    }

    #[test]
    fn rotating_star_without_spin_is_point_mass() {
        let pot = RochePotential::rotating(0.0, Vector3::z_axis());
        assert_relative_eq!(pot.value(&Point3::new(0.0, 0.5, 0.0)), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn singularity_is_reported() {
        let pot = tilted();
        assert!(pot.checked_value(&Point3::origin()).is_err());
        assert!(pot.checked_value(&Point3::new(1.1, 0.0, 0.0)).is_err());
        assert!(pot.checked_value(&Point3::new(0.3, 0.0, 0.0)).is_ok());
    }

    #[test]
    fn rejects_non_positive_parameters() {
        assert!(RocheParams::new(0.0, 1.0, 1.0, Misalignment::Aligned).is_err());
        assert!(RocheParams::new(1.0, -1.0, 1.0, Misalignment::Aligned).is_err());
        assert!(RocheParams::new(1.0, 1.0, f64::NAN, Misalignment::Aligned).is_err());
        assert!(RocheParams::new(1.0, 1.0, 1.0, Misalignment::Obliquity(f64::INFINITY)).is_err());
    }
}
