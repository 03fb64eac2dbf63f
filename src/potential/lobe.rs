use std::f64::consts::{PI, TAU};

use crate::error::{MeshError, Result};
use crate::math::quadrature::GaussLegendre;
use crate::math::root::{brent, golden_section_min, scan_for_sign_change};
use crate::math::{Point3, Vector3};

use super::{Equipotential, RochePotential};

/// Number of linear scan steps used to bracket a radial crossing.
const RADIAL_SCAN_STEPS: usize = 400;

/// Area and volume of a star-shaped lobe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LobeIntegrals {
    /// Surface area.
    pub area: f64,
    /// Enclosed volume.
    pub volume: f64,
}

impl LobeIntegrals {
    /// Radius of the sphere with the same volume.
    #[must_use]
    pub fn volume_equivalent_radius(&self) -> f64 {
        (3.0 * self.volume / (4.0 * PI)).cbrt()
    }
}

/// Integrates the area and volume of a lobe around `center` by radial
/// root finding on a spherical quadrature grid.
///
/// `V = ∮ r³/3 dΩ` and `A = ∮ r² / |r̂·n̂| dΩ`, with Gauss-Legendre nodes in
/// `cos θ` and uniform nodes in `φ`. Independent of the marching mesher.
pub struct LobeQuadrature<'a> {
    potential: &'a RochePotential,
    center: Point3,
    target: f64,
    max_radius: f64,
    n_theta: usize,
    n_phi: usize,
}

impl<'a> LobeQuadrature<'a> {
    /// Creates a quadrature for the level set `Ω = target` around `center`.
    ///
    /// `max_radius` bounds the radial search and must lie outside the lobe.
    #[must_use]
    pub fn new(potential: &'a RochePotential, center: Point3, target: f64, max_radius: f64) -> Self {
        Self {
            potential,
            center,
            target,
            max_radius,
            n_theta: 48,
            n_phi: 96,
        }
    }

    /// Sets the grid resolution.
    #[must_use]
    pub fn with_resolution(mut self, n_theta: usize, n_phi: usize) -> Self {
        self.n_theta = n_theta.max(2);
        self.n_phi = n_phi.max(4);
        self
    }

    /// Distance from the centre to the level set along `direction`.
    ///
    /// # Errors
    ///
    /// Returns `MeshError::InvalidPotential` if the level set is not crossed
    /// within `max_radius`.
    pub fn radius(&self, direction: &Vector3) -> Result<f64> {
        radial_crossing(self.potential, &self.center, direction, self.target, self.max_radius)
    }

    /// Runs the quadrature.
    ///
    /// # Errors
    ///
    /// Returns an error if any radial crossing cannot be located.
    #[allow(clippy::cast_precision_loss)]
    pub fn execute(&self) -> Result<LobeIntegrals> {
        let rule = GaussLegendre::new(self.n_theta);
        let d_phi = TAU / self.n_phi as f64;
        let mut area = 0.0;
        let mut volume = 0.0;

        for (&mu, &w) in rule.nodes.iter().zip(&rule.weights) {
            let sin_theta = (1.0 - mu * mu).max(0.0).sqrt();
            for k in 0..self.n_phi {
                let phi = (k as f64 + 0.5) * d_phi;
                let dir = Vector3::new(sin_theta * phi.cos(), sin_theta * phi.sin(), mu);
                let r = self.radius(&dir)?;
                let grad = self.potential.gradient(&(self.center + dir * r));
                let cos_tilt = (grad.dot(&dir) / grad.norm()).abs().max(1e-12);
                let weight = w * d_phi;
                volume += weight * r * r * r / 3.0;
                area += weight * r * r / cos_tilt;
            }
        }

        Ok(LobeIntegrals { area, volume })
    }
}

/// Locates the first crossing of `Ω = target` along a ray from `center`.
pub(crate) fn radial_crossing(
    potential: &RochePotential,
    center: &Point3,
    direction: &Vector3,
    target: f64,
    max_radius: f64,
) -> Result<f64> {
    let dir = direction.normalize();
    let f = |r: f64| potential.value(&(center + dir * r)) - target;
    let start = max_radius * 1e-6;
    let not_found = || MeshError::InvalidPotential {
        potential: target,
        min: f64::NAN,
        max: f64::NAN,
        topology: "a closed surface around the seed centre",
    };
    let (lo, hi) =
        scan_for_sign_change(f, start, max_radius, RADIAL_SCAN_STEPS).ok_or_else(not_found)?;
    brent(f, lo, hi, 1e-15 * max_radius).ok_or_else(|| not_found().into())
}

/// Eggleton (1983) approximation of the volume-equivalent Roche-lobe radius
/// of a star, in units of the separation.
///
/// `q` is the mass of the star divided by the mass of its companion.
#[must_use]
pub fn eggleton_radius(q: f64) -> f64 {
    let q23 = q.powf(2.0 / 3.0);
    0.49 * q23 / (0.6 * q23 + (1.0 + q.cbrt()).ln())
}

/// The narrowest cross-section of a contact envelope.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactNeck {
    /// Abscissa of the neck plane `x = const`.
    pub x: f64,
    /// Half-width of the envelope in `y` at the neck.
    pub radius: f64,
}

/// Finds the neck of a contact envelope by minimising its `y` half-width
/// between the two centres.
///
/// # Errors
///
/// Returns `MeshError::InvalidPotential` if the envelope does not bridge
/// the centres at `target`.
pub fn contact_neck(potential: &RochePotential, target: f64) -> Result<ContactNeck> {
    let d = potential.d();
    let width = |x: f64| -> Result<f64> {
        radial_crossing(potential, &Point3::new(x, 0.0, 0.0), &Vector3::y(), target, 2.0 * d)
    };
    let lo = 0.05 * d;
    let hi = 0.95 * d;
    // The potential on the axis is convex between the centres; its minimum is L1.
    let x_saddle = golden_section_min(|x| potential.on_axis(x), lo, hi, 1e-12 * d);
    let saddle = potential.on_axis(x_saddle);
    if saddle <= target {
        return Err(MeshError::InvalidPotential {
            potential: target,
            min: f64::NEG_INFINITY,
            max: saddle,
            topology: "a contact envelope bridging both centres",
        }
        .into());
    }
    let x = golden_section_min(|x| width(x).unwrap_or(f64::INFINITY), lo, hi, 1e-9 * d);
    let radius = width(x)?;
    Ok(ContactNeck { x, radius })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::potential::{critical_potentials, RocheParams};
    use approx::assert_relative_eq;

    #[test]
    fn sphere_integrals_are_exact() {
        let pot = RochePotential::rotating(0.0, Vector3::z_axis());
        let integrals = LobeQuadrature::new(&pot, Point3::origin(), 2.0, 2.0)
            .with_resolution(8, 16)
            .execute()
            .unwrap();
        let r: f64 = 0.5;
        assert_relative_eq!(integrals.volume, 4.0 / 3.0 * PI * r.powi(3), max_relative = 1e-10);
        assert_relative_eq!(integrals.area, 4.0 * PI * r * r, max_relative = 1e-10);
        assert_relative_eq!(integrals.volume_equivalent_radius(), r, max_relative = 1e-10);
    }

    #[test]
    fn critical_lobe_matches_eggleton() {
        let params = RocheParams::synchronous(1.0).unwrap();
        let crit = critical_potentials(&params).unwrap();
        let pot = RochePotential::binary(&params);
        let integrals = LobeQuadrature::new(&pot, Point3::origin(), crit.l1 * (1.0 + 1e-9), crit.x_l1)
            .execute()
            .unwrap();
        let r = integrals.volume_equivalent_radius();
        assert_relative_eq!(r, eggleton_radius(1.0), max_relative = 0.02);
    }

    #[test]
    fn rotating_star_is_oblate() {
        let pot = RochePotential::rotating(0.5, Vector3::z_axis());
        let quad = LobeQuadrature::new(&pot, Point3::origin(), 2.0, 2.0);
        let polar = quad.radius(&Vector3::z()).unwrap();
        let equatorial = quad.radius(&Vector3::x()).unwrap();
        assert_relative_eq!(polar, 0.5, max_relative = 1e-12);
        assert!(equatorial > polar);
    }

    #[test]
    fn missing_crossing_is_invalid_potential() {
        let pot = RochePotential::rotating(0.0, Vector3::z_axis());
        // Surface at r = 10 lies beyond the search radius.
        let quad = LobeQuadrature::new(&pot, Point3::origin(), 0.1, 2.0);
        assert!(quad.radius(&Vector3::x()).is_err());
    }

    #[test]
    fn neck_of_equal_mass_envelope_is_central() {
        let params = RocheParams::synchronous(1.0).unwrap();
        let crit = critical_potentials(&params).unwrap();
        let pot = RochePotential::binary(&params);
        let neck = contact_neck(&pot, crit.potential_at_fillout(0.5)).unwrap();
        assert_relative_eq!(neck.x, 0.5, epsilon = 1e-6);
        assert!(neck.radius > 0.0 && neck.radius < 0.5);
    }

    #[test]
    fn detached_potential_has_no_neck() {
        let params = RocheParams::synchronous(1.0).unwrap();
        let pot = RochePotential::binary(&params);
        assert!(contact_neck(&pot, 3.9).is_err());
    }

    #[test]
    fn eggleton_equal_masses() {
        assert_relative_eq!(eggleton_radius(1.0), 0.49 / (0.6 + 2.0_f64.ln()), epsilon = 1e-12);
    }
}
