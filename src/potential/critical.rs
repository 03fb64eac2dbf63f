use crate::error::{PotentialError, Result};
use crate::math::root::{bracket_outward, brent};

use super::{RocheParams, RochePotential};

/// Relative tolerance on the Lagrange-point abscissae.
const ABSCISSA_TOLERANCE: f64 = 1e-14;

/// Potential values and positions of the collinear Lagrange points.
///
/// Abscissae are measured along the line of centres in the primary's frame:
/// `0 < x_l1 < d`, `x_l2 > d` and `x_l3 < 0`. For a misaligned spin the
/// points are the extrema of the potential restricted to that line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CriticalPotentials {
    /// Potential at L1 (inner critical potential).
    pub l1: f64,
    /// Potential at L2 (behind the secondary).
    pub l2: f64,
    /// Potential at L3 (behind the primary).
    pub l3: f64,
    /// Abscissa of L1.
    pub x_l1: f64,
    /// Abscissa of L2.
    pub x_l2: f64,
    /// Abscissa of L3.
    pub x_l3: f64,
}

impl CriticalPotentials {
    /// The outer critical potential: the first of L2/L3 to open the envelope.
    #[must_use]
    pub fn outer(&self) -> f64 {
        self.l2.max(self.l3)
    }

    /// Fillout factor `(Ω − Ω_L1) / (Ω_outer − Ω_L1)`, clamped to `[0, 1]`.
    #[must_use]
    pub fn fillout(&self, potential: f64) -> f64 {
        ((potential - self.l1) / (self.outer() - self.l1)).clamp(0.0, 1.0)
    }

    /// Potential corresponding to a fillout factor in `[0, 1]`.
    #[must_use]
    pub fn potential_at_fillout(&self, fillout: f64) -> f64 {
        self.l1 + fillout.clamp(0.0, 1.0) * (self.outer() - self.l1)
    }
}

/// Locates L1, L2 and L3 by 1-D root finding on `dΩ/dx` along the line of centres.
///
/// # Errors
///
/// Returns `PotentialError::InvalidParameter` for invalid parameters and
/// `PotentialError::CriticalPointNotFound` when the slope has no sign change
/// on the searched interval (for example without centrifugal support along
/// the line of centres).
pub fn critical_potentials(params: &RocheParams) -> Result<CriticalPotentials> {
    params.validate()?;
    let pot = RochePotential::binary(params);
    let d = params.d;
    let eps = 1e-6 * d;
    let slope = |x: f64| pot.on_axis_slope(x);

    let x_l1 = brent(slope, eps, d - eps, ABSCISSA_TOLERANCE * d).ok_or_else(|| {
        PotentialError::CriticalPointNotFound {
            point: "L1",
            reason: format!("slope has no sign change on (0, {d})"),
        }
    })?;

    let x_l2 = outer_point(&slope, d + eps, 100.0 * d, "L2")?;
    let x_l3 = outer_point(&slope, -eps, -100.0 * d, "L3")?;

    let result = CriticalPotentials {
        l1: pot.on_axis(x_l1),
        l2: pot.on_axis(x_l2),
        l3: pot.on_axis(x_l3),
        x_l1,
        x_l2,
        x_l3,
    };
    tracing::debug!(
        l1 = result.l1,
        l2 = result.l2,
        l3 = result.l3,
        "critical potentials"
    );
    Ok(result)
}

fn outer_point<F>(slope: &F, start: f64, limit: f64, point: &'static str) -> Result<f64>
where
    F: Fn(f64) -> f64,
{
    let step = 1e-3 * limit.abs() / 100.0;
    let (lo, hi) = bracket_outward(slope, start, step, limit).ok_or_else(|| {
        PotentialError::CriticalPointNotFound {
            point,
            reason: format!("slope keeps its sign between {start} and {limit}"),
        }
    })?;
    brent(slope, lo, hi, ABSCISSA_TOLERANCE * limit.abs()).ok_or_else(|| {
        PotentialError::CriticalPointNotFound {
            point,
            reason: "root refinement did not converge".into(),
        }
        .into()
    })
}

/// Critical (equatorial break-up) potential of an isolated rotating star:
/// `Ω_crit = 3/2 · ω^(2/3)`.
#[must_use]
pub fn rotating_critical_potential(omega: f64) -> f64 {
    1.5 * omega.abs().powf(2.0 / 3.0)
}
