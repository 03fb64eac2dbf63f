use crate::error::{MeshError, Result};
use crate::math::{Point3, UnitVector3};
use crate::potential::Equipotential;

/// Maximum Newton steps when projecting onto the level set.
const MAX_NEWTON_STEPS: usize = 60;

/// Projects `start` onto the level set `Ω = target` by Newton iteration
/// along the local gradient.
///
/// Converges when `|Ω − target| < tolerance`.
///
/// # Errors
///
/// Returns `MeshError::ProjectionFailed` if the iteration leaves the
/// domain or does not converge.
pub fn project_onto_level_set<P: Equipotential>(
    potential: &P,
    start: &Point3,
    target: f64,
    tolerance: f64,
) -> Result<Point3> {
    let mut p = *start;
    for _ in 0..MAX_NEWTON_STEPS {
        let residual = potential.value(&p) - target;
        if !residual.is_finite() {
            break;
        }
        if residual.abs() < tolerance {
            return Ok(p);
        }
        let grad = potential.gradient(&p);
        let norm_sq = grad.norm_squared();
        if !norm_sq.is_finite() || norm_sq <= f64::MIN_POSITIVE {
            break;
        }
        p -= grad * (residual / norm_sq);
    }
    Err(MeshError::ProjectionFailed.into())
}

/// Outward unit normal of the level set at `p`.
///
/// The potential decreases outwards, so the normal is `−∇Ω / |∇Ω|`.
///
/// # Errors
///
/// Returns `MeshError::DegenerateTopology` at critical points where the
/// gradient vanishes.
pub fn outward_normal<P: Equipotential>(potential: &P, p: &Point3) -> Result<(UnitVector3, f64)> {
    let grad = potential.gradient(p);
    let norm = grad.norm();
    if !norm.is_finite() || norm <= f64::MIN_POSITIVE {
        return Err(MeshError::DegenerateTopology(format!(
            "vanishing potential gradient at ({}, {}, {})",
            p.x, p.y, p.z
        ))
        .into());
    }
    Ok((UnitVector3::new_unchecked(-grad / norm), norm))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Vector3;
    use crate::potential::{RocheParams, RochePotential};

    #[test]
    fn projects_onto_sphere() {
        let pot = RochePotential::rotating(0.0, Vector3::z_axis());
        let p = project_onto_level_set(&pot, &Point3::new(0.3, 0.4, 0.1), 2.0, 1e-12).unwrap();
        assert!((p.coords.norm() - 0.5).abs() < 1e-10);
    }

    #[test]
    fn projects_onto_roche_lobe() {
        let pot = RochePotential::binary(&RocheParams::synchronous(0.5).unwrap());
        let p = project_onto_level_set(&pot, &Point3::new(0.1, 0.25, 0.2), 4.0, 1e-12).unwrap();
        assert!((pot.value(&p) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn sphere_normal_points_outward() {
        let pot = RochePotential::rotating(0.0, Vector3::z_axis());
        let (n, g) = outward_normal(&pot, &Point3::new(0.0, 0.0, 0.5)).unwrap();
        assert!((n.into_inner() - Vector3::z()).norm() < 1e-12);
        assert!((g - 4.0).abs() < 1e-12);
    }
}
