use std::collections::HashMap;

use crate::error::{MeshError, Result};
use crate::potential::Equipotential;

use super::Mesh;

/// Counts gathered while checking a closed mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManifoldReport {
    /// Number of vertices.
    pub vertices: usize,
    /// Number of undirected edges.
    pub edges: usize,
    /// Number of triangles.
    pub triangles: usize,
    /// `V − E + T`.
    pub euler_characteristic: i64,
    /// Signed enclosed volume.
    pub volume: f64,
}

/// Verifies that `mesh` is a closed, consistently oriented genus-0 surface
/// wound outwards.
///
/// Every directed edge must occur exactly once and its reverse exactly once,
/// every vertex must be referenced, `V − E + T` must be 2 and the signed
/// volume must be positive.
///
/// # Errors
///
/// Returns `MeshError::DegenerateTopology` describing the first violation.
#[allow(clippy::cast_possible_wrap)]
pub fn check_closed_manifold(mesh: &Mesh) -> Result<ManifoldReport> {
    let degenerate = |msg: String| -> crate::error::RocheError {
        MeshError::DegenerateTopology(msg).into()
    };
    if mesh.triangle_count() == 0 {
        return Err(degenerate("mesh has no triangles".into()));
    }

    let mut directed: HashMap<(u32, u32), usize> =
        HashMap::with_capacity(mesh.triangle_count() * 3);
    let mut used = vec![false; mesh.vertex_count()];
    for (t, tri) in mesh.triangles().iter().enumerate() {
        if tri[0] == tri[1] || tri[1] == tri[2] || tri[2] == tri[0] {
            return Err(degenerate(format!("triangle {t} repeats a vertex")));
        }
        for k in 0..3 {
            let (a, b) = (tri[k], tri[(k + 1) % 3]);
            let Some(flag) = used.get_mut(a as usize) else {
                return Err(degenerate(format!("triangle {t} references missing vertex {a}")));
            };
            *flag = true;
            let count = directed.entry((a, b)).or_insert(0);
            *count += 1;
            if *count > 1 {
                return Err(degenerate(format!("directed edge {a}->{b} used twice")));
            }
        }
    }
    if let Some((&(a, b), _)) = directed
        .iter()
        .find(|(edge, _)| !directed.contains_key(&(edge.1, edge.0)))
    {
        return Err(degenerate(format!("edge {a}->{b} has no opposite")));
    }
    if let Some(v) = used.iter().position(|&u| !u) {
        return Err(degenerate(format!("vertex {v} is not referenced")));
    }

    let edges = directed.len() / 2;
    let euler_characteristic =
        mesh.vertex_count() as i64 - edges as i64 + mesh.triangle_count() as i64;
    if euler_characteristic != 2 {
        return Err(degenerate(format!(
            "Euler characteristic is {euler_characteristic}, expected 2"
        )));
    }
    let volume = mesh.signed_volume();
    if volume.is_nan() || volume <= 0.0 {
        return Err(degenerate(format!("enclosed volume {volume} is not positive")));
    }

    Ok(ManifoldReport {
        vertices: mesh.vertex_count(),
        edges,
        triangles: mesh.triangle_count(),
        euler_characteristic,
        volume,
    })
}

/// Verifies that every vertex satisfies `|Ω(v) − target| <= tolerance`.
///
/// Returns the largest residual.
///
/// # Errors
///
/// Returns `MeshError::DegenerateTopology` naming the worst vertex.
pub fn check_on_surface<P: Equipotential>(
    mesh: &Mesh,
    potential: &P,
    target: f64,
    tolerance: f64,
) -> Result<f64> {
    let mut worst = (0, 0.0_f64);
    for (i, v) in mesh.vertices().iter().enumerate() {
        let residual = (potential.value(v) - target).abs();
        if !residual.is_finite() {
            worst = (i, f64::INFINITY);
            break;
        }
        if residual > worst.1 {
            worst = (i, residual);
        }
    }
    if worst.1 > tolerance {
        return Err(MeshError::DegenerateTopology(format!(
            "vertex {} is off the level set by {:e}",
            worst.0, worst.1
        ))
        .into());
    }
    Ok(worst.1)
}
