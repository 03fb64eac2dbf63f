pub mod body;
pub mod config;
pub mod error;
pub mod irradiation;
pub mod marching;
pub mod math;
pub mod mesh;
pub mod pipeline;
pub mod potential;
pub mod visibility;

pub use body::{Body, Choice, Component, EnvelopePart};
pub use config::Tolerances;
pub use error::{NonConvergence, Result, RocheError};
pub use irradiation::{solve_irradiation, IrradiatedBody, IrradiationParams, IrradiationSolution};
pub use marching::{MarchingMesh, MeshParams};
pub use mesh::{Mesh, MeshFields, MeshResult};
pub use pipeline::{generate_meshes, Frame, PlacedBody};
pub use potential::{
    critical_potentials, CriticalPotentials, Equipotential, Misalignment, RocheParams,
    RochePotential,
};
pub use visibility::{classify_visibility, ExchangeGraph, TriangleVisibility, VisibilityState};

/// Meshes one surface of a binary from flat parameters.
///
/// Detached lobes, contact envelopes and rotating single stars are all
/// triangulated by [`MarchingMesh`]; the resulting meshes feed
/// [`classify_visibility`] and [`solve_irradiation`].
///
/// `full` selects the global front bookkeeping; `false` runs the faster
/// depth-first variant.
///
/// # Errors
///
/// Returns `PotentialError::InvalidParameter` for invalid binary parameters
/// and any error of [`MarchingMesh::execute`].
#[allow(clippy::too_many_arguments)]
pub fn generate_mesh(
    q: f64,
    f: f64,
    d: f64,
    misalignment: Misalignment,
    potential: f64,
    delta: f64,
    choice: Choice,
    max_triangles: usize,
    fields: MeshFields,
    full: bool,
) -> Result<MeshResult> {
    let roche = RocheParams::new(q, f, d, misalignment)?;
    let body = Body::from_choice(roche, choice)?;
    let params = MeshParams::new(body, potential, delta)
        .with_max_triangles(max_triangles)
        .with_fields(fields)
        .with_full(full);
    MarchingMesh::new(params).execute()
}
