use rayon::prelude::*;
use tracing::{debug, debug_span};

use crate::config::Tolerances;
use crate::error::Result;
use crate::irradiation::{solve_irradiation, IrradiatedBody, IrradiationParams, IrradiationSolution};
use crate::marching::{MarchingMesh, MeshParams};
use crate::math::{Isometry3, Vector3};
use crate::mesh::{Mesh, MeshResult};
use crate::visibility::{classify_visibility, ExchangeGraph, VisibilityState};

/// Generates independent meshes in parallel, one result per job, in order.
#[must_use]
pub fn generate_meshes(jobs: &[MeshParams]) -> Vec<Result<MeshResult>> {
    let _span = debug_span!("generate_meshes", jobs = jobs.len()).entered();
    jobs.par_iter()
        .map(|params| MarchingMesh::new(*params).execute())
        .collect()
}

/// A mesh and its placement in the system frame.
#[derive(Debug, Clone, Copy)]
pub struct PlacedBody<'a> {
    pub mesh: &'a Mesh,
    pub pose: Isometry3,
}

/// The bodies of a system at one instant, in a common frame.
///
/// Placement, visibility and irradiation of a frame depend only on the
/// previous stage's output, so frames can be evaluated independently.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    bodies: Vec<Mesh>,
}

/// Everything computed for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameOutput {
    pub visibility: Vec<VisibilityState>,
    pub irradiation: IrradiationSolution,
}

impl Frame {
    /// Places each mesh with its pose.
    #[must_use]
    pub fn new(placed: &[PlacedBody<'_>]) -> Self {
        let bodies = placed
            .par_iter()
            .map(|p| p.mesh.transformed(&p.pose))
            .collect();
        Self { bodies }
    }

    /// Placed meshes, in input order.
    #[must_use]
    pub fn bodies(&self) -> &[Mesh] {
        &self.bodies
    }

    /// Classifies every triangle as seen from `observer`.
    ///
    /// # Errors
    ///
    /// See [`classify_visibility`].
    pub fn visibility(
        &self,
        observer: &Vector3,
        tolerances: &Tolerances,
    ) -> Result<Vec<VisibilityState>> {
        classify_visibility(&self.bodies, observer, tolerances)
    }

    /// Form factors between the placed bodies.
    #[must_use]
    pub fn exchange(&self) -> ExchangeGraph {
        ExchangeGraph::build(&self.bodies)
    }

    /// Runs visibility and irradiation for this frame.
    ///
    /// # Errors
    ///
    /// Propagates visibility errors and irradiation input errors.
    /// Non-convergence is reported inside the returned solution.
    pub fn evaluate(
        &self,
        observer: &Vector3,
        sources: &[IrradiatedBody],
        tolerances: &Tolerances,
        params: &IrradiationParams,
    ) -> Result<FrameOutput> {
        let _span = debug_span!("frame", bodies = self.bodies.len()).entered();
        let visibility = self.visibility(observer, tolerances)?;
        let graph = self.exchange();
        let irradiation = solve_irradiation(sources, &graph, params)?;
        debug!(
            iterations = irradiation.iterations,
            converged = irradiation.converged(),
            "frame evaluated"
        );
        Ok(FrameOutput {
            visibility,
            irradiation,
        })
    }
}
