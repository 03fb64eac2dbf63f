use rayon::prelude::*;

use crate::config::Tolerances;
use crate::error::Result;
use crate::marching::{outward_normal, project_onto_level_set};
use crate::math::{Point3, Vector3};
use crate::potential::Equipotential;

use super::Mesh;

/// Optional per-element arrays to compute alongside a mesh.
///
/// Total area and volume are always reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[allow(clippy::struct_excessive_bools)]
pub struct MeshFields {
    /// Outward unit normal at each vertex.
    pub vertex_normals: bool,
    /// `|∇Ω|` at each vertex.
    pub vertex_gradient_norms: bool,
    /// Unit normal of each triangle from its winding.
    pub triangle_normals: bool,
    /// Area of each triangle.
    pub areas: bool,
    /// Triangle centroids projected onto the level set.
    pub centroids: bool,
    /// Outward unit normal at each projected centroid.
    pub centroid_normals: bool,
    /// `|∇Ω|` at each projected centroid.
    pub centroid_gradient_norms: bool,
}

impl MeshFields {
    /// Requests every field.
    #[must_use]
    pub fn all() -> Self {
        Self {
            vertex_normals: true,
            vertex_gradient_norms: true,
            triangle_normals: true,
            areas: true,
            centroids: true,
            centroid_normals: true,
            centroid_gradient_norms: true,
        }
    }

    fn any_vertex(&self) -> bool {
        self.vertex_normals || self.vertex_gradient_norms
    }

    fn any_centroid(&self) -> bool {
        self.centroids || self.centroid_normals || self.centroid_gradient_norms
    }
}

/// A generated mesh with the fields requested in [`MeshFields`].
#[derive(Debug, Clone, PartialEq)]
pub struct MeshResult {
    /// Vertices and triangle connectivity.
    pub mesh: Mesh,
    pub vertex_normals: Option<Vec<Vector3>>,
    pub vertex_gradient_norms: Option<Vec<f64>>,
    pub triangle_normals: Option<Vec<Vector3>>,
    pub areas: Option<Vec<f64>>,
    pub centroids: Option<Vec<Point3>>,
    pub centroid_normals: Option<Vec<Vector3>>,
    pub centroid_gradient_norms: Option<Vec<f64>>,
    /// Sum of triangle areas.
    pub total_area: f64,
    /// Enclosed volume, measured from the cut plane for envelope halves.
    pub volume: f64,
}

/// Post-processes a mesh of the level set `Ω = target`.
pub struct MeshAttributes<'a, P> {
    potential: &'a P,
    target: f64,
    tolerance: f64,
    fields: MeshFields,
    volume_apex: Point3,
}

impl<'a, P: Equipotential> MeshAttributes<'a, P> {
    /// Creates a post-processor computing every field.
    #[must_use]
    pub fn new(potential: &'a P, target: f64) -> Self {
        Self {
            potential,
            target,
            tolerance: Tolerances::default().potential,
            fields: MeshFields::all(),
            volume_apex: Point3::origin(),
        }
    }

    /// Sets the fields to compute.
    #[must_use]
    pub fn with_fields(mut self, fields: MeshFields) -> Self {
        self.fields = fields;
        self
    }

    /// Sets the level-set tolerance used when projecting centroids.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Measures the volume as cones from `apex` instead of the origin.
    #[must_use]
    pub fn with_volume_apex(mut self, apex: Point3) -> Self {
        self.volume_apex = apex;
        self
    }

    /// Computes the requested fields, consuming the mesh into the result.
    ///
    /// # Errors
    ///
    /// Returns an error if a centroid cannot be projected onto the level set
    /// or the gradient vanishes at a vertex or centroid.
    pub fn execute(&self, mesh: Mesh) -> Result<MeshResult> {
        let fields = self.fields;

        let (vertex_normals, vertex_gradient_norms) = if fields.any_vertex() {
            let pairs = mesh
                .vertices()
                .par_iter()
                .map(|v| outward_normal(self.potential, v))
                .collect::<Result<Vec<_>>>()?;
            let (normals, norms): (Vec<Vector3>, Vec<f64>) =
                pairs.into_iter().map(|(n, g)| (n.into_inner(), g)).unzip();
            (
                fields.vertex_normals.then_some(normals),
                fields.vertex_gradient_norms.then_some(norms),
            )
        } else {
            (None, None)
        };

        let (centroids, centroid_normals, centroid_gradient_norms) = if fields.any_centroid() {
            let samples = (0..mesh.triangle_count())
                .into_par_iter()
                .map(|i| {
                    let c = project_onto_level_set(
                        self.potential,
                        &mesh.flat_centroid(i),
                        self.target,
                        self.tolerance,
                    )?;
                    let (n, g) = outward_normal(self.potential, &c)?;
                    Ok((c, n.into_inner(), g))
                })
                .collect::<Result<Vec<_>>>()?;
            let mut centroids = Vec::with_capacity(samples.len());
            let mut normals = Vec::with_capacity(samples.len());
            let mut norms = Vec::with_capacity(samples.len());
            for (c, n, g) in samples {
                centroids.push(c);
                normals.push(n);
                norms.push(g);
            }
            (
                fields.centroids.then_some(centroids),
                fields.centroid_normals.then_some(normals),
                fields.centroid_gradient_norms.then_some(norms),
            )
        } else {
            (None, None, None)
        };

        let triangle_normals = fields
            .triangle_normals
            .then(|| (0..mesh.triangle_count()).map(|i| mesh.triangle_normal(i)).collect());
        let areas: Vec<f64> = (0..mesh.triangle_count())
            .map(|i| mesh.triangle_area(i))
            .collect();
        let total_area = areas.iter().sum();
        let volume = mesh.volume_about(&self.volume_apex);

        Ok(MeshResult {
            mesh,
            vertex_normals,
            vertex_gradient_norms,
            triangle_normals,
            areas: fields.areas.then_some(areas),
            centroids,
            centroid_normals,
            centroid_gradient_norms,
            total_area,
            volume,
        })
    }
}
