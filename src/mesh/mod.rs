mod attributes;
mod split;
mod validate;

pub use attributes::{MeshAttributes, MeshFields, MeshResult};
pub use split::{split_at_plane, MeshHalves};
pub use validate::{check_closed_manifold, check_on_surface, ManifoldReport};

use crate::math::{Isometry3, Point3, Vector3};

/// A triangle mesh owning its vertices.
///
/// Triangles reference vertices by index and wind counter-clockwise when
/// viewed from outside, so `(v1 − v0) × (v2 − v0)` points outwards.
/// A mesh is immutable once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    vertices: Vec<Point3>,
    triangles: Vec<[u32; 3]>,
}

impl Mesh {
    /// Creates a mesh from a vertex arena and triangle indices.
    #[must_use]
    pub fn new(vertices: Vec<Point3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    /// Vertex positions.
    #[must_use]
    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    /// Triangle vertex indices.
    #[must_use]
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// The three corners of triangle `i`.
    #[must_use]
    pub fn corners(&self, i: usize) -> [Point3; 3] {
        let [a, b, c] = self.triangles[i];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// `(v1 − v0) × (v2 − v0)`: twice the area along the outward normal.
    #[must_use]
    pub fn area_vector(&self, i: usize) -> Vector3 {
        let [v0, v1, v2] = self.corners(i);
        (v1 - v0).cross(&(v2 - v0))
    }

    /// Area of triangle `i`.
    #[must_use]
    pub fn triangle_area(&self, i: usize) -> f64 {
        self.area_vector(i).norm() * 0.5
    }

    /// Unit outward normal of triangle `i` from its winding, or zero if degenerate.
    #[must_use]
    pub fn triangle_normal(&self, i: usize) -> Vector3 {
        self.area_vector(i)
            .try_normalize(f64::MIN_POSITIVE)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Flat (polygon) centroid of triangle `i`.
    #[must_use]
    pub fn flat_centroid(&self, i: usize) -> Point3 {
        let [v0, v1, v2] = self.corners(i);
        Point3::from((v0.coords + v1.coords + v2.coords) / 3.0)
    }

    /// Total surface area.
    #[must_use]
    pub fn total_area(&self) -> f64 {
        (0..self.triangles.len()).map(|i| self.triangle_area(i)).sum()
    }

    /// Signed enclosed volume by the divergence theorem.
    ///
    /// Sums `(1/3) c·n A` over triangles, which equals the signed tetrahedron
    /// sum `(1/6) v0·(v1 × v2)`. Positive for a closed, outward-wound mesh.
    #[must_use]
    pub fn signed_volume(&self) -> f64 {
        self.volume_about(&Point3::origin())
    }

    /// Signed volume of the cone from `apex` over every triangle.
    ///
    /// Independent of `apex` for closed meshes; for an open mesh whose
    /// boundary lies in a plane through `apex` it is the volume enclosed by
    /// the mesh and that plane.
    #[must_use]
    pub fn volume_about(&self, apex: &Point3) -> f64 {
        let mut sum = 0.0;
        for i in 0..self.triangles.len() {
            let [v0, v1, v2] = self.corners(i);
            let (a, b, c) = (v0 - apex, v1 - apex, v2 - apex);
            sum += a.dot(&b.cross(&c));
        }
        sum / 6.0
    }

    /// Number of distinct undirected edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        let mut edges = std::collections::HashSet::with_capacity(self.triangles.len() * 3 / 2);
        for tri in &self.triangles {
            for k in 0..3 {
                let (a, b) = (tri[k], tri[(k + 1) % 3]);
                edges.insert((a.min(b), a.max(b)));
            }
        }
        edges.len()
    }

    /// `V − E + T`.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn euler_characteristic(&self) -> i64 {
        self.vertices.len() as i64 - self.edge_count() as i64 + self.triangles.len() as i64
    }

    /// Returns a copy with every vertex moved by `pose`.
    #[must_use]
    pub fn transformed(&self, pose: &Isometry3) -> Self {
        Self {
            vertices: self.vertices.iter().map(|p| pose * p).collect(),
            triangles: self.triangles.clone(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::Mesh;
    use crate::math::Point3;

    /// Regular octahedron with vertices at distance `r` from `center`.
    pub fn octahedron(center: Point3, r: f64) -> Mesh {
        let c = center.coords;
        let vertices = vec![
            Point3::from(c + nalgebra::Vector3::new(r, 0.0, 0.0)),
            Point3::from(c + nalgebra::Vector3::new(-r, 0.0, 0.0)),
            Point3::from(c + nalgebra::Vector3::new(0.0, r, 0.0)),
            Point3::from(c + nalgebra::Vector3::new(0.0, -r, 0.0)),
            Point3::from(c + nalgebra::Vector3::new(0.0, 0.0, r)),
            Point3::from(c + nalgebra::Vector3::new(0.0, 0.0, -r)),
        ];
        let triangles = vec![
            [0, 2, 4],
            [2, 1, 4],
            [1, 3, 4],
            [3, 0, 4],
            [2, 0, 5],
            [1, 2, 5],
            [3, 1, 5],
            [0, 3, 5],
        ];
        Mesh::new(vertices, triangles)
    }
}
