use crate::math::Point3;

use super::Mesh;

/// The two open parts of a mesh cut by a plane `x = const`.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshHalves {
    /// Triangles whose centroid lies at `x < plane`.
    pub primary: Mesh,
    /// Triangles whose centroid lies at `x >= plane`.
    pub secondary: Mesh,
}

/// Partitions the triangles of `mesh` by the side of `x = plane` their flat
/// centroid falls on.
///
/// Each half keeps only the vertices it references, renumbered in order of
/// first use. Every triangle lands in exactly one half.
#[must_use]
pub fn split_at_plane(mesh: &Mesh, plane: f64) -> MeshHalves {
    let (left, right): (Vec<usize>, Vec<usize>) =
        (0..mesh.triangle_count()).partition(|&i| mesh.flat_centroid(i).x < plane);
    MeshHalves {
        primary: extract(mesh, &left),
        secondary: extract(mesh, &right),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn extract(mesh: &Mesh, selected: &[usize]) -> Mesh {
    let mut remap = vec![u32::MAX; mesh.vertex_count()];
    let mut vertices: Vec<Point3> = Vec::new();
    let mut triangles = Vec::with_capacity(selected.len());
    for &t in selected {
        let tri = mesh.triangles()[t];
        let mut out = [0u32; 3];
        for (slot, &v) in out.iter_mut().zip(tri.iter()) {
            let mapped = &mut remap[v as usize];
            if *mapped == u32::MAX {
                *mapped = vertices.len() as u32;
                vertices.push(mesh.vertices()[v as usize]);
            }
            *slot = *mapped;
        }
        triangles.push(out);
    }
    Mesh::new(vertices, triangles)
}
