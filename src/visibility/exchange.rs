use std::f64::consts::PI;

use rayon::prelude::*;
use tracing::debug;

use crate::math::{Point3, Vector3};
use crate::mesh::Mesh;

/// Parametric slack when testing a centroid-to-centroid segment against
/// occluding triangles; hits this close to either end do not block.
const SEGMENT_SLACK: f64 = 1e-9;

/// One radiative coupling from a source triangle to a receiver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeLink {
    /// Index of the source body.
    pub body: usize,
    /// Index of the source triangle within its body.
    pub triangle: usize,
    /// Form factor: the fraction of the source's radiance intercepted by
    /// the receiver, per unit receiver area.
    pub factor: f64,
}

/// Mutual visibility between the triangles of different bodies.
///
/// For receiver `i` and source `j` facing each other at distance `r`,
/// `F_ij = cos θ_i cos θ_j A_j / (π r²)`, so that `A_i F_ij = A_j F_ji`.
/// Triangles of the same body never exchange flux, and a pair is unlinked
/// when a third body crosses the segment between the two centroids.
///
/// Only per-triangle data is stored. Links are evaluated on demand, so the
/// graph grows linearly with the number of triangles.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeGraph {
    bodies: Vec<BodyElements>,
    /// Bodies that may block exchange between bodies `b` and `c`, at `[b][c]`.
    occluders: Vec<Vec<Vec<usize>>>,
}

#[derive(Debug, Clone, PartialEq)]
struct Element {
    centroid: Point3,
    normal: Vector3,
    area: f64,
    corners: [Point3; 3],
}

#[derive(Debug, Clone, PartialEq)]
struct BodyElements {
    elements: Vec<Element>,
    center: Point3,
    radius: f64,
}

impl BodyElements {
    fn new(mesh: &Mesh) -> Self {
        let elements: Vec<Element> = (0..mesh.triangle_count())
            .map(|i| Element {
                centroid: mesh.flat_centroid(i),
                normal: mesh.triangle_normal(i),
                area: mesh.triangle_area(i),
                corners: mesh.corners(i),
            })
            .collect();
        let (center, radius) = bounding_sphere(mesh.vertices());
        Self {
            elements,
            center,
            radius,
        }
    }
}

/// Centre of the axis-aligned bounds and the distance to the farthest point.
fn bounding_sphere(points: &[Point3]) -> (Point3, f64) {
    let Some(first) = points.first() else {
        return (Point3::origin(), 0.0);
    };
    let (lo, hi) = points
        .iter()
        .fold((*first, *first), |(lo, hi), p| (lo.inf(p), hi.sup(p)));
    let center = nalgebra::center(&lo, &hi);
    let radius = points
        .iter()
        .map(|p| (p - center).norm())
        .fold(0.0, f64::max);
    (center, radius)
}

/// Distance from `p` to the segment `a → b`.
fn segment_distance(p: &Point3, a: &Point3, b: &Point3) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    let t = if len_sq > 0.0 {
        ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (p - (a + ab * t)).norm()
}

/// Returns `true` if the open segment `a → b` crosses triangle `corners`.
#[allow(clippy::many_single_char_names)]
fn segment_hits_triangle(a: &Point3, b: &Point3, corners: &[Point3; 3]) -> bool {
    let dir = b - a;
    let e1 = corners[1] - corners[0];
    let e2 = corners[2] - corners[0];
    let p = dir.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() <= f64::MIN_POSITIVE {
        return false;
    }
    let inv = 1.0 / det;
    let s = a - corners[0];
    let u = s.dot(&p) * inv;
    if !(0.0..=1.0).contains(&u) {
        return false;
    }
    let q = s.cross(&e1);
    let v = dir.dot(&q) * inv;
    if v < 0.0 || u + v > 1.0 {
        return false;
    }
    let t = e2.dot(&q) * inv;
    t > SEGMENT_SLACK && t < 1.0 - SEGMENT_SLACK
}

impl ExchangeGraph {
    /// Builds the graph for bodies placed in a common frame.
    #[must_use]
    pub fn build(bodies: &[Mesh]) -> Self {
        let bodies: Vec<BodyElements> = bodies.par_iter().map(BodyElements::new).collect();

        // A body can only block a pair if it meets the capsule swept by the
        // larger of the two bounding spheres along the line of their centres.
        let n = bodies.len();
        let occluders = (0..n)
            .map(|b| {
                (0..n)
                    .map(|c| {
                        if b == c {
                            return Vec::new();
                        }
                        let reach = bodies[b].radius.max(bodies[c].radius);
                        (0..n)
                            .filter(|&k| k != b && k != c)
                            .filter(|&k| {
                                let dist = segment_distance(
                                    &bodies[k].center,
                                    &bodies[b].center,
                                    &bodies[c].center,
                                );
                                dist < bodies[k].radius + reach
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect();

        let graph = Self { bodies, occluders };
        debug!(
            bodies = graph.body_count(),
            triangles = graph.bodies.iter().map(|b| b.elements.len()).sum::<usize>(),
            "exchange graph built"
        );
        graph
    }

    /// Number of bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Number of triangles of `body`.
    #[must_use]
    pub fn triangle_count(&self, body: usize) -> usize {
        self.bodies[body].elements.len()
    }

    /// Area of triangle `triangle` of `body`.
    #[must_use]
    pub fn area(&self, body: usize, triangle: usize) -> f64 {
        self.bodies[body].elements[triangle].area
    }

    /// Form factor from source `(source_body, source)` into `(body, triangle)`,
    /// or zero if they do not see each other.
    #[must_use]
    pub fn factor(&self, body: usize, triangle: usize, source_body: usize, source: usize) -> f64 {
        if body == source_body {
            return 0.0;
        }
        self.visible_factor(body, triangle, source_body, source)
            .unwrap_or(0.0)
    }

    /// Calls `f` for every link into triangle `triangle` of `body`.
    pub fn for_each_link<F>(&self, body: usize, triangle: usize, mut f: F)
    where
        F: FnMut(ExchangeLink),
    {
        for c in 0..self.bodies.len() {
            if c == body {
                continue;
            }
            for j in 0..self.bodies[c].elements.len() {
                if let Some(factor) = self.visible_factor(body, triangle, c, j) {
                    f(ExchangeLink {
                        body: c,
                        triangle: j,
                        factor,
                    });
                }
            }
        }
    }

    /// Links into triangle `triangle` of `body`.
    #[must_use]
    pub fn links(&self, body: usize, triangle: usize) -> Vec<ExchangeLink> {
        let mut out = Vec::new();
        self.for_each_link(body, triangle, |link| out.push(link));
        out
    }

    /// Flux received by triangle `triangle` of `body` when every source
    /// triangle emits `radiosity[source_body][source]`.
    #[must_use]
    pub fn incident(&self, body: usize, triangle: usize, radiosity: &[Vec<f64>]) -> f64 {
        let mut sum = 0.0;
        self.for_each_link(body, triangle, |link| {
            sum += link.factor * radiosity[link.body][link.triangle];
        });
        sum
    }

    fn visible_factor(
        &self,
        body: usize,
        triangle: usize,
        source_body: usize,
        source: usize,
    ) -> Option<f64> {
        let receiver = &self.bodies[body].elements[triangle];
        let emitter = &self.bodies[source_body].elements[source];
        let factor = form_factor(receiver, emitter)?;
        if self.blocked(body, source_body, &receiver.centroid, &emitter.centroid) {
            return None;
        }
        Some(factor)
    }

    fn blocked(&self, body: usize, source_body: usize, a: &Point3, b: &Point3) -> bool {
        self.occluders[body][source_body].iter().any(|&k| {
            let occluder = &self.bodies[k];
            segment_distance(&occluder.center, a, b) < occluder.radius
                && occluder
                    .elements
                    .iter()
                    .any(|e| segment_hits_triangle(a, b, &e.corners))
        })
    }
}

fn form_factor(receiver: &Element, source: &Element) -> Option<f64> {
    let r = source.centroid - receiver.centroid;
    let dist_sq = r.norm_squared();
    if dist_sq <= f64::MIN_POSITIVE {
        return None;
    }
    let dist = dist_sq.sqrt();
    let cos_receiver = receiver.normal.dot(&r) / dist;
    let cos_source = -source.normal.dot(&r) / dist;
    if cos_receiver <= 0.0 || cos_source <= 0.0 {
        return None;
    }
    Some(cos_receiver * cos_source * source.area / (PI * dist_sq))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Isometry3;
    use crate::mesh::fixtures::octahedron;
    use approx::assert_relative_eq;

    fn pair() -> Vec<Mesh> {
        let a = octahedron(Point3::origin(), 1.0);
        let b = octahedron(Point3::origin(), 0.6)
            .transformed(&Isometry3::translation(3.0, 0.4, -0.2));
        vec![a, b]
    }

    fn element(centroid: Point3, normal: Vector3, area: f64) -> Element {
        Element {
            centroid,
            normal,
            area,
            corners: [centroid; 3],
        }
    }

    #[test]
    fn reciprocity_holds() {
        let bodies = pair();
        let graph = ExchangeGraph::build(&bodies);
        assert!((0..graph.triangle_count(0)).any(|i| !graph.links(0, i).is_empty()));
        for i in 0..graph.triangle_count(0) {
            for link in graph.links(0, i) {
                let forward = graph.area(0, i) * link.factor;
                let backward = graph.area(1, link.triangle) * graph.factor(1, link.triangle, 0, i);
                assert_relative_eq!(forward, backward, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn only_facing_pairs_are_linked() {
        let bodies = pair();
        let graph = ExchangeGraph::build(&bodies);
        for i in 0..graph.triangle_count(0) {
            let facing_companion = bodies[0].triangle_normal(i).x > 0.0;
            if !facing_companion {
                assert!(graph.links(0, i).is_empty());
            }
        }
        assert!(graph.links(0, 0).iter().all(|l| l.body == 1));
        assert_relative_eq!(graph.factor(0, 0, 0, 1), 0.0);
    }

    #[test]
    fn middle_body_blocks_outer_pair() {
        let row: Vec<Mesh> = [0.0, 3.0, 6.0]
            .iter()
            .map(|x| octahedron(Point3::new(*x, 0.0, 0.0), 1.0))
            .collect();
        let graph = ExchangeGraph::build(&row);
        assert_eq!(graph.occluders[0][2], vec![1]);
        assert!(graph.occluders[0][1].is_empty());

        let mut outer = 0;
        let mut inner = 0;
        for i in 0..graph.triangle_count(0) {
            graph.for_each_link(0, i, |link| match link.body {
                2 => outer += 1,
                _ => inner += 1,
            });
        }
        assert_eq!(outer, 0);
        assert!(inner > 0);

        // Moving the middle body out of the way restores the outer links.
        let mut moved = row.clone();
        moved[1] = octahedron(Point3::new(3.0, 5.0, 0.0), 1.0);
        let graph = ExchangeGraph::build(&moved);
        assert!(graph.occluders[0][2].is_empty());
        let outer: usize = (0..graph.triangle_count(0))
            .map(|i| graph.links(0, i).iter().filter(|l| l.body == 2).count())
            .sum();
        assert!(outer > 0);
    }

    #[test]
    fn incident_flux_sums_links() {
        let bodies = pair();
        let graph = ExchangeGraph::build(&bodies);
        let radiosity: Vec<Vec<f64>> = (0..2)
            .map(|b| vec![2.0; graph.triangle_count(b)])
            .collect();
        for i in 0..graph.triangle_count(0) {
            let expected: f64 = graph.links(0, i).iter().map(|l| 2.0 * l.factor).sum();
            assert_relative_eq!(graph.incident(0, i, &radiosity), expected, max_relative = 1e-12);
        }
    }

    #[test]
    fn segment_crossing_needs_interior_hit() {
        let tri = [
            Point3::new(0.0, -1.0, -1.0),
            Point3::new(0.0, 1.0, -1.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let a = Point3::new(-1.0, 0.0, 0.0);
        assert!(segment_hits_triangle(&a, &Point3::new(1.0, 0.0, 0.0), &tri));
        assert!(!segment_hits_triangle(&a, &Point3::new(-0.5, 0.0, 0.0), &tri));
        assert!(!segment_hits_triangle(&a, &Point3::new(1.0, 3.0, 0.0), &tri));
    }

    #[test]
    fn distant_small_source_matches_point_source() {
        let receiver = element(Point3::origin(), Vector3::x(), 1.0);
        let source = element(Point3::new(100.0, 0.0, 0.0), -Vector3::x(), 2.0);
        let f = form_factor(&receiver, &source).unwrap_or_default();
        assert_relative_eq!(f, 2.0 / (PI * 1e4), max_relative = 1e-12);
    }
}
